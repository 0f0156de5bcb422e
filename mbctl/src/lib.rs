//! Client engine for the privileged mbtool daemon.
//!
//! A [`Client`] owns one connection to the daemon's local socket. The first
//! call connects and runs the handshake (credential check, interface
//! negotiation, minimum version); if the daemon is missing or refuses, the
//! bundled daemon can be installed and launched through a privileged shell
//! before a single retry. Calls are serialized over the connection, and any
//! transport or protocol failure drops it so the next call starts fresh.
//!
//! Outcomes the daemon reports itself (a failed chmod, a checksum mismatch)
//! come back as values; [`Error`] is reserved for failures of the
//! connection or protocol.

mod context;
mod env;
mod error;
mod handshake;
mod operation;
pub mod version;

#[cfg(unix)]
mod bootstrap;
#[cfg(unix)]
mod client;
#[cfg(unix)]
mod connection;

#[cfg(all(test, unix))]
mod testutil;

pub use context::DispatchContext;
pub use env::{BootDevice, BundledDaemon, CommandRunner, DaemonLocator, StaticBootDevice, SuRunner};
pub use error::{Error, Result};
pub use handshake::{Requirements, handshake};
pub use operation::{Operation, execute};
pub use version::{ParseVersionError, Version};

#[cfg(unix)]
pub use client::{Client, ClientBuilder, SetKernelResult, SwitchRomResult, WipeResult};
#[cfg(unix)]
pub use connection::{SocketAddress, State};

pub use mbctl_proto::{RomEntry, WipeTarget};
