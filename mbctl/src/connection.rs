//! The single logical connection to the daemon.
//!
//! A [`Connection`] is lazily opened by the first call that needs it,
//! handshaken, and torn down again on any failure. When the daemon cannot
//! be reached and bootstrap collaborators are configured, the bundled
//! daemon is installed and launched once before a single retry.

use std::fmt;
use std::io::{self, BufReader, BufWriter, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::bootstrap;
use crate::context;
use crate::env::{CommandRunner, DaemonLocator};
use crate::error::{Error, Result};
use crate::handshake::{self, Requirements};
use crate::operation::{self, Operation};

/// Where the daemon listens.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SocketAddress {
    /// A name in the Linux abstract socket namespace.
    Abstract(String),
    /// A filesystem socket.
    Path(PathBuf),
}

impl SocketAddress {
    /// Opens a raw stream to the address.
    pub fn connect(&self) -> io::Result<UnixStream> {
        match self {
            Self::Abstract(name) => connect_abstract(name),
            Self::Path(path) => UnixStream::connect(path),
        }
    }
}

impl Default for SocketAddress {
    fn default() -> Self {
        Self::Abstract(mbctl_proto::SOCKET_NAME.to_owned())
    }
}

impl fmt::Display for SocketAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abstract(name) => write!(f, "@{name}"),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn connect_abstract(name: &str) -> io::Result<UnixStream> {
    #[cfg(target_os = "android")]
    use std::os::android::net::SocketAddrExt;
    #[cfg(target_os = "linux")]
    use std::os::linux::net::SocketAddrExt;

    let addr = std::os::unix::net::SocketAddr::from_abstract_name(name.as_bytes())?;
    UnixStream::connect_addr(&addr)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn connect_abstract(name: &str) -> io::Result<UnixStream> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("abstract socket @{name} requires Linux or Android"),
    ))
}

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum State {
    /// No socket.
    #[default]
    Disconnected,
    /// Opening the socket.
    Connecting,
    /// Socket open, handshake in progress.
    Handshaking,
    /// Handshake complete; operations may run.
    Ready,
}

/// Settings shared by every connect attempt.
pub(crate) struct Config {
    /// Daemon socket.
    pub address: SocketAddress,
    /// What the handshake enforces.
    pub requirements: Requirements,
    /// Where bootstrap installs the daemon.
    pub install_path: PathBuf,
    /// How long to wait for a freshly launched daemon to listen.
    pub ready_timeout: Duration,
    /// Privileged shell; bootstrap is disabled without it.
    pub runner: Option<Box<dyn CommandRunner>>,
    /// Bundled daemon; bootstrap is disabled without it.
    pub locator: Option<Box<dyn DaemonLocator>>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("address", &self.address)
            .field("requirements", &self.requirements)
            .field("install_path", &self.install_path)
            .field("ready_timeout", &self.ready_timeout)
            .field("bootstrap", &self.can_bootstrap())
            .finish()
    }
}

impl Config {
    /// Returns `true` if both bootstrap collaborators are present.
    pub const fn can_bootstrap(&self) -> bool {
        self.runner.is_some() && self.locator.is_some()
    }
}

/// Buffered halves of one socket.
#[derive(Debug)]
struct Link {
    /// Read half.
    reader: BufReader<UnixStream>,
    /// Write half.
    writer: BufWriter<UnixStream>,
}

impl Link {
    fn new(stream: UnixStream) -> io::Result<Self> {
        Ok(Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
        })
    }
}

/// Connection state machine. Owns the socket while [`State::Ready`].
#[derive(Debug, Default)]
pub(crate) struct Connection {
    /// Lifecycle position.
    state: State,
    /// Socket, present only while ready.
    link: Option<Link>,
    /// Daemon version string; present only while ready.
    daemon_version: Option<String>,
}

impl Connection {
    pub const fn state(&self) -> State {
        self.state
    }

    pub fn daemon_version(&self) -> Option<&str> {
        self.daemon_version.as_deref()
    }

    /// Connects and handshakes unless already ready.
    ///
    /// On failure, bootstraps the daemon (if configured) and retries once.
    pub fn ensure_ready(&mut self, cfg: &Config) -> Result<()> {
        context::ensure_blocking_allowed("connect")?;
        if self.state == State::Ready {
            return Ok(());
        }

        let first = match self.open(cfg, None) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        let (Some(runner), Some(locator)) = (cfg.runner.as_deref(), cfg.locator.as_deref()) else {
            return Err(first);
        };
        warn!(address = %cfg.address, error = %first, "daemon unavailable, bootstrapping");

        bootstrap::launch(runner, locator, &cfg.install_path)?;
        let stream = bootstrap::wait_for_socket(&cfg.address, cfg.ready_timeout)
            .map_err(Error::transport("connect"))?;
        self.open(cfg, Some(stream))
    }

    /// One connect-and-handshake attempt, reusing `stream` if given.
    fn open(&mut self, cfg: &Config, stream: Option<UnixStream>) -> Result<()> {
        self.disconnect();
        self.set_state(State::Connecting);
        let result = stream
            .map_or_else(|| cfg.address.connect(), Ok)
            .map_err(Error::transport("connect"))
            .and_then(|stream| self.handshake(cfg, stream));
        if result.is_err() {
            self.disconnect();
        }
        result
    }

    fn handshake(&mut self, cfg: &Config, stream: UnixStream) -> Result<()> {
        let mut link = Link::new(stream).map_err(Error::transport("connect"))?;
        self.set_state(State::Handshaking);
        let version = handshake::handshake(&mut link.reader, &mut link.writer, &cfg.requirements)?;

        info!(address = %cfg.address, version = %version, "connected to daemon");
        self.link = Some(link);
        self.daemon_version = Some(version);
        self.set_state(State::Ready);
        Ok(())
    }

    /// Runs `op` on a ready connection, tearing down on any failure.
    pub fn call<O: Operation>(&mut self, cfg: &Config, op: O) -> Result<O::Output> {
        self.ensure_ready(cfg)?;
        let result = match self.link.as_mut() {
            Some(link) => operation::execute(&mut link.reader, &mut link.writer, op),
            None => Err(Error::transport(O::NAME)(io::ErrorKind::NotConnected.into())),
        };
        match &result {
            // Refused before any I/O; the stream is still in sync.
            Err(Error::ThreadingViolation { .. }) | Ok(_) => {}
            Err(e) => {
                debug!(op = O::NAME, error = %e, "tearing down after failed call");
                self.disconnect();
            }
        }
        result
    }

    /// Closes the socket, suppressing close errors. Idempotent.
    pub fn disconnect(&mut self) {
        if let Some(mut link) = self.link.take() {
            let _ = link.writer.flush();
            let _ = link.writer.get_ref().shutdown(Shutdown::Both);
        }
        self.daemon_version = None;
        self.set_state(State::Disconnected);
    }

    fn set_state(&mut self, next: State) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "connection state");
            self.state = next;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mbctl_proto::{INTERFACE_VERSION, TOKEN_DENY};

    use super::*;
    use crate::testutil::{FakeDaemon, Script};
    use crate::version::Version;

    fn config(address: SocketAddress) -> Config {
        Config {
            address,
            requirements: Requirements {
                interface_version: INTERFACE_VERSION,
                min_version: Version::new(9, 0, 0),
            },
            install_path: "/mbtool".into(),
            ready_timeout: Duration::from_secs(1),
            runner: None,
            locator: None,
        }
    }

    #[test]
    fn address_display_and_default() {
        assert_eq!(SocketAddress::default().to_string(), "@mbtool.daemon");
        assert_eq!(
            SocketAddress::Path("/tmp/d.sock".into()).to_string(),
            "/tmp/d.sock"
        );
    }

    #[test]
    fn ensure_ready_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.sock");
        let daemon = FakeDaemon::bind(&path, vec![Script::ready("9.2.0")]);
        let cfg = config(SocketAddress::Path(path));

        let mut conn = Connection::default();
        conn.ensure_ready(&cfg).unwrap();
        conn.ensure_ready(&cfg).unwrap();
        assert_eq!(conn.state(), State::Ready);
        assert_eq!(conn.daemon_version(), Some("9.2.0"));

        conn.disconnect();
        conn.disconnect();
        assert_eq!(conn.state(), State::Disconnected);
        assert_eq!(conn.daemon_version(), None);

        let transcripts = daemon.join();
        assert_eq!(transcripts.len(), 1);
        assert!(transcripts[0].trailing.is_empty());
    }

    #[test]
    fn failed_handshake_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.sock");
        let daemon = FakeDaemon::bind(&path, vec![Script::greeting(TOKEN_DENY)]);
        let cfg = config(SocketAddress::Path(path));

        let mut conn = Connection::default();
        assert!(matches!(conn.ensure_ready(&cfg), Err(Error::AuthDenied)));
        assert_eq!(conn.state(), State::Disconnected);
        assert!(conn.link.is_none());
        daemon.join();
    }

    #[test]
    fn missing_daemon_without_bootstrap_is_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(SocketAddress::Path(dir.path().join("none.sock")));
        let err = Connection::default().ensure_ready(&cfg).unwrap_err();
        assert!(matches!(err, Error::Transport { op: "connect", .. }));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn connects_to_abstract_name() {
        use std::os::linux::net::SocketAddrExt;
        use std::os::unix::net::{SocketAddr, UnixListener};

        let name = format!("mbctl-test-{}", std::process::id());
        let listener =
            UnixListener::bind_addr(&SocketAddr::from_abstract_name(name.as_bytes()).unwrap())
                .unwrap();
        let _stream = SocketAddress::Abstract(name).connect().unwrap();
        listener.accept().unwrap();
    }
}
