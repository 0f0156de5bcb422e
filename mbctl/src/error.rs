//! Error types for daemon operations.

use std::io;

use mbctl_proto::ResponseType;

use crate::version::Version;

/// Alias for `Result<T, mbctl::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned while connecting to or calling the daemon.
///
/// Outcomes the daemon reports itself (a failed switch, a failed copy) are
/// not errors; they come back as ordinary values.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The daemon rejected the client's signature.
    #[error("daemon denied access (the app is probably not officially signed)")]
    AuthDenied,

    /// The daemon does not implement the requested interface version.
    #[error("daemon does not support interface version {version}")]
    ProtocolUnsupported {
        /// Interface version the client asked for.
        version: i32,
    },

    /// A handshake token was neither of the expected sentinels.
    #[error("unexpected reply during {stage}: expected {expected}, got {got:?}")]
    UnexpectedReply {
        /// Handshake step.
        stage: &'static str,
        /// Tokens that would have been accepted.
        expected: &'static str,
        /// What the daemon actually sent.
        got: String,
    },

    /// The daemon is older than the minimum this client needs.
    #[error("daemon version {found} is older than the minimum {minimum}")]
    VersionTooOld {
        /// Version reported by the daemon.
        found: Version,
        /// Minimum supported version.
        minimum: Version,
    },

    /// The daemon reported no version, or one that does not parse.
    #[error("could not determine daemon version from {0:?}")]
    VersionUnparseable(String),

    /// A blocking call was made from the latency-critical dispatch context.
    #[error("{op}: blocking daemon call issued from the dispatch context")]
    ThreadingViolation {
        /// Operation that was attempted.
        op: &'static str,
    },

    /// The socket failed or closed mid-exchange.
    #[error("{op}: transport failure")]
    Transport {
        /// Operation or stage in progress.
        op: &'static str,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The daemon does not know the request tag.
    #[error("{op}: command not supported by the daemon")]
    CommandUnsupported {
        /// Operation that was attempted.
        op: &'static str,
    },

    /// The daemon could not parse the request.
    #[error("{op}: daemon rejected the request as invalid")]
    CommandInvalid {
        /// Operation that was attempted.
        op: &'static str,
    },

    /// The daemon answered with a different response variant.
    #[error("{op}: expected {expected:?} response, got {}", describe_tag(.got))]
    UnexpectedResponseType {
        /// Operation that was attempted.
        op: &'static str,
        /// Tag the operation expects.
        expected: ResponseType,
        /// Raw tag received.
        got: u8,
    },

    /// The response tag matched but its payload was missing or undecodable.
    #[error("{op}: malformed {expected:?} response: {reason}")]
    MalformedUnion {
        /// Operation that was attempted.
        op: &'static str,
        /// Tag the operation expects.
        expected: ResponseType,
        /// What was wrong with the payload.
        reason: String,
    },

    /// Installing or launching the bundled daemon failed.
    #[error("failed to launch daemon: {0}")]
    DaemonLaunchFailed(String),
}

impl Error {
    /// Returns a mapper that wraps an I/O error with the operation name.
    pub(crate) fn transport(op: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Self::Transport { op, source }
    }

    /// Returns `true` if the socket itself failed.
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// Renders a raw response tag with its name when it is a known one.
fn describe_tag(tag: &u8) -> String {
    match ResponseType::try_from(*tag) {
        Ok(ty) => format!("{ty:?} (tag {tag})"),
        Err(_) => format!("unknown tag {tag}"),
    }
}
