//! Connection handshake.
//!
//! Runs right after the socket connects:
//! 1. The daemon sends `ALLOW` or `DENY` depending on the caller's signature.
//! 2. The client sends its interface version; the daemon answers `OK` or
//!    `UNSUPPORTED`.
//! 3. The client asks for the daemon version and checks it against the
//!    minimum it supports.

use std::io::{Read, Write};

use mbctl_proto::{GetVersionRequest, TOKEN_ALLOW, TOKEN_DENY, TOKEN_OK, TOKEN_UNSUPPORTED};
use tracing::debug;

use crate::error::{Error, Result};
use crate::operation;
use crate::version::Version;

/// Negotiated parameters the handshake enforces.
#[derive(Debug, Clone)]
pub struct Requirements {
    /// Interface version sent in step 2.
    pub interface_version: i32,
    /// Oldest daemon accepted in step 3.
    pub min_version: Version,
}

/// Runs all three handshake steps and returns the daemon version string.
pub fn handshake(r: &mut impl Read, w: &mut impl Write, req: &Requirements) -> Result<String> {
    verify_credentials(r)?;
    request_interface(r, w, req.interface_version)?;
    verify_version(r, w, &req.min_version)
}

/// Step 1: the daemon's allow/deny verdict.
fn verify_credentials(r: &mut impl Read) -> Result<()> {
    let token = mbctl_proto::read_token(r).map_err(Error::transport("credential check"))?;
    match token.as_str() {
        TOKEN_ALLOW => Ok(()),
        TOKEN_DENY => Err(Error::AuthDenied),
        _ => Err(Error::UnexpectedReply {
            stage: "credential check",
            expected: "ALLOW or DENY",
            got: token,
        }),
    }
}

/// Step 2: interface version negotiation.
fn request_interface(r: &mut impl Read, w: &mut impl Write, version: i32) -> Result<()> {
    mbctl_proto::write_i32(w, version).map_err(Error::transport("interface negotiation"))?;
    let token = mbctl_proto::read_token(r).map_err(Error::transport("interface negotiation"))?;
    match token.as_str() {
        TOKEN_OK => Ok(()),
        TOKEN_UNSUPPORTED => Err(Error::ProtocolUnsupported { version }),
        _ => Err(Error::UnexpectedReply {
            stage: "interface negotiation",
            expected: "OK or UNSUPPORTED",
            got: token,
        }),
    }
}

/// Step 3: minimum daemon version.
fn verify_version(r: &mut impl Read, w: &mut impl Write, minimum: &Version) -> Result<String> {
    let raw = operation::execute(r, w, GetVersionRequest)?
        .version
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::VersionUnparseable(String::new()))?;
    let found = Version::parse(&raw).map_err(|_| Error::VersionUnparseable(raw.clone()))?;

    debug!(daemon = %found, minimum = %minimum, "checking daemon version");
    if found < *minimum {
        return Err(Error::VersionTooOld {
            found,
            minimum: minimum.clone(),
        });
    }
    Ok(raw)
}
