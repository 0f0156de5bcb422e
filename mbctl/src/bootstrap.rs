//! Installs and launches the bundled daemon when none is reachable.

use std::borrow::Cow;
use std::io;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::connection::SocketAddress;
use crate::env::{CommandRunner, DaemonLocator};
use crate::error::{Error, Result};

/// First readiness poll interval.
const POLL_INITIAL: Duration = Duration::from_millis(10);
/// Readiness poll interval cap.
const POLL_MAX: Duration = Duration::from_millis(200);

/// One privileged command in the install sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Step {
    /// Short description used in errors.
    pub name: &'static str,
    /// Shell command line.
    pub command: String,
}

/// The install-and-launch sequence, in order.
pub(crate) fn steps(bundled: &Path, install: &Path) -> Vec<Step> {
    let bundled = quote(&bundled.to_string_lossy()).into_owned();
    let target = install.to_string_lossy();
    let backup = quote(&format!("{target}.bak")).into_owned();
    let target = quote(&target).into_owned();

    vec![
        Step {
            name: "remount / read-write",
            command: "mount -o remount,rw /".into(),
        },
        Step {
            name: "back up installed daemon",
            command: format!("mv {target} {backup} || :"),
        },
        Step {
            name: "copy bundled daemon",
            command: format!("cp {bundled} {target}"),
        },
        Step {
            name: "make daemon executable",
            command: format!("chmod 755 {target}"),
        },
        // Best effort: `|| :` keeps a busy root from failing the launch.
        Step {
            name: "remount / read-only",
            command: "mount -o remount,ro / || :".into(),
        },
        Step {
            name: "launch daemon",
            command: format!("{target} daemon --replace --daemonize"),
        },
    ]
}

/// Runs the install sequence, stopping at the first non-zero exit.
pub(crate) fn launch(
    runner: &dyn CommandRunner,
    locator: &dyn DaemonLocator,
    install: &Path,
) -> Result<()> {
    let bundled = locator
        .daemon_binary()
        .map_err(|e| Error::DaemonLaunchFailed(format!("bundled daemon unavailable: {e}")))?;
    info!(bundled = %bundled.display(), install = %install.display(), "launching bundled daemon");

    for step in steps(&bundled, install) {
        debug!(command = %step.command, "running privileged command");
        match runner.run(&step.command) {
            Ok(0) => {}
            Ok(status) => {
                return Err(Error::DaemonLaunchFailed(format!(
                    "{}: `{}` exited with status {status}",
                    step.name, step.command
                )));
            }
            Err(e) => {
                return Err(Error::DaemonLaunchFailed(format!("{}: {e}", step.name)));
            }
        }
    }
    Ok(())
}

/// Polls `addr` with exponential backoff until it accepts a connection or
/// `timeout` elapses.
///
/// The returned stream is the one the caller handshakes on.
pub(crate) fn wait_for_socket(addr: &SocketAddress, timeout: Duration) -> io::Result<UnixStream> {
    let deadline = Instant::now() + timeout;
    let mut delay = POLL_INITIAL;
    loop {
        match addr.connect() {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    return Err(e);
                }
                std::thread::sleep(delay.min(left));
                delay = (delay * 2).min(POLL_MAX);
            }
        }
    }
}

/// Single-quotes `s` for `sh` unless it only has shell-safe characters.
fn quote(s: &str) -> Cow<'_, str> {
    let safe = !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"/._-+,:@=%".contains(&b));
    if safe {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(format!("'{}'", s.replace('\'', r"'\''")))
    }
}
