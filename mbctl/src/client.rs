//! Public handle for daemon operations.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use mbctl_proto::{
    GetBootedRomIdRequest, GetInstalledRomsRequest, INTERFACE_VERSION, PathChmodRequest,
    PathCopyRequest, PathSELinuxGetLabelRequest, PathSELinuxSetLabelRequest, RebootRequest,
    ResponseType, RomEntry, SetKernelRequest, StatusResponse, SwitchRomCode, SwitchRomRequest,
    WipeRomRequest, WipeTarget,
};
use tracing::warn;

use crate::connection::{Config, Connection, SocketAddress, State};
use crate::context;
use crate::env::{BootDevice, CommandRunner, DaemonLocator};
use crate::error::{Error, Result};
use crate::handshake::Requirements;
use crate::operation::Operation;
use crate::version::Version;

/// Outcome of [`Client::switch_rom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::exhaustive_enums)]
pub enum SwitchRomResult {
    /// The boot partition could not be resolved; nothing was sent.
    UnknownBootPartition,
    /// The ROM's kernel was flashed.
    Succeeded,
    /// The daemon failed; see its log.
    Failed,
    /// The stored kernel does not match its checksum.
    ChecksumInvalid,
    /// No checksum is recorded for the ROM's kernel.
    ChecksumNotFound,
}

impl From<SwitchRomCode> for SwitchRomResult {
    fn from(code: SwitchRomCode) -> Self {
        match code {
            SwitchRomCode::Succeeded => Self::Succeeded,
            SwitchRomCode::Failed => Self::Failed,
            SwitchRomCode::ChecksumInvalid => Self::ChecksumInvalid,
            SwitchRomCode::ChecksumNotFound => Self::ChecksumNotFound,
        }
    }
}

/// Outcome of [`Client::set_kernel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::exhaustive_enums)]
pub enum SetKernelResult {
    /// The boot partition could not be resolved; nothing was sent.
    UnknownBootPartition,
    /// The kernel was saved.
    Succeeded,
    /// The daemon failed; see its log.
    Failed,
}

/// Outcome of [`Client::wipe_rom`], as raw [`WipeTarget`] codes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct WipeResult {
    /// Targets that were wiped.
    pub succeeded: Vec<i16>,
    /// Targets that could not be wiped.
    pub failed: Vec<i16>,
}

/// Builder for a [`Client`].
///
/// Defaults: the `mbtool.daemon` abstract socket, interface version 3,
/// daemon 9.0.0 or newer, daemon installed at `/mbtool`, one second for a
/// freshly launched daemon to come up, no bootstrap and no boot device.
///
/// # Example
///
/// ```no_run
/// use mbctl::{BundledDaemon, Client, StaticBootDevice, SuRunner};
///
/// let client = Client::builder()
///     .runner(SuRunner::new())
///     .locator(BundledDaemon::new("/data/data/com.github.chenxiaolong.dualbootpatcher/files"))
///     .boot_device(StaticBootDevice::new("/dev/block/bootdevice/by-name/boot"))
///     .build();
/// println!("daemon {}", client.version()?);
/// # Ok::<(), mbctl::Error>(())
/// ```
#[must_use = "a ClientBuilder does nothing until .build() is called"]
pub struct ClientBuilder {
    /// Daemon socket.
    address: SocketAddress,
    /// Interface version requested in the handshake.
    interface_version: i32,
    /// Oldest accepted daemon.
    min_version: Version,
    /// Where bootstrap installs the daemon.
    install_path: PathBuf,
    /// Readiness deadline after bootstrap.
    ready_timeout: Duration,
    /// Privileged shell for bootstrap.
    runner: Option<Box<dyn CommandRunner>>,
    /// Bundled daemon for bootstrap.
    locator: Option<Box<dyn DaemonLocator>>,
    /// Boot partition resolver for ROM switching.
    boot_device: Option<Box<dyn BootDevice>>,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("address", &self.address)
            .field("interface_version", &self.interface_version)
            .field("min_version", &self.min_version)
            .field("install_path", &self.install_path)
            .field("ready_timeout", &self.ready_timeout)
            .finish_non_exhaustive()
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            address: SocketAddress::default(),
            interface_version: INTERFACE_VERSION,
            min_version: Version::new(9, 0, 0),
            install_path: PathBuf::from("/mbtool"),
            ready_timeout: Duration::from_secs(1),
            runner: None,
            locator: None,
            boot_device: None,
        }
    }
}

impl ClientBuilder {
    /// Sets the daemon socket (default: abstract `mbtool.daemon`).
    pub fn address(mut self, address: SocketAddress) -> Self {
        self.address = address;
        self
    }

    /// Sets the interface version sent during the handshake (default: 3).
    pub const fn interface_version(mut self, version: i32) -> Self {
        self.interface_version = version;
        self
    }

    /// Sets the oldest daemon version accepted (default: 9.0.0).
    pub fn min_version(mut self, version: Version) -> Self {
        self.min_version = version;
        self
    }

    /// Sets where bootstrap installs the daemon (default: `/mbtool`).
    pub fn install_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.install_path = path.into();
        self
    }

    /// Sets how long to wait for a launched daemon to listen (default: 1 s).
    pub const fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Sets the privileged shell used to install and launch the daemon.
    ///
    /// Bootstrap needs both a runner and a [`locator`](Self::locator).
    pub fn runner(mut self, runner: impl CommandRunner + 'static) -> Self {
        self.runner = Some(Box::new(runner));
        self
    }

    /// Sets where the bundled daemon binary is found.
    pub fn locator(mut self, locator: impl DaemonLocator + 'static) -> Self {
        self.locator = Some(Box::new(locator));
        self
    }

    /// Sets the boot partition resolver used by ROM switching.
    pub fn boot_device(mut self, device: impl BootDevice + 'static) -> Self {
        self.boot_device = Some(Box::new(device));
        self
    }

    /// Builds the client. No connection is made until the first call.
    pub fn build(self) -> Client {
        Client {
            config: Config {
                address: self.address,
                requirements: Requirements {
                    interface_version: self.interface_version,
                    min_version: self.min_version,
                },
                install_path: self.install_path,
                ready_timeout: self.ready_timeout,
                runner: self.runner,
                locator: self.locator,
            },
            boot_device: self.boot_device,
            conn: Mutex::new(Connection::default()),
        }
    }
}

/// A handle to the daemon.
///
/// Calls block on socket I/O and are serialized: concurrent callers wait
/// for the one in flight. Share it across threads with an `Arc`.
pub struct Client {
    /// Connect settings.
    config: Config,
    /// Boot partition resolver.
    boot_device: Option<Box<dyn BootDevice>>,
    /// The one connection; the lock is the single-flight guard.
    conn: Mutex<Connection>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("conn", &self.conn)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Returns a builder with default settings.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Connects and handshakes now instead of on the first call.
    pub fn connect(&self) -> Result<()> {
        context::ensure_blocking_allowed("connect")?;
        self.lock().ensure_ready(&self.config)
    }

    /// Closes the connection. The next call reconnects.
    pub fn disconnect(&self) {
        self.lock().disconnect();
    }

    /// Current connection state.
    pub fn state(&self) -> State {
        self.lock().state()
    }

    /// Daemon version string, connecting first if needed.
    pub fn version(&self) -> Result<String> {
        context::ensure_blocking_allowed("GetVersion")?;
        let mut conn = self.lock();
        conn.ensure_ready(&self.config)?;
        conn.daemon_version()
            .map(str::to_owned)
            .ok_or_else(|| Error::VersionUnparseable(String::new()))
    }

    /// Lists installed ROMs.
    pub fn installed_roms(&self) -> Result<Vec<RomEntry>> {
        Ok(self.call(GetInstalledRomsRequest)?.roms)
    }

    /// ID of the booted ROM, if the daemon can tell.
    pub fn booted_rom_id(&self) -> Result<Option<String>> {
        Ok(self.call(GetBootedRomIdRequest)?.rom_id)
    }

    /// Flashes `rom_id`'s kernel to the boot partition.
    ///
    /// With `force_update_checksums`, the daemon records the kernel's
    /// current checksum instead of validating it.
    pub fn switch_rom(&self, rom_id: &str, force_update_checksums: bool) -> Result<SwitchRomResult> {
        context::ensure_blocking_allowed("SwitchRom")?;
        let Some(boot) = self.boot_partition() else {
            return Ok(SwitchRomResult::UnknownBootPartition);
        };
        let blockdev_base_dirs = self
            .boot_device
            .as_deref()
            .map(|d| d.search_dirs().iter().map(|p| path_string(p)).collect())
            .unwrap_or_default();

        let req = SwitchRomRequest {
            rom_id: rom_id.to_owned(),
            boot_blockdev: boot,
            blockdev_base_dirs,
            force_update_checksums,
        };
        let mut conn = self.lock();
        let code = conn.call(&self.config, req)?.result;
        match SwitchRomCode::try_from(code) {
            Ok(code) => Ok(code.into()),
            Err(code) => {
                conn.disconnect();
                Err(Error::MalformedUnion {
                    op: SwitchRomRequest::NAME,
                    expected: ResponseType::SwitchRom,
                    reason: format!("unknown switch result code {code}"),
                })
            }
        }
    }

    /// Saves the current boot image as `rom_id`'s kernel.
    pub fn set_kernel(&self, rom_id: &str) -> Result<SetKernelResult> {
        context::ensure_blocking_allowed("SetKernel")?;
        let Some(boot) = self.boot_partition() else {
            return Ok(SetKernelResult::UnknownBootPartition);
        };
        let resp = self.call(SetKernelRequest {
            rom_id: rom_id.to_owned(),
            boot_blockdev: boot,
        })?;
        Ok(if resp.success {
            SetKernelResult::Succeeded
        } else {
            SetKernelResult::Failed
        })
    }

    /// Reboots the device; `arg` selects the target (`""`, `recovery`, ...).
    pub fn reboot(&self, arg: &str) -> Result<bool> {
        Ok(self.call(RebootRequest { arg: arg.to_owned() })?.success)
    }

    /// Copies `source` to `target` as root.
    pub fn path_copy(&self, source: impl AsRef<Path>, target: impl AsRef<Path>) -> Result<bool> {
        let resp = self.call(PathCopyRequest {
            source: path_string(source.as_ref()),
            target: path_string(target.as_ref()),
        })?;
        Ok(check_status(PathCopyRequest::NAME, resp))
    }

    /// Sets `path`'s permission bits as root.
    pub fn path_chmod(&self, path: impl AsRef<Path>, mode: u32) -> Result<bool> {
        let resp = self.call(PathChmodRequest {
            path: path_string(path.as_ref()),
            mode,
        })?;
        Ok(check_status(PathChmodRequest::NAME, resp))
    }

    /// Wipes `targets` of `rom_id`.
    ///
    /// The daemon's succeeded/failed lists are returned unmodified.
    pub fn wipe_rom(&self, rom_id: &str, targets: &[WipeTarget]) -> Result<WipeResult> {
        let resp = self.call(WipeRomRequest {
            rom_id: rom_id.to_owned(),
            targets: targets.iter().map(|t| t.code()).collect(),
        })?;
        Ok(WipeResult {
            succeeded: resp.succeeded,
            failed: resp.failed,
        })
    }

    /// Reads `path`'s SELinux label; `None` if the daemon could not.
    pub fn path_selinux_get_label(
        &self,
        path: impl AsRef<Path>,
        follow_symlinks: bool,
    ) -> Result<Option<String>> {
        let resp = self.call(PathSELinuxGetLabelRequest {
            path: path_string(path.as_ref()),
            follow_symlinks,
        })?;
        if !resp.success {
            warn!(
                op = PathSELinuxGetLabelRequest::NAME,
                error = resp.error_msg.as_deref().unwrap_or("unknown error"),
                "daemon reported failure"
            );
            return Ok(None);
        }
        Ok(resp.label)
    }

    /// Sets `path`'s SELinux label.
    pub fn path_selinux_set_label(
        &self,
        path: impl AsRef<Path>,
        label: &str,
        follow_symlinks: bool,
    ) -> Result<bool> {
        let resp = self.call(PathSELinuxSetLabelRequest {
            path: path_string(path.as_ref()),
            label: label.to_owned(),
            follow_symlinks,
        })?;
        Ok(check_status(PathSELinuxSetLabelRequest::NAME, resp))
    }

    /// Runs one operation under the connection lock.
    fn call<O: Operation>(&self, op: O) -> Result<O::Output> {
        context::ensure_blocking_allowed(O::NAME)?;
        self.lock().call(&self.config, op)
    }

    fn boot_partition(&self) -> Option<String> {
        let boot = self.boot_device.as_deref()?.boot_partition();
        if boot.is_none() {
            warn!("boot partition could not be determined");
        }
        boot.map(|p| path_string(&p))
    }

    /// Locks the connection, resetting it if a previous holder panicked.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            let mut conn = poisoned.into_inner();
            // The stream may be mid-exchange.
            conn.disconnect();
            self.conn.clear_poison();
            conn
        })
    }
}

/// Logs the daemon's message for a failed path operation.
fn check_status(op: &'static str, resp: StatusResponse) -> bool {
    if !resp.success {
        warn!(
            op,
            error = resp.error_msg.as_deref().unwrap_or("unknown error"),
            "daemon reported failure"
        );
    }
    resp.success
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
