//! Host collaborators: privileged shell, bundled daemon binary, boot device.
//!
//! These are traits so applications can plug in their own root shell or
//! device database; the provided implementations cover the common case.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Runs a shell command with elevated privileges.
pub trait CommandRunner: Send + Sync {
    /// Runs `command` and returns its exit status (`0` is success).
    fn run(&self, command: &str) -> io::Result<i32>;
}

impl<F> CommandRunner for F
where
    F: Fn(&str) -> io::Result<i32> + Send + Sync,
{
    fn run(&self, command: &str) -> io::Result<i32> {
        self(command)
    }
}

/// Runs commands through `su -c`.
#[derive(Debug, Clone)]
pub struct SuRunner {
    /// Path or name of the `su` binary.
    su: PathBuf,
}

impl SuRunner {
    /// Uses the `su` found in `PATH`.
    pub fn new() -> Self {
        Self { su: "su".into() }
    }

    /// Uses a specific `su` binary.
    pub fn with_binary(su: impl Into<PathBuf>) -> Self {
        Self { su: su.into() }
    }
}

impl Default for SuRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for SuRunner {
    fn run(&self, command: &str) -> io::Result<i32> {
        let status = Command::new(&self.su)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .status()?;
        // Killed by a signal.
        Ok(status.code().unwrap_or(-1))
    }
}

/// Locates the daemon binary shipped with the application.
pub trait DaemonLocator: Send + Sync {
    /// Returns the on-disk path of the bundled daemon, extracting it first
    /// if necessary.
    fn daemon_binary(&self) -> io::Result<PathBuf>;
}

/// Daemon binaries laid out as `<root>/binaries/android/<abi>/mbtool`.
#[derive(Debug, Clone)]
pub struct BundledDaemon {
    /// Directory the application's data files were extracted to.
    root: PathBuf,
}

impl BundledDaemon {
    /// Creates a locator rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Android ABI name for the running architecture.
    pub fn abi() -> &'static str {
        match std::env::consts::ARCH {
            "aarch64" => "arm64-v8a",
            "arm" => "armeabi-v7a",
            "x86" => "x86",
            "x86_64" => "x86_64",
            "mips" => "mips",
            "mips64" => "mips64",
            _ => "unknown",
        }
    }

    /// Path the binary is expected at.
    pub fn path(&self) -> PathBuf {
        self.root
            .join("binaries/android")
            .join(Self::abi())
            .join("mbtool")
    }
}

impl DaemonLocator for BundledDaemon {
    fn daemon_binary(&self) -> io::Result<PathBuf> {
        let path = self.path();
        if !path.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("bundled daemon not found at {}", path.display()),
            ));
        }
        Ok(path)
    }
}

impl DaemonLocator for PathBuf {
    fn daemon_binary(&self) -> io::Result<PathBuf> {
        Ok(self.clone())
    }
}

/// Resolves the block devices ROM switching operates on.
pub trait BootDevice: Send + Sync {
    /// Current boot partition, or `None` if it cannot be determined.
    fn boot_partition(&self) -> Option<PathBuf>;

    /// Directories the daemon should search for block devices by name.
    fn search_dirs(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// A [`BootDevice`] with fixed answers.
#[derive(Debug, Clone, Default)]
pub struct StaticBootDevice {
    /// Boot partition block device.
    boot: Option<PathBuf>,
    /// Block device search directories.
    search_dirs: Vec<PathBuf>,
}

impl StaticBootDevice {
    /// Creates a device with a known boot partition.
    pub fn new(boot: impl Into<PathBuf>) -> Self {
        Self {
            boot: Some(boot.into()),
            search_dirs: Vec::new(),
        }
    }

    /// Creates a device whose boot partition is unknown.
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Adds a block device search directory.
    #[must_use]
    pub fn search_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.search_dirs.push(dir.as_ref().to_path_buf());
        self
    }
}

impl BootDevice for StaticBootDevice {
    fn boot_partition(&self) -> Option<PathBuf> {
        self.boot.clone()
    }

    fn search_dirs(&self) -> Vec<PathBuf> {
        self.search_dirs.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn bundled_daemon_path_layout() {
        let dir = tempfile::tempdir().unwrap();
        let locator = BundledDaemon::new(dir.path());
        let expected = dir
            .path()
            .join("binaries/android")
            .join(BundledDaemon::abi())
            .join("mbtool");
        assert_eq!(locator.path(), expected);
        assert_eq!(
            locator.daemon_binary().unwrap_err().kind(),
            io::ErrorKind::NotFound
        );

        std::fs::create_dir_all(expected.parent().unwrap()).unwrap();
        std::fs::write(&expected, b"\x7fELF").unwrap();
        assert_eq!(locator.daemon_binary().unwrap(), expected);
    }

    #[cfg(unix)]
    #[test]
    fn su_runner_reports_exit_status() {
        // `sh` stands in for `su`: `sh -c <cmd>` has the same calling shape.
        let runner = SuRunner::with_binary("sh");
        assert_eq!(runner.run("exit 0").unwrap(), 0);
        assert_eq!(runner.run("exit 3").unwrap(), 3);
    }

    #[test]
    fn static_boot_device() {
        let dev = StaticBootDevice::new("/dev/block/mmcblk0p9").search_dir("/dev/block/by-name");
        assert_eq!(dev.boot_partition(), Some(PathBuf::from("/dev/block/mmcblk0p9")));
        assert_eq!(dev.search_dirs(), vec![PathBuf::from("/dev/block/by-name")]);
        assert_eq!(StaticBootDevice::unknown().boot_partition(), None);
    }
}
