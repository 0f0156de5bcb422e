//! CLI for the mbtool daemon.

#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::missing_docs_in_private_items
)]

mod path;
mod rom;

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use mbctl::{BundledDaemon, Client, SocketAddress, StaticBootDevice, SuRunner};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mbctl", version, about = "Talk to the mbtool multiboot daemon")]
struct Cli {
    #[command(flatten)]
    daemon: DaemonArgs,

    /// More log output (-v debug, -vv trace). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

/// How to reach, and if needed start, the daemon.
#[derive(clap::Args)]
struct DaemonArgs {
    /// Daemon socket: `@name` for an abstract socket, otherwise a path.
    #[arg(long, global = true, default_value = "@mbtool.daemon")]
    socket: String,

    /// Directory containing `binaries/android/<abi>/mbtool`.
    ///
    /// When set, a missing or outdated daemon is installed and launched.
    #[arg(long, global = true)]
    bundle_dir: Option<PathBuf>,

    /// `su` binary used to install the daemon.
    #[arg(long, global = true, default_value = "su")]
    su: PathBuf,

    /// Boot partition block device, required by `switch` and `set-kernel`.
    #[arg(long, global = true)]
    boot_blockdev: Option<PathBuf>,

    /// Directory the daemon searches for block devices (repeatable).
    #[arg(long = "search-dir", global = true)]
    search_dirs: Vec<PathBuf>,

    /// Never install or launch the daemon.
    #[arg(long, global = true)]
    no_bootstrap: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print the daemon version.
    Version,

    /// List installed ROMs.
    Roms {
        /// Output format.
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },

    /// Print the ID of the booted ROM.
    Booted,

    /// Switch to another ROM's kernel.
    Switch(rom::SwitchArgs),

    /// Save the current boot image as a ROM's kernel.
    SetKernel {
        /// ROM ID.
        rom_id: String,
    },

    /// Reboot the device.
    Reboot {
        /// Reboot target (e.g. recovery, bootloader).
        #[arg(default_value = "")]
        arg: String,
    },

    /// Wipe parts of a ROM.
    Wipe(rom::WipeArgs),

    /// Copy a path as root.
    Cp(path::CpArgs),

    /// Change a path's mode as root.
    Chmod(path::ChmodArgs),

    /// Print a path's SELinux label.
    GetLabel(path::GetLabelArgs),

    /// Set a path's SELinux label.
    SetLabel(path::SetLabelArgs),

    /// Generate shell completion scripts.
    #[command(hide = true)]
    Completion {
        /// Target shell.
        shell: Shell,
    },
}

/// Output format for list commands.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable table.
    #[default]
    Table,
    /// Machine-readable JSON.
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(e) = cli.dispatch() {
        eprintln!("mbctl: {e:#}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();
}

impl Cli {
    fn dispatch(self) -> Result<()> {
        if let Command::Completion { shell } = self.command {
            clap_complete::generate(shell, &mut Self::command(), "mbctl", &mut std::io::stdout());
            return Ok(());
        }

        tracing::debug!(socket = %self.daemon.socket, "using daemon");
        let client = self.daemon.client();
        match self.command {
            Command::Version => {
                println!("{}", client.version()?);
                Ok(())
            }
            Command::Roms { format } => rom::roms(&client, format),
            Command::Booted => rom::booted(&client),
            Command::Switch(args) => rom::switch(&client, &args),
            Command::SetKernel { rom_id } => rom::set_kernel(&client, &rom_id),
            Command::Reboot { arg } => rom::reboot(&client, &arg),
            Command::Wipe(args) => rom::wipe(&client, &args),
            Command::Cp(args) => path::cp(&client, &args),
            Command::Chmod(args) => path::chmod(&client, &args),
            Command::GetLabel(args) => path::get_label(&client, &args),
            Command::SetLabel(args) => path::set_label(&client, &args),
            Command::Completion { .. } => Ok(()),
        }
    }
}

impl DaemonArgs {
    fn client(&self) -> Client {
        let mut builder = Client::builder().address(parse_socket(&self.socket));

        if let Some(dir) = self.bundle_dir.as_ref().filter(|_| !self.no_bootstrap) {
            builder = builder
                .runner(SuRunner::with_binary(&self.su))
                .locator(BundledDaemon::new(dir));
        }

        let mut device = self
            .boot_blockdev
            .as_ref()
            .map_or_else(StaticBootDevice::unknown, StaticBootDevice::new);
        for dir in &self.search_dirs {
            device = device.search_dir(dir);
        }
        builder.boot_device(device).build()
    }
}

/// `@name` is an abstract socket; anything else is a filesystem path.
fn parse_socket(s: &str) -> SocketAddress {
    s.strip_prefix('@').map_or_else(
        || SocketAddress::Path(PathBuf::from(s)),
        |name| SocketAddress::Abstract(name.to_owned()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn socket_syntax() {
        assert_eq!(
            parse_socket("@mbtool.daemon"),
            SocketAddress::Abstract("mbtool.daemon".into())
        );
        assert_eq!(
            parse_socket("/tmp/mbtool.sock"),
            SocketAddress::Path("/tmp/mbtool.sock".into())
        );
    }
}
