//! Path commands: cp, chmod, get-label, set-label.

use anyhow::{Context, Result, bail};
use mbctl::Client;

/// Arguments for `mbctl cp`.
#[derive(clap::Args)]
pub struct CpArgs {
    /// Source path.
    pub source: String,
    /// Target path.
    pub target: String,
}

/// Arguments for `mbctl chmod`.
#[derive(clap::Args)]
pub struct ChmodArgs {
    /// Path to change.
    pub path: String,
    /// Octal mode, e.g. 755.
    #[arg(value_parser = parse_mode)]
    pub mode: u32,
}

/// Arguments for `mbctl get-label`.
#[derive(clap::Args)]
pub struct GetLabelArgs {
    /// Path to inspect.
    pub path: String,
    /// Do not follow a trailing symlink.
    #[arg(long)]
    pub no_follow: bool,
}

/// Arguments for `mbctl set-label`.
#[derive(clap::Args)]
pub struct SetLabelArgs {
    /// Path to relabel.
    pub path: String,
    /// SELinux context, e.g. `u:object_r:system_file:s0`.
    pub label: String,
    /// Do not follow a trailing symlink.
    #[arg(long)]
    pub no_follow: bool,
}

pub fn cp(client: &Client, args: &CpArgs) -> Result<()> {
    if !client.path_copy(&args.source, &args.target)? {
        bail!("failed to copy {} to {}", args.source, args.target);
    }
    Ok(())
}

pub fn chmod(client: &Client, args: &ChmodArgs) -> Result<()> {
    if !client.path_chmod(&args.path, args.mode)? {
        bail!("failed to chmod {}", args.path);
    }
    Ok(())
}

pub fn get_label(client: &Client, args: &GetLabelArgs) -> Result<()> {
    let label = client
        .path_selinux_get_label(&args.path, !args.no_follow)?
        .with_context(|| format!("failed to read SELinux label of {}", args.path))?;
    println!("{label}");
    Ok(())
}

pub fn set_label(client: &Client, args: &SetLabelArgs) -> Result<()> {
    if !client.path_selinux_set_label(&args.path, &args.label, !args.no_follow)? {
        bail!("failed to set SELinux label of {}", args.path);
    }
    Ok(())
}

fn parse_mode(s: &str) -> Result<u32> {
    let mode = u32::from_str_radix(s.trim_start_matches("0o"), 8)
        .with_context(|| format!("invalid octal mode: {s}"))?;
    if mode > 0o7777 {
        bail!("mode out of range: {s}");
    }
    Ok(mode)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn octal_modes() {
        assert_eq!(parse_mode("755").unwrap(), 0o755);
        assert_eq!(parse_mode("0644").unwrap(), 0o644);
        assert_eq!(parse_mode("0o4755").unwrap(), 0o4755);
        assert!(parse_mode("999").is_err());
        assert!(parse_mode("17777").is_err());
    }
}
