//! ROM commands: roms, booted, switch, set-kernel, reboot, wipe.

use anyhow::{Result, bail};
use mbctl::{Client, SetKernelResult, SwitchRomResult, WipeTarget};

use crate::OutputFormat;

/// Arguments for `mbctl switch`.
#[derive(clap::Args)]
pub struct SwitchArgs {
    /// ROM ID.
    pub rom_id: String,

    /// Record the kernel's checksum instead of validating it.
    #[arg(long)]
    pub force_checksums: bool,
}

/// Arguments for `mbctl wipe`.
#[derive(clap::Args)]
pub struct WipeArgs {
    /// ROM ID.
    pub rom_id: String,

    /// What to wipe: system, cache, data, dalvik-cache, multiboot.
    #[arg(required = true, num_args = 1..)]
    pub targets: Vec<WipeTarget>,
}

pub fn roms(client: &Client, format: OutputFormat) -> Result<()> {
    let roms = client.installed_roms()?;

    if matches!(format, OutputFormat::Json) {
        println!("{}", serde_json::to_string_pretty(&roms)?);
        return Ok(());
    }

    if roms.is_empty() {
        println!("No ROMs.");
        return Ok(());
    }
    println!("{:<24} {:<10} {:<24} SYSTEM", "ID", "VERSION", "BUILD");
    for rom in &roms {
        println!(
            "{:<24} {:<10} {:<24} {}",
            rom.id,
            rom.version.as_deref().unwrap_or("-"),
            rom.build.as_deref().unwrap_or("-"),
            rom.system_path.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

pub fn booted(client: &Client) -> Result<()> {
    match client.booted_rom_id()? {
        Some(id) => {
            println!("{id}");
            Ok(())
        }
        None => bail!("booted ROM could not be determined"),
    }
}

pub fn switch(client: &Client, args: &SwitchArgs) -> Result<()> {
    match client.switch_rom(&args.rom_id, args.force_checksums)? {
        SwitchRomResult::Succeeded => {
            println!("switched to {}", args.rom_id);
            Ok(())
        }
        SwitchRomResult::UnknownBootPartition => {
            bail!("boot partition unknown; pass --boot-blockdev")
        }
        SwitchRomResult::ChecksumInvalid => {
            bail!("kernel checksum for {} does not match; retry with --force-checksums", args.rom_id)
        }
        SwitchRomResult::ChecksumNotFound => {
            bail!("no kernel checksum recorded for {}; retry with --force-checksums", args.rom_id)
        }
        SwitchRomResult::Failed => bail!("daemon failed to switch to {}", args.rom_id),
    }
}

pub fn set_kernel(client: &Client, rom_id: &str) -> Result<()> {
    match client.set_kernel(rom_id)? {
        SetKernelResult::Succeeded => {
            println!("saved kernel for {rom_id}");
            Ok(())
        }
        SetKernelResult::UnknownBootPartition => {
            bail!("boot partition unknown; pass --boot-blockdev")
        }
        SetKernelResult::Failed => bail!("daemon failed to save kernel for {rom_id}"),
    }
}

pub fn reboot(client: &Client, arg: &str) -> Result<()> {
    if !client.reboot(arg)? {
        bail!("daemon refused to reboot");
    }
    Ok(())
}

pub fn wipe(client: &Client, args: &WipeArgs) -> Result<()> {
    let result = client.wipe_rom(&args.rom_id, &args.targets)?;
    for code in &result.succeeded {
        println!("wiped   {}", target_name(*code));
    }
    for code in &result.failed {
        println!("failed  {}", target_name(*code));
    }
    if !result.failed.is_empty() {
        bail!("{} target(s) could not be wiped", result.failed.len());
    }
    Ok(())
}

fn target_name(code: i16) -> String {
    WipeTarget::try_from(code).map_or_else(|c| format!("unknown ({c})"), |t| t.to_string())
}
