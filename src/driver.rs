use anyhow::{Result, bail};
use log::{error, info};
use std::fs;
use std::path::Path;
use std::process::Command;

const UINPUT_PATH: &str = "/dev/uinput";

pub(crate) fn check_installed() -> bool {
    Path::new(UINPUT_PATH).exists()
}

pub(crate) fn check_elevated() -> bool {
    fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|status| effective_uid(&status))
        == Some(0)
}

pub(crate) fn install() -> Result<()> {
    let status = Command::new("modprobe").arg("uinput").status()?;
    if !status.success() {
        bail!("modprobe uinput exited with {status}");
    }
    Ok(())
}

/// Makes sure the uinput driver is present, loading it when we are allowed to.
pub(crate) fn ensure() -> bool {
    if check_installed() {
        info!("uinput seems to be installed");
        return true;
    }

    error!("uinput not installed");
    if !check_elevated() {
        info!("Restart with root rights so it can be loaded (or run: sudo modprobe uinput)");
        return false;
    }

    info!("Loading uinput...");
    match install() {
        Ok(()) if check_installed() => {
            info!("Done! uinput loaded");
            true
        }
        Ok(()) => {
            error!("modprobe succeeded but {UINPUT_PATH} is still missing");
            false
        }
        Err(e) => {
            error!("Failed to load uinput: {e:#}");
            false
        }
    }
}

fn effective_uid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("Uid:"))
        .and_then(|ids| ids.split_whitespace().nth(1))
        .and_then(|euid| euid.parse().ok())
}
