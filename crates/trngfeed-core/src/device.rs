//! Validation of user-supplied serial device names and line rates.

use std::path::{Path, PathBuf};

use crate::error::{FeedError, Result};

/// Basename prefixes of acceptable serial devices: the UART, USB-serial and
/// CDC-ACM families. Virtual consoles (`tty1`, `tty63`) do not match.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub const DEVICE_PREFIXES: &[&str] = &["ttyS", "ttyUSB", "ttyACM", "ttyAMA", "ttyU"];
/// Basename prefixes of acceptable serial devices (callout units).
#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub const DEVICE_PREFIXES: &[&str] = &["cua"];

/// Directory every serial device must live in.
pub const DEVICE_DIR: &str = "/dev";

pub const MIN_BAUD: u32 = 9_600;
pub const MAX_BAUD: u32 = 1_000_000;
pub const DEFAULT_BAUD: u32 = 115_200;

/// Turn a device name or path into `/dev/<basename>`.
///
/// Only the basename of `input` is used. It must be at least four characters
/// long, must not start with `/` or `.`, and must carry one of
/// [`DEVICE_PREFIXES`].
pub fn device_path(input: &str) -> Result<PathBuf> {
    let base = Path::new(input)
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| FeedError::config(format!("illegal device path '{input}'")))?;

    if base.starts_with('/') || base.starts_with('.') {
        return Err(FeedError::config(format!("illegal device basename '{base}'")));
    }
    if base.chars().count() < 4 {
        return Err(FeedError::config(format!(
            "device basename '{base}' is shorter than four characters"
        )));
    }
    if !DEVICE_PREFIXES.iter().any(|prefix| base.starts_with(prefix)) {
        return Err(FeedError::config(format!(
            "'{base}' is not a serial device ({DEVICE_DIR}/{{{}}}*)",
            DEVICE_PREFIXES.join(",")
        )));
    }

    Ok(Path::new(DEVICE_DIR).join(base))
}

/// Check that `rate` lies in `MIN_BAUD..=MAX_BAUD`.
pub fn validate_baud(rate: u32) -> Result<u32> {
    if !(MIN_BAUD..=MAX_BAUD).contains(&rate) {
        return Err(FeedError::config(format!(
            "speed {rate} out of range ({MIN_BAUD} to {MAX_BAUD} bps)"
        )));
    }
    Ok(rate)
}
