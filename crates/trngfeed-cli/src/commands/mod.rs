pub mod feed;
pub mod probe;

use std::time::Duration;

use trngfeed_core::{FeedError, SerialConfig, ShortWritePolicy, SinkKind, ZeroReadPolicy};

/// Validate the device name and rate shared by every subcommand.
pub fn serial_config(device: &str, speed: u32, local: bool) -> Result<SerialConfig, FeedError> {
    Ok(SerialConfig::new(device, speed)?.with_local_line(local))
}

/// Parse a zero-read policy string into the enum.
pub fn parse_zero_read(s: &str, idle_ms: u64) -> ZeroReadPolicy {
    match s {
        "fail" => ZeroReadPolicy::Fail,
        "wait" => ZeroReadPolicy::WaitRetry {
            idle: Duration::from_millis(idle_ms),
        },
        _ => {
            log::warn!("unknown zero-read policy '{s}', using wait");
            ZeroReadPolicy::WaitRetry {
                idle: Duration::from_millis(idle_ms),
            }
        }
    }
}

/// Parse a short-write policy string into the enum.
pub fn parse_short_write(s: &str) -> ShortWritePolicy {
    match s {
        "warn" => ShortWritePolicy::Warn,
        "fatal" => ShortWritePolicy::Fatal,
        _ => {
            log::warn!("unknown short-write policy '{s}', using fatal");
            ShortWritePolicy::Fatal
        }
    }
}

/// Parse a sink kind string into the enum.
pub fn parse_sink_kind(s: &str) -> SinkKind {
    match s {
        "stream" => SinkKind::Stream,
        "latest" | "latest-value" => SinkKind::LatestValue,
        _ => {
            log::warn!("unknown sink kind '{s}', using latest");
            SinkKind::LatestValue
        }
    }
}
