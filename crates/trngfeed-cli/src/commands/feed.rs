use trngfeed_core::{ConditioningMode, FeedError, PipelineConfig, SinkTarget, setup};

pub struct FeedCommandConfig<'a> {
    pub device: &'a str,
    pub speed: u32,
    pub stdout: bool,
    pub output: Option<&'a str>,
    pub sink_kind: &'a str,
    pub transparent: bool,
    pub block_size: usize,
    pub keep_first: bool,
    pub zero_read: &'a str,
    pub idle_ms: u64,
    pub short_write: &'a str,
    pub local: bool,
}

pub fn run(cfg: FeedCommandConfig<'_>) -> Result<(), FeedError> {
    let serial = super::serial_config(cfg.device, cfg.speed, cfg.local)?;
    let mut pipeline = setup(&serial, pipeline_config(&cfg))?;

    match pipeline.run() {
        Ok(never) => match never {},
        Err(err) => {
            let stats = pipeline.stats();
            log::info!(
                "stopped after {} blocks delivered ({} bytes, {} entropy bits credited)",
                stats.blocks_delivered,
                stats.bytes_delivered,
                stats.entropy_bits
            );
            Err(err)
        }
    }
}

/// Translate command-line flags into the pipeline's startup parameters.
fn pipeline_config(cfg: &FeedCommandConfig<'_>) -> PipelineConfig {
    let target = if cfg.stdout {
        SinkTarget::Stdout
    } else if let Some(path) = cfg.output {
        SinkTarget::Path {
            path: path.into(),
            kind: super::parse_sink_kind(cfg.sink_kind),
        }
    } else {
        SinkTarget::default()
    };

    PipelineConfig {
        block_size: cfg.block_size,
        mode: if cfg.transparent {
            ConditioningMode::Transparent
        } else {
            ConditioningMode::Sha512
        },
        discard_first_block: !(cfg.keep_first || cfg.stdout),
        zero_read: super::parse_zero_read(cfg.zero_read, cfg.idle_ms),
        short_write: super::parse_short_write(cfg.short_write),
        target,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trngfeed_core::{DEFAULT_BLOCK_SIZE, ShortWritePolicy, SinkKind, ZeroReadPolicy};

    fn base() -> FeedCommandConfig<'static> {
        FeedCommandConfig {
            device: "ttyU0",
            speed: 115_200,
            stdout: false,
            output: None,
            sink_kind: "latest",
            transparent: false,
            block_size: DEFAULT_BLOCK_SIZE,
            keep_first: false,
            zero_read: "wait",
            idle_ms: 10,
            short_write: "fatal",
            local: false,
        }
    }

    #[test]
    fn test_defaults_feed_device_conditioned() {
        let cfg = pipeline_config(&base());
        assert_eq!(cfg.target, SinkTarget::default());
        assert_eq!(cfg.target.kind(), SinkKind::LatestValue);
        assert_eq!(cfg.mode, ConditioningMode::Sha512);
        assert!(cfg.discard_first_block);
        assert_eq!(cfg.short_write, ShortWritePolicy::Fatal);
    }

    #[test]
    fn test_stdout_keeps_first_block() {
        let cfg = pipeline_config(&FeedCommandConfig {
            stdout: true,
            ..base()
        });
        assert_eq!(cfg.target, SinkTarget::Stdout);
        assert!(!cfg.discard_first_block);
    }

    #[test]
    fn test_output_path_with_stream_kind() {
        let cfg = pipeline_config(&FeedCommandConfig {
            output: Some("/tmp/trng.out"),
            sink_kind: "stream",
            ..base()
        });
        assert_eq!(cfg.target.kind(), SinkKind::Stream);
        assert!(cfg.discard_first_block);
    }

    #[test]
    fn test_transparent_and_policies() {
        let cfg = pipeline_config(&FeedCommandConfig {
            transparent: true,
            keep_first: true,
            zero_read: "fail",
            short_write: "warn",
            block_size: 16,
            ..base()
        });
        assert_eq!(cfg.mode, ConditioningMode::Transparent);
        assert!(!cfg.discard_first_block);
        assert_eq!(cfg.zero_read, ZeroReadPolicy::Fail);
        assert_eq!(cfg.short_write, ShortWritePolicy::Warn);
        assert_eq!(cfg.block_size, 16);
    }
}
