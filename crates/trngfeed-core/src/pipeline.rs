//! The feed loop: source → block → conditioning → sink.
//!
//! ```text
//! setup() ──► Pipeline::run() ──► Err(FeedError)
//!  (Setup)       (Running)        (Terminated)
//! ```
//!
//! There is no normal exit. [`Pipeline::run`] loops until a stage fails and
//! hands that error back to the caller, which decides how to terminate. One
//! block is read and one output written at a time, so outputs reach the sink
//! in exactly the order their blocks were read, and every chain update sees
//! the previous one.

use std::convert::Infallible;
use std::io::Read;

use crate::block::{BlockAccumulator, DEFAULT_BLOCK_SIZE, ZeroReadPolicy};
use crate::conditioning::{ChainState, ConditioningMode, condition};
use crate::error::{FeedError, Result};
use crate::serial::{SerialConfig, SerialSource};
use crate::sink::{
    FileSink, MAX_SINK_WRITE, ShortWritePolicy, Sink, SinkTarget, SinkWriter, entropy_credit_bits,
};

/// Delivered blocks between two periodic stats log lines.
const STATS_LOG_INTERVAL: u64 = 1024;

/// Startup parameters of a pipeline; fixed for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub block_size: usize,
    pub mode: ConditioningMode,
    /// Drop the first completed block instead of delivering it.
    pub discard_first_block: bool,
    pub zero_read: ZeroReadPolicy,
    pub short_write: ShortWritePolicy,
    pub target: SinkTarget,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            mode: ConditioningMode::default(),
            discard_first_block: true,
            zero_read: ZeroReadPolicy::default(),
            short_write: ShortWritePolicy::default(),
            target: SinkTarget::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 || self.block_size > MAX_SINK_WRITE {
            return Err(FeedError::config(format!(
                "block size {} out of range (1 to {MAX_SINK_WRITE} bytes)",
                self.block_size
            )));
        }
        Ok(())
    }
}

/// Counters for a running pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub blocks_filled: u64,
    pub blocks_discarded: u64,
    pub blocks_delivered: u64,
    pub bytes_delivered: u64,
    /// Entropy the kernel sink credits for the delivered bytes.
    pub entropy_bits: u64,
    pub zero_reads: u64,
    pub short_writes: u64,
}

/// Outcome of one pipeline iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The first block of the run was dropped.
    Discarded { bytes: usize },
    /// Output was written to the sink.
    Delivered { bytes: usize },
}

/// A running pipeline owning its source, chain and sink.
#[derive(Debug)]
pub struct Pipeline<R, S> {
    config: PipelineConfig,
    source: R,
    accumulator: BlockAccumulator,
    chain: ChainState,
    writer: SinkWriter<S>,
    discard_pending: bool,
    stats: PipelineStats,
}

impl<R: Read, S: Sink> Pipeline<R, S> {
    /// Wire an already opened source and sink together.
    ///
    /// The sink is driven with the semantics of `config.target`.
    pub fn new(config: PipelineConfig, source: R, sink: S) -> Result<Self> {
        config.validate()?;
        let accumulator = BlockAccumulator::new(config.block_size, config.zero_read);
        let writer = SinkWriter::new(sink, config.target.kind(), config.short_write);
        Ok(Self {
            discard_pending: config.discard_first_block,
            config,
            source,
            accumulator,
            chain: ChainState::new(),
            writer,
            stats: PipelineStats::default(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn chain(&self) -> &ChainState {
        &self.chain
    }

    pub fn sink(&self) -> &S {
        self.writer.get_ref()
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            zero_reads: self.accumulator.zero_reads(),
            short_writes: self.writer.short_writes(),
            ..self.stats
        }
    }

    /// Accumulate one block and either discard or deliver it.
    pub fn step(&mut self) -> Result<Step> {
        let block = self.accumulator.fill_block(&mut self.source)?;
        self.stats.blocks_filled += 1;

        if self.discard_pending {
            self.discard_pending = false;
            self.stats.blocks_discarded += 1;
            log::debug!("discarded first block ({} bytes)", block.len());
            return Ok(Step::Discarded { bytes: block.len() });
        }

        let output = condition(&mut self.chain, block, self.config.mode);
        let bytes = self.writer.deliver(&output)?;

        self.stats.blocks_delivered += 1;
        self.stats.bytes_delivered += bytes as u64;
        self.stats.entropy_bits += entropy_credit_bits(bytes);
        if self.stats.blocks_delivered % STATS_LOG_INTERVAL == 0 {
            let s = self.stats();
            log::debug!(
                "{} blocks delivered, {} bytes, {} entropy bits credited, {} zero reads, {} short writes",
                s.blocks_delivered,
                s.bytes_delivered,
                s.entropy_bits,
                s.zero_reads,
                s.short_writes
            );
        }
        Ok(Step::Delivered { bytes })
    }

    /// Loop until a stage fails.
    pub fn run(&mut self) -> Result<Infallible> {
        loop {
            self.step()?;
        }
    }
}

/// Open and configure the serial source, then open the destination.
///
/// Either both succeed or the error is returned before any byte is read.
pub fn setup(
    serial: &SerialConfig,
    config: PipelineConfig,
) -> Result<Pipeline<SerialSource, FileSink>> {
    config.validate()?;
    let source = SerialSource::open(serial)?;
    let sink = config.target.open()?;
    log::info!(
        "feeding {} from {} (mode={}, block={}B, sink={}, discard_first={}, zero_read={}, short_write={})",
        config.target,
        source.device().display(),
        config.mode,
        config.block_size,
        config.target.kind(),
        config.discard_first_block,
        config.zero_read,
        config.short_write
    );
    Pipeline::new(config, source, sink)
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::time::Duration;

    use super::*;
    use crate::block::testing::{ChunkedSource, Step as Chunk};
    use crate::conditioning::DIGEST_SIZE;
    use crate::sink::SinkKind;
    use crate::sink::testing::RecordingSink;

    fn config(block_size: usize, mode: ConditioningMode) -> PipelineConfig {
        PipelineConfig {
            block_size,
            mode,
            zero_read: ZeroReadPolicy::WaitRetry {
                idle: Duration::ZERO,
            },
            target: SinkTarget::Path {
                path: "/unused".into(),
                kind: SinkKind::Stream,
            },
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_first_block_never_reaches_sink() {
        let src = ChunkedSource::sizes(&[16, 16, 16]);
        let mut p = Pipeline::new(
            config(16, ConditioningMode::Transparent),
            src,
            RecordingSink::default(),
        )
        .unwrap();

        assert_eq!(p.step().unwrap(), Step::Discarded { bytes: 16 });
        assert!(p.sink().writes.is_empty());

        assert_eq!(p.step().unwrap(), Step::Delivered { bytes: 16 });
        assert_eq!(p.step().unwrap(), Step::Delivered { bytes: 16 });
        let expected: Vec<u8> = (16..48).collect();
        assert_eq!(p.sink().writes.concat(), expected);
    }

    #[test]
    fn test_discard_disabled_delivers_first_block() {
        let mut cfg = config(16, ConditioningMode::Transparent);
        cfg.discard_first_block = false;
        let mut p = Pipeline::new(cfg, ChunkedSource::sizes(&[16]), RecordingSink::default()).unwrap();
        assert_eq!(p.step().unwrap(), Step::Delivered { bytes: 16 });
    }

    #[test]
    fn test_discarded_block_does_not_touch_chain() {
        let mut p = Pipeline::new(
            config(16, ConditioningMode::Sha512),
            ChunkedSource::sizes(&[16, 16]),
            RecordingSink::default(),
        )
        .unwrap();
        p.step().unwrap();
        assert_eq!(p.chain(), &ChainState::new());
        assert_eq!(p.step().unwrap(), Step::Delivered { bytes: DIGEST_SIZE });
        assert_ne!(p.chain(), &ChainState::new());
    }

    #[test]
    fn test_sha512_output_matches_conditioner() {
        let mut p = Pipeline::new(
            config(16, ConditioningMode::Sha512),
            ChunkedSource::sizes(&[16, 16]),
            RecordingSink::default(),
        )
        .unwrap();
        p.step().unwrap();
        p.step().unwrap();

        let second: Vec<u8> = (16..32).collect();
        let mut chain = ChainState::new();
        let expected = condition(&mut chain, second.into(), ConditioningMode::Sha512);
        assert_eq!(p.sink().writes.concat(), expected.to_bytes());
        assert_eq!(p.chain(), &chain);
    }

    #[test]
    fn test_fatal_read_skips_sink() {
        let src = ChunkedSource::new([
            Chunk::Bytes(16),
            Chunk::Bytes(16),
            Chunk::Bytes(7),
            Chunk::Fail(io::ErrorKind::Other),
        ]);
        let mut cfg = config(16, ConditioningMode::Transparent);
        cfg.discard_first_block = false;
        let mut p = Pipeline::new(cfg, src, RecordingSink::default()).unwrap();

        let err = p.run().unwrap_err();
        assert!(matches!(err, FeedError::Source { .. }));
        assert_eq!(p.sink().writes.len(), 2);
        assert_eq!(p.stats().blocks_delivered, 2);
    }

    #[test]
    fn test_sink_failure_terminates_run() {
        let sink = RecordingSink {
            fail_with: Some(io::ErrorKind::PermissionDenied),
            ..Default::default()
        };
        let mut p = Pipeline::new(
            config(16, ConditioningMode::Sha512),
            ChunkedSource::sizes(&[16, 16, 16]),
            sink,
        )
        .unwrap();
        let err = p.run().unwrap_err();
        assert!(matches!(err, FeedError::Sink { .. }));
        assert_eq!(p.stats().blocks_filled, 2);
    }

    #[test]
    fn test_stats_track_entropy_credit() {
        let src = ChunkedSource::sizes(&[16, 0, 16, 16]);
        let mut p = Pipeline::new(
            config(16, ConditioningMode::Sha512),
            src,
            RecordingSink::default(),
        )
        .unwrap();
        for _ in 0..3 {
            p.step().unwrap();
        }
        let stats = p.stats();
        assert_eq!(stats.blocks_filled, 3);
        assert_eq!(stats.blocks_discarded, 1);
        assert_eq!(stats.blocks_delivered, 2);
        assert_eq!(stats.bytes_delivered, 2 * DIGEST_SIZE as u64);
        assert_eq!(stats.entropy_bits, 2 * 256);
        assert_eq!(stats.zero_reads, 1);
    }

    #[test]
    fn test_block_size_validation() {
        for bad in [0, MAX_SINK_WRITE + 1] {
            let cfg = config(bad, ConditioningMode::Sha512);
            let err = Pipeline::new(cfg, ChunkedSource::sizes(&[]), RecordingSink::default())
                .unwrap_err();
            assert!(matches!(err, FeedError::Config { .. }));
        }
    }

    #[test]
    fn test_default_config() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(cfg.mode, ConditioningMode::Sha512);
        assert!(cfg.discard_first_block);
        assert_eq!(cfg.short_write, ShortWritePolicy::Fatal);
        assert!(cfg.validate().is_ok());
    }
}
