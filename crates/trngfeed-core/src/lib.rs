//! # trngfeed-core
//!
//! **Feed a serial hardware noise source into the kernel entropy pool.**
//!
//! A TRNG attached to a serial line delivers bytes in unpredictable chunks,
//! often one byte at a time. The kernel sink wants complete, fixed-size
//! records at a bounded rate. This crate bridges the two.
//!
//! ## Quick Start
//!
//! ```no_run
//! use trngfeed_core::{PipelineConfig, SerialConfig, setup};
//!
//! let serial = SerialConfig::new("/dev/ttyUSB0", 115_200)?;
//! let mut pipeline = setup(&serial, PipelineConfig::default())?;
//! // Runs until the source or sink fails.
//! let err = pipeline.run().unwrap_err();
//! eprintln!("trngfeed: {}: {err}", err.stage());
//! # Ok::<(), trngfeed_core::FeedError>(())
//! ```
//!
//! ## Architecture
//!
//! Serial source → BlockAccumulator → Conditioning → SinkWriter → `/dev/trng`
//!
//! Two output modes:
//! - **Sha512** (default): each block is hashed together with the running
//!   chain state and the new 64-byte chain is delivered as eight word records.
//! - **Transparent**: blocks pass through unchanged, for diagnostics only.
//!
//! The first completed block of every run is discarded.

pub mod block;
pub mod conditioning;
pub mod device;
pub mod error;
pub mod pipeline;
pub mod serial;
pub mod sink;

pub use block::{Block, BlockAccumulator, DEFAULT_BLOCK_SIZE, DEFAULT_IDLE_WAIT, ZeroReadPolicy};
pub use conditioning::{
    CHAIN_WORDS, ChainState, ConditioningMode, DIGEST_SIZE, Output, SHA512_IV, condition,
};
pub use device::{DEFAULT_BAUD, DEVICE_PREFIXES, MAX_BAUD, MIN_BAUD, device_path, validate_baud};
pub use error::{FeedError, Result};
pub use pipeline::{Pipeline, PipelineConfig, PipelineStats, Step, setup};
pub use serial::{SerialConfig, SerialSource};
pub use sink::{
    DEFAULT_OUTPUT_DEVICE, FileSink, MAX_SINK_WRITE, ShortWritePolicy, Sink, SinkKind, SinkTarget,
    SinkWriter, entropy_credit_bits,
};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
