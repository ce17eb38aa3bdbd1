//! Error taxonomy for the feed pipeline.
//!
//! Every stage returns a [`FeedError`]; nothing in the library terminates the
//! process. The binary inspects the error once, prints a single diagnostic
//! line and exits with [`FeedError::exit_code`].

use std::fmt;
use std::io;

/// `EX_USAGE` from sysexits(3).
pub const EX_USAGE: i32 = 64;
/// `EX_IOERR` from sysexits(3).
pub const EX_IOERR: i32 = 74;

/// Errors that abort the feed pipeline.
#[derive(Debug)]
pub enum FeedError {
    /// Invalid device name, rate, block size or other startup parameter.
    Config {
        /// What was wrong.
        message: String,
    },

    /// Opening, configuring or reading the serial source failed.
    Source {
        /// Short name of the failing step (e.g. `"read from tty"`).
        stage: &'static str,
        /// Underlying system error.
        error: io::Error,
    },

    /// Opening or writing the destination failed.
    Sink {
        /// Short name of the failing step.
        stage: &'static str,
        /// Underlying system error.
        error: io::Error,
    },

    /// A write delivered fewer bytes than requested.
    ShortWrite {
        /// Bytes handed to the destination.
        expected: usize,
        /// Bytes the destination accepted.
        written: usize,
    },
}

impl FeedError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn source_failure(stage: &'static str, error: io::Error) -> Self {
        Self::Source { stage, error }
    }

    pub fn sink_failure(stage: &'static str, error: io::Error) -> Self {
        Self::Sink { stage, error }
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => EX_USAGE,
            Self::Source { .. } | Self::Sink { .. } | Self::ShortWrite { .. } => EX_IOERR,
        }
    }

    /// Name of the pipeline stage the error belongs to.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Source { .. } => "source",
            Self::Sink { .. } | Self::ShortWrite { .. } => "sink",
        }
    }
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { message } => write!(f, "invalid configuration: {message}"),
            Self::Source { stage, error } | Self::Sink { stage, error } => {
                write!(f, "{stage} failed: {error}")
            }
            Self::ShortWrite { expected, written } => {
                write!(f, "short write: {written} of {expected} bytes accepted")
            }
        }
    }
}

impl std::error::Error for FeedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Source { error, .. } | Self::Sink { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FeedError>;
