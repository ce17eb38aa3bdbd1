//! Fixed-size block accumulation from a chunked byte source.
//!
//! A serial line hands out bytes in whatever chunks the driver happens to have
//! buffered, often a single byte. [`BlockAccumulator::fill_block`] keeps
//! reading into the tail of an owned buffer until exactly `block_size` bytes
//! have arrived, and only then hands out a [`Block`].

use std::io::{self, Read};
use std::time::Duration;

use crate::error::{FeedError, Result};

/// Block size for high-rate sources (designed for NeuG at ~80 kB/s).
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Idle wait after a zero-byte read before trying again.
pub const DEFAULT_IDLE_WAIT: Duration = Duration::from_millis(10);

/// A completely filled block of source bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    bytes: Box<[u8]>,
}

impl Block {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl AsRef<[u8]> for Block {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl From<Vec<u8>> for Block {
    fn from(bytes: Vec<u8>) -> Self {
        Self {
            bytes: bytes.into_boxed_slice(),
        }
    }
}

/// What to do when the source reports zero bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroReadPolicy {
    /// Treat it as "no data yet": sleep for `idle`, then read again.
    WaitRetry { idle: Duration },
    /// Treat it as end of stream and abort.
    Fail,
}

impl Default for ZeroReadPolicy {
    fn default() -> Self {
        Self::WaitRetry {
            idle: DEFAULT_IDLE_WAIT,
        }
    }
}

impl std::fmt::Display for ZeroReadPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WaitRetry { idle } => write!(f, "wait({}ms)", idle.as_millis()),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// Fills fixed-size blocks from a [`Read`] source.
#[derive(Debug)]
pub struct BlockAccumulator {
    block_size: usize,
    zero_read: ZeroReadPolicy,
    zero_reads: u64,
}

impl BlockAccumulator {
    pub fn new(block_size: usize, zero_read: ZeroReadPolicy) -> Self {
        Self {
            block_size,
            zero_read,
            zero_reads: 0,
        }
    }

    /// Number of zero-byte reads absorbed so far.
    pub fn zero_reads(&self) -> u64 {
        self.zero_reads
    }

    /// Read from `source` until a full block is available.
    ///
    /// Short reads are normal and simply advance the fill cursor. A read
    /// error aborts the block; the partial contents are dropped and never
    /// returned.
    pub fn fill_block<R: Read + ?Sized>(&mut self, source: &mut R) -> Result<Block> {
        let mut buf = vec![0u8; self.block_size];
        let mut filled = 0usize;

        while filled < self.block_size {
            match source.read(&mut buf[filled..]) {
                Ok(0) => match self.zero_read {
                    ZeroReadPolicy::WaitRetry { idle } => {
                        self.zero_reads += 1;
                        log::trace!("zero-byte read at {filled}/{}, idling", self.block_size);
                        if !idle.is_zero() {
                            std::thread::sleep(idle);
                        }
                    }
                    ZeroReadPolicy::Fail => {
                        return Err(FeedError::source_failure(
                            "read from tty",
                            io::Error::new(io::ErrorKind::UnexpectedEof, "source returned no data"),
                        ));
                    }
                },
                Ok(n) => {
                    filled += n;
                    log::trace!("read {n} bytes, {filled}/{} filled", self.block_size);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(FeedError::source_failure("read from tty", e)),
            }
        }

        Ok(Block::from(buf))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::io::{self, Read};

    /// One scripted reaction of a [`ChunkedSource`].
    #[derive(Debug)]
    pub enum Step {
        Bytes(usize),
        Fail(io::ErrorKind),
    }

    /// Source that returns a scripted sequence of chunk sizes, filling each
    /// chunk from a running byte counter.
    #[derive(Debug)]
    pub struct ChunkedSource {
        steps: VecDeque<Step>,
        next: u8,
        pub reads: usize,
    }

    impl ChunkedSource {
        pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
            Self {
                steps: steps.into_iter().collect(),
                next: 0,
                reads: 0,
            }
        }

        pub fn sizes(sizes: &[usize]) -> Self {
            Self::new(sizes.iter().map(|&n| Step::Bytes(n)))
        }
    }

    impl Read for ChunkedSource {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reads += 1;
            match self.steps.pop_front() {
                Some(Step::Bytes(n)) => {
                    let n = n.min(buf.len());
                    for b in &mut buf[..n] {
                        *b = self.next;
                        self.next = self.next.wrapping_add(1);
                    }
                    Ok(n)
                }
                Some(Step::Fail(kind)) => Err(io::Error::new(kind, "scripted failure")),
                None => Err(io::Error::other("script exhausted")),
            }
        }
    }
}
