//! Delivery of conditioned or raw output to the entropy sink.
//!
//! Two destination flavours exist:
//!
//! - **Stream** sinks append every write (stdout, pipes, plain files).
//! - **Latest-value** sinks keep only the most recent write (the kernel
//!   `/dev/trng` device). The writer rewinds to offset zero once before each
//!   delivery instead of relying on the destination's file position, so the
//!   eight word records of a digest land back to back.
//!
//! The kernel side accepts at most [`MAX_SINK_WRITE`] bytes per write call
//! and credits half of the supplied bits as entropy.

use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Seek, SeekFrom, Write};
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};

use crate::conditioning::Output;
use crate::error::{FeedError, Result};

/// Default kernel-facing destination.
pub const DEFAULT_OUTPUT_DEVICE: &str = "/dev/trng";

/// Largest single write the kernel sink accepts.
pub const MAX_SINK_WRITE: usize = 1024;

/// Entropy the kernel sink credits for `bytes` of input: half the bit-length.
pub fn entropy_credit_bits(bytes: usize) -> u64 {
    bytes as u64 * 8 / 2
}

/// Write semantics of a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// Sequential appended writes.
    Stream,
    /// Each delivery replaces prior content; rewind before every delivery.
    LatestValue,
}

impl std::fmt::Display for SinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream => write!(f, "stream"),
            Self::LatestValue => write!(f, "latest-value"),
        }
    }
}

/// How a write that delivers fewer bytes than requested is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShortWritePolicy {
    /// Abort with [`FeedError::ShortWrite`] (default).
    #[default]
    Fatal,
    /// Log a warning and carry on.
    Warn,
}

impl std::fmt::Display for ShortWritePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fatal => write!(f, "fatal"),
            Self::Warn => write!(f, "warn"),
        }
    }
}

// ---------------------------------------------------------------------------
// Destinations
// ---------------------------------------------------------------------------

/// Byte destination the [`SinkWriter`] drives.
pub trait Sink {
    /// Write once, returning the number of bytes accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Reset the write position to zero, dropping earlier content where the
    /// destination retains it.
    fn rewind(&mut self) -> io::Result<()>;
}

/// File-descriptor backed sink: a device node, a regular file or stdout.
#[derive(Debug)]
pub struct FileSink {
    file: File,
    regular: bool,
}

impl FileSink {
    pub fn new(file: File) -> io::Result<Self> {
        let regular = file.metadata()?.is_file();
        Ok(Self { file, regular })
    }

    /// Duplicate the process's stdout descriptor.
    pub fn stdout() -> io::Result<Self> {
        let fd = io::stdout().as_fd().try_clone_to_owned()?;
        Self::new(File::from(fd))
    }
}

impl Sink for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn rewind(&mut self) -> io::Result<()> {
        if self.regular {
            self.file.set_len(0)?;
        }
        self.file.seek(SeekFrom::Start(0)).map(|_| ())
    }
}

impl Sink for Cursor<Vec<u8>> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Write::write(self, buf)
    }

    fn rewind(&mut self) -> io::Result<()> {
        self.get_mut().clear();
        self.set_position(0);
        Ok(())
    }
}

impl Sink for Vec<u8> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn rewind(&mut self) -> io::Result<()> {
        self.clear();
        Ok(())
    }
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write(buf)
    }

    fn rewind(&mut self) -> io::Result<()> {
        (**self).rewind()
    }
}

/// Where delivered bytes go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkTarget {
    /// Existing device node with latest-value semantics.
    Device(PathBuf),
    /// The process's standard output, stream semantics.
    Stdout,
    /// Any path with explicitly chosen semantics; created if missing.
    Path { path: PathBuf, kind: SinkKind },
}

impl Default for SinkTarget {
    fn default() -> Self {
        Self::Device(PathBuf::from(DEFAULT_OUTPUT_DEVICE))
    }
}

impl SinkTarget {
    pub fn kind(&self) -> SinkKind {
        match self {
            Self::Device(_) => SinkKind::LatestValue,
            Self::Stdout => SinkKind::Stream,
            Self::Path { kind, .. } => *kind,
        }
    }

    /// Open the destination for writing.
    pub fn open(&self) -> Result<FileSink> {
        match self {
            Self::Device(path) => open_path(path, false),
            Self::Path { path, .. } => open_path(path, true),
            Self::Stdout => FileSink::stdout().map_err(|e| FeedError::sink_failure("open stdout", e)),
        }
    }
}

impl std::fmt::Display for SinkTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Device(path) | Self::Path { path, .. } => write!(f, "{}", path.display()),
            Self::Stdout => write!(f, "stdout"),
        }
    }
}

fn open_path(path: &Path, create: bool) -> Result<FileSink> {
    let file = OpenOptions::new()
        .write(true)
        .create(create)
        .open(path)
        .map_err(|e| FeedError::sink_failure("open output", e))?;
    FileSink::new(file).map_err(|e| FeedError::sink_failure("stat output", e))
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Writes [`Output`]s to a [`Sink`] according to its [`SinkKind`].
#[derive(Debug)]
pub struct SinkWriter<S> {
    sink: S,
    kind: SinkKind,
    short_write: ShortWritePolicy,
    short_writes: u64,
}

impl<S: Sink> SinkWriter<S> {
    pub fn new(sink: S, kind: SinkKind, short_write: ShortWritePolicy) -> Self {
        Self {
            sink,
            kind,
            short_write,
            short_writes: 0,
        }
    }

    /// Number of short writes tolerated under [`ShortWritePolicy::Warn`].
    pub fn short_writes(&self) -> u64 {
        self.short_writes
    }

    pub fn get_ref(&self) -> &S {
        &self.sink
    }

    pub fn into_inner(self) -> S {
        self.sink
    }

    /// Deliver one output, returning the number of bytes accepted.
    ///
    /// A digest goes out as eight 8-byte word records, each checked on its
    /// own; a short word record is always fatal. A raw block goes out in a
    /// single write governed by the configured [`ShortWritePolicy`].
    pub fn deliver(&mut self, output: &Output) -> Result<usize> {
        if output.len() > MAX_SINK_WRITE {
            return Err(FeedError::sink_failure(
                "write to sink",
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} bytes exceeds the {MAX_SINK_WRITE}-byte write limit", output.len()),
                ),
            ));
        }
        if self.kind == SinkKind::LatestValue {
            self.sink
                .rewind()
                .map_err(|e| FeedError::sink_failure("rewind sink", e))?;
        }
        match output {
            Output::Digest(words) => {
                let mut total = 0;
                for word in words {
                    let record = word.to_le_bytes();
                    let n = self.write_once(&record)?;
                    if n < record.len() {
                        return Err(FeedError::ShortWrite {
                            expected: record.len(),
                            written: n,
                        });
                    }
                    log::trace!("wrote {n} conditioned bytes");
                    total += n;
                }
                Ok(total)
            }
            Output::Raw(block) => {
                let bytes = block.as_bytes();
                let n = self.write_once(bytes)?;
                if n < bytes.len() {
                    self.on_short_write(bytes.len(), n)?;
                }
                log::trace!("wrote {n} bytes transparently");
                Ok(n)
            }
        }
    }

    fn on_short_write(&mut self, expected: usize, written: usize) -> Result<()> {
        match self.short_write {
            ShortWritePolicy::Fatal => Err(FeedError::ShortWrite { expected, written }),
            ShortWritePolicy::Warn => {
                self.short_writes += 1;
                log::warn!("short write: {written} of {expected} bytes accepted, continuing");
                Ok(())
            }
        }
    }

    fn write_once(&mut self, buf: &[u8]) -> Result<usize> {
        loop {
            match self.sink.write(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(FeedError::sink_failure("write to sink", e)),
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io;

    use super::Sink;

    /// Sink that records every write call and can be told to accept fewer
    /// bytes than offered.
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub writes: Vec<Vec<u8>>,
        pub rewinds: usize,
        pub accept_at_most: Option<usize>,
        pub fail_with: Option<io::ErrorKind>,
    }

    impl Sink for RecordingSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Some(kind) = self.fail_with {
                return Err(io::Error::new(kind, "scripted sink failure"));
            }
            let n = self.accept_at_most.map_or(buf.len(), |max| max.min(buf.len()));
            self.writes.push(buf[..n].to_vec());
            Ok(n)
        }

        fn rewind(&mut self) -> io::Result<()> {
            self.rewinds += 1;
            Ok(())
        }
    }
}
