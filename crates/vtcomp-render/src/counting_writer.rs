#![forbid(unsafe_code)]

//! Byte accounting for terminal writes.
//!
//! [`CountingWriter`] wraps the terminal device and counts what goes through
//! it; [`FlushStats`] is the per-flush summary the output channel hands back
//! to the compositor.
//!
//! ```
//! use std::io::Write;
//! use vtcomp_render::counting_writer::CountingWriter;
//!
//! let mut writer = CountingWriter::new(Vec::new());
//! writer.write_all(b"\x1b[H").unwrap();
//! assert_eq!(writer.bytes_written(), 3);
//! ```

use std::io::{self, Write};
use std::time::{Duration, Instant};

/// A `Write` adapter that counts bytes.
#[derive(Debug)]
pub struct CountingWriter<W> {
    inner: W,
    bytes_written: u64,
}

impl<W> CountingWriter<W> {
    #[inline]
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            bytes_written: 0,
        }
    }

    /// Bytes accepted since creation or the last [`reset_counter`](Self::reset_counter).
    #[inline]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    #[inline]
    pub fn reset_counter(&mut self) {
        self.bytes_written = 0;
    }

    #[inline]
    pub fn inner(&self) -> &W {
        &self.inner
    }

    #[inline]
    pub fn inner_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    #[inline]
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.bytes_written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf)?;
        self.bytes_written += buf.len() as u64;
        Ok(())
    }
}

/// What one flush of the output channel wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushStats {
    /// Bytes handed to the device.
    pub bytes: u64,
    /// Text and control fragments drained.
    pub fragments: usize,
    /// Wall time spent writing.
    pub elapsed: Duration,
}

impl FlushStats {
    /// Average fragment size; 0.0 for an empty flush.
    #[inline]
    pub fn bytes_per_fragment(&self) -> f64 {
        if self.fragments == 0 {
            0.0
        } else {
            self.bytes as f64 / self.fragments as f64
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }

    /// Add another flush into this one.
    pub fn accumulate(&mut self, other: &FlushStats) {
        self.bytes += other.bytes;
        self.fragments += other.fragments;
        self.elapsed += other.elapsed;
    }

    #[cfg(feature = "tracing")]
    pub fn log(&self) {
        tracing::trace!(
            bytes = self.bytes,
            fragments = self.fragments,
            elapsed_us = self.elapsed.as_micros() as u64,
            "flush"
        );
    }

    #[cfg(not(feature = "tracing"))]
    pub fn log(&self) {}
}

/// Times a flush and produces its [`FlushStats`].
#[derive(Debug)]
pub struct StatsCollector {
    start: Instant,
    fragments: usize,
}

impl StatsCollector {
    #[inline]
    pub fn start(fragments: usize) -> Self {
        Self {
            start: Instant::now(),
            fragments,
        }
    }

    #[inline]
    pub fn finish(self, bytes: u64) -> FlushStats {
        FlushStats {
            bytes,
            fragments: self.fragments,
            elapsed: self.start.elapsed(),
        }
    }
}
