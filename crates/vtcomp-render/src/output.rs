#![forbid(unsafe_code)]

//! Buffered terminal output.
//!
//! The presenter pushes literal text and control sequences into an
//! [`OutputChannel`]; the channel keeps them as fragments until the
//! [`FlushTimer`] says it is time, the caller forces a flush, or the
//! pending bytes reach the buffer limit (eager flush).
//!
//! ```
//! use vtcomp_render::output::OutputChannel;
//!
//! let mut out = OutputChannel::new(Vec::new());
//! out.push_control("\x1b[H").unwrap();
//! out.push_text("hello").unwrap();
//! assert_eq!(out.pending_bytes(), 8);
//!
//! let stats = out.flush().unwrap();
//! assert_eq!(stats.bytes, 8);
//! assert_eq!(out.writer().as_slice(), b"\x1b[Hhello");
//! ```

use std::io::{self, Write};
use std::time::Instant;

use crate::config::CompositorConfig;
use crate::counting_writer::{CountingWriter, FlushStats, StatsCollector};
use crate::flush::FlushTimer;

/// One queued piece of output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Printable characters, already encoded.
    Text(String),
    /// Escape sequences written verbatim.
    Control(String),
}

impl Fragment {
    #[inline]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(s) | Self::Control(s) => s,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.as_str().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }
}

/// Fragment queue in front of the terminal device.
#[derive(Debug)]
pub struct OutputChannel<W: Write> {
    writer: CountingWriter<W>,
    fragments: Vec<Fragment>,
    pending: usize,
    timer: FlushTimer,
    total: FlushStats,
}

impl<W: Write> OutputChannel<W> {
    pub fn new(writer: W) -> Self {
        Self::with_timer(writer, FlushTimer::default())
    }

    pub fn with_timer(writer: W, timer: FlushTimer) -> Self {
        Self {
            writer: CountingWriter::new(writer),
            fragments: Vec::new(),
            pending: 0,
            timer,
            total: FlushStats::default(),
        }
    }

    pub fn with_config(writer: W, config: &CompositorConfig) -> Self {
        Self::with_timer(
            writer,
            FlushTimer::new(
                config.min_flush_wait,
                config.max_flush_wait,
                config.output_buffer_limit,
            ),
        )
    }

    // ── Queueing ───────────────────────────────────────────────────────

    /// Queue printable text.
    pub fn push_text(&mut self, text: &str) -> io::Result<()> {
        self.push(text, false)
    }

    /// Queue a control sequence.
    pub fn push_control(&mut self, seq: &str) -> io::Result<()> {
        self.push(seq, true)
    }

    /// Queue a whole fragment.
    pub fn push_fragment(&mut self, fragment: Fragment) -> io::Result<()> {
        match fragment {
            Fragment::Text(s) => self.push(&s, false),
            Fragment::Control(s) => self.push(&s, true),
        }
    }

    fn push(&mut self, s: &str, control: bool) -> io::Result<()> {
        if s.is_empty() {
            return Ok(());
        }
        // Consecutive fragments of the same kind share one buffer.
        let merged = match self.fragments.last_mut() {
            Some(Fragment::Control(buf)) if control => {
                buf.push_str(s);
                true
            }
            Some(Fragment::Text(buf)) if !control => {
                buf.push_str(s);
                true
            }
            _ => false,
        };
        if !merged {
            self.fragments.push(if control {
                Fragment::Control(s.to_owned())
            } else {
                Fragment::Text(s.to_owned())
            });
        }
        self.pending += s.len();

        if self.pending >= self.timer.limit() {
            vtcomp_core::trace!(pending = self.pending, "eager flush");
            self.flush_at(Instant::now())?;
        }
        Ok(())
    }

    // ── Inspection ─────────────────────────────────────────────────────

    #[inline]
    pub fn pending_bytes(&self) -> usize {
        self.pending
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending == 0
    }

    /// Queued fragments, oldest first.
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Queued bytes as one string.
    pub fn pending_string(&self) -> String {
        self.fragments.iter().map(Fragment::as_str).collect()
    }

    pub fn timer(&self) -> &FlushTimer {
        &self.timer
    }

    /// Totals over every flush so far.
    pub fn total_stats(&self) -> FlushStats {
        self.total
    }

    pub fn writer(&self) -> &W {
        self.writer.inner()
    }

    pub fn writer_mut(&mut self) -> &mut W {
        self.writer.inner_mut()
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    // ── Flushing ───────────────────────────────────────────────────────

    /// Flush if the pacing policy allows it at `now`.
    pub fn flush_if_due(&mut self, now: Instant) -> io::Result<Option<FlushStats>> {
        if self.timer.should_flush_at(now, self.pending, false) {
            self.flush_at(now).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Write everything now.
    pub fn flush(&mut self) -> io::Result<FlushStats> {
        vtcomp_core::trace!(pending = self.pending, "forced flush");
        self.flush_at(Instant::now())
    }

    /// Write everything and record the flush at `now`.
    ///
    /// Fragments are removed only once written; on error the unwritten rest
    /// stays queued.
    pub fn flush_at(&mut self, now: Instant) -> io::Result<FlushStats> {
        #[cfg(feature = "tracing")]
        let _span = tracing::trace_span!("output_flush", pending = self.pending).entered();

        let collector = StatsCollector::start(self.fragments.len());
        self.writer.reset_counter();

        let mut written = 0;
        let mut result = Ok(());
        for fragment in &self.fragments {
            if let Err(err) = self.writer.write_all(fragment.as_str().as_bytes()) {
                result = Err(err);
                break;
            }
            written += 1;
        }
        let bytes_done: usize = self.fragments[..written].iter().map(Fragment::len).sum();
        self.fragments.drain(..written);
        self.pending -= bytes_done;
        result?;
        self.writer.flush()?;

        self.timer.record_flush(now);
        let stats = collector.finish(self.writer.bytes_written());
        self.total.accumulate(&stats);
        stats.log();
        Ok(stats)
    }

    /// Drop queued output without writing it.
    pub fn discard(&mut self) {
        self.fragments.clear();
        self.pending = 0;
    }
}
