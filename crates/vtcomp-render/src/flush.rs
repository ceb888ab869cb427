#![forbid(unsafe_code)]

//! Adaptive flush pacing.
//!
//! Writing every tiny update to the terminal immediately wastes syscalls and,
//! on slow links, bandwidth. [`FlushTimer`] learns how often flushes happen
//! and waits roughly that long before the next one:
//!
//! ```text
//! average ← average · 3/4 + gap · 1/4          (exponentially weighted)
//! median  ← median of the last 8 gaps
//! wait    ← clamp((average + median) / 2, min_wait, max_wait)
//! ```
//!
//! A flush happens when the caller forces it, when the pending output is at
//! or above the byte limit, or when `wait` has elapsed since the last flush.
//!
//! All methods take `now` explicitly so tests can drive the clock.
//!
//! ```
//! use std::time::{Duration, Instant};
//! use vtcomp_render::flush::FlushTimer;
//!
//! let timer = FlushTimer::default();
//! let t0 = Instant::now();
//! assert!(timer.should_flush_at(t0, 10, false));   // never flushed yet
//! assert!(!timer.should_flush_at(t0, 0, false));   // nothing pending
//! assert!(timer.should_flush_at(t0, 0, true));     // forced
//! ```

use std::time::{Duration, Instant};

/// Shortest adaptive wait (one 60 Hz frame).
pub const MIN_FLUSH_WAIT: Duration = Duration::from_micros(16_667);

/// Longest adaptive wait.
pub const MAX_FLUSH_WAIT: Duration = Duration::from_millis(200);

/// Pending bytes that force an eager flush.
pub const OUTPUT_BUFFER_LIMIT: usize = 32 * 1024;

/// Inter-flush gaps kept for the median.
pub const GAP_HISTORY: usize = 8;

#[derive(Debug, Clone)]
pub struct FlushTimer {
    min_wait: Duration,
    max_wait: Duration,
    limit: usize,
    average: Option<Duration>,
    gaps: [Duration; GAP_HISTORY],
    gap_count: usize,
    next_gap: usize,
    last_flush: Option<Instant>,
    wait: Duration,
}

impl Default for FlushTimer {
    fn default() -> Self {
        Self::new(MIN_FLUSH_WAIT, MAX_FLUSH_WAIT, OUTPUT_BUFFER_LIMIT)
    }
}

impl FlushTimer {
    /// Bounds are swapped if given in the wrong order.
    pub fn new(min_wait: Duration, max_wait: Duration, limit: usize) -> Self {
        let (min_wait, max_wait) = if min_wait <= max_wait {
            (min_wait, max_wait)
        } else {
            (max_wait, min_wait)
        };
        Self {
            min_wait,
            max_wait,
            limit,
            average: None,
            gaps: [Duration::ZERO; GAP_HISTORY],
            gap_count: 0,
            next_gap: 0,
            last_flush: None,
            wait: min_wait,
        }
    }

    /// Current adaptive wait.
    #[inline]
    pub const fn wait(&self) -> Duration {
        self.wait
    }

    #[inline]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    #[inline]
    pub const fn last_flush(&self) -> Option<Instant> {
        self.last_flush
    }

    /// Weighted average gap, once at least one gap was seen.
    #[inline]
    pub const fn average(&self) -> Option<Duration> {
        self.average
    }

    /// Median of the recorded gaps.
    pub fn median(&self) -> Option<Duration> {
        if self.gap_count == 0 {
            return None;
        }
        let mut sorted = self.gaps;
        let recorded = &mut sorted[..self.gap_count];
        recorded.sort_unstable();
        Some(recorded[self.gap_count / 2])
    }

    /// Whether output pending at `now` should be written.
    pub fn should_flush_at(&self, now: Instant, pending: usize, forced: bool) -> bool {
        if forced {
            return true;
        }
        if pending == 0 {
            return false;
        }
        if pending >= self.limit {
            return true;
        }
        match self.last_flush {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.wait,
        }
    }

    /// Record a flush at `now` and adapt the wait.
    pub fn record_flush(&mut self, now: Instant) {
        if let Some(last) = self.last_flush {
            let gap = now.saturating_duration_since(last);
            self.average = Some(match self.average {
                None => gap,
                Some(avg) => avg * 3 / 4 + gap / 4,
            });
            self.gaps[self.next_gap] = gap;
            self.next_gap = (self.next_gap + 1) % GAP_HISTORY;
            self.gap_count = (self.gap_count + 1).min(GAP_HISTORY);

            if let (Some(avg), Some(median)) = (self.average, self.median()) {
                self.wait = ((avg + median) / 2).clamp(self.min_wait, self.max_wait);
            }
        }
        self.last_flush = Some(now);
    }

    /// Forget all history; the next flush is immediate.
    pub fn reset(&mut self) {
        *self = Self::new(self.min_wait, self.max_wait, self.limit);
    }
}
