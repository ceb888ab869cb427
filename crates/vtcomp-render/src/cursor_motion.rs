#![forbid(unsafe_code)]

//! Cheapest cursor relocation.
//!
//! [`CursorMotionOptimizer::move_cursor`] compares every way the terminal
//! offers to get from the last known cursor position to a target and returns
//! the sequence with the lowest emission cost. Costs come from the
//! [`CapabilityTable`]; nothing is guessed.
//!
//! # Strategies
//!
//! | Method | Sequence |
//! |--------|----------|
//! | [`MoveMethod::Address`] | absolute `cup` |
//! | [`MoveMethod::Relative`] | vertical then horizontal steps from the old position |
//! | [`MoveMethod::CarriageReturn`] | `cr`, then relative from column 0 |
//! | [`MoveMethod::Home`] | `home`, then relative from the origin |
//! | [`MoveMethod::LastLine`] | `ll`, then relative from the bottom-left corner |
//! | [`MoveMethod::LeftMarginWrap`] | `cr` + `cub1` wrapping to the previous row's end, then relative |
//!
//! Absolute addressing is the baseline. It is the only candidate when the old
//! position is unknown or the move is "wide" (far from both margins and longer
//! than the move limit). A later strategy replaces the incumbent only when it
//! is strictly cheaper.
//!
//! Vertical components try `vpa`, then `cuu`/`cud` with a count, then
//! repeated `cuu1`/`cud1`. Horizontal components try `hpa`, then `cuf`/`cub`
//! with a count, then repeated `cuf1`/`cub1` with tab or back-tab stepping.

use vtcomp_core::capabilities::{Cap, CapabilityTable, LONG_DURATION, TermFlags};
use vtcomp_core::geometry::Point;

/// Manhattan distance beyond which a move far from the margins goes straight
/// to absolute addressing.
pub const MOVE_LIMIT: u16 = 7;

/// Longest sequence built out of repeated single steps.
const REPEAT_LIMIT: usize = 512;

/// Which strategy produced a [`CursorMove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveMethod {
    /// Already there; nothing to emit.
    Stay,
    Address,
    Relative,
    CarriageReturn,
    Home,
    LastLine,
    LeftMarginWrap,
}

impl MoveMethod {
    /// Strategy number (0 = absolute addressing).
    #[must_use]
    pub const fn index(self) -> Option<u8> {
        match self {
            Self::Stay => None,
            Self::Address => Some(0),
            Self::Relative => Some(1),
            Self::CarriageReturn => Some(2),
            Self::Home => Some(3),
            Self::LastLine => Some(4),
            Self::LeftMarginWrap => Some(5),
        }
    }
}

/// The chosen relocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorMove {
    /// Bytes to emit.
    pub sequence: String,
    /// Emission time in the table's duration units.
    pub duration: u32,
    /// Cost in character-equivalents.
    pub cost: u32,
    pub method: MoveMethod,
}

#[derive(Debug)]
struct Candidate {
    sequence: String,
    duration: u32,
    method: MoveMethod,
}

#[inline]
fn add(a: u32, b: u32) -> u32 {
    if a == LONG_DURATION || b == LONG_DURATION {
        LONG_DURATION
    } else {
        a.saturating_add(b).min(LONG_DURATION - 1)
    }
}

/// Picks the cheapest cursor movement for one terminal.
#[derive(Debug, Clone)]
pub struct CursorMotionOptimizer {
    caps: CapabilityTable,
    width: u16,
    height: u16,
    move_limit: u16,
}

impl CursorMotionOptimizer {
    pub fn new(caps: CapabilityTable, width: u16, height: u16) -> Self {
        Self {
            caps,
            width,
            height,
            move_limit: MOVE_LIMIT,
        }
    }

    #[inline]
    pub fn capabilities(&self) -> &CapabilityTable {
        &self.caps
    }

    /// Replace the capability table (e.g. after a terminal change).
    pub fn set_capabilities(&mut self, caps: CapabilityTable) {
        self.caps = caps;
    }

    /// Change the line speed; every capability cost is recomputed.
    pub fn set_baud_rate(&mut self, baud: u32) {
        self.caps.set_baud_rate(baud);
    }

    pub fn set_term_size(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
    }

    #[inline]
    pub const fn term_size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    pub fn set_move_limit(&mut self, limit: u16) {
        self.move_limit = limit;
    }

    #[inline]
    pub const fn move_limit(&self) -> u16 {
        self.move_limit
    }

    /// Cheapest sequence from `from` to `to`.
    ///
    /// `from == None` means the cursor position is unknown. An old position
    /// outside the screen is treated as unknown; the target is clamped onto
    /// the screen. Returns `None` when no strategy has a finite cost; the
    /// caller must then consider the cursor position unknown.
    pub fn move_cursor(&self, from: Option<Point>, to: Point) -> Option<CursorMove> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let to = Point::new(to.x.min(self.width - 1), to.y.min(self.height - 1));
        let from = from.filter(|p| p.x < self.width && p.y < self.height);

        if from == Some(to) {
            return Some(CursorMove {
                sequence: String::new(),
                duration: 0,
                cost: 0,
                method: MoveMethod::Stay,
            });
        }

        let mut best = self.address(to);

        let Some(from) = from else {
            return self.finish(best);
        };
        if self.is_wide_move(from, to) {
            return self.finish(best);
        }

        let mut consider = |candidate: Option<Candidate>| {
            if let Some(c) = candidate
                && c.duration < LONG_DURATION
                && best.as_ref().is_none_or(|b| c.duration < b.duration)
            {
                best = Some(c);
            }
        };

        consider(self.prefixed(&[], from, to, MoveMethod::Relative));
        consider(self.prefixed(
            &[Cap::CarriageReturn],
            Point::new(0, from.y),
            to,
            MoveMethod::CarriageReturn,
        ));
        consider(self.prefixed(&[Cap::CursorHome], Point::new(0, 0), to, MoveMethod::Home));
        consider(self.prefixed(
            &[Cap::CursorToLastLine],
            Point::new(0, self.height - 1),
            to,
            MoveMethod::LastLine,
        ));
        if self.caps.has_flag(TermFlags::AUTO_LEFT_MARGIN)
            && !self.caps.has_flag(TermFlags::EAT_NEWLINE_GLITCH)
            && from.y > 0
            && self.caps.is_available(Cap::CursorLeft)
        {
            consider(self.prefixed(
                &[Cap::CarriageReturn, Cap::CursorLeft],
                Point::new(self.width - 1, from.y - 1),
                to,
                MoveMethod::LeftMarginWrap,
            ));
        }

        self.finish(best)
    }

    fn finish(&self, best: Option<Candidate>) -> Option<CursorMove> {
        let best = best.filter(|c| c.duration < LONG_DURATION)?;
        #[cfg(feature = "tracing")]
        tracing::trace!(
            method = ?best.method,
            duration = best.duration,
            bytes = best.sequence.len(),
            "cursor move"
        );
        Some(CursorMove {
            cost: self.caps.duration_to_length(best.duration),
            duration: best.duration,
            sequence: best.sequence,
            method: best.method,
        })
    }

    /// A move is wide when it stays clear of both margins and exceeds the
    /// move limit.
    fn is_wide_move(&self, from: Point, to: Point) -> bool {
        let limit = self.move_limit;
        let right = self.width.saturating_sub(1).saturating_sub(limit);
        let inside = |x: u16| x > limit && x < right;
        inside(from.x) && inside(to.x) && from.distance(to) > u32::from(limit)
    }

    fn address(&self, to: Point) -> Option<Candidate> {
        let sequence = self
            .caps
            .format(Cap::CursorAddress, &[i32::from(to.y), i32::from(to.x)])?;
        Some(Candidate {
            sequence,
            duration: self.caps.duration(Cap::CursorAddress),
            method: MoveMethod::Address,
        })
    }

    /// `prefix` capabilities followed by a relative move from `start`.
    fn prefixed(&self, prefix: &[Cap], start: Point, to: Point, method: MoveMethod) -> Option<Candidate> {
        let mut sequence = String::new();
        let mut duration = 0;
        for &cap in prefix {
            sequence.push_str(&self.caps.sequence(cap)?);
            duration = add(duration, self.caps.duration(cap));
        }
        duration = add(duration, self.relative_move(start, to, &mut sequence));
        (duration < LONG_DURATION).then_some(Candidate {
            sequence,
            duration,
            method,
        })
    }

    /// Vertical then horizontal component. Appends to `out`.
    fn relative_move(&self, from: Point, to: Point, out: &mut String) -> u32 {
        let mut total = 0;
        if from.y != to.y {
            let Some((seq, duration)) = self.vertical_move(from.y, to.y) else {
                return LONG_DURATION;
            };
            out.push_str(&seq);
            total = add(total, duration);
        }
        if from.x != to.x {
            let Some((seq, duration)) = self.horizontal_move(from.x, to.x) else {
                return LONG_DURATION;
            };
            out.push_str(&seq);
            total = add(total, duration);
        }
        total
    }

    fn vertical_move(&self, from_y: u16, to_y: u16) -> Option<(String, u32)> {
        let mut best: Option<(String, u32)> = self
            .caps
            .format(Cap::RowAddress, &[i32::from(to_y)])
            .map(|s| (s, self.caps.duration(Cap::RowAddress)));

        let (parm, single, count) = if to_y > from_y {
            (Cap::ParmDownCursor, Cap::CursorDown, to_y - from_y)
        } else {
            (Cap::ParmUpCursor, Cap::CursorUp, from_y - to_y)
        };
        self.offer_parm(&mut best, parm, count);
        self.offer(&mut best, self.repeated(single, count, String::new()));
        best.filter(|(_, d)| *d < LONG_DURATION)
    }

    fn horizontal_move(&self, from_x: u16, to_x: u16) -> Option<(String, u32)> {
        let mut best: Option<(String, u32)> = self
            .caps
            .format(Cap::ColumnAddress, &[i32::from(to_x)])
            .map(|s| (s, self.caps.duration(Cap::ColumnAddress)));

        if to_x > from_x {
            let count = to_x - from_x;
            self.offer_parm(&mut best, Cap::ParmRightCursor, count);
            self.offer(&mut best, self.repeated(Cap::CursorRight, count, String::new()));
            self.offer(&mut best, self.tabbed_right(from_x, to_x));
        } else {
            let count = from_x - to_x;
            self.offer_parm(&mut best, Cap::ParmLeftCursor, count);
            self.offer(&mut best, self.repeated(Cap::CursorLeft, count, String::new()));
            self.offer(&mut best, self.tabbed_left(from_x, to_x));
        }
        best.filter(|(_, d)| *d < LONG_DURATION)
    }

    fn offer(&self, best: &mut Option<(String, u32)>, candidate: Option<(String, u32)>) {
        if let Some((seq, duration)) = candidate
            && duration < LONG_DURATION
            && best.as_ref().is_none_or(|(_, d)| duration < *d)
        {
            *best = Some((seq, duration));
        }
    }

    fn offer_parm(&self, best: &mut Option<(String, u32)>, cap: Cap, count: u16) {
        let candidate = self
            .caps
            .format(cap, &[i32::from(count)])
            .map(|s| (s, self.caps.duration(cap)));
        self.offer(best, candidate);
    }

    /// `count` copies of `cap` appended to `prefix`.
    fn repeated(&self, cap: Cap, count: u16, mut prefix: String) -> Option<(String, u32)> {
        let seq = self.caps.sequence(cap)?;
        if prefix.len() + seq.len() * count as usize > REPEAT_LIMIT {
            return None;
        }
        for _ in 0..count {
            prefix.push_str(&seq);
        }
        let duration = self.caps.duration(cap).checked_mul(u32::from(count))?;
        (duration < LONG_DURATION).then_some((prefix, duration))
    }

    /// Forward tabs as far as they go, then single steps.
    fn tabbed_right(&self, from_x: u16, to_x: u16) -> Option<(String, u32)> {
        let tabstop = self.caps.tabstop();
        let tab = self.caps.sequence(Cap::Tab)?;
        if tabstop == 0 {
            return None;
        }
        let mut pos = from_x;
        let mut seq = String::new();
        let mut duration = 0;
        loop {
            let next = u32::from(pos) + u32::from(tabstop - pos % tabstop);
            if next > u32::from(to_x) {
                break;
            }
            seq.push_str(&tab);
            duration = add(duration, self.caps.duration(Cap::Tab));
            pos = next as u16;
        }
        if pos == from_x {
            return None;
        }
        if pos == to_x {
            return Some((seq, duration));
        }
        let (rest, rest_duration) = self.repeated(Cap::CursorRight, to_x - pos, seq)?;
        Some((rest, add(duration, rest_duration)))
    }

    /// Back-tabs as far as they go, then single steps.
    fn tabbed_left(&self, from_x: u16, to_x: u16) -> Option<(String, u32)> {
        let tabstop = self.caps.tabstop();
        let back_tab = self.caps.sequence(Cap::BackTab)?;
        if tabstop == 0 {
            return None;
        }
        let mut pos = from_x;
        let mut seq = String::new();
        let mut duration = 0;
        while pos > 0 {
            let prev = ((pos - 1) / tabstop) * tabstop;
            if prev < to_x {
                break;
            }
            seq.push_str(&back_tab);
            duration = add(duration, self.caps.duration(Cap::BackTab));
            pos = prev;
        }
        if pos == from_x {
            return None;
        }
        if pos == to_x {
            return Some((seq, duration));
        }
        let (rest, rest_duration) = self.repeated(Cap::CursorLeft, pos - to_x, seq)?;
        Some((rest, add(duration, rest_duration)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vtcomp_core::capabilities::CapabilityTableBuilder;

    /// One byte per step, six bytes to address.
    fn minimal(width: u16, height: u16) -> CursorMotionOptimizer {
        let caps = CapabilityTableBuilder::new()
            .baud_rate(9600)
            .cap(Cap::CursorRight, Some("\x06"))
            .cap(Cap::CursorAddress, Some("\x1b%p1%d%p2%dH"))
            .build();
        CursorMotionOptimizer::new(caps, width, height)
    }

    fn xterm() -> CursorMotionOptimizer {
        CursorMotionOptimizer::new(CapabilityTable::xterm(), 80, 24)
    }

    #[test]
    fn far_move_on_a_row_prefers_addressing() {
        let opt = minimal(80, 24);
        assert_eq!(opt.capabilities().length(Cap::CursorAddress), 6);
        let mv = opt
            .move_cursor(Some(Point::new(0, 0)), Point::new(79, 0))
            .expect("move");
        assert_eq!(mv.method, MoveMethod::Address);
        assert_eq!(mv.cost, 6);
        assert_eq!(mv.sequence, "\x1b079H");
    }

    #[test]
    fn short_move_prefers_steps() {
        let opt = minimal(80, 24);
        let mv = opt
            .move_cursor(Some(Point::new(0, 0)), Point::new(3, 0))
            .expect("move");
        assert_eq!(mv.method, MoveMethod::Relative);
        assert_eq!(mv.sequence, "\x06\x06\x06");
        assert_eq!(mv.cost, 3);
    }

    #[test]
    fn same_position_is_empty() {
        let mv = xterm()
            .move_cursor(Some(Point::new(5, 5)), Point::new(5, 5))
            .expect("move");
        assert_eq!(mv.method, MoveMethod::Stay);
        assert!(mv.sequence.is_empty());
        assert_eq!(mv.method.index(), None);
    }

    #[test]
    fn unknown_origin_forces_addressing() {
        let mv = xterm().move_cursor(None, Point::new(1, 0)).expect("move");
        assert_eq!(mv.method, MoveMethod::Address);
        assert_eq!(mv.sequence, "\x1b[1;2H");
    }

    #[test]
    fn offscreen_origin_is_unknown() {
        let mv = xterm()
            .move_cursor(Some(Point::new(200, 0)), Point::new(1, 0))
            .expect("move");
        assert_eq!(mv.method, MoveMethod::Address);
    }

    #[test]
    fn target_is_clamped() {
        let mv = xterm().move_cursor(None, Point::new(500, 500)).expect("move");
        assert_eq!(mv.sequence, "\x1b[24;80H");
    }

    #[test]
    fn wide_move_skips_relative_strategies() {
        let opt = xterm();
        let mv = opt
            .move_cursor(Some(Point::new(20, 5)), Point::new(40, 5))
            .expect("move");
        assert_eq!(mv.method, MoveMethod::Address);
    }

    #[test]
    fn carriage_return_then_newline() {
        let mv = xterm()
            .move_cursor(Some(Point::new(50, 3)), Point::new(0, 4))
            .expect("move");
        assert_eq!(mv.sequence, "\r\n");
        assert_eq!(mv.method, MoveMethod::CarriageReturn);
    }

    #[test]
    fn home_when_cheapest() {
        let mv = xterm()
            .move_cursor(Some(Point::new(3, 2)), Point::new(0, 0))
            .expect("move");
        assert_eq!(mv.method, MoveMethod::Home);
        assert_eq!(mv.sequence, "\x1b[H");
    }

    #[test]
    fn tabs_beat_single_steps() {
        let caps = CapabilityTableBuilder::new()
            .cap(Cap::Tab, Some("\t"))
            .cap(Cap::CursorRight, Some("\x1b[C"))
            .build();
        let opt = CursorMotionOptimizer::new(caps, 80, 24);
        let mv = opt
            .move_cursor(Some(Point::new(1, 0)), Point::new(17, 0))
            .expect("move");
        assert_eq!(mv.sequence, "\t\t\x1b[C");
    }

    #[test]
    fn back_tabs_then_steps_left() {
        let caps = CapabilityTableBuilder::new()
            .cap(Cap::BackTab, Some("\x1b[Z"))
            .cap(Cap::CursorLeft, Some("\x1b[D"))
            .build();
        let opt = CursorMotionOptimizer::new(caps, 80, 24);
        let mv = opt
            .move_cursor(Some(Point::new(20, 0)), Point::new(7, 0))
            .expect("move");
        assert_eq!(mv.sequence, "\x1b[Z\x1b[Z\x1b[D");
        let exact = opt
            .move_cursor(Some(Point::new(15, 0)), Point::new(8, 0))
            .expect("move");
        assert_eq!(exact.sequence, "\x1b[Z");
    }

    #[test]
    fn left_margin_wrap_when_allowed() {
        let caps = CapabilityTableBuilder::new()
            .flag(TermFlags::AUTO_LEFT_MARGIN, true)
            .cap(Cap::CarriageReturn, Some("\r"))
            .cap(Cap::CursorLeft, Some("\x08"))
            .cap(Cap::CursorUp, Some("\x1b[A"))
            .cap(Cap::CursorRight, Some("\x1b[C"))
            .build();
        let opt = CursorMotionOptimizer::new(caps, 10, 5);
        let mv = opt
            .move_cursor(Some(Point::new(0, 3)), Point::new(9, 2))
            .expect("move");
        assert_eq!(mv.method, MoveMethod::LeftMarginWrap);
        assert_eq!(mv.sequence, "\r\x08");
    }

    #[test]
    fn impossible_move_is_none() {
        let opt = CursorMotionOptimizer::new(CapabilityTable::dumb(), 80, 24);
        assert!(opt.move_cursor(Some(Point::new(5, 5)), Point::new(5, 2)).is_none());
        assert!(opt.move_cursor(None, Point::new(0, 0)).is_none());
        let down = opt
            .move_cursor(Some(Point::new(5, 5)), Point::new(0, 6))
            .expect("move");
        assert_eq!(down.sequence, "\r\n");
    }

    #[test]
    fn zero_sized_terminal_cannot_move() {
        let opt = CursorMotionOptimizer::new(CapabilityTable::xterm(), 0, 0);
        assert!(opt.move_cursor(None, Point::new(0, 0)).is_none());
    }

    #[test]
    fn repeat_limit_caps_step_runs() {
        let caps = CapabilityTableBuilder::new()
            .cap(Cap::CursorRight, Some("\x1b[C"))
            .build();
        let opt = CursorMotionOptimizer::new(caps, 1000, 1);
        assert!(opt.move_cursor(Some(Point::new(0, 0)), Point::new(100, 0)).is_some());
        assert!(opt.move_cursor(Some(Point::new(0, 0)), Point::new(500, 0)).is_none());
    }

    #[test]
    fn baud_rate_changes_costs_not_choices() {
        let mut opt = xterm();
        let before = opt.move_cursor(Some(Point::new(0, 0)), Point::new(2, 0));
        opt.set_baud_rate(1200);
        let after = opt.move_cursor(Some(Point::new(0, 0)), Point::new(2, 0));
        assert_eq!(before.map(|m| m.sequence), after.map(|m| m.sequence));
    }

    mod property {
        use super::super::*;
        use super::minimal;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn never_worse_than_addressing(
                fx in 0u16..80, fy in 0u16..24, tx in 0u16..80, ty in 0u16..24
            ) {
                let opt = CursorMotionOptimizer::new(CapabilityTable::xterm(), 80, 24);
                let direct = opt.capabilities().duration(Cap::CursorAddress);
                let mv = opt.move_cursor(Some(Point::new(fx, fy)), Point::new(tx, ty));
                prop_assert!(mv.is_some());
                if let Some(mv) = mv {
                    prop_assert!(mv.duration <= direct);
                }
            }

            #[test]
            fn cost_grows_with_distance_along_a_row(start in 0u16..70, d in 0u16..9) {
                let opt = minimal(80, 24);
                let from = Some(Point::new(start, 3));
                let near = opt.move_cursor(from, Point::new(start + d, 3)).map(|m| m.cost);
                let far = opt.move_cursor(from, Point::new(start + d + 1, 3)).map(|m| m.cost);
                prop_assert!(near <= far);
            }

            #[test]
            fn sequence_empty_only_when_staying(fx in 0u16..80, fy in 0u16..24, tx in 0u16..80, ty in 0u16..24) {
                let opt = CursorMotionOptimizer::new(CapabilityTable::vt100(), 80, 24);
                if let Some(mv) = opt.move_cursor(Some(Point::new(fx, fy)), Point::new(tx, ty)) {
                    prop_assert_eq!(mv.sequence.is_empty(), (fx, fy) == (tx, ty));
                }
            }
        }
    }
}
