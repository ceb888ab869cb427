#![forbid(unsafe_code)]

//! Presenter: root surface to terminal bytes.
//!
//! The presenter walks the dirty span of every root row and produces the
//! cheapest byte stream that makes the terminal match it. It tracks what it
//! knows about the terminal (cursor position, active attributes, cursor
//! visibility) and only emits what changes that state.
//!
//! # Per-row strategy
//!
//! 1. A dirty span whose cells are all already on screen emits nothing.
//! 2. If everything from the span start to the end of the line is one
//!    erasable blank, a single `clr_eol` replaces it.
//! 3. Otherwise leading blanks may go with `clr_bol` and trailing blanks
//!    with `clr_eol`, each only when cheaper than printing them.
//! 4. The rest is walked cell by cell:
//!    - runs already on screen are jumped over when longer than a cursor
//!      address;
//!    - blank runs use `erase_chars` when cheaper than a literal write plus
//!      the move back;
//!    - runs of one 7-bit character use `repeat_char`;
//!    - everything else is printed through the [`PutChar`] writer, with the
//!      attribute change from the [`AttributeDiff`] in front of it.
//!
//! Wide glyphs print together with their padding cell. A wide glyph whose
//! padding does not match it, or that would be split by the right edge,
//! prints as `…` instead.
//!
//! The bottom-right cell is special on terminals that wrap at the right
//! margin: printing it would scroll the screen. The presenter turns
//! auto-margins off around it, or prints it one column early and inserts
//! the real neighbour in front of it, or leaves it alone.

use std::io::{self, Write};

use vtcomp_core::capabilities::{Cap, CapabilityTable, TermFlags};
use vtcomp_core::geometry::Point;

use crate::ansi::{AttributeDiff, PutChar, SgrDiff, TermAttr, put_utf8};
use crate::cell::{CellFormat, StyleFlags};
use crate::config::CompositorConfig;
use crate::cursor_motion::CursorMotionOptimizer;
use crate::output::OutputChannel;
use crate::surface::{LineChanges, Surface};

/// Horizontal ellipsis shown in place of a glyph that cannot be drawn whole.
pub const ELLIPSIS: char = '\u{2026}';

const CHARSET_STYLES: StyleFlags = StyleFlags::ALT_CHARSET.union(StyleFlags::PC_CHARSET);

/// What one [`Presenter::present`] pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresentSummary {
    /// Rows that produced output.
    pub rows: usize,
    /// Cells brought up to date (printed, erased or cleared).
    pub cells: usize,
}

/// State-tracking root surface presenter.
pub struct Presenter {
    optimizer: CursorMotionOptimizer,
    attr_diff: Box<dyn AttributeDiff>,
    put_char: PutChar,
    cursor: Option<Point>,
    attr: Option<TermAttr>,
    cursor_visible: Option<bool>,
    saved_cursor: Option<Option<Point>>,
    alternate_screen: bool,
    glyph: String,
}

impl std::fmt::Debug for Presenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Presenter")
            .field("cursor", &self.cursor)
            .field("attr", &self.attr)
            .field("cursor_visible", &self.cursor_visible)
            .field("alternate_screen", &self.alternate_screen)
            .finish_non_exhaustive()
    }
}

impl Presenter {
    /// Presenter for a `width`×`height` terminal, UTF-8 output, SGR diffs.
    pub fn new(caps: CapabilityTable, width: u16, height: u16) -> Self {
        let attr_diff = SgrDiff::from_capabilities(&caps);
        Self {
            optimizer: CursorMotionOptimizer::new(caps, width, height),
            attr_diff: Box::new(attr_diff),
            put_char: put_utf8,
            cursor: None,
            attr: None,
            cursor_visible: None,
            saved_cursor: None,
            alternate_screen: false,
            glyph: String::new(),
        }
    }

    /// Apply baud rate, move limit, encoding and color depth from `config`.
    pub fn with_config(
        mut caps: CapabilityTable,
        width: u16,
        height: u16,
        config: &CompositorConfig,
    ) -> Self {
        caps.set_baud_rate(config.baud_rate);
        if caps.color_depth() > config.color_depth {
            caps.set_color_depth(config.color_depth);
        }
        let mut presenter = Self::new(caps, width, height);
        presenter.optimizer.set_move_limit(config.move_limit);
        presenter.put_char = config.encoding.put_char();
        presenter
    }

    // ── Collaborators ──────────────────────────────────────────────────

    pub fn set_attribute_diff(&mut self, diff: Box<dyn AttributeDiff>) {
        self.attr_diff = diff;
        self.attr = None;
    }

    pub fn set_put_char(&mut self, put_char: PutChar) {
        self.put_char = put_char;
    }

    #[inline]
    pub fn capabilities(&self) -> &CapabilityTable {
        self.optimizer.capabilities()
    }

    /// Replace the capability table; terminal state becomes unknown.
    pub fn set_capabilities(&mut self, caps: CapabilityTable) {
        self.attr_diff = Box::new(SgrDiff::from_capabilities(&caps));
        self.optimizer.set_capabilities(caps);
        self.reset();
    }

    #[inline]
    pub fn optimizer(&self) -> &CursorMotionOptimizer {
        &self.optimizer
    }

    pub fn optimizer_mut(&mut self) -> &mut CursorMotionOptimizer {
        &mut self.optimizer
    }

    pub fn set_term_size(&mut self, width: u16, height: u16) {
        self.optimizer.set_term_size(width, height);
        self.cursor = None;
    }

    // ── Tracked state ──────────────────────────────────────────────────

    /// Where the terminal cursor is, if known.
    #[inline]
    pub const fn cursor(&self) -> Option<Point> {
        self.cursor
    }

    /// Attributes active on the terminal, if known.
    #[inline]
    pub const fn attr(&self) -> Option<TermAttr> {
        self.attr
    }

    #[inline]
    pub const fn cursor_visible(&self) -> Option<bool> {
        self.cursor_visible
    }

    #[inline]
    pub const fn is_alternate_screen(&self) -> bool {
        self.alternate_screen
    }

    /// Forget everything known about the terminal.
    pub fn reset(&mut self) {
        self.cursor = None;
        self.attr = None;
        self.cursor_visible = None;
        self.saved_cursor = None;
    }

    #[inline]
    fn has_flag(&self, flag: TermFlags) -> bool {
        self.optimizer.capabilities().has_flag(flag)
    }

    #[inline]
    fn cap_length(&self, cap: Cap) -> u32 {
        self.optimizer.capabilities().length(cap)
    }

    #[inline]
    fn has_cap(&self, cap: Cap) -> bool {
        self.optimizer.capabilities().is_available(cap)
    }

    fn push_cap<W: Write>(&self, cap: Cap, out: &mut OutputChannel<W>) -> io::Result<bool> {
        match self.optimizer.capabilities().sequence(cap) {
            Some(seq) => {
                out.push_control(&seq)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ── Presenting ─────────────────────────────────────────────────────

    /// Bring the terminal up to date with every dirty span of `root` and
    /// clear the spans.
    pub fn present<W: Write>(
        &mut self,
        root: &mut Surface,
        out: &mut OutputChannel<W>,
    ) -> io::Result<PresentSummary> {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!(
            "present",
            width = root.width(),
            height = root.height()
        )
        .entered();

        let size = (root.width(), root.height());
        if self.optimizer.term_size() != size {
            self.set_term_size(size.0, size.1);
        }

        let mut summary = PresentSummary::default();
        let mut spans = Vec::with_capacity(usize::from(root.height()));
        for y in 0..root.height() {
            spans.push(root.line_changes(y).copied());
            let before = summary.cells;
            self.present_row(root, y, out, &mut summary)?;
            if summary.cells != before {
                summary.rows += 1;
            }
        }
        root.reset_changes();
        self.keep_unprinted_dirty(root, &spans);
        Ok(summary)
    }

    /// Cells a present could not get on screen stay dirty for the next one.
    /// A corner the terminal has no way to reach is left out.
    fn keep_unprinted_dirty(&self, root: &mut Surface, spans: &[Option<LineChanges>]) {
        let width = root.width();
        let skip_corner = !self.corner_reachable();
        for (y, changes) in (0..root.height()).zip(spans.iter().copied()) {
            let Some(changes) = changes.filter(|c| !c.is_clean() && c.xmin < width) else {
                continue;
            };
            let xmax = changes.xmax.min(width - 1);
            let unprinted = |x: &u16| {
                !(skip_corner && self.is_bottom_right(*x, y))
                    && root.cell(*x, y).is_some_and(|c| !c.attrs.is_printed())
            };
            let first = (changes.xmin..=xmax).find(|x| unprinted(x));
            let last = (changes.xmin..=xmax).rev().find(|x| unprinted(x));
            if let (Some(first), Some(last)) = (first, last) {
                vtcomp_core::trace!(y, first, last, "cells left for the next present");
                root.mark_dirty_range(y, first, last);
            }
        }
    }

    fn present_row<W: Write>(
        &mut self,
        root: &mut Surface,
        y: u16,
        out: &mut OutputChannel<W>,
        summary: &mut PresentSummary,
    ) -> io::Result<()> {
        let width = root.width();
        let Some(changes) = root.line_changes(y).copied() else {
            return Ok(());
        };
        if changes.is_clean() || width == 0 || changes.xmin >= width {
            return Ok(());
        }
        let mut xmin = changes.xmin;
        let mut xmax = changes.xmax.min(width - 1);
        let row = &mut root.row_mut(y)[..usize::from(width)];

        #[cfg(feature = "tracing")]
        let _span = tracing::trace_span!("present_row", y, xmin, xmax).entered();

        if row[usize::from(xmin)..=usize::from(xmax)]
            .iter()
            .all(|c| c.attrs.no_changes())
        {
            return Ok(());
        }

        // A wide glyph and its padding are always drawn together.
        if xmin > 0 && row[usize::from(xmin)].is_padding() && row[usize::from(xmin - 1)].is_wide() {
            xmin -= 1;
        }
        if xmax + 1 < width && row[usize::from(xmax)].is_wide() {
            xmax += 1;
        }

        if self.clear_to_eol_applies(row, xmin) {
            if !self.move_to(Point::new(xmin, y), out)? {
                return Ok(());
            }
            let blank = row[usize::from(xmin)];
            self.set_attr(&blank, out)?;
            self.push_cap(Cap::ClrEol, out)?;
            summary.cells += mark_printed(&mut row[usize::from(xmin)..]);
            return Ok(());
        }

        if let Some(lead) = self.leading_blanks(row, xmin) {
            if !self.move_to(Point::new(lead - 1, y), out)? {
                return Ok(());
            }
            let blank = row[0];
            self.set_attr(&blank, out)?;
            self.push_cap(Cap::ClrBol, out)?;
            summary.cells += mark_printed(&mut row[..usize::from(lead)]);
            xmin = lead;
        }

        let mut trailing = None;
        if xmin <= xmax
            && let Some(start) = self.trailing_blanks(row, xmin, xmax)
        {
            trailing = Some(start);
            xmax = start - 1;
        }

        let mut x = xmin;
        while x <= xmax {
            let xi = usize::from(x);
            if row[xi].attrs.no_changes() {
                let run = row[xi..=usize::from(xmax)]
                    .iter()
                    .take_while(|c| c.attrs.no_changes())
                    .count() as u16;
                if x + run > xmax || u32::from(run) > self.cap_length(Cap::CursorAddress) {
                    x += run;
                    continue;
                }
            }

            if self.is_bottom_right(x, y) {
                summary.cells += self.print_last_cell(row, x, y, out)?;
                x += 1;
                continue;
            }

            if !self.move_to(Point::new(x, y), out)? {
                break;
            }
            let done = match self.try_erase(row, x, xmax, y, out)? {
                Some(n) => n,
                None => match self.try_repeat(row, x, xmax, y, out)? {
                    Some(n) => n,
                    None => self.print_cell(row, x, y, out)?,
                },
            };
            summary.cells += usize::from(done);
            x += done;
        }

        if let Some(start) = trailing
            && self.move_to(Point::new(start, y), out)?
        {
            let blank = row[usize::from(start)];
            self.set_attr(&blank, out)?;
            self.push_cap(Cap::ClrEol, out)?;
            summary.cells += mark_printed(&mut row[usize::from(start)..]);
        }
        Ok(())
    }

    // ── Blank detection ────────────────────────────────────────────────

    /// A blank the terminal's erase operations reproduce exactly.
    fn is_erasable(&self, cell: &CellFormat) -> bool {
        cell.is_space()
            && cell.char_width() == 1
            && !cell.is_padding()
            && (cell.attrs.style() - CHARSET_STYLES).is_empty()
            && (self.has_flag(TermFlags::BACKGROUND_COLOR_ERASE)
                || (cell.fg.is_default() && cell.bg.is_default()))
    }

    /// Everything from `xmin` to the end of the line is one erasable blank
    /// and `clr_eol` is cheaper than printing it.
    fn clear_to_eol_applies(&self, row: &[CellFormat], xmin: u16) -> bool {
        let tail = &row[usize::from(xmin)..];
        let first = tail[0];
        self.has_cap(Cap::ClrEol)
            && self.is_erasable(&first)
            && tail.iter().all(|c| *c == first)
            && self.cap_length(Cap::ClrEol) < tail.len() as u32
    }

    /// Length of the leading blank run when it reaches past `xmin` and
    /// `clr_bol` is cheaper than printing it.
    fn leading_blanks(&self, row: &[CellFormat], xmin: u16) -> Option<u16> {
        if !self.has_cap(Cap::ClrBol) {
            return None;
        }
        let first = row[0];
        if !self.is_erasable(&first) {
            return None;
        }
        let lead = row.iter().take_while(|c| **c == first).count();
        (lead > usize::from(xmin) && self.cap_length(Cap::ClrBol) < lead as u32)
            .then_some(lead as u16)
    }

    /// Start column of the trailing blank run when it begins inside the
    /// span and `clr_eol` is cheaper than printing it.
    fn trailing_blanks(&self, row: &[CellFormat], xmin: u16, xmax: u16) -> Option<u16> {
        if !self.has_cap(Cap::ClrEol) {
            return None;
        }
        let last = *row.last()?;
        if !self.is_erasable(&last) {
            return None;
        }
        let trail = row.iter().rev().take_while(|c| **c == last).count();
        let start = row.len() - trail;
        (start > usize::from(xmin)
            && start <= usize::from(xmax)
            && self.cap_length(Cap::ClrEol) < trail as u32)
            .then_some(start as u16)
    }

    // ── Runs ───────────────────────────────────────────────────────────

    /// Cells identical to `row[x]` from `x` on, up to `xmax` and never
    /// into a bottom-right cell that must not be printed plainly.
    fn identical_run(&self, row: &[CellFormat], x: u16, xmax: u16, y: u16) -> u16 {
        let mut limit = xmax;
        if self.wraps_at_bottom_right() && y + 1 == self.optimizer.term_size().1 {
            limit = limit.min((row.len() as u16).saturating_sub(2));
        }
        if limit < x {
            return 1;
        }
        let first = row[usize::from(x)];
        row[usize::from(x)..=usize::from(limit)]
            .iter()
            .take_while(|c| **c == first)
            .count() as u16
    }

    fn try_erase<W: Write>(
        &mut self,
        row: &mut [CellFormat],
        x: u16,
        xmax: u16,
        y: u16,
        out: &mut OutputChannel<W>,
    ) -> io::Result<Option<u16>> {
        let cell = row[usize::from(x)];
        if !self.has_cap(Cap::EraseChars) || !self.is_erasable(&cell) {
            return Ok(None);
        }
        let run = self.identical_run(row, x, xmax, y);
        let threshold = self
            .cap_length(Cap::EraseChars)
            .saturating_add(self.cap_length(Cap::CursorAddress));
        if u32::from(run) <= threshold {
            return Ok(None);
        }
        let Some(seq) = self
            .optimizer
            .capabilities()
            .format(Cap::EraseChars, &[i32::from(run)])
        else {
            return Ok(None);
        };
        self.set_attr(&cell, out)?;
        out.push_control(&seq)?;
        mark_printed(&mut row[usize::from(x)..usize::from(x + run)]);
        Ok(Some(run))
    }

    fn try_repeat<W: Write>(
        &mut self,
        row: &mut [CellFormat],
        x: u16,
        xmax: u16,
        y: u16,
        out: &mut OutputChannel<W>,
    ) -> io::Result<Option<u16>> {
        let cell = row[usize::from(x)];
        if !self.has_cap(Cap::RepeatChar) || !cell.is_seven_bit() || cell.is_padding() {
            return Ok(None);
        }
        let run = self.identical_run(row, x, xmax, y);
        if run < 2 || u32::from(run) <= self.cap_length(Cap::RepeatChar) {
            return Ok(None);
        }
        let Some(seq) = self
            .optimizer
            .capabilities()
            .format(Cap::RepeatChar, &[cell.base() as i32, i32::from(run)])
        else {
            return Ok(None);
        };
        self.set_attr(&cell, out)?;
        out.push_control(&seq)?;
        self.advance(run, row.len() as u16);
        mark_printed(&mut row[usize::from(x)..usize::from(x + run)]);
        Ok(Some(run))
    }

    // ── Literal output ─────────────────────────────────────────────────

    /// What actually gets printed for `row[x]` and how many cells it
    /// settles.
    fn glyph_at(&self, row: &[CellFormat], x: u16, y: u16) -> (CellFormat, u16) {
        let xi = usize::from(x);
        let cell = row[xi];
        let width = row.len() as u16;
        if cell.is_wide() {
            let splits_corner = self.wraps_at_bottom_right()
                && y + 1 == self.optimizer.term_size().1
                && x + 2 == width;
            let paired = x + 1 < width
                && row[xi + 1].is_padding()
                && row[xi + 1].fg == cell.fg
                && row[xi + 1].bg == cell.bg
                && row[xi + 1].attrs.style() == cell.attrs.style();
            if paired && !splits_corner {
                return (cell, 2);
            }
            return (ellipsis_of(&cell), 1);
        }
        if cell.is_padding() {
            return (blank_of(&cell), 1);
        }
        (cell, 1)
    }

    /// Print `row[x]` at the tracked cursor. Returns cells settled.
    fn print_cell<W: Write>(
        &mut self,
        row: &mut [CellFormat],
        x: u16,
        y: u16,
        out: &mut OutputChannel<W>,
    ) -> io::Result<u16> {
        let (glyph, settled) = self.glyph_at(row, x, y);
        self.emit_glyph(&glyph, out)?;
        self.advance(u16::from(glyph.char_width().max(1)), row.len() as u16);
        mark_printed(&mut row[usize::from(x)..usize::from(x + settled)]);
        Ok(settled)
    }

    fn emit_glyph<W: Write>(&mut self, glyph: &CellFormat, out: &mut OutputChannel<W>) -> io::Result<()> {
        self.set_attr(glyph, out)?;
        self.glyph.clear();
        (self.put_char)(glyph, &mut self.glyph);
        out.push_text(&self.glyph)
    }

    fn set_attr<W: Write>(&mut self, cell: &CellFormat, out: &mut OutputChannel<W>) -> io::Result<()> {
        let next = TermAttr::of(cell);
        if self.attr == Some(next) {
            return Ok(());
        }
        if let Some(seq) = self.attr_diff.diff(self.attr.as_ref(), &next) {
            out.push_control(&seq)?;
        }
        self.attr = Some(next);
        Ok(())
    }

    /// Cursor bookkeeping after printing `cols` columns.
    fn advance(&mut self, cols: u16, width: u16) {
        if let Some(p) = self.cursor {
            let nx = p.x.saturating_add(cols);
            // At the right margin the cursor is in a wrap-pending state
            // whose behaviour differs between terminals.
            self.cursor = (nx < width).then_some(Point::new(nx, p.y));
        }
    }

    // ── Bottom-right cell ──────────────────────────────────────────────

    #[inline]
    fn wraps_at_bottom_right(&self) -> bool {
        self.has_flag(TermFlags::AUTO_RIGHT_MARGIN)
    }

    fn is_bottom_right(&self, x: u16, y: u16) -> bool {
        let (w, h) = self.optimizer.term_size();
        self.wraps_at_bottom_right() && x + 1 == w && y + 1 == h
    }

    /// Print the bottom-right cell without scrolling. Returns cells settled.
    fn print_last_cell<W: Write>(
        &mut self,
        row: &mut [CellFormat],
        x: u16,
        y: u16,
        out: &mut OutputChannel<W>,
    ) -> io::Result<usize> {
        let (glyph, _) = self.glyph_at(row, x, y);

        if self.has_cap(Cap::ExitAmMode) && self.has_cap(Cap::EnterAmMode) {
            if !self.move_to(Point::new(x, y), out)? {
                return Ok(0);
            }
            self.push_cap(Cap::ExitAmMode, out)?;
            self.emit_glyph(&glyph, out)?;
            self.push_cap(Cap::EnterAmMode, out)?;
            self.cursor = None;
            return Ok(mark_printed(&mut row[usize::from(x)..=usize::from(x)]));
        }

        let xi = usize::from(x);
        if x > 0 && self.can_insert() {
            // The glyph left of the corner: a whole wide pair when one sits
            // there, otherwise whatever a single cell prints as.
            let pair = (x >= 2 && row[xi - 1].is_padding())
                .then(|| self.glyph_at(row, x - 2, y))
                .filter(|&(_, settled)| settled == 2);
            let (prev, span) = match pair {
                Some((wide, _)) => (wide, 2u16),
                None => (self.glyph_at(row, x - 1, y).0, 1),
            };
            if prev.char_width() == span as u8 {
                let at = x - span;
                if !self.move_to(Point::new(at, y), out)? {
                    return Ok(0);
                }
                self.emit_glyph(&glyph, out)?;
                self.cursor = Some(Point::new(at + 1, y));
                if !self.move_to(Point::new(at, y), out)? {
                    return Ok(0);
                }
                self.insert_glyph(&prev, span, out)?;
                self.cursor = Some(Point::new(x, y));
                return Ok(mark_printed(&mut row[usize::from(at)..=xi]));
            }
        }

        vtcomp_core::debug!(x, y, "bottom-right cell left unprinted");
        Ok(0)
    }

    fn can_insert(&self) -> bool {
        self.has_cap(Cap::ParmInsertChar)
            || (self.has_cap(Cap::EnterInsertMode) && self.has_cap(Cap::ExitInsertMode))
            || self.has_cap(Cap::InsertCharacter)
    }

    /// Whether [`Self::print_last_cell`] has any way to reach the corner.
    fn corner_reachable(&self) -> bool {
        (self.has_cap(Cap::ExitAmMode) && self.has_cap(Cap::EnterAmMode))
            || (self.optimizer.term_size().0 > 1 && self.can_insert())
    }

    /// Open `cols` columns at the cursor and print `glyph` into them.
    fn insert_glyph<W: Write>(
        &mut self,
        glyph: &CellFormat,
        cols: u16,
        out: &mut OutputChannel<W>,
    ) -> io::Result<()> {
        if let Some(seq) = self
            .optimizer
            .capabilities()
            .format(Cap::ParmInsertChar, &[i32::from(cols)])
        {
            out.push_control(&seq)?;
            self.emit_glyph(glyph, out)?;
        } else if self.has_cap(Cap::EnterInsertMode) && self.has_cap(Cap::ExitInsertMode) {
            self.push_cap(Cap::EnterInsertMode, out)?;
            self.emit_glyph(glyph, out)?;
            self.push_cap(Cap::InsertPadding, out)?;
            self.push_cap(Cap::ExitInsertMode, out)?;
        } else {
            for _ in 0..cols {
                self.push_cap(Cap::InsertCharacter, out)?;
            }
            self.emit_glyph(glyph, out)?;
            self.push_cap(Cap::InsertPadding, out)?;
        }
        Ok(())
    }

    // ── Cursor and screen control ──────────────────────────────────────

    /// Move the terminal cursor to `to`. Returns `false` when no capability
    /// gets there; the cursor position is then unknown.
    pub fn move_to<W: Write>(&mut self, to: Point, out: &mut OutputChannel<W>) -> io::Result<bool> {
        if self.cursor == Some(to) {
            return Ok(true);
        }
        match self.optimizer.move_cursor(self.cursor, to) {
            Some(step) => {
                out.push_control(&step.sequence)?;
                self.cursor = Some(to);
                Ok(true)
            }
            None => {
                vtcomp_core::debug!(x = to.x, y = to.y, "cursor cannot move");
                self.cursor = None;
                Ok(false)
            }
        }
    }

    /// Put the hardware cursor at `at` and make it visible.
    pub fn show_cursor_at<W: Write>(&mut self, at: Point, out: &mut OutputChannel<W>) -> io::Result<bool> {
        if !self.move_to(at, out)? {
            return Ok(false);
        }
        if self.cursor_visible != Some(true) && self.push_cap(Cap::CursorVisible, out)? {
            self.cursor_visible = Some(true);
        }
        Ok(true)
    }

    pub fn hide_cursor<W: Write>(&mut self, out: &mut OutputChannel<W>) -> io::Result<()> {
        if self.cursor_visible != Some(false) && self.push_cap(Cap::CursorInvisible, out)? {
            self.cursor_visible = Some(false);
        }
        Ok(())
    }

    pub fn save_cursor<W: Write>(&mut self, out: &mut OutputChannel<W>) -> io::Result<bool> {
        let saved = self.push_cap(Cap::SaveCursor, out)?;
        if saved {
            self.saved_cursor = Some(self.cursor);
        }
        Ok(saved)
    }

    pub fn restore_cursor<W: Write>(&mut self, out: &mut OutputChannel<W>) -> io::Result<bool> {
        let restored = self.push_cap(Cap::RestoreCursor, out)?;
        if restored {
            self.cursor = self.saved_cursor.take().flatten();
        }
        Ok(restored)
    }

    /// Switch to the alternate screen. Returns whether the terminal can.
    pub fn enter_alternate_screen<W: Write>(&mut self, out: &mut OutputChannel<W>) -> io::Result<bool> {
        if self.alternate_screen {
            return Ok(true);
        }
        let entered = self.push_cap(Cap::EnterCaMode, out)?;
        if entered {
            self.alternate_screen = true;
            self.cursor = None;
        }
        Ok(entered)
    }

    pub fn leave_alternate_screen<W: Write>(&mut self, out: &mut OutputChannel<W>) -> io::Result<bool> {
        if !self.alternate_screen {
            return Ok(false);
        }
        let left = self.push_cap(Cap::ExitCaMode, out)?;
        self.alternate_screen = false;
        self.cursor = None;
        Ok(left)
    }
}

/// Flag cells as on screen. Returns how many.
fn mark_printed(cells: &mut [CellFormat]) -> usize {
    for cell in cells.iter_mut() {
        cell.attrs = cell.attrs.with_printed(true).with_no_changes(false);
    }
    cells.len()
}

fn ellipsis_of(cell: &CellFormat) -> CellFormat {
    CellFormat {
        ch: [ELLIPSIS, '\0', '\0', '\0', '\0'],
        attrs: cell.attrs.with_char_width(1),
        ..*cell
    }
}

fn blank_of(cell: &CellFormat) -> CellFormat {
    CellFormat::BLANK
        .with_fg(cell.fg)
        .with_bg(cell.bg)
        .with_style(cell.attrs.style())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vtcomp_core::geometry::{Rect, Size};

    fn root(w: u16, h: u16) -> Surface {
        Surface::create(Rect::new(0, 0, w, h), Size::ZERO).unwrap()
    }

    fn present(p: &mut Presenter, root: &mut Surface) -> String {
        let mut out = OutputChannel::new(Vec::new());
        p.present(root, &mut out).unwrap();
        out.flush().unwrap();
        String::from_utf8(out.into_inner()).unwrap()
    }

    fn put_text(root: &mut Surface, x: u16, y: u16, text: &str) {
        for (i, c) in text.chars().enumerate() {
            root.put_cell(x + i as u16, y, CellFormat::from_char(c));
        }
    }

    #[test]
    fn clean_root_emits_nothing() {
        let mut p = Presenter::new(CapabilityTable::xterm(), 10, 2);
        let mut r = root(10, 2);
        assert_eq!(present(&mut p, &mut r), "");
    }

    #[test]
    fn prints_text_after_addressing() {
        let mut p = Presenter::new(CapabilityTable::xterm(), 10, 2);
        let mut r = root(10, 2);
        put_text(&mut r, 2, 1, "hi");
        let bytes = present(&mut p, &mut r);
        assert_eq!(bytes, "\x1b[2;3H\x1b[0m\x1b(Bhi");
        assert_eq!(p.cursor(), Some(Point::new(4, 1)));
    }

    #[test]
    fn second_present_is_silent() {
        let mut p = Presenter::new(CapabilityTable::xterm(), 10, 2);
        let mut r = root(10, 2);
        put_text(&mut r, 0, 0, "abc");
        assert!(!present(&mut p, &mut r).is_empty());
        assert_eq!(present(&mut p, &mut r), "");
        assert!(r.changes().iter().all(|c| c.is_clean()));
    }

    #[test]
    fn trailing_blank_line_is_one_clr_eol() {
        let mut p = Presenter::new(CapabilityTable::xterm(), 80, 2);
        let mut r = root(80, 2);
        r.mark_dirty_range(0, 40, 79);
        let bytes = present(&mut p, &mut r);
        assert_eq!(bytes.matches("\x1b[K").count(), 1);
        assert!(bytes.ends_with("\x1b[K"));
        assert!(!bytes.contains(' '));
    }

    #[test]
    fn unchanged_cells_are_not_reprinted() {
        let mut p = Presenter::new(CapabilityTable::xterm(), 10, 1);
        let mut r = root(10, 1);
        put_text(&mut r, 0, 0, "abcdefghij");
        present(&mut p, &mut r);
        for cell in r.row_mut(0) {
            cell.attrs = cell.attrs.with_no_changes(true);
        }
        r.mark_dirty_range(0, 0, 9);
        assert_eq!(present(&mut p, &mut r), "");
    }

    #[test]
    fn repeat_char_for_long_runs() {
        let mut p = Presenter::new(CapabilityTable::xterm(), 40, 2);
        let mut r = root(40, 2);
        put_text(&mut r, 0, 0, &"=".repeat(20));
        let bytes = present(&mut p, &mut r);
        assert!(bytes.contains("=\x1b[19b"), "{bytes:?}");
    }

    #[test]
    fn erase_chars_for_blank_runs_in_the_middle() {
        let mut p = Presenter::new(CapabilityTable::xterm(), 40, 2);
        let mut r = root(40, 2);
        put_text(&mut r, 0, 0, "a");
        put_text(&mut r, 30, 0, "b");
        r.mark_dirty_range(0, 0, 39);
        let bytes = present(&mut p, &mut r);
        assert!(bytes.contains("\x1b[29X"), "{bytes:?}");
    }

    #[test]
    fn wide_glyph_with_padding_prints_once() {
        let mut p = Presenter::new(CapabilityTable::xterm(), 10, 2);
        let mut r = root(10, 2);
        r.put_cell(0, 0, CellFormat::from_char('中'));
        let bytes = present(&mut p, &mut r);
        assert_eq!(bytes.matches('中').count(), 1);
        assert_eq!(p.cursor(), Some(Point::new(2, 0)));
    }

    #[test]
    fn mismatched_padding_degrades_to_ellipsis() {
        let mut p = Presenter::new(CapabilityTable::xterm(), 10, 2);
        let mut r = root(10, 2);
        r.put_cell(0, 0, CellFormat::from_char('中'));
        let tinted = r.cell(1, 0).copied().unwrap().with_bg(vtcomp_core::color::Color::BLUE);
        r.row_mut(0)[1] = tinted;
        r.mark_dirty_range(0, 0, 1);
        let bytes = present(&mut p, &mut r);
        assert!(bytes.contains(ELLIPSIS));
        assert!(!bytes.contains('中'));
    }

    #[test]
    fn bottom_right_uses_auto_margin_toggle() {
        let mut p = Presenter::new(CapabilityTable::xterm(), 4, 2);
        let mut r = root(4, 2);
        put_text(&mut r, 3, 1, "z");
        let bytes = present(&mut p, &mut r);
        assert!(bytes.contains("\x1b[?7l"));
        assert!(bytes.ends_with("z\x1b[?7h"));
    }

    #[test]
    fn bottom_right_insert_dance() {
        let mut p = Presenter::new(CapabilityTable::linux_console(), 4, 2);
        let mut r = root(4, 2);
        put_text(&mut r, 2, 1, "yz");
        let bytes = present(&mut p, &mut r);
        assert!(bytes.contains("z\x08\x1b[1@y"), "{bytes:?}");
    }

    #[test]
    fn bottom_right_insert_dance_moves_a_wide_neighbour() {
        let mut p = Presenter::new(CapabilityTable::linux_console(), 6, 2);
        let mut r = root(6, 2);
        assert!(r.put_cell(3, 1, CellFormat::from_char('中')));
        put_text(&mut r, 5, 1, "a");
        let bytes = present(&mut p, &mut r);
        assert!(bytes.contains("a\x08\x1b[2@中"), "{bytes:?}");
        assert!(r.row(1)[3..].iter().all(|c| c.attrs.is_printed()));
        assert!(r.line_changes(1).unwrap().is_clean());
    }

    #[test]
    fn bottom_right_without_means_is_skipped() {
        let mut p = Presenter::new(CapabilityTable::ansi_minimal(), 4, 2);
        let mut r = root(4, 2);
        put_text(&mut r, 3, 1, "z");
        let bytes = present(&mut p, &mut r);
        assert!(!bytes.contains('z'));
        // Nothing will ever reach that corner, so it does not linger as dirty.
        assert!(r.line_changes(1).unwrap().is_clean());
    }

    #[test]
    fn unreachable_cells_stay_dirty() {
        let caps = CapabilityTable::empty(vtcomp_core::capabilities::TerminalProfile::Custom);
        let mut p = Presenter::new(caps, 6, 2);
        let mut r = root(6, 2);
        put_text(&mut r, 1, 0, "ab");
        put_text(&mut r, 4, 0, "c");
        assert!(present(&mut p, &mut r).is_empty());
        let changes = *r.line_changes(0).unwrap();
        assert_eq!((changes.xmin, changes.xmax), (1, 4));
        assert!(r.line_changes(1).unwrap().is_clean());
    }

    #[test]
    fn attributes_change_only_when_needed() {
        let mut p = Presenter::new(CapabilityTable::xterm(), 10, 1);
        let mut r = root(10, 1);
        let red = CellFormat::from_char('r').with_fg(vtcomp_core::color::Color::RED);
        r.put_cell(0, 0, red);
        r.put_cell(1, 0, CellFormat::from_char('s').with_fg(vtcomp_core::color::Color::RED));
        r.put_cell(2, 0, CellFormat::from_char('d'));
        let bytes = present(&mut p, &mut r);
        assert_eq!(bytes, "\x1b[1;1H\x1b[0;31m\x1b(Brs\x1b[0md");
    }

    #[test]
    fn cursor_visibility_is_tracked() {
        let mut p = Presenter::new(CapabilityTable::xterm(), 10, 2);
        let mut out = OutputChannel::new(Vec::new());
        p.hide_cursor(&mut out).unwrap();
        p.hide_cursor(&mut out).unwrap();
        assert!(p.show_cursor_at(Point::new(1, 1), &mut out).unwrap());
        out.flush().unwrap();
        let bytes = String::from_utf8(out.into_inner()).unwrap();
        assert_eq!(bytes.matches("\x1b[?25l").count(), 1);
        assert!(bytes.ends_with("\x1b[2;2H\x1b[?12l\x1b[?25h"));
    }

    #[test]
    fn alternate_screen_round_trip() {
        let mut p = Presenter::new(CapabilityTable::xterm(), 10, 2);
        let mut out = OutputChannel::new(Vec::new());
        assert!(p.enter_alternate_screen(&mut out).unwrap());
        assert!(p.is_alternate_screen());
        assert!(p.leave_alternate_screen(&mut out).unwrap());
        assert!(!p.leave_alternate_screen(&mut out).unwrap());
        out.flush().unwrap();
        assert_eq!(out.into_inner(), b"\x1b[?1049h\x1b[?1049l".to_vec());
    }

    #[test]
    fn save_and_restore_cursor() {
        let mut p = Presenter::new(CapabilityTable::xterm(), 10, 2);
        let mut out = OutputChannel::new(Vec::new());
        p.move_to(Point::new(3, 1), &mut out).unwrap();
        assert!(p.save_cursor(&mut out).unwrap());
        p.move_to(Point::new(0, 0), &mut out).unwrap();
        assert!(p.restore_cursor(&mut out).unwrap());
        assert_eq!(p.cursor(), Some(Point::new(3, 1)));
    }
}
