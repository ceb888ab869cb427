#![forbid(unsafe_code)]

//! Terminal model for presenter validation.
//!
//! A small VT-style emulator that understands exactly the sequences the
//! capability profiles can produce, so the presenter's byte stream can be
//! replayed and the resulting screen compared against the root surface.
//!
//! # Scope
//!
//! Supported:
//! - cursor addressing and relative moves (CUP, HVP, CUU/CUD/CUF/CUB, CHA,
//!   VPA, HT/CBT, BS, CR, LF)
//! - erase (EL 0/1/2, ED 0/1/2, ECH), insert (ICH, IRM) and REP
//! - SGR styles and 16/256/RGB colors
//! - DECAWM auto-margins with either pending-wrap (`xenl`) or immediate
//!   wrapping, and `bw` backspace wrapping
//! - DECTCEM cursor visibility, save/restore cursor, the 1049 alternate
//!   screen, `ESC ( 0` / `ESC ( B` and SO/SI character sets
//!
//! Everything else is parsed and ignored.
//!
//! ```
//! use vtcomp_core::capabilities::TermFlags;
//! use vtcomp_render::terminal_model::TerminalModel;
//!
//! let mut model = TerminalModel::new(10, 2, TermFlags::AUTO_RIGHT_MARGIN);
//! model.process(b"\x1b[2;3Hhi");
//! assert_eq!(model.row_text(1).as_deref(), Some("  hi"));
//! ```

use smallvec::SmallVec;
use unicode_width::UnicodeWidthChar;
use vtcomp_core::capabilities::TermFlags;
use vtcomp_core::color::Color;
use vtcomp_core::geometry::Point;

use crate::cell::StyleFlags;

/// One character cell on the modelled screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCell {
    pub ch: char,
    /// Zero-width characters attached to `ch`.
    pub marks: SmallVec<[char; 4]>,
    pub fg: Color,
    pub bg: Color,
    pub style: StyleFlags,
    /// Drawn while a line-drawing character set was selected.
    pub alt_charset: bool,
    /// Right half of the double-width glyph to the left.
    pub wide_tail: bool,
}

impl Default for ModelCell {
    fn default() -> Self {
        Self::blank(Color::DEFAULT)
    }
}

impl ModelCell {
    fn blank(bg: Color) -> Self {
        Self {
            ch: ' ',
            marks: SmallVec::new(),
            fg: Color::DEFAULT,
            bg,
            style: StyleFlags::empty(),
            alt_charset: false,
            wide_tail: false,
        }
    }
}

/// Active graphic rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SgrState {
    pub fg: Color,
    pub bg: Color,
    pub style: StyleFlags,
}

impl Default for SgrState {
    fn default() -> Self {
        Self {
            fg: Color::DEFAULT,
            bg: Color::DEFAULT,
            style: StyleFlags::empty(),
        }
    }
}

/// Mode switches the model tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeFlags {
    pub cursor_visible: bool,
    pub auto_wrap: bool,
    pub insert: bool,
    pub alt_screen: bool,
    /// `ESC ( 0` selected line drawing for G0.
    pub g0_graphics: bool,
    /// SO shifted to G1 (line drawing).
    pub shift_out: bool,
}

impl Default for ModeFlags {
    fn default() -> Self {
        Self {
            cursor_visible: true,
            auto_wrap: true,
            insert: false,
            alt_screen: false,
            g0_graphics: false,
            shift_out: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Ground,
    Escape,
    /// `ESC (` waiting for the designator.
    Designate,
    CsiEntry,
    CsiParam,
    OscString,
    OscEscape,
}

#[derive(Debug, Clone)]
struct SavedCursor {
    x: u16,
    y: u16,
    sgr: SgrState,
    g0_graphics: bool,
}

/// Minimal terminal emulator for replaying presenter output.
#[derive(Debug, Clone)]
pub struct TerminalModel {
    width: u16,
    height: u16,
    flags: TermFlags,
    cells: Vec<ModelCell>,
    /// Primary screen while the alternate one is shown.
    saved_screen: Option<Vec<ModelCell>>,
    cursor_x: u16,
    cursor_y: u16,
    wrap_pending: bool,
    sgr: SgrState,
    modes: ModeFlags,
    saved: Option<SavedCursor>,
    tabstop: u16,
    last_printed: Option<char>,
    scrolled: usize,
    parse_state: ParseState,
    csi_params: Vec<u32>,
    csi_private: bool,
    utf8: SmallVec<[u8; 4]>,
    utf8_needed: usize,
}

impl TerminalModel {
    /// A blank `width`×`height` screen with the given quirks.
    pub fn new(width: u16, height: u16, flags: TermFlags) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            flags,
            cells: vec![ModelCell::default(); usize::from(width) * usize::from(height)],
            saved_screen: None,
            cursor_x: 0,
            cursor_y: 0,
            wrap_pending: false,
            sgr: SgrState::default(),
            modes: ModeFlags::default(),
            saved: None,
            tabstop: 8,
            last_printed: None,
            scrolled: 0,
            parse_state: ParseState::Ground,
            csi_params: Vec::with_capacity(16),
            csi_private: false,
            utf8: SmallVec::new(),
            utf8_needed: 0,
        }
    }

    // ── Inspection ─────────────────────────────────────────────────────

    #[inline]
    pub const fn width(&self) -> u16 {
        self.width
    }

    #[inline]
    pub const fn height(&self) -> u16 {
        self.height
    }

    #[inline]
    pub const fn cursor(&self) -> Point {
        Point::new(self.cursor_x, self.cursor_y)
    }

    /// The last column was printed and the wrap has not happened yet.
    #[inline]
    pub const fn is_wrap_pending(&self) -> bool {
        self.wrap_pending
    }

    #[inline]
    pub const fn sgr(&self) -> SgrState {
        self.sgr
    }

    #[inline]
    pub const fn modes(&self) -> ModeFlags {
        self.modes
    }

    /// Lines scrolled off the top so far.
    #[inline]
    pub const fn scroll_count(&self) -> usize {
        self.scrolled
    }

    pub fn cell(&self, x: u16, y: u16) -> Option<&ModelCell> {
        (x < self.width && y < self.height).then(|| &self.cells[self.index(x, y)])
    }

    pub fn row(&self, y: u16) -> Option<&[ModelCell]> {
        if y >= self.height {
            return None;
        }
        let start = usize::from(y) * usize::from(self.width);
        Some(&self.cells[start..start + usize::from(self.width)])
    }

    /// Row text with trailing blanks trimmed; wide tails are skipped.
    pub fn row_text(&self, y: u16) -> Option<String> {
        self.row(y).map(|cells| {
            let mut text = String::new();
            for cell in cells.iter().filter(|c| !c.wide_tail) {
                text.push(cell.ch);
                text.extend(cell.marks.iter());
            }
            text.trim_end().to_owned()
        })
    }

    /// Every row's text, one line each.
    pub fn screen_text(&self) -> Vec<String> {
        (0..self.height)
            .filter_map(|y| self.row_text(y))
            .collect()
    }

    #[inline]
    fn index(&self, x: u16, y: u16) -> usize {
        usize::from(y) * usize::from(self.width) + usize::from(x)
    }

    // ── Input ──────────────────────────────────────────────────────────

    /// Feed terminal output.
    pub fn process(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.process_byte(b);
        }
    }

    fn process_byte(&mut self, b: u8) {
        match self.parse_state {
            ParseState::Ground => self.ground_state(b),
            ParseState::Escape => self.escape_state(b),
            ParseState::Designate => {
                match b {
                    b'0' => self.modes.g0_graphics = true,
                    b'B' | b'A' | b'U' => self.modes.g0_graphics = false,
                    _ => {}
                }
                self.parse_state = ParseState::Ground;
            }
            ParseState::CsiEntry | ParseState::CsiParam => self.csi_state(b),
            ParseState::OscString => match b {
                0x07 => self.parse_state = ParseState::Ground,
                0x1B => self.parse_state = ParseState::OscEscape,
                _ => {}
            },
            ParseState::OscEscape => {
                self.parse_state = if b == b'\\' {
                    ParseState::Ground
                } else {
                    ParseState::OscString
                };
            }
        }
    }

    fn ground_state(&mut self, b: u8) {
        if self.utf8_needed > 0 {
            if b & 0xC0 == 0x80 {
                self.utf8.push(b);
                self.utf8_needed -= 1;
                if self.utf8_needed == 0 {
                    let decoded = std::str::from_utf8(&self.utf8)
                        .ok()
                        .and_then(|s| s.chars().next())
                        .unwrap_or(char::REPLACEMENT_CHARACTER);
                    self.utf8.clear();
                    self.put_char(decoded);
                }
                return;
            }
            // Truncated sequence.
            self.utf8.clear();
            self.utf8_needed = 0;
            self.put_char(char::REPLACEMENT_CHARACTER);
        }

        match b {
            0x1B => self.parse_state = ParseState::Escape,
            0x00..=0x1F | 0x7F => self.handle_c0(b),
            0x20..=0x7E => self.put_char(char::from(b)),
            0xC0..=0xDF => self.begin_utf8(b, 1),
            0xE0..=0xEF => self.begin_utf8(b, 2),
            0xF0..=0xF7 => self.begin_utf8(b, 3),
            _ => self.put_char(char::REPLACEMENT_CHARACTER),
        }
    }

    fn begin_utf8(&mut self, lead: u8, needed: usize) {
        self.utf8.clear();
        self.utf8.push(lead);
        self.utf8_needed = needed;
    }

    fn escape_state(&mut self, b: u8) {
        self.parse_state = ParseState::Ground;
        match b {
            b'[' => {
                self.csi_params.clear();
                self.csi_private = false;
                self.parse_state = ParseState::CsiEntry;
            }
            b']' => self.parse_state = ParseState::OscString,
            b'(' => self.parse_state = ParseState::Designate,
            b'7' => self.save_cursor(),
            b'8' => self.restore_cursor(),
            0x1B => self.parse_state = ParseState::Escape,
            _ => {}
        }
    }

    fn csi_state(&mut self, b: u8) {
        match b {
            b'0'..=b'9' => {
                if self.csi_params.is_empty() {
                    self.csi_params.push(0);
                }
                if let Some(last) = self.csi_params.last_mut() {
                    *last = last.saturating_mul(10).saturating_add(u32::from(b - b'0'));
                }
                self.parse_state = ParseState::CsiParam;
            }
            b';' | b':' => {
                if self.csi_params.is_empty() {
                    self.csi_params.push(0);
                }
                self.csi_params.push(0);
                self.parse_state = ParseState::CsiParam;
            }
            b'?' | b'>' | b'!' if self.parse_state == ParseState::CsiEntry => {
                self.csi_private = true;
                self.parse_state = ParseState::CsiParam;
            }
            0x20..=0x2F => {}
            0x40..=0x7E => {
                self.execute_csi(b);
                self.parse_state = ParseState::Ground;
            }
            _ => self.parse_state = ParseState::Ground,
        }
    }

    fn handle_c0(&mut self, b: u8) {
        match b {
            0x08 => self.backspace(),
            0x09 => {
                self.wrap_pending = false;
                let next = (self.cursor_x / self.tabstop + 1) * self.tabstop;
                self.cursor_x = next.min(self.width - 1);
            }
            0x0A => {
                // A newline right after a deferred wrap is still a newline.
                self.wrap_pending = false;
                self.line_feed();
            }
            0x0D => {
                self.wrap_pending = false;
                self.cursor_x = 0;
            }
            0x0E => self.modes.shift_out = true,
            0x0F => self.modes.shift_out = false,
            _ => {}
        }
    }

    fn backspace(&mut self) {
        self.wrap_pending = false;
        if self.cursor_x > 0 {
            self.cursor_x -= 1;
        } else if self.flags.contains(TermFlags::AUTO_LEFT_MARGIN) && self.cursor_y > 0 {
            self.cursor_y -= 1;
            self.cursor_x = self.width - 1;
        }
    }

    fn line_feed(&mut self) {
        if self.cursor_y + 1 < self.height {
            self.cursor_y += 1;
        } else {
            self.scroll_up();
        }
    }

    fn scroll_up(&mut self) {
        let w = usize::from(self.width);
        self.cells.drain(..w);
        let fill = self.erase_template();
        self.cells.extend(std::iter::repeat_n(fill, w));
        self.scrolled += 1;
    }

    // ── Printing ───────────────────────────────────────────────────────

    fn put_char(&mut self, ch: char) {
        let width = UnicodeWidthChar::width(ch).unwrap_or(0) as u16;
        if width == 0 {
            self.attach_mark(ch);
            return;
        }

        if self.wrap_pending {
            self.wrap_pending = false;
            self.cursor_x = 0;
            self.line_feed();
        }
        if width == 2 && self.cursor_x + 1 >= self.width && self.modes.auto_wrap {
            self.cursor_x = 0;
            self.line_feed();
        }

        if self.modes.insert {
            self.insert_blanks(width);
        }
        let (x, y) = (self.cursor_x, self.cursor_y);
        self.clear_wide_neighbours(x, y);
        if width == 2 && x + 1 < self.width {
            self.clear_wide_neighbours(x + 1, y);
        }
        let alt_charset = self.modes.g0_graphics || self.modes.shift_out;
        let sgr = self.sgr;
        let idx = self.index(x, y);
        self.cells[idx] = ModelCell {
            ch,
            marks: SmallVec::new(),
            fg: sgr.fg,
            bg: sgr.bg,
            style: sgr.style,
            alt_charset,
            wide_tail: false,
        };
        if width == 2 && x + 1 < self.width {
            let tail = self.index(x + 1, y);
            self.cells[tail] = ModelCell {
                wide_tail: true,
                ch: ' ',
                ..self.cells[idx].clone()
            };
        }
        self.last_printed = Some(ch);
        self.advance(width);
    }

    fn attach_mark(&mut self, mark: char) {
        let x = if self.wrap_pending {
            self.cursor_x
        } else {
            self.cursor_x.saturating_sub(1)
        };
        let mut idx = self.index(x, self.cursor_y);
        if self.cells[idx].wide_tail && x > 0 {
            idx -= 1;
        }
        self.cells[idx].marks.push(mark);
    }

    /// Overwriting half of a wide glyph blanks the other half.
    fn clear_wide_neighbours(&mut self, x: u16, y: u16) {
        let idx = self.index(x, y);
        if self.cells[idx].wide_tail && x > 0 {
            let head = idx - 1;
            self.cells[head].ch = ' ';
            self.cells[head].marks.clear();
        } else if x + 1 < self.width && self.cells[idx + 1].wide_tail {
            self.cells[idx + 1].wide_tail = false;
            self.cells[idx + 1].ch = ' ';
        }
    }

    fn advance(&mut self, width: u16) {
        let next = self.cursor_x + width;
        if next < self.width {
            self.cursor_x = next;
            return;
        }
        if !self.modes.auto_wrap {
            self.cursor_x = self.width - 1;
        } else if self.flags.contains(TermFlags::EAT_NEWLINE_GLITCH) {
            self.cursor_x = self.width - 1;
            self.wrap_pending = true;
        } else {
            self.cursor_x = 0;
            self.line_feed();
        }
    }

    // ── Control sequences ──────────────────────────────────────────────

    fn param(&self, i: usize, default: u32) -> u32 {
        match self.csi_params.get(i).copied() {
            Some(0) | None => default,
            Some(v) => v,
        }
    }

    fn count(&self) -> u16 {
        u16::try_from(self.param(0, 1)).unwrap_or(u16::MAX)
    }

    fn execute_csi(&mut self, final_byte: u8) {
        if self.csi_private {
            match final_byte {
                b'h' => self.set_private_modes(true),
                b'l' => self.set_private_modes(false),
                _ => {}
            }
            return;
        }

        let n = self.count();
        match final_byte {
            b'H' | b'f' => {
                let row = self.param(0, 1);
                let col = self.param(1, 1);
                self.goto(col - 1, row - 1);
            }
            b'A' => self.goto_rel(0, -i32::from(n)),
            b'B' => self.goto_rel(0, i32::from(n)),
            b'C' => self.goto_rel(i32::from(n), 0),
            b'D' => self.goto_rel(-i32::from(n), 0),
            b'G' => self.goto(self.param(0, 1) - 1, u32::from(self.cursor_y)),
            b'd' => self.goto(u32::from(self.cursor_x), self.param(0, 1) - 1),
            b'Z' => {
                self.wrap_pending = false;
                for _ in 0..n {
                    self.cursor_x = self.cursor_x.saturating_sub(1) / self.tabstop * self.tabstop;
                }
            }
            b'J' => self.erase_display(self.csi_params.first().copied().unwrap_or(0)),
            b'K' => self.erase_line(self.csi_params.first().copied().unwrap_or(0)),
            b'X' => {
                let end = self.cursor_x.saturating_add(n).min(self.width);
                self.erase_cells(self.cursor_x, end, self.cursor_y);
            }
            b'@' => self.insert_blanks(n),
            b'b' => {
                if let Some(ch) = self.last_printed {
                    for _ in 0..n {
                        self.put_char(ch);
                    }
                }
            }
            b'm' => self.apply_sgr(),
            b'h' => self.set_ansi_modes(true),
            b'l' => self.set_ansi_modes(false),
            b's' => self.save_cursor(),
            b'u' => self.restore_cursor(),
            _ => {}
        }
    }

    fn goto(&mut self, x: u32, y: u32) {
        self.wrap_pending = false;
        self.cursor_x = u16::try_from(x).unwrap_or(u16::MAX).min(self.width - 1);
        self.cursor_y = u16::try_from(y).unwrap_or(u16::MAX).min(self.height - 1);
    }

    fn goto_rel(&mut self, dx: i32, dy: i32) {
        let x = (i32::from(self.cursor_x) + dx).max(0);
        let y = (i32::from(self.cursor_y) + dy).max(0);
        self.goto(x.unsigned_abs(), y.unsigned_abs());
    }

    fn set_private_modes(&mut self, on: bool) {
        for i in 0..self.csi_params.len() {
            match self.csi_params[i] {
                7 => {
                    self.modes.auto_wrap = on;
                    if !on {
                        self.wrap_pending = false;
                    }
                }
                25 => self.modes.cursor_visible = on,
                1049 => self.switch_screen(on),
                _ => {}
            }
        }
    }

    fn set_ansi_modes(&mut self, on: bool) {
        if self.csi_params.contains(&4) {
            self.modes.insert = on;
        }
    }

    fn switch_screen(&mut self, alternate: bool) {
        if alternate == self.modes.alt_screen {
            return;
        }
        if alternate {
            self.save_cursor();
            let blank = vec![ModelCell::default(); self.cells.len()];
            self.saved_screen = Some(std::mem::replace(&mut self.cells, blank));
        } else {
            if let Some(primary) = self.saved_screen.take() {
                self.cells = primary;
            }
            self.restore_cursor();
        }
        self.modes.alt_screen = alternate;
    }

    fn save_cursor(&mut self) {
        self.saved = Some(SavedCursor {
            x: self.cursor_x,
            y: self.cursor_y,
            sgr: self.sgr,
            g0_graphics: self.modes.g0_graphics,
        });
    }

    fn restore_cursor(&mut self) {
        let saved = self.saved.clone().unwrap_or(SavedCursor {
            x: 0,
            y: 0,
            sgr: SgrState::default(),
            g0_graphics: false,
        });
        self.goto(u32::from(saved.x), u32::from(saved.y));
        self.sgr = saved.sgr;
        self.modes.g0_graphics = saved.g0_graphics;
    }

    // ── Erase and insert ───────────────────────────────────────────────

    /// What erased cells become: the current background on `bce`
    /// terminals, the default one elsewhere.
    fn erase_template(&self) -> ModelCell {
        if self.flags.contains(TermFlags::BACKGROUND_COLOR_ERASE) {
            ModelCell::blank(self.sgr.bg)
        } else {
            ModelCell::default()
        }
    }

    fn erase_cells(&mut self, from: u16, to: u16, y: u16) {
        self.wrap_pending = false;
        if from >= to {
            return;
        }
        let fill = self.erase_template();
        self.clear_wide_neighbours(from, y);
        self.clear_wide_neighbours(to - 1, y);
        let start = self.index(from, y);
        let end = self.index(to - 1, y) + 1;
        self.cells[start..end].fill(fill);
    }

    fn erase_line(&mut self, mode: u32) {
        let y = self.cursor_y;
        match mode {
            0 => self.erase_cells(self.cursor_x, self.width, y),
            1 => self.erase_cells(0, self.cursor_x + 1, y),
            2 => self.erase_cells(0, self.width, y),
            _ => {}
        }
    }

    fn erase_display(&mut self, mode: u32) {
        let y = self.cursor_y;
        match mode {
            0 => {
                self.erase_line(0);
                for row in y + 1..self.height {
                    self.erase_cells(0, self.width, row);
                }
            }
            1 => {
                for row in 0..y {
                    self.erase_cells(0, self.width, row);
                }
                self.erase_line(1);
            }
            2 | 3 => {
                for row in 0..self.height {
                    self.erase_cells(0, self.width, row);
                }
            }
            _ => {}
        }
    }

    /// Shift the rest of the line right by `n`, dropping cells at the edge.
    fn insert_blanks(&mut self, n: u16) {
        self.wrap_pending = false;
        let (x, y) = (self.cursor_x, self.cursor_y);
        let n = n.min(self.width - x);
        if n == 0 {
            return;
        }
        let fill = self.erase_template();
        let start = self.index(x, y);
        let end = self.index(self.width - 1, y) + 1;
        let line = &mut self.cells[start..end];
        line.rotate_right(usize::from(n));
        line[..usize::from(n)].fill(fill);
        // A wide glyph pushed off the edge leaves its head behind.
        if let Some(last) = line.last_mut()
            && UnicodeWidthChar::width(last.ch) == Some(2)
        {
            last.ch = ' ';
            last.marks.clear();
        }
    }

    // ── SGR ────────────────────────────────────────────────────────────

    fn apply_sgr(&mut self) {
        if self.csi_params.is_empty() {
            self.sgr = SgrState::default();
            return;
        }
        let mut i = 0;
        while i < self.csi_params.len() {
            let code = self.csi_params[i];
            match code {
                0 => self.sgr = SgrState::default(),
                1 => self.sgr.style.insert(StyleFlags::BOLD),
                2 => self.sgr.style.insert(StyleFlags::DIM),
                3 => self.sgr.style.insert(StyleFlags::ITALIC),
                4 => self.sgr.style.insert(StyleFlags::UNDERLINE),
                5 => self.sgr.style.insert(StyleFlags::BLINK),
                7 => self.sgr.style.insert(StyleFlags::REVERSE),
                8 => self.sgr.style.insert(StyleFlags::INVISIBLE),
                9 => self.sgr.style.insert(StyleFlags::CROSSED_OUT),
                21 => self.sgr.style.insert(StyleFlags::DOUBLE_UNDERLINE),
                22 => self.sgr.style.remove(StyleFlags::BOLD | StyleFlags::DIM),
                23 => self.sgr.style.remove(StyleFlags::ITALIC),
                24 => self
                    .sgr
                    .style
                    .remove(StyleFlags::UNDERLINE | StyleFlags::DOUBLE_UNDERLINE),
                25 => self.sgr.style.remove(StyleFlags::BLINK),
                27 => self.sgr.style.remove(StyleFlags::REVERSE),
                28 => self.sgr.style.remove(StyleFlags::INVISIBLE),
                29 => self.sgr.style.remove(StyleFlags::CROSSED_OUT),
                30..=37 => self.sgr.fg = Color::indexed((code - 30) as u8),
                39 => self.sgr.fg = Color::DEFAULT,
                40..=47 => self.sgr.bg = Color::indexed((code - 40) as u8),
                49 => self.sgr.bg = Color::DEFAULT,
                90..=97 => self.sgr.fg = Color::indexed((code - 90 + 8) as u8),
                100..=107 => self.sgr.bg = Color::indexed((code - 100 + 8) as u8),
                38 | 48 => {
                    if let Some(color) = self.extended_color(&mut i) {
                        if code == 38 {
                            self.sgr.fg = color;
                        } else {
                            self.sgr.bg = color;
                        }
                    }
                }
                _ => {}
            }
            i += 1;
        }
    }

    /// `38;5;n` or `38;2;r;g;b`; `i` ends on the last consumed parameter.
    fn extended_color(&self, i: &mut usize) -> Option<Color> {
        let byte = |v: u32| u8::try_from(v).unwrap_or(u8::MAX);
        match self.csi_params.get(*i + 1).copied()? {
            5 => {
                let index = self.csi_params.get(*i + 2).copied()?;
                *i += 2;
                Some(Color::indexed(byte(index)))
            }
            2 => {
                let r = self.csi_params.get(*i + 2).copied()?;
                let g = self.csi_params.get(*i + 3).copied()?;
                let b = self.csi_params.get(*i + 4).copied()?;
                *i += 4;
                Some(Color::rgb(byte(r), byte(g), byte(b)))
            }
            _ => None,
        }
    }

    // ── Debugging ──────────────────────────────────────────────────────

    /// Escape sequences made readable for assertion messages.
    pub fn dump_sequences(bytes: &[u8]) -> String {
        let mut out = String::new();
        for chunk in String::from_utf8_lossy(bytes).chars() {
            match chunk {
                '\x1b' => out.push_str("\\e"),
                '\r' => out.push_str("\\r"),
                '\n' => out.push_str("\\n"),
                '\x08' => out.push_str("\\b"),
                c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
                c => out.push(c),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xterm(w: u16, h: u16) -> TerminalModel {
        TerminalModel::new(
            w,
            h,
            TermFlags::AUTO_RIGHT_MARGIN
                | TermFlags::EAT_NEWLINE_GLITCH
                | TermFlags::BACKGROUND_COLOR_ERASE,
        )
    }

    #[test]
    fn new_screen_is_blank() {
        let model = xterm(4, 2);
        assert_eq!(model.cursor(), Point::new(0, 0));
        assert!(model.row(0).unwrap().iter().all(|c| *c == ModelCell::default()));
        assert!(model.cell(4, 0).is_none());
    }

    #[test]
    fn cup_and_print() {
        let mut model = xterm(10, 3);
        model.process(b"\x1b[3;5Hab");
        assert_eq!(model.row_text(2).as_deref(), Some("    ab"));
        assert_eq!(model.cursor(), Point::new(6, 2));
    }

    #[test]
    fn relative_moves_are_clamped() {
        let mut model = xterm(10, 5);
        model.process(b"\x1b[3;3H\x1b[2A\x1b[40C\x1b[B\x1b[100D");
        assert_eq!(model.cursor(), Point::new(0, 1));
        model.process(b"\x1b[4G\x1b[5d");
        assert_eq!(model.cursor(), Point::new(3, 4));
    }

    #[test]
    fn pending_wrap_waits_for_next_glyph() {
        let mut model = xterm(3, 2);
        model.process(b"abc");
        assert!(model.is_wrap_pending());
        assert_eq!(model.cursor(), Point::new(2, 0));
        model.process(b"d");
        assert_eq!(model.row_text(1).as_deref(), Some("d"));
    }

    #[test]
    fn immediate_wrap_without_xenl() {
        let mut model = TerminalModel::new(3, 2, TermFlags::AUTO_RIGHT_MARGIN);
        model.process(b"\x1b[2;1Habc");
        assert_eq!(model.scroll_count(), 1);
        assert_eq!(model.row_text(0).as_deref(), Some("abc"));
    }

    #[test]
    fn autowrap_off_overwrites_last_column() {
        let mut model = xterm(3, 1);
        model.process(b"\x1b[?7labcd");
        assert_eq!(model.row_text(0).as_deref(), Some("abd"));
        assert_eq!(model.scroll_count(), 0);
    }

    #[test]
    fn erase_uses_background_on_bce() {
        let mut model = xterm(5, 1);
        model.process(b"hello\x1b[1;3H\x1b[44m\x1b[K");
        assert_eq!(model.row_text(0).as_deref(), Some("he"));
        assert_eq!(model.cell(4, 0).unwrap().bg, Color::BLUE);

        let mut plain = TerminalModel::new(5, 1, TermFlags::AUTO_RIGHT_MARGIN);
        plain.process(b"hello\x1b[1;3H\x1b[44m\x1b[K");
        assert_eq!(plain.cell(4, 0).unwrap().bg, Color::DEFAULT);
    }

    #[test]
    fn clear_to_line_start() {
        let mut model = xterm(6, 1);
        model.process(b"abcdef\x1b[1;3H\x1b[1K");
        assert_eq!(model.row_text(0).as_deref(), Some("   def"));
    }

    #[test]
    fn erase_chars_keeps_cursor() {
        let mut model = xterm(6, 1);
        model.process(b"abcdef\x1b[1;2H\x1b[3X");
        assert_eq!(model.row_text(0).as_deref(), Some("a   ef"));
        assert_eq!(model.cursor(), Point::new(1, 0));
    }

    #[test]
    fn repeat_last_character() {
        let mut model = xterm(10, 1);
        model.process(b"=\x1b[4b");
        assert_eq!(model.row_text(0).as_deref(), Some("====="));
    }

    #[test]
    fn insert_character_shifts_right() {
        let mut model = xterm(4, 1);
        model.process(b"abcd\x1b[1;2H\x1b[1@X");
        assert_eq!(model.row_text(0).as_deref(), Some("aXbc"));

        let mut irm = xterm(4, 1);
        irm.process(b"abcd\x1b[1;2H\x1b[4hY\x1b[4l");
        assert_eq!(irm.row_text(0).as_deref(), Some("aYbc"));
        assert!(!irm.modes().insert);
    }

    #[test]
    fn inserted_blanks_take_the_erase_background() {
        let mut model = xterm(5, 1);
        model.process("ab中\x1b[1;2H\x1b[44m\x1b[2@".as_bytes());
        assert_eq!(model.row_text(0).as_deref(), Some("a  b"));
        assert_eq!(model.cell(1, 0).unwrap().bg, Color::BLUE);
        assert_eq!(model.cell(2, 0).unwrap().bg, Color::BLUE);
        // The wide glyph lost its tail off the edge.
        assert_eq!(model.cell(4, 0).unwrap().ch, ' ');
        assert!(!model.cell(4, 0).unwrap().wide_tail);
    }

    #[test]
    fn sgr_colors_and_styles() {
        let mut model = xterm(10, 1);
        model.process(b"\x1b[0;1;31;44mx\x1b[22;38;5;200;48;2;1;2;3my");
        let x = model.cell(0, 0).unwrap();
        assert_eq!(x.style, StyleFlags::BOLD);
        assert_eq!((x.fg, x.bg), (Color::RED, Color::BLUE));
        let y = model.cell(1, 0).unwrap();
        assert!(y.style.is_empty());
        assert_eq!((y.fg, y.bg), (Color::indexed(200), Color::rgb(1, 2, 3)));
    }

    #[test]
    fn utf8_wide_glyph_takes_two_columns() {
        let mut model = xterm(6, 1);
        model.process("中x".as_bytes());
        assert_eq!(model.row_text(0).as_deref(), Some("中x"));
        assert!(model.cell(1, 0).unwrap().wide_tail);
        assert_eq!(model.cursor(), Point::new(3, 0));
    }

    #[test]
    fn overwriting_wide_tail_blanks_head() {
        let mut model = xterm(6, 1);
        model.process("中\x1b[1;2Hx".as_bytes());
        assert_eq!(model.row_text(0).as_deref(), Some(" x"));
    }

    #[test]
    fn charsets_are_tracked() {
        let mut model = xterm(6, 1);
        model.process(b"\x1b(0q\x1b(Bq\x0eq\x0fq");
        let flags: Vec<bool> = model.row(0).unwrap()[..4].iter().map(|c| c.alt_charset).collect();
        assert_eq!(flags, vec![true, false, true, false]);
    }

    #[test]
    fn alternate_screen_restores_primary() {
        let mut model = xterm(4, 2);
        model.process(b"main\x1b[?1049h");
        assert_eq!(model.row_text(0).as_deref(), Some(""));
        model.process(b"alt\x1b[?1049l");
        assert_eq!(model.row_text(0).as_deref(), Some("main"));
        assert!(!model.modes().alt_screen);
    }

    #[test]
    fn cursor_visibility_and_save_restore() {
        let mut model = xterm(10, 3);
        model.process(b"\x1b[?25l\x1b[2;4H\x1b7\x1b[H\x1b8");
        assert!(!model.modes().cursor_visible);
        assert_eq!(model.cursor(), Point::new(3, 1));
        model.process(b"\x1b[?12l\x1b[?25h");
        assert!(model.modes().cursor_visible);
    }

    #[test]
    fn backspace_wraps_only_with_bw() {
        let mut model = xterm(4, 2);
        model.process(b"\x1b[2;1H\x08");
        assert_eq!(model.cursor(), Point::new(0, 1));

        let mut bw = TerminalModel::new(4, 2, TermFlags::AUTO_LEFT_MARGIN);
        bw.process(b"\x1b[2;1H\x08");
        assert_eq!(bw.cursor(), Point::new(3, 0));
    }

    #[test]
    fn tabs_forward_and_back() {
        let mut model = xterm(20, 1);
        model.process(b"\tx\x1b[Z");
        assert_eq!(model.cell(8, 0).unwrap().ch, 'x');
        assert_eq!(model.cursor(), Point::new(8, 0));
    }

    #[test]
    fn combining_marks_attach() {
        let mut model = xterm(4, 1);
        model.process("e\u{301}x".as_bytes());
        assert_eq!(model.cell(0, 0).unwrap().marks.as_slice(), &['\u{301}']);
        assert_eq!(model.cursor(), Point::new(2, 0));
    }

    #[test]
    fn dump_is_readable() {
        assert_eq!(TerminalModel::dump_sequences(b"\x1b[Hx\r\n"), "\\e[Hx\\r\\n");
    }

    mod property {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn cursor_stays_on_screen(bytes in proptest::collection::vec(any::<u8>(), 0..200)) {
                let mut model = xterm(12, 4);
                model.process(&bytes);
                prop_assert!(model.cursor().x < 12);
                prop_assert!(model.cursor().y < 4);
            }

            #[test]
            fn printable_text_never_scrolls_when_it_fits(s in "[a-z]{0,11}") {
                let mut model = xterm(12, 2);
                model.process(s.as_bytes());
                prop_assert_eq!(model.row_text(0).unwrap(), s);
                prop_assert_eq!(model.scroll_count(), 0);
            }
        }
    }
}
