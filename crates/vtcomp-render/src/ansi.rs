#![forbid(unsafe_code)]

//! Attribute changes and character output.
//!
//! The presenter never formats SGR itself. Before a literal character whose
//! colors or style differ from what the terminal currently shows, it asks an
//! [`AttributeDiff`] for the control sequence that gets from one
//! [`TermAttr`] to the next. [`SgrDiff`] is the default: it emits the
//! shortest SGR delta, downgrades colors to the configured depth and
//! switches the alternate character set.
//!
//! Characters themselves go through a [`PutChar`] function so the output
//! encoding can be swapped between UTF-8 and plain ASCII.
//!
//! # SGR reference
//!
//! | Style | On | Off |
//! |-------|----|-----|
//! | bold | 1 | 22 |
//! | dim | 2 | 22 |
//! | italic | 3 | 23 |
//! | underline | 4 | 24 |
//! | double underline | 21 | 24 |
//! | blink | 5 | 25 |
//! | reverse, standout | 7 | 27 |
//! | invisible | 8 | 28 |
//! | crossed out | 9 | 29 |

use vtcomp_core::capabilities::{Cap, CapabilityTable};
use vtcomp_core::color::{self, Color, ColorDepth, ColorKind, PaletteFn};

use crate::cell::{CellFormat, StyleFlags};

/// SGR reset: `CSI 0 m`
pub const SGR_RESET: &str = "\x1b[0m";

/// Designate DEC special graphics into G0.
pub const ACS_ENTER: &str = "\x1b(0";
/// Designate US-ASCII into G0.
pub const ACS_EXIT: &str = "\x1b(B";

/// SGR on/off parameter pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SgrCodes {
    pub on: u8,
    pub off: u8,
}

/// Style flags that map to SGR parameters, in emission order.
///
/// `STANDOUT` is folded into `REVERSE` before lookup.
pub const FLAG_TABLE: [(StyleFlags, SgrCodes); 9] = [
    (StyleFlags::BOLD, SgrCodes { on: 1, off: 22 }),
    (StyleFlags::DIM, SgrCodes { on: 2, off: 22 }),
    (StyleFlags::ITALIC, SgrCodes { on: 3, off: 23 }),
    (StyleFlags::UNDERLINE, SgrCodes { on: 4, off: 24 }),
    (StyleFlags::DOUBLE_UNDERLINE, SgrCodes { on: 21, off: 24 }),
    (StyleFlags::BLINK, SgrCodes { on: 5, off: 25 }),
    (StyleFlags::REVERSE, SgrCodes { on: 7, off: 27 }),
    (StyleFlags::INVISIBLE, SgrCodes { on: 8, off: 28 }),
    (StyleFlags::CROSSED_OUT, SgrCodes { on: 9, off: 29 }),
];

/// Style bits that reach the terminal through SGR.
const SGR_STYLES: StyleFlags = StyleFlags::BOLD
    .union(StyleFlags::DIM)
    .union(StyleFlags::ITALIC)
    .union(StyleFlags::UNDERLINE)
    .union(StyleFlags::DOUBLE_UNDERLINE)
    .union(StyleFlags::BLINK)
    .union(StyleFlags::REVERSE)
    .union(StyleFlags::INVISIBLE)
    .union(StyleFlags::CROSSED_OUT);

// ── Terminal attribute state ─────────────────────────────────────────────

/// The attribute state of the terminal: what the next printed character
/// will look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TermAttr {
    pub fg: Color,
    pub bg: Color,
    pub style: StyleFlags,
}

impl TermAttr {
    /// State right after `SGR 0` with the ASCII character set.
    pub const DEFAULT: Self = Self {
        fg: Color::DEFAULT,
        bg: Color::DEFAULT,
        style: StyleFlags::empty(),
    };

    /// Attributes needed to print `cell`.
    #[inline]
    pub const fn of(cell: &CellFormat) -> Self {
        Self {
            fg: cell.fg,
            bg: cell.bg,
            style: cell.attrs.style(),
        }
    }

    #[inline]
    pub fn alt_charset(&self) -> bool {
        self.style.contains(StyleFlags::ALT_CHARSET)
    }

    /// Style as the terminal sees it: SGR bits only, standout as reverse.
    #[inline]
    pub fn sgr_style(&self) -> StyleFlags {
        let mut style = self.style & SGR_STYLES;
        if self.style.contains(StyleFlags::STANDOUT) {
            style |= StyleFlags::REVERSE;
        }
        style
    }
}

impl Default for TermAttr {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Computes the control sequence that changes the terminal's attributes.
///
/// `current == None` means the terminal state is unknown. Implementations
/// must return `None` whenever `current` already renders like `next`.
pub trait AttributeDiff {
    fn diff(&self, current: Option<&TermAttr>, next: &TermAttr) -> Option<String>;
}

impl<F> AttributeDiff for F
where
    F: Fn(Option<&TermAttr>, &TermAttr) -> Option<String>,
{
    fn diff(&self, current: Option<&TermAttr>, next: &TermAttr) -> Option<String> {
        self(current, next)
    }
}

// ── SGR diff ─────────────────────────────────────────────────────────────

/// Minimal SGR delta generator.
#[derive(Debug, Clone)]
pub struct SgrDiff {
    depth: ColorDepth,
    palette: PaletteFn,
    enter_acs: Option<String>,
    exit_acs: Option<String>,
}

impl Default for SgrDiff {
    fn default() -> Self {
        Self::new(ColorDepth::default())
    }
}

impl SgrDiff {
    pub fn new(depth: ColorDepth) -> Self {
        Self {
            depth,
            palette: color::approximate,
            enter_acs: Some(ACS_ENTER.to_owned()),
            exit_acs: Some(ACS_EXIT.to_owned()),
        }
    }

    /// Color depth and alternate charset sequences from a capability table.
    pub fn from_capabilities(caps: &CapabilityTable) -> Self {
        Self {
            depth: caps.color_depth(),
            palette: color::approximate,
            enter_acs: caps.sequence(Cap::EnterAltCharsetMode).map(|s| s.into_owned()),
            exit_acs: caps.sequence(Cap::ExitAltCharsetMode).map(|s| s.into_owned()),
        }
    }

    /// Replace the RGB → palette mapping.
    #[must_use]
    pub fn with_palette(mut self, palette: PaletteFn) -> Self {
        self.palette = palette;
        self
    }

    #[inline]
    pub const fn depth(&self) -> ColorDepth {
        self.depth
    }

    pub fn set_depth(&mut self, depth: ColorDepth) {
        self.depth = depth;
    }

    /// The color as the terminal will show it at this depth.
    fn effective(&self, c: Color) -> Color {
        match (self.depth, c.kind()) {
            (ColorDepth::Mono, _) | (_, ColorKind::Default) => Color::DEFAULT,
            (ColorDepth::TrueColor, _) => c,
            (ColorDepth::Ansi16, ColorKind::Indexed(i)) => Color::indexed(color::index_to_16(i)),
            (ColorDepth::Ansi256, ColorKind::Indexed(_)) => c,
            (depth, ColorKind::Rgb(r, g, b)) => {
                let index = (self.palette)(r, g, b, depth);
                if depth == ColorDepth::Ansi16 {
                    Color::indexed(color::index_to_16(index))
                } else {
                    Color::indexed(index)
                }
            }
        }
    }

    /// SGR parameters selecting an already-downgraded color.
    fn push_color(params: &mut Vec<String>, c: Color, background: bool) {
        let base: u16 = if background { 40 } else { 30 };
        match c.kind() {
            ColorKind::Default => params.push((base + 9).to_string()),
            ColorKind::Indexed(i) if i < 8 => params.push((base + u16::from(i)).to_string()),
            ColorKind::Indexed(i) if i < 16 => {
                params.push((base + 60 + u16::from(i) - 8).to_string());
            }
            ColorKind::Indexed(i) => params.push(format!("{};5;{i}", base + 8)),
            ColorKind::Rgb(r, g, b) => params.push(format!("{};2;{r};{g};{b}", base + 8)),
        }
    }

    fn push_style_on(params: &mut Vec<String>, style: StyleFlags) {
        for (flag, codes) in FLAG_TABLE {
            if style.contains(flag) {
                params.push(codes.on.to_string());
            }
        }
    }

    /// Parameters for a full set after `SGR 0`.
    fn full_params(&self, style: StyleFlags, fg: Color, bg: Color) -> Vec<String> {
        let mut params = vec!["0".to_owned()];
        Self::push_style_on(&mut params, style);
        if !fg.is_default() {
            Self::push_color(&mut params, fg, false);
        }
        if !bg.is_default() {
            Self::push_color(&mut params, bg, true);
        }
        params
    }

    /// Parameters moving from one known state to another.
    fn delta_params(
        &self,
        from: (StyleFlags, Color, Color),
        to: (StyleFlags, Color, Color),
    ) -> Vec<String> {
        let mut params = Vec::new();
        let removed = from.0 - to.0;
        let mut added = to.0 - from.0;

        let mut offs: Vec<u8> = Vec::new();
        for (flag, codes) in FLAG_TABLE {
            if removed.contains(flag) && !offs.contains(&codes.off) {
                offs.push(codes.off);
            }
        }
        for off in &offs {
            params.push(off.to_string());
            // Shared off codes (22, 24) also clear the sibling.
            for (flag, codes) in FLAG_TABLE {
                if codes.off == *off && to.0.contains(flag) {
                    added |= flag;
                }
            }
        }
        Self::push_style_on(&mut params, added);

        if from.1 != to.1 {
            Self::push_color(&mut params, to.1, false);
        }
        if from.2 != to.2 {
            Self::push_color(&mut params, to.2, true);
        }
        params
    }

    fn sgr(params: &[String]) -> String {
        let mut out = String::with_capacity(2 + params.len() * 3);
        out.push_str("\x1b[");
        for (i, p) in params.iter().enumerate() {
            if i > 0 {
                out.push(';');
            }
            out.push_str(p);
        }
        out.push('m');
        out
    }
}

impl AttributeDiff for SgrDiff {
    fn diff(&self, current: Option<&TermAttr>, next: &TermAttr) -> Option<String> {
        let to = (next.sgr_style(), self.effective(next.fg), self.effective(next.bg));
        let mut out = String::new();

        match current {
            None => {
                let params = self.full_params(to.0, to.1, to.2);
                out.push_str(&Self::sgr(&params));
                let acs = if next.alt_charset() { &self.enter_acs } else { &self.exit_acs };
                if let Some(seq) = acs {
                    out.push_str(seq);
                }
            }
            Some(cur) => {
                let from = (cur.sgr_style(), self.effective(cur.fg), self.effective(cur.bg));
                if from != to {
                    let delta = self.delta_params(from, to);
                    let full = self.full_params(to.0, to.1, to.2);
                    let delta_len: usize = delta.iter().map(|p| p.len() + 1).sum();
                    let full_len: usize = full.iter().map(|p| p.len() + 1).sum();
                    let params = if full_len < delta_len { full } else { delta };
                    out.push_str(&Self::sgr(&params));
                }
                if cur.alt_charset() != next.alt_charset() {
                    let acs = if next.alt_charset() { &self.enter_acs } else { &self.exit_acs };
                    if let Some(seq) = acs {
                        out.push_str(seq);
                    }
                }
            }
        }

        if out.is_empty() { None } else { Some(out) }
    }
}

// ── Character output ─────────────────────────────────────────────────────

/// Appends the bytes for one cell's glyph. Must advance the terminal cursor
/// by exactly `cell.char_width()` columns.
pub type PutChar = fn(&CellFormat, &mut String);

/// UTF-8 output: base glyph and combining marks as-is.
pub fn put_utf8(cell: &CellFormat, out: &mut String) {
    for &c in cell.codepoints() {
        out.push(c);
    }
}

/// 7-bit output. Line drawing and blocks get ASCII look-alikes, anything
/// else outside ASCII becomes `?` (one per column).
pub fn put_ascii(cell: &CellFormat, out: &mut String) {
    let c = cell.base();
    let mapped = match c {
        ' '..='~' => c,
        '─' | '━' | '═' | '┄' | '┈' | '╌' => '-',
        '│' | '┃' | '║' | '┆' | '┊' | '╎' => '|',
        '┌' | '┐' | '└' | '┘' | '├' | '┤' | '┬' | '┴' | '┼' | '╔' | '╗' | '╚' | '╝' | '╠'
        | '╣' | '╦' | '╩' | '╬' | '╭' | '╮' | '╯' | '╰' => '+',
        '█' | '▓' | '▒' | '░' | '▀' | '▄' | '▌' | '▐' => '#',
        '►' | '▶' | '→' => '>',
        '◄' | '◀' | '←' => '<',
        '▲' | '↑' => '^',
        '▼' | '↓' => 'v',
        '·' | '•' => '*',
        _ => '?',
    };
    out.push(mapped);
    if cell.is_wide() {
        out.push(mapped);
    }
}
