#![forbid(unsafe_code)]

//! Cell types and invariants.
//!
//! A [`CellFormat`] is one character cell of a surface: up to five
//! codepoints (base glyph plus combining marks), a foreground and background
//! [`Color`], and a packed [`CellAttrs`] word.
//!
//! # Attribute word layout
//!
//! ```text
//! bits  0..16  StyleFlags      (bold, dim, ... pc_charset)
//! bits 16..20  CompositeFlags  (transparent, color_overlay,
//!                               inherit_background, fullwidth_padding)
//! bits 20..22  char_width      (0, 1 or 2)
//! bit  22      printed         (scratch: written to the terminal)
//! bit  23      no_changes      (scratch: identical to what is on screen)
//! ```
//!
//! Equality masks out the two scratch bits, so a cell compares equal to its
//! on-screen copy regardless of bookkeeping.

use vtcomp_core::color::Color;
use vtcomp_core::glyph;

/// Codepoint slots per cell.
pub const MAX_CODEPOINTS: usize = 5;

bitflags::bitflags! {
    /// Display attributes sent to the terminal.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StyleFlags: u16 {
        const BOLD             = 1 << 0;
        const DIM              = 1 << 1;
        const ITALIC           = 1 << 2;
        const UNDERLINE        = 1 << 3;
        const DOUBLE_UNDERLINE = 1 << 4;
        const BLINK            = 1 << 5;
        const REVERSE          = 1 << 6;
        const STANDOUT         = 1 << 7;
        const INVISIBLE        = 1 << 8;
        const PROTECTED        = 1 << 9;
        const CROSSED_OUT      = 1 << 10;
        /// Glyph is drawn from the alternate (line drawing) charset.
        const ALT_CHARSET      = 1 << 11;
        /// Glyph is drawn from the PC (CP437) charset.
        const PC_CHARSET       = 1 << 12;
    }
}

bitflags::bitflags! {
    /// How a cell combines with the layers beneath it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CompositeFlags: u8 {
        /// Show whatever is beneath unchanged.
        const TRANSPARENT        = 1 << 0;
        /// Tint the colors of whatever is beneath (drop shadows).
        const COLOR_OVERLAY      = 1 << 1;
        /// Keep own glyph and foreground, take the background from beneath.
        const INHERIT_BACKGROUND = 1 << 2;
        /// Right half of a double-width glyph.
        const FULLWIDTH_PADDING  = 1 << 3;
    }
}

const STYLE_MASK: u32 = 0x0000_FFFF;
const COMPOSITE_SHIFT: u32 = 16;
const COMPOSITE_MASK: u32 = 0x000F_0000;
const WIDTH_SHIFT: u32 = 20;
const WIDTH_MASK: u32 = 0x0030_0000;
const PRINTED: u32 = 1 << 22;
const NO_CHANGES: u32 = 1 << 23;
const SCRATCH_MASK: u32 = PRINTED | NO_CHANGES;

/// Packed attribute word (see the module docs for the layout).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(transparent)]
pub struct CellAttrs(u32);

impl CellAttrs {
    pub const NONE: Self = Self(0);

    #[inline]
    pub const fn from_style(style: StyleFlags) -> Self {
        Self(style.bits() as u32)
    }

    /// Raw word, scratch bits included.
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Word used for equality: scratch bits cleared.
    #[inline]
    pub const fn comparable(self) -> u32 {
        self.0 & !SCRATCH_MASK
    }

    #[inline]
    pub const fn style(self) -> StyleFlags {
        StyleFlags::from_bits_truncate((self.0 & STYLE_MASK) as u16)
    }

    #[inline]
    pub const fn with_style(self, style: StyleFlags) -> Self {
        Self((self.0 & !STYLE_MASK) | style.bits() as u32)
    }

    #[inline]
    pub const fn has_style(self, flag: StyleFlags) -> bool {
        self.style().contains(flag)
    }

    #[inline]
    pub const fn composite(self) -> CompositeFlags {
        CompositeFlags::from_bits_truncate(((self.0 & COMPOSITE_MASK) >> COMPOSITE_SHIFT) as u8)
    }

    #[inline]
    pub const fn with_composite(self, flags: CompositeFlags) -> Self {
        Self((self.0 & !COMPOSITE_MASK) | ((flags.bits() as u32) << COMPOSITE_SHIFT))
    }

    #[inline]
    pub const fn has_composite(self, flag: CompositeFlags) -> bool {
        self.composite().contains(flag)
    }

    #[inline]
    pub const fn char_width(self) -> u8 {
        ((self.0 & WIDTH_MASK) >> WIDTH_SHIFT) as u8
    }

    #[inline]
    pub const fn with_char_width(self, width: u8) -> Self {
        let width = if width > 2 { 2 } else { width };
        Self((self.0 & !WIDTH_MASK) | ((width as u32) << WIDTH_SHIFT))
    }

    #[inline]
    pub const fn is_printed(self) -> bool {
        self.0 & PRINTED != 0
    }

    #[inline]
    pub const fn with_printed(self, printed: bool) -> Self {
        if printed {
            Self(self.0 | PRINTED)
        } else {
            Self(self.0 & !PRINTED)
        }
    }

    #[inline]
    pub const fn no_changes(self) -> bool {
        self.0 & NO_CHANGES != 0
    }

    #[inline]
    pub const fn with_no_changes(self, unchanged: bool) -> Self {
        if unchanged {
            Self(self.0 | NO_CHANGES)
        } else {
            Self(self.0 & !NO_CHANGES)
        }
    }
}

/// Glyphs that shape an area rather than draw a character; a color overlay
/// turns them into a plain space.
#[inline]
pub const fn is_block_glyph(c: char) -> bool {
    matches!(
        c,
        '\u{2580}' | '\u{2584}' | '\u{2588}' | '\u{258C}' | '\u{2590}' | '\u{2592}'
    )
}

/// One character cell.
#[derive(Debug, Clone, Copy)]
pub struct CellFormat {
    /// Base glyph followed by combining marks; unused slots are `'\0'`.
    pub ch: [char; MAX_CODEPOINTS],
    pub fg: Color,
    pub bg: Color,
    pub attrs: CellAttrs,
}

impl PartialEq for CellFormat {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        (self.attrs.comparable() == other.attrs.comparable())
            & (self.fg == other.fg)
            & (self.bg == other.bg)
            & (self.ch == other.ch)
    }
}

impl Eq for CellFormat {}

impl Default for CellFormat {
    fn default() -> Self {
        Self::BLANK
    }
}

impl CellFormat {
    /// Single-width space in default colors.
    pub const BLANK: Self = Self {
        ch: [' ', '\0', '\0', '\0', '\0'],
        fg: Color::DEFAULT,
        bg: Color::DEFAULT,
        attrs: CellAttrs::NONE.with_char_width(1),
    };

    /// A cell showing whatever is beneath it.
    pub const TRANSPARENT: Self = Self {
        ch: [' ', '\0', '\0', '\0', '\0'],
        fg: Color::DEFAULT,
        bg: Color::DEFAULT,
        attrs: CellAttrs::NONE
            .with_char_width(1)
            .with_composite(CompositeFlags::TRANSPARENT),
    };

    /// Measured cell for a single character.
    pub fn from_char(c: char) -> Self {
        Self {
            ch: [c, '\0', '\0', '\0', '\0'],
            ..Self::BLANK
        }
        .measured()
    }

    /// Measured cell for a base glyph and its combining marks. Extra marks
    /// beyond the slot count are dropped.
    pub fn from_codepoints(codepoints: &[char]) -> Self {
        let mut ch = ['\0'; MAX_CODEPOINTS];
        for (slot, &c) in ch.iter_mut().zip(codepoints) {
            *slot = c;
        }
        Self { ch, ..Self::BLANK }.measured()
    }

    /// Fix `char_width` from the glyph's display width.
    #[must_use]
    pub fn measured(mut self) -> Self {
        self.attrs = self.attrs.with_char_width(glyph::cell_width(&self.ch));
        self
    }

    #[inline]
    #[must_use]
    pub const fn with_fg(mut self, fg: Color) -> Self {
        self.fg = fg;
        self
    }

    #[inline]
    #[must_use]
    pub const fn with_bg(mut self, bg: Color) -> Self {
        self.bg = bg;
        self
    }

    #[inline]
    #[must_use]
    pub const fn with_style(mut self, style: StyleFlags) -> Self {
        self.attrs = self.attrs.with_style(style);
        self
    }

    #[inline]
    #[must_use]
    pub const fn with_composite(mut self, flags: CompositeFlags) -> Self {
        self.attrs = self.attrs.with_composite(flags);
        self
    }

    #[inline]
    pub const fn base(&self) -> char {
        self.ch[0]
    }

    /// Used codepoints (up to the first empty slot).
    pub fn codepoints(&self) -> &[char] {
        let used = self
            .ch
            .iter()
            .position(|&c| c == '\0')
            .unwrap_or(MAX_CODEPOINTS);
        &self.ch[..used]
    }

    #[inline]
    pub const fn char_width(&self) -> u8 {
        self.attrs.char_width()
    }

    #[inline]
    pub const fn is_wide(&self) -> bool {
        self.attrs.char_width() == 2
    }

    #[inline]
    pub const fn is_padding(&self) -> bool {
        self.attrs.has_composite(CompositeFlags::FULLWIDTH_PADDING)
    }

    #[inline]
    pub const fn is_transparent(&self) -> bool {
        self.attrs.has_composite(CompositeFlags::TRANSPARENT)
    }

    #[inline]
    pub const fn is_color_overlay(&self) -> bool {
        self.attrs.has_composite(CompositeFlags::COLOR_OVERLAY)
    }

    #[inline]
    pub const fn inherits_background(&self) -> bool {
        self.attrs.has_composite(CompositeFlags::INHERIT_BACKGROUND)
    }

    /// True when the cell would hide what is beneath it.
    #[inline]
    pub const fn is_opaque(&self) -> bool {
        !self.is_transparent() && !self.is_color_overlay()
    }

    /// True when resolving the cell needs the layers beneath it.
    #[inline]
    pub const fn reads_beneath(&self) -> bool {
        self.attrs.composite().intersects(
            CompositeFlags::TRANSPARENT
                .union(CompositeFlags::COLOR_OVERLAY)
                .union(CompositeFlags::INHERIT_BACKGROUND),
        )
    }

    /// A single space with no combining marks.
    #[inline]
    pub fn is_space(&self) -> bool {
        self.ch[0] == ' ' && self.ch[1] == '\0'
    }

    /// A single 7-bit printable character.
    #[inline]
    pub fn is_seven_bit(&self) -> bool {
        self.ch[1] == '\0' && (' '..='~').contains(&self.ch[0])
    }

    /// Companion placeholder written after a double-width glyph.
    #[must_use]
    pub const fn padding(&self) -> Self {
        Self {
            ch: [' ', '\0', '\0', '\0', '\0'],
            fg: self.fg,
            bg: self.bg,
            attrs: self
                .attrs
                .with_char_width(0)
                .with_composite(CompositeFlags::FULLWIDTH_PADDING)
                .with_printed(false)
                .with_no_changes(false),
        }
    }

    /// Reverse/standout removed: a tint must not swap the colors it sets.
    #[must_use]
    pub const fn without_highlight(mut self) -> Self {
        let style = self
            .attrs
            .style()
            .difference(StyleFlags::REVERSE.union(StyleFlags::STANDOUT));
        self.attrs = self.attrs.with_style(style);
        self
    }

    /// This glyph re-colored by an overlay cell.
    ///
    /// Block glyphs become a space so the tint alone defines the area.
    #[must_use]
    pub fn tinted_by(mut self, overlay: &CellFormat) -> Self {
        self.fg = overlay.fg;
        self.bg = overlay.bg;
        if is_block_glyph(self.ch[0]) {
            self.ch = [' ', '\0', '\0', '\0', '\0'];
        }
        self.without_highlight()
    }

    /// Same glyph and style with scratch bits and composite flags removed,
    /// as stored in the root surface.
    #[must_use]
    pub const fn resolved(mut self) -> Self {
        let keep = self
            .attrs
            .composite()
            .intersection(CompositeFlags::FULLWIDTH_PADDING);
        self.attrs = self
            .attrs
            .with_composite(keep)
            .with_printed(false)
            .with_no_changes(false);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_fields_do_not_overlap() {
        let attrs = CellAttrs::from_style(StyleFlags::all())
            .with_composite(CompositeFlags::all())
            .with_char_width(2)
            .with_printed(true)
            .with_no_changes(true);
        assert_eq!(attrs.style(), StyleFlags::all());
        assert_eq!(attrs.composite(), CompositeFlags::all());
        assert_eq!(attrs.char_width(), 2);
        assert!(attrs.is_printed());
        assert!(attrs.no_changes());

        let cleared = attrs.with_style(StyleFlags::empty()).with_printed(false);
        assert_eq!(cleared.composite(), CompositeFlags::all());
        assert_eq!(cleared.char_width(), 2);
        assert!(!cleared.is_printed());
        assert!(cleared.no_changes());
    }

    #[test]
    fn char_width_saturates_at_two() {
        assert_eq!(CellAttrs::NONE.with_char_width(7).char_width(), 2);
    }

    #[test]
    fn equality_ignores_scratch_bits() {
        let a = CellFormat::from_char('x');
        let mut b = a;
        b.attrs = b.attrs.with_printed(true).with_no_changes(true);
        assert_eq!(a, b);
        assert_ne!(a.attrs, b.attrs);
        assert_ne!(a, a.with_style(StyleFlags::BOLD));
        assert_ne!(a, a.with_fg(Color::RED));
    }

    #[test]
    fn measured_widths() {
        assert_eq!(CellFormat::from_char('a').char_width(), 1);
        assert_eq!(CellFormat::from_char('中').char_width(), 2);
        assert_eq!(CellFormat::from_codepoints(&['e', '\u{0301}']).char_width(), 1);
        assert_eq!(CellFormat::from_codepoints(&['e', '\u{0301}']).codepoints().len(), 2);
        assert_eq!(CellFormat::BLANK.char_width(), 1);
    }

    #[test]
    fn extra_combining_marks_are_dropped() {
        let marks = ['a', '\u{0300}', '\u{0301}', '\u{0302}', '\u{0303}', '\u{0304}'];
        let cell = CellFormat::from_codepoints(&marks);
        assert_eq!(cell.codepoints(), &marks[..MAX_CODEPOINTS]);
    }

    #[test]
    fn padding_keeps_colors_and_marks_itself() {
        let wide = CellFormat::from_char('中').with_bg(Color::BLUE);
        let pad = wide.padding();
        assert!(pad.is_padding());
        assert_eq!(pad.char_width(), 0);
        assert_eq!(pad.bg, Color::BLUE);
        assert!(pad.is_space());
    }

    #[test]
    fn tint_changes_colors_and_blocks_only() {
        let overlay = CellFormat::TRANSPARENT
            .with_composite(CompositeFlags::COLOR_OVERLAY)
            .with_fg(Color::DARK_GRAY)
            .with_bg(Color::BLACK);
        let glyph = CellFormat::from_char('x').with_style(StyleFlags::REVERSE | StyleFlags::BOLD);
        let tinted = glyph.tinted_by(&overlay);
        assert_eq!(tinted.base(), 'x');
        assert_eq!(tinted.fg, Color::DARK_GRAY);
        assert_eq!(tinted.bg, Color::BLACK);
        assert_eq!(tinted.attrs.style(), StyleFlags::BOLD);

        let block = CellFormat::from_char('█').tinted_by(&overlay);
        assert_eq!(block.base(), ' ');
    }

    #[test]
    fn block_glyph_set() {
        for c in ['▀', '▄', '▌', '▐', '▒', '█'] {
            assert!(is_block_glyph(c), "{c}");
        }
        assert!(!is_block_glyph('░'));
        assert!(!is_block_glyph('x'));
    }

    #[test]
    fn resolved_drops_compositing_flags() {
        let cell = CellFormat::from_char('x')
            .with_composite(CompositeFlags::INHERIT_BACKGROUND | CompositeFlags::FULLWIDTH_PADDING);
        let resolved = cell.resolved();
        assert!(!resolved.inherits_background());
        assert!(resolved.is_padding());
    }

    #[test]
    fn opacity_and_seven_bit() {
        assert!(CellFormat::BLANK.is_opaque());
        assert!(!CellFormat::TRANSPARENT.is_opaque());
        assert!(CellFormat::from_char('a').is_seven_bit());
        assert!(!CellFormat::from_char('é').is_seven_bit());
        assert!(!CellFormat::from_codepoints(&['a', '\u{0301}']).is_seven_bit());
    }
}
