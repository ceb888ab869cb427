#![forbid(unsafe_code)]

//! Display width of glyphs.
//!
//! This is the default width collaborator used to fix a cell's `char_width`
//! (0, 1 or 2) before it participates in compositing. ASCII is handled
//! inline; everything else goes through `unicode-display-width`, with
//! explicit zero-width and emoji ranges so terminals that render emoji as
//! double-width line up with the model.

use unicode_display_width::{is_double_width, width as unicode_display_width};
use unicode_segmentation::UnicodeSegmentation;

/// True for combining marks and other codepoints that occupy no column.
#[inline]
pub fn is_zero_width(c: char) -> bool {
    let u = c as u32;
    matches!(u, 0x0000..=0x001F | 0x007F..=0x009F)
        || matches!(u, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF)
        || matches!(u, 0xFE20..=0xFE2F)
        || matches!(u, 0xFE00..=0xFE0F | 0xE0100..=0xE01EF)
        || matches!(
            u,
            0x00AD | 0x034F | 0x180E | 0x200B | 0x200C | 0x200D | 0x200E | 0x200F | 0x2060 | 0xFEFF
        )
        || matches!(u, 0x202A..=0x202E | 0x2066..=0x2069 | 0x206A..=0x206F)
}

#[inline]
fn is_probable_emoji(c: char) -> bool {
    let u = c as u32;
    matches!(
        u,
        0x1F000..=0x1FAFF | 0x2300..=0x23FF | 0x2600..=0x27BF | 0x2B00..=0x2BFF
    ) && u != 0x2764
}

/// Column width of a single character (0, 1 or 2).
#[inline]
pub fn char_width(ch: char) -> usize {
    if ch.is_ascii() {
        return match ch {
            ' '..='~' => 1,
            _ => 0,
        };
    }
    if is_zero_width(ch) {
        return 0;
    }
    if is_double_width(ch) || is_probable_emoji(ch) {
        return 2;
    }
    1
}

/// Column width of one grapheme cluster.
#[inline]
pub fn grapheme_width(grapheme: &str) -> usize {
    if grapheme.is_ascii() {
        return grapheme.bytes().filter(|b| (0x20..=0x7E).contains(b)).count();
    }
    if grapheme.chars().all(is_zero_width) {
        return 0;
    }
    if grapheme.chars().any(|c| c as u32 == 0xFE0F) || grapheme.chars().any(is_probable_emoji) {
        return 2;
    }
    (unicode_display_width(grapheme) as usize).min(2)
}

/// Width of a whole string in columns.
pub fn display_width(text: &str) -> usize {
    if text.bytes().all(|b| (0x20..=0x7E).contains(&b)) {
        return text.len();
    }
    text.graphemes(true).map(grapheme_width).sum()
}

/// Width of a cell's codepoint slots: base glyph plus combining marks.
///
/// Unused slots hold `'\0'` and are ignored. A cell whose base is `'\0'` or
/// a zero-width codepoint measures 0 (combining-only or blank-unmeasured).
pub fn cell_width(codepoints: &[char]) -> u8 {
    let Some(&base) = codepoints.first() else {
        return 0;
    };
    if base == '\0' {
        return 0;
    }
    let used = codepoints
        .iter()
        .position(|&c| c == '\0')
        .unwrap_or(codepoints.len());
    if used == 1 {
        return char_width(base) as u8;
    }
    let cluster: String = codepoints[..used].iter().collect();
    grapheme_width(&cluster).min(2) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_is_one_column() {
        assert_eq!(char_width('a'), 1);
        assert_eq!(char_width(' '), 1);
        assert_eq!(char_width('\x07'), 0);
        assert_eq!(display_width("hello"), 5);
    }

    #[test]
    fn cjk_is_two_columns() {
        assert_eq!(char_width('中'), 2);
        assert_eq!(cell_width(&['中', '\0', '\0', '\0', '\0']), 2);
        assert_eq!(display_width("中文"), 4);
    }

    #[test]
    fn combining_marks_do_not_add_width() {
        assert_eq!(char_width('\u{0301}'), 0);
        assert_eq!(cell_width(&['e', '\u{0301}', '\0', '\0', '\0']), 1);
        assert_eq!(cell_width(&['\u{0301}', '\0', '\0', '\0', '\0']), 0);
    }

    #[test]
    fn empty_and_null_cells_measure_zero() {
        assert_eq!(cell_width(&[]), 0);
        assert_eq!(cell_width(&['\0'; 5]), 0);
    }

    #[test]
    fn box_drawing_is_narrow() {
        assert_eq!(char_width('─'), 1);
        assert_eq!(char_width('█'), 1);
        assert_eq!(char_width('▒'), 1);
    }

    #[test]
    fn emoji_is_wide() {
        assert_eq!(char_width('😀'), 2);
        assert_eq!(grapheme_width("👍🏽"), 2);
    }
}
