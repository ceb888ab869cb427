#![forbid(unsafe_code)]

//! Cell colors and palette approximation.
//!
//! [`Color`] packs the three color forms a terminal understands into one
//! `u32` so that cells stay `Copy` and compare with a single integer compare:
//!
//! | Tag (bits 24..32) | Payload | Meaning |
//! |-------------------|---------|---------|
//! | `0` | unused | terminal default color |
//! | `1` | bits 0..8 | palette index (0-255) |
//! | `2` | `0xRRGGBB` | true color |
//!
//! When the active [`ColorDepth`] cannot express a true-color value, the
//! presenter asks a palette function (by default [`approximate`]) for the
//! nearest index.

const TAG_SHIFT: u32 = 24;
const TAG_DEFAULT: u32 = 0;
const TAG_INDEXED: u32 = 1;
const TAG_RGB: u32 = 2;

/// A packed cell color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Color(u32);

/// Unpacked view of a [`Color`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorKind {
    Default,
    Indexed(u8),
    Rgb(u8, u8, u8),
}

impl Color {
    /// The terminal's default foreground/background.
    pub const DEFAULT: Color = Color(TAG_DEFAULT << TAG_SHIFT);
    pub const BLACK: Color = Color::indexed(0);
    pub const RED: Color = Color::indexed(1);
    pub const GREEN: Color = Color::indexed(2);
    pub const YELLOW: Color = Color::indexed(3);
    pub const BLUE: Color = Color::indexed(4);
    pub const MAGENTA: Color = Color::indexed(5);
    pub const CYAN: Color = Color::indexed(6);
    pub const LIGHT_GRAY: Color = Color::indexed(7);
    pub const DARK_GRAY: Color = Color::indexed(8);
    pub const WHITE: Color = Color::indexed(15);

    /// Palette color.
    #[inline]
    pub const fn indexed(index: u8) -> Self {
        Self((TAG_INDEXED << TAG_SHIFT) | index as u32)
    }

    /// True color.
    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self((TAG_RGB << TAG_SHIFT) | ((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    #[inline]
    pub const fn kind(self) -> ColorKind {
        match self.0 >> TAG_SHIFT {
            TAG_INDEXED => ColorKind::Indexed((self.0 & 0xFF) as u8),
            TAG_RGB => ColorKind::Rgb(
                ((self.0 >> 16) & 0xFF) as u8,
                ((self.0 >> 8) & 0xFF) as u8,
                (self.0 & 0xFF) as u8,
            ),
            _ => ColorKind::Default,
        }
    }

    #[inline]
    pub const fn is_default(self) -> bool {
        self.0 >> TAG_SHIFT == TAG_DEFAULT
    }

    /// Raw packed representation.
    #[inline]
    pub const fn to_bits(self) -> u32 {
        self.0
    }
}

/// How many colors the terminal can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ColorDepth {
    /// No color support; only the default pair.
    Mono,
    /// The 16 ANSI colors.
    Ansi16,
    /// xterm 256-color palette.
    #[default]
    Ansi256,
    /// 24-bit color.
    TrueColor,
}

impl ColorDepth {
    /// Number of palette entries addressable at this depth.
    pub const fn palette_size(self) -> u16 {
        match self {
            Self::Mono => 0,
            Self::Ansi16 => 16,
            Self::Ansi256 | Self::TrueColor => 256,
        }
    }

    /// Parse `mono`, `16`, `256` or `truecolor`/`24bit`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mono" | "none" | "0" | "2" => Some(Self::Mono),
            "16" | "ansi" => Some(Self::Ansi16),
            "256" => Some(Self::Ansi256),
            "truecolor" | "24bit" | "rgb" => Some(Self::TrueColor),
            _ => None,
        }
    }
}

/// RGB → palette index mapping used when a true color cannot be sent as-is.
pub type PaletteFn = fn(u8, u8, u8, ColorDepth) -> u8;

/// RGB values of the 16 ANSI colors (xterm defaults).
pub const ANSI16_RGB: [(u8, u8, u8); 16] = [
    (0, 0, 0),
    (205, 0, 0),
    (0, 205, 0),
    (205, 205, 0),
    (0, 0, 238),
    (205, 0, 205),
    (0, 205, 205),
    (229, 229, 229),
    (127, 127, 127),
    (255, 0, 0),
    (0, 255, 0),
    (255, 255, 0),
    (92, 92, 255),
    (255, 0, 255),
    (0, 255, 255),
    (255, 255, 255),
];

const CUBE_LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];

/// RGB value of an xterm 256-palette entry.
pub const fn palette_rgb(index: u8) -> (u8, u8, u8) {
    match index {
        0..=15 => ANSI16_RGB[index as usize],
        16..=231 => {
            let i = index - 16;
            (
                CUBE_LEVELS[(i / 36) as usize],
                CUBE_LEVELS[((i / 6) % 6) as usize],
                CUBE_LEVELS[(i % 6) as usize],
            )
        }
        _ => {
            let gray = 8 + (index - 232) * 10;
            (gray, gray, gray)
        }
    }
}

#[inline]
fn distance_sq(a: (u8, u8, u8), b: (u8, u8, u8)) -> u32 {
    let dr = a.0 as i32 - b.0 as i32;
    let dg = a.1 as i32 - b.1 as i32;
    let db = a.2 as i32 - b.2 as i32;
    (dr * dr + dg * dg + db * db) as u32
}

#[inline]
fn cube_level(v: u8) -> u8 {
    match v {
        0..=47 => 0,
        48..=114 => 1,
        _ => (v - 35) / 40,
    }
}

/// Nearest of the 16 ANSI colors.
pub fn rgb_to_16(r: u8, g: u8, b: u8) -> u8 {
    let mut best = 0u8;
    let mut best_dist = u32::MAX;
    for (idx, &rgb) in ANSI16_RGB.iter().enumerate() {
        let d = distance_sq((r, g, b), rgb);
        if d < best_dist {
            best_dist = d;
            best = idx as u8;
        }
    }
    best
}

/// Nearest xterm 256-palette entry from the color cube or grayscale ramp.
pub fn rgb_to_256(r: u8, g: u8, b: u8) -> u8 {
    let (cr, cg, cb) = (cube_level(r), cube_level(g), cube_level(b));
    let cube_index = 16 + 36 * cr + 6 * cg + cb;
    let cube_rgb = palette_rgb(cube_index);

    let avg = (r as u16 + g as u16 + b as u16) / 3;
    let gray_step = if avg > 238 {
        23
    } else {
        (avg.saturating_sub(3) / 10) as u8
    };
    let gray_index = 232 + gray_step;
    let gray_rgb = palette_rgb(gray_index);

    if distance_sq((r, g, b), gray_rgb) < distance_sq((r, g, b), cube_rgb) {
        gray_index
    } else {
        cube_index
    }
}

/// Default palette function: picks the approximation matching `depth`.
///
/// At `Mono` every color maps to 0; callers normally emit no color at all
/// at that depth.
pub fn approximate(r: u8, g: u8, b: u8, depth: ColorDepth) -> u8 {
    match depth {
        ColorDepth::Mono => 0,
        ColorDepth::Ansi16 => rgb_to_16(r, g, b),
        ColorDepth::Ansi256 | ColorDepth::TrueColor => rgb_to_256(r, g, b),
    }
}

/// Reduce a 256-palette index to the 16-color range.
pub fn index_to_16(index: u8) -> u8 {
    if index < 16 {
        return index;
    }
    let (r, g, b) = palette_rgb(index);
    rgb_to_16(r, g, b)
}
