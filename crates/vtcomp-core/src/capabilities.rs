#![forbid(unsafe_code)]

//! Terminal capability cost table.
//!
//! The compositor never guesses what a terminal can do. It reads pre-resolved
//! capability strings from a [`CapabilityTable`] and compares their costs:
//!
//! - **duration**: abstract emission time. Each byte costs one
//!   *character duration* (derived from the baud rate); `$<n>` padding adds
//!   `10 * n` (`*` multiplies by the number of affected lines).
//! - **length**: the duration expressed in character-equivalents,
//!   `ceil(duration / char_duration)`.
//!
//! A missing capability, or a template whose parameters cannot be
//! evaluated, costs [`LONG_DURATION`]. Comparisons then pick an available
//! alternative on their own; nothing here ever errors.
//!
//! # Predefined Profiles
//!
//! | Profile | Description |
//! |---------|-------------|
//! | `xterm()` | xterm, 16 colors, `rep`/`ech`, auto-margin toggles |
//! | `xterm_256color()` | xterm with the 256-color palette |
//! | `vt100()` | VT100 with padding delays, no erase/repeat |
//! | `linux_console()` | Linux console, insert-character but no margin toggles |
//! | `ansi_minimal()` | bare ANSI addressing, wraps without the newline glitch |
//! | `dumb()` | carriage return and line feed only |
//!
//! ## Builder
//!
//! ```
//! use vtcomp_core::capabilities::{Cap, CapabilityTableBuilder, TerminalProfile};
//!
//! let table = CapabilityTableBuilder::from_profile(TerminalProfile::Xterm)
//!     .baud_rate(9600)
//!     .cap(Cap::RepeatChar, None)
//!     .build();
//! assert!(!table.is_available(Cap::RepeatChar));
//! ```

use std::borrow::Cow;

use bitflags::bitflags;

use crate::color::ColorDepth;
use crate::tparm;

/// Cost of an unavailable capability ("infinite").
pub const LONG_DURATION: u32 = u32::MAX;

/// Baud rate assumed when none is configured.
pub const DEFAULT_BAUD_RATE: u32 = 38_400;

/// Bits per transmitted byte (7 data + parity + stop).
const BAUD_BYTE_BITS: u32 = 9;

/// Named capabilities the compositor consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Cap {
    CursorAddress,
    CursorHome,
    CursorToLastLine,
    CarriageReturn,
    Tab,
    BackTab,
    CursorUp,
    CursorDown,
    CursorLeft,
    CursorRight,
    ParmUpCursor,
    ParmDownCursor,
    ParmLeftCursor,
    ParmRightCursor,
    RowAddress,
    ColumnAddress,
    ClrBol,
    ClrEol,
    EraseChars,
    RepeatChar,
    EnterAmMode,
    ExitAmMode,
    ParmInsertChar,
    InsertCharacter,
    EnterInsertMode,
    ExitInsertMode,
    InsertPadding,
    SaveCursor,
    RestoreCursor,
    EnterCaMode,
    ExitCaMode,
    CursorVisible,
    CursorInvisible,
    EnterAltCharsetMode,
    ExitAltCharsetMode,
}

impl Cap {
    /// Number of named capabilities.
    pub const COUNT: usize = 35;

    /// Every capability, in declaration order.
    pub const ALL: [Cap; Cap::COUNT] = [
        Cap::CursorAddress,
        Cap::CursorHome,
        Cap::CursorToLastLine,
        Cap::CarriageReturn,
        Cap::Tab,
        Cap::BackTab,
        Cap::CursorUp,
        Cap::CursorDown,
        Cap::CursorLeft,
        Cap::CursorRight,
        Cap::ParmUpCursor,
        Cap::ParmDownCursor,
        Cap::ParmLeftCursor,
        Cap::ParmRightCursor,
        Cap::RowAddress,
        Cap::ColumnAddress,
        Cap::ClrBol,
        Cap::ClrEol,
        Cap::EraseChars,
        Cap::RepeatChar,
        Cap::EnterAmMode,
        Cap::ExitAmMode,
        Cap::ParmInsertChar,
        Cap::InsertCharacter,
        Cap::EnterInsertMode,
        Cap::ExitInsertMode,
        Cap::InsertPadding,
        Cap::SaveCursor,
        Cap::RestoreCursor,
        Cap::EnterCaMode,
        Cap::ExitCaMode,
        Cap::CursorVisible,
        Cap::CursorInvisible,
        Cap::EnterAltCharsetMode,
        Cap::ExitAltCharsetMode,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The terminfo name of this capability.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Cap::CursorAddress => "cup",
            Cap::CursorHome => "home",
            Cap::CursorToLastLine => "ll",
            Cap::CarriageReturn => "cr",
            Cap::Tab => "ht",
            Cap::BackTab => "cbt",
            Cap::CursorUp => "cuu1",
            Cap::CursorDown => "cud1",
            Cap::CursorLeft => "cub1",
            Cap::CursorRight => "cuf1",
            Cap::ParmUpCursor => "cuu",
            Cap::ParmDownCursor => "cud",
            Cap::ParmLeftCursor => "cub",
            Cap::ParmRightCursor => "cuf",
            Cap::RowAddress => "vpa",
            Cap::ColumnAddress => "hpa",
            Cap::ClrBol => "el1",
            Cap::ClrEol => "el",
            Cap::EraseChars => "ech",
            Cap::RepeatChar => "rep",
            Cap::EnterAmMode => "smam",
            Cap::ExitAmMode => "rmam",
            Cap::ParmInsertChar => "ich",
            Cap::InsertCharacter => "ich1",
            Cap::EnterInsertMode => "smir",
            Cap::ExitInsertMode => "rmir",
            Cap::InsertPadding => "ip",
            Cap::SaveCursor => "sc",
            Cap::RestoreCursor => "rc",
            Cap::EnterCaMode => "smcup",
            Cap::ExitCaMode => "rmcup",
            Cap::CursorVisible => "cnorm",
            Cap::CursorInvisible => "civis",
            Cap::EnterAltCharsetMode => "smacs",
            Cap::ExitAltCharsetMode => "rmacs",
        }
    }

    /// Look a capability up by terminfo name.
    pub fn from_name(name: &str) -> Option<Cap> {
        Cap::ALL.into_iter().find(|cap| cap.name() == name)
    }

    /// Parameters used to price a parametrized capability.
    const fn sample_params(self) -> &'static [i32] {
        match self {
            Cap::CursorAddress => &[23, 23],
            Cap::RepeatChar => &[' ' as i32, 23],
            Cap::ParmUpCursor
            | Cap::ParmDownCursor
            | Cap::ParmLeftCursor
            | Cap::ParmRightCursor
            | Cap::RowAddress
            | Cap::ColumnAddress
            | Cap::EraseChars => &[23],
            Cap::ParmInsertChar => &[1],
            _ => &[],
        }
    }
}

bitflags! {
    /// Terminal quirks that change how output must be produced.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TermFlags: u8 {
        /// `bw`: cursor-left from column 0 wraps to the previous line's end.
        const AUTO_LEFT_MARGIN       = 0b0000_0001;
        /// `am`: printing in the last column wraps to the next line.
        const AUTO_RIGHT_MARGIN      = 0b0000_0010;
        /// `xenl`: a newline right after a wrap is ignored (pending wrap).
        const EAT_NEWLINE_GLITCH     = 0b0000_0100;
        /// `bce`: erase operations fill with the current background color.
        const BACKGROUND_COLOR_ERASE = 0b0000_1000;
    }
}

/// Known capability profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalProfile {
    Xterm,
    Xterm256Color,
    Vt100,
    LinuxConsole,
    AnsiMinimal,
    Dumb,
    /// Built by hand.
    Custom,
}

impl TerminalProfile {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Xterm => "xterm",
            Self::Xterm256Color => "xterm-256color",
            Self::Vt100 => "vt100",
            Self::LinuxConsole => "linux",
            Self::AnsiMinimal => "ansi",
            Self::Dumb => "dumb",
            Self::Custom => "custom",
        }
    }
}

impl std::str::FromStr for TerminalProfile {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "xterm" => Ok(Self::Xterm),
            "xterm-256color" | "xterm256color" | "xterm-256" => Ok(Self::Xterm256Color),
            "vt100" | "vt102" => Ok(Self::Vt100),
            "linux" | "linux-console" => Ok(Self::LinuxConsole),
            "ansi" | "ansi-minimal" => Ok(Self::AnsiMinimal),
            "dumb" => Ok(Self::Dumb),
            "custom" => Ok(Self::Custom),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for TerminalProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One capability string with its precomputed costs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    template: Option<String>,
    duration: u32,
    length: u32,
}

impl Default for Capability {
    fn default() -> Self {
        Self::absent()
    }
}

impl Capability {
    /// A capability the terminal does not have.
    pub const fn absent() -> Self {
        Self {
            template: None,
            duration: LONG_DURATION,
            length: LONG_DURATION,
        }
    }

    /// The raw template, possibly containing parameters and padding.
    #[inline]
    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    #[inline]
    pub const fn duration(&self) -> u32 {
        self.duration
    }

    #[inline]
    pub const fn length(&self) -> u32 {
        self.length
    }

    #[inline]
    pub const fn is_available(&self) -> bool {
        self.duration != LONG_DURATION
    }
}

/// Capability strings, their costs, and the terminal quirks that go with them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityTable {
    profile: TerminalProfile,
    caps: Vec<Capability>,
    baud_rate: u32,
    char_duration: u32,
    flags: TermFlags,
    tabstop: u16,
    color_depth: ColorDepth,
}

impl Default for CapabilityTable {
    fn default() -> Self {
        Self::xterm_256color()
    }
}

/// Character duration for a baud rate; 0 means "unknown line speed".
fn char_duration_for(baud: u32) -> u32 {
    if baud == 0 {
        return 1;
    }
    (BAUD_BYTE_BITS * 10_000 / baud).max(1)
}

/// Parse the body of a `$<...>` marker into tenths.
fn padding_tenths(body: &[u8], affected_lines: u32) -> u64 {
    let mut tenths: u64 = 0;
    let mut in_fraction = false;
    let mut fraction_done = false;
    for &b in body {
        match b {
            b'0'..=b'9' if !in_fraction => {
                tenths = tenths.saturating_mul(10) + u64::from(b - b'0') * 10;
            }
            // Only one fractional digit is significant.
            b'0'..=b'9' if !fraction_done => {
                tenths += u64::from(b - b'0');
                fraction_done = true;
            }
            b'.' => in_fraction = true,
            b'*' => tenths = tenths.saturating_mul(u64::from(affected_lines)),
            _ => {}
        }
    }
    tenths
}

impl CapabilityTable {
    /// A table with no capabilities at all.
    #[must_use]
    pub fn empty(profile: TerminalProfile) -> Self {
        Self {
            profile,
            caps: vec![Capability::absent(); Cap::COUNT],
            baud_rate: DEFAULT_BAUD_RATE,
            char_duration: char_duration_for(DEFAULT_BAUD_RATE),
            flags: TermFlags::empty(),
            tabstop: 8,
            color_depth: ColorDepth::Mono,
        }
    }

    fn with_caps(
        profile: TerminalProfile,
        flags: TermFlags,
        color_depth: ColorDepth,
        caps: &[(Cap, &str)],
    ) -> Self {
        let mut table = Self::empty(profile);
        table.flags = flags;
        table.color_depth = color_depth;
        for &(cap, template) in caps {
            table.set(cap, Some(template));
        }
        table
    }

    // ── Predefined Profiles ────────────────────────────────────────────

    /// xterm with 16 colors.
    #[must_use]
    pub fn xterm() -> Self {
        Self::with_caps(
            TerminalProfile::Xterm,
            TermFlags::AUTO_RIGHT_MARGIN
                | TermFlags::EAT_NEWLINE_GLITCH
                | TermFlags::BACKGROUND_COLOR_ERASE,
            ColorDepth::Ansi16,
            XTERM_CAPS,
        )
    }

    /// xterm with the 256-color palette.
    #[must_use]
    pub fn xterm_256color() -> Self {
        let mut table = Self::xterm();
        table.profile = TerminalProfile::Xterm256Color;
        table.color_depth = ColorDepth::Ansi256;
        table
    }

    /// DEC VT100: padded sequences, no erase-chars or repeat.
    #[must_use]
    pub fn vt100() -> Self {
        Self::with_caps(
            TerminalProfile::Vt100,
            TermFlags::AUTO_RIGHT_MARGIN | TermFlags::EAT_NEWLINE_GLITCH,
            ColorDepth::Mono,
            VT100_CAPS,
        )
    }

    /// Linux virtual console.
    #[must_use]
    pub fn linux_console() -> Self {
        Self::with_caps(
            TerminalProfile::LinuxConsole,
            TermFlags::AUTO_RIGHT_MARGIN
                | TermFlags::EAT_NEWLINE_GLITCH
                | TermFlags::BACKGROUND_COLOR_ERASE,
            ColorDepth::Ansi16,
            LINUX_CAPS,
        )
    }

    /// Plain ANSI addressing on a terminal that wraps immediately.
    #[must_use]
    pub fn ansi_minimal() -> Self {
        Self::with_caps(
            TerminalProfile::AnsiMinimal,
            TermFlags::AUTO_RIGHT_MARGIN,
            ColorDepth::Ansi16,
            ANSI_MINIMAL_CAPS,
        )
    }

    /// Carriage return and line feed only.
    #[must_use]
    pub fn dumb() -> Self {
        Self::with_caps(
            TerminalProfile::Dumb,
            TermFlags::AUTO_RIGHT_MARGIN,
            ColorDepth::Mono,
            &[(Cap::CarriageReturn, "\r"), (Cap::CursorDown, "\n")],
        )
    }

    /// Table for a named profile. `Custom` yields an empty table.
    #[must_use]
    pub fn from_profile(profile: TerminalProfile) -> Self {
        match profile {
            TerminalProfile::Xterm => Self::xterm(),
            TerminalProfile::Xterm256Color => Self::xterm_256color(),
            TerminalProfile::Vt100 => Self::vt100(),
            TerminalProfile::LinuxConsole => Self::linux_console(),
            TerminalProfile::AnsiMinimal => Self::ansi_minimal(),
            TerminalProfile::Dumb => Self::dumb(),
            TerminalProfile::Custom => Self::empty(TerminalProfile::Custom),
        }
    }

    // ── Accessors ──────────────────────────────────────────────────────

    #[must_use]
    pub const fn profile(&self) -> TerminalProfile {
        self.profile
    }

    #[inline]
    pub fn get(&self, cap: Cap) -> &Capability {
        &self.caps[cap.index()]
    }

    #[inline]
    pub fn is_available(&self, cap: Cap) -> bool {
        self.get(cap).is_available()
    }

    #[inline]
    pub fn duration(&self, cap: Cap) -> u32 {
        self.get(cap).duration
    }

    #[inline]
    pub fn length(&self, cap: Cap) -> u32 {
        self.get(cap).length
    }

    /// Bytes to emit for a parameterless capability, padding removed.
    pub fn sequence(&self, cap: Cap) -> Option<Cow<'_, str>> {
        let capability = self.get(cap);
        if !capability.is_available() {
            return None;
        }
        capability.template().map(tparm::strip_padding)
    }

    /// Bytes to emit for a parametrized capability, padding removed.
    pub fn format(&self, cap: Cap, params: &[i32]) -> Option<String> {
        let capability = self.get(cap);
        if !capability.is_available() {
            return None;
        }
        let expanded = tparm::expand(capability.template()?, params)?;
        Some(tparm::strip_padding(&expanded).into_owned())
    }

    /// Emission cost of `cap` instantiated with `params`, including padding.
    pub fn format_duration(&self, cap: Cap, params: &[i32]) -> u32 {
        let Some(template) = self.get(cap).template() else {
            return LONG_DURATION;
        };
        match tparm::expand(template, params) {
            Some(expanded) => self.cap_duration(&expanded, 1),
            None => LONG_DURATION,
        }
    }

    #[inline]
    pub const fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Duration of a single transmitted character.
    #[inline]
    pub const fn char_duration(&self) -> u32 {
        self.char_duration
    }

    #[inline]
    pub const fn flags(&self) -> TermFlags {
        self.flags
    }

    #[inline]
    pub const fn has_flag(&self, flag: TermFlags) -> bool {
        self.flags.contains(flag)
    }

    #[inline]
    pub const fn tabstop(&self) -> u16 {
        self.tabstop
    }

    #[inline]
    pub const fn color_depth(&self) -> ColorDepth {
        self.color_depth
    }

    // ── Mutation ───────────────────────────────────────────────────────

    /// Replace one capability and recompute its costs.
    pub fn set(&mut self, cap: Cap, template: Option<&str>) {
        self.caps[cap.index()] = self.build_capability(cap, template);
    }

    /// Change the line speed; every cost is recomputed.
    pub fn set_baud_rate(&mut self, baud: u32) {
        self.baud_rate = baud;
        self.char_duration = char_duration_for(baud);
        self.recompute();
    }

    pub fn set_flags(&mut self, flags: TermFlags) {
        self.flags = flags;
    }

    pub fn set_flag(&mut self, flag: TermFlags, enabled: bool) {
        self.flags.set(flag, enabled);
    }

    pub fn set_tabstop(&mut self, tabstop: u16) {
        self.tabstop = tabstop;
    }

    pub fn set_color_depth(&mut self, depth: ColorDepth) {
        self.color_depth = depth;
    }

    fn recompute(&mut self) {
        for cap in Cap::ALL {
            let template = self.caps[cap.index()].template.take();
            self.caps[cap.index()] = self.build_capability(cap, template.as_deref());
        }
    }

    fn build_capability(&self, cap: Cap, template: Option<&str>) -> Capability {
        let Some(template) = template.filter(|t| !t.is_empty()) else {
            return Capability::absent();
        };
        let duration = if tparm::is_parametrized(template) {
            match tparm::expand(template, cap.sample_params()) {
                Some(sample) => self.cap_duration(&sample, 1),
                None => LONG_DURATION,
            }
        } else {
            self.cap_duration(template, 1)
        };
        if duration == LONG_DURATION {
            return Capability {
                template: Some(template.to_owned()),
                duration,
                length: LONG_DURATION,
            };
        }
        Capability {
            template: Some(template.to_owned()),
            duration,
            length: self.duration_to_length(duration),
        }
    }

    /// Emission duration of an expanded sequence.
    ///
    /// `affected_lines` scales `*` padding.
    pub fn cap_duration(&self, seq: &str, affected_lines: u32) -> u32 {
        let bytes = seq.as_bytes();
        let mut total: u64 = 0;
        let mut pos = 0;
        for (start, end) in tparm::padding_markers(bytes) {
            total += (start - pos) as u64 * u64::from(self.char_duration);
            total += padding_tenths(&bytes[start + 2..end - 1], affected_lines);
            pos = end;
        }
        total += (bytes.len() - pos) as u64 * u64::from(self.char_duration);
        u32::try_from(total)
            .unwrap_or(LONG_DURATION - 1)
            .min(LONG_DURATION - 1)
    }

    /// Convert a duration into character-equivalents (rounded up).
    pub fn duration_to_length(&self, duration: u32) -> u32 {
        if duration == LONG_DURATION {
            return LONG_DURATION;
        }
        duration.div_ceil(self.char_duration)
    }
}

/// Chained construction of a [`CapabilityTable`].
#[derive(Debug, Clone)]
pub struct CapabilityTableBuilder {
    table: CapabilityTable,
}

impl CapabilityTableBuilder {
    /// Start from an empty custom table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: CapabilityTable::empty(TerminalProfile::Custom),
        }
    }

    /// Start from a predefined profile.
    #[must_use]
    pub fn from_profile(profile: TerminalProfile) -> Self {
        Self {
            table: CapabilityTable::from_profile(profile),
        }
    }

    #[must_use]
    pub fn cap(mut self, cap: Cap, template: Option<&str>) -> Self {
        self.table.set(cap, template);
        self
    }

    #[must_use]
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.table.set_baud_rate(baud);
        self
    }

    #[must_use]
    pub fn flag(mut self, flag: TermFlags, enabled: bool) -> Self {
        self.table.set_flag(flag, enabled);
        self
    }

    #[must_use]
    pub fn tabstop(mut self, tabstop: u16) -> Self {
        self.table.tabstop = tabstop;
        self
    }

    #[must_use]
    pub fn color_depth(mut self, depth: ColorDepth) -> Self {
        self.table.color_depth = depth;
        self
    }

    #[must_use]
    pub fn build(self) -> CapabilityTable {
        self.table
    }
}

impl Default for CapabilityTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

const XTERM_CAPS: &[(Cap, &str)] = &[
    (Cap::CursorAddress, "\x1b[%i%p1%d;%p2%dH"),
    (Cap::CursorHome, "\x1b[H"),
    (Cap::CarriageReturn, "\r"),
    (Cap::Tab, "\t"),
    (Cap::BackTab, "\x1b[Z"),
    (Cap::CursorUp, "\x1b[A"),
    (Cap::CursorDown, "\n"),
    (Cap::CursorLeft, "\x08"),
    (Cap::CursorRight, "\x1b[C"),
    (Cap::ParmUpCursor, "\x1b[%p1%dA"),
    (Cap::ParmDownCursor, "\x1b[%p1%dB"),
    (Cap::ParmLeftCursor, "\x1b[%p1%dD"),
    (Cap::ParmRightCursor, "\x1b[%p1%dC"),
    (Cap::RowAddress, "\x1b[%i%p1%dd"),
    (Cap::ColumnAddress, "\x1b[%i%p1%dG"),
    (Cap::ClrBol, "\x1b[1K"),
    (Cap::ClrEol, "\x1b[K"),
    (Cap::EraseChars, "\x1b[%p1%dX"),
    (Cap::RepeatChar, "%p1%c\x1b[%p2%{1}%-%db"),
    (Cap::EnterAmMode, "\x1b[?7h"),
    (Cap::ExitAmMode, "\x1b[?7l"),
    (Cap::ParmInsertChar, "\x1b[%p1%d@"),
    (Cap::EnterInsertMode, "\x1b[4h"),
    (Cap::ExitInsertMode, "\x1b[4l"),
    (Cap::SaveCursor, "\x1b7"),
    (Cap::RestoreCursor, "\x1b8"),
    (Cap::EnterCaMode, "\x1b[?1049h"),
    (Cap::ExitCaMode, "\x1b[?1049l"),
    (Cap::CursorVisible, "\x1b[?12l\x1b[?25h"),
    (Cap::CursorInvisible, "\x1b[?25l"),
    (Cap::EnterAltCharsetMode, "\x1b(0"),
    (Cap::ExitAltCharsetMode, "\x1b(B"),
];

const VT100_CAPS: &[(Cap, &str)] = &[
    (Cap::CursorAddress, "\x1b[%i%p1%d;%p2%dH$<5>"),
    (Cap::CursorHome, "\x1b[H"),
    (Cap::CarriageReturn, "\r"),
    (Cap::Tab, "\t"),
    (Cap::CursorUp, "\x1b[A$<2>"),
    (Cap::CursorDown, "\n"),
    (Cap::CursorLeft, "\x08"),
    (Cap::CursorRight, "\x1b[C$<2>"),
    (Cap::ParmUpCursor, "\x1b[%p1%dA"),
    (Cap::ParmDownCursor, "\x1b[%p1%dB"),
    (Cap::ParmLeftCursor, "\x1b[%p1%dD"),
    (Cap::ParmRightCursor, "\x1b[%p1%dC"),
    (Cap::ClrBol, "\x1b[1K$<3>"),
    (Cap::ClrEol, "\x1b[K$<3>"),
    (Cap::EnterAmMode, "\x1b[?7h"),
    (Cap::ExitAmMode, "\x1b[?7l"),
    (Cap::SaveCursor, "\x1b7"),
    (Cap::RestoreCursor, "\x1b8"),
    (Cap::EnterAltCharsetMode, "\x1b(0$<2>"),
    (Cap::ExitAltCharsetMode, "\x1b(B$<4>"),
];

const LINUX_CAPS: &[(Cap, &str)] = &[
    (Cap::CursorAddress, "\x1b[%i%p1%d;%p2%dH"),
    (Cap::CursorHome, "\x1b[H"),
    (Cap::CarriageReturn, "\r"),
    (Cap::Tab, "\t"),
    (Cap::CursorUp, "\x1b[A"),
    (Cap::CursorDown, "\n"),
    (Cap::CursorLeft, "\x08"),
    (Cap::CursorRight, "\x1b[C"),
    (Cap::ParmUpCursor, "\x1b[%p1%dA"),
    (Cap::ParmDownCursor, "\x1b[%p1%dB"),
    (Cap::ParmLeftCursor, "\x1b[%p1%dD"),
    (Cap::ParmRightCursor, "\x1b[%p1%dC"),
    (Cap::RowAddress, "\x1b[%i%p1%dd"),
    (Cap::ColumnAddress, "\x1b[%i%p1%dG"),
    (Cap::ClrBol, "\x1b[1K"),
    (Cap::ClrEol, "\x1b[K"),
    (Cap::EraseChars, "\x1b[%p1%dX"),
    (Cap::ParmInsertChar, "\x1b[%p1%d@"),
    (Cap::InsertCharacter, "\x1b[@"),
    (Cap::EnterInsertMode, "\x1b[4h"),
    (Cap::ExitInsertMode, "\x1b[4l"),
    (Cap::SaveCursor, "\x1b7"),
    (Cap::RestoreCursor, "\x1b8"),
    (Cap::CursorVisible, "\x1b[?25h\x1b[?0c"),
    (Cap::CursorInvisible, "\x1b[?25l\x1b[?1c"),
    (Cap::EnterAltCharsetMode, "\x0e"),
    (Cap::ExitAltCharsetMode, "\x0f"),
];

const ANSI_MINIMAL_CAPS: &[(Cap, &str)] = &[
    (Cap::CursorAddress, "\x1b[%i%p1%d;%p2%dH"),
    (Cap::CursorHome, "\x1b[H"),
    (Cap::CarriageReturn, "\r"),
    (Cap::CursorUp, "\x1b[A"),
    (Cap::CursorDown, "\n"),
    (Cap::CursorLeft, "\x08"),
    (Cap::CursorRight, "\x1b[C"),
    (Cap::ClrEol, "\x1b[K"),
];
