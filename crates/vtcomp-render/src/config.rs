#![forbid(unsafe_code)]

//! Runtime knobs for the compositor.
//!
//! [`CompositorConfig::default`] carries the built-in values;
//! [`CompositorConfig::from_env`] overlays the `VTCOMP_*` environment
//! variables; [`CompositorConfig::global`] caches the latter for the whole
//! process.
//!
//! | Variable | Meaning | Example |
//! |----------|---------|---------|
//! | `VTCOMP_MIN_FLUSH_WAIT_US` | shortest adaptive flush wait | `16667` |
//! | `VTCOMP_MAX_FLUSH_WAIT_US` | longest adaptive flush wait | `200000` |
//! | `VTCOMP_OUTPUT_LIMIT` | pending bytes forcing a flush | `32768` |
//! | `VTCOMP_BAUD_RATE` | line speed for capability costs | `9600` |
//! | `VTCOMP_ENCODING` | `utf8` or `ascii` | `ascii` |
//! | `VTCOMP_COLOR_DEPTH` | `mono`, `16`, `256`, `truecolor` | `256` |

use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use vtcomp_core::capabilities::DEFAULT_BAUD_RATE;
use vtcomp_core::color::ColorDepth;

use crate::ansi::{PutChar, put_ascii, put_utf8};
use crate::cursor_motion::MOVE_LIMIT;
use crate::flush::{MAX_FLUSH_WAIT, MIN_FLUSH_WAIT, OUTPUT_BUFFER_LIMIT};

pub const ENV_MIN_FLUSH_WAIT: &str = "VTCOMP_MIN_FLUSH_WAIT_US";
pub const ENV_MAX_FLUSH_WAIT: &str = "VTCOMP_MAX_FLUSH_WAIT_US";
pub const ENV_OUTPUT_LIMIT: &str = "VTCOMP_OUTPUT_LIMIT";
pub const ENV_BAUD_RATE: &str = "VTCOMP_BAUD_RATE";
pub const ENV_ENCODING: &str = "VTCOMP_ENCODING";
pub const ENV_COLOR_DEPTH: &str = "VTCOMP_COLOR_DEPTH";

static GLOBAL: LazyLock<CompositorConfig> = LazyLock::new(CompositorConfig::from_env);

/// Character encoding of the terminal output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Ascii,
}

impl Encoding {
    /// The character writer for this encoding.
    pub fn put_char(self) -> PutChar {
        match self {
            Self::Utf8 => put_utf8,
            Self::Ascii => put_ascii,
        }
    }
}

impl FromStr for Encoding {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Self::Utf8),
            "ascii" | "us-ascii" => Ok(Self::Ascii),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositorConfig {
    pub min_flush_wait: Duration,
    pub max_flush_wait: Duration,
    /// Pending output bytes that trigger an eager flush.
    pub output_buffer_limit: usize,
    /// Manhattan distance above which a move inside the line body is
    /// addressed directly.
    pub move_limit: u16,
    pub baud_rate: u32,
    pub encoding: Encoding,
    pub color_depth: ColorDepth,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            min_flush_wait: MIN_FLUSH_WAIT,
            max_flush_wait: MAX_FLUSH_WAIT,
            output_buffer_limit: OUTPUT_BUFFER_LIMIT,
            move_limit: MOVE_LIMIT,
            baud_rate: DEFAULT_BAUD_RATE,
            encoding: Encoding::Utf8,
            color_depth: ColorDepth::default(),
        }
    }
}

impl CompositorConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Process-wide configuration, read from the environment once.
    pub fn global() -> &'static CompositorConfig {
        &GLOBAL
    }

    /// Defaults overlaid with whatever `lookup` returns. Values that do not
    /// parse are ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(us) = parse_var::<u64, _>(&lookup, ENV_MIN_FLUSH_WAIT) {
            config.min_flush_wait = Duration::from_micros(us);
        }
        if let Some(us) = parse_var::<u64, _>(&lookup, ENV_MAX_FLUSH_WAIT) {
            config.max_flush_wait = Duration::from_micros(us);
        }
        if let Some(limit) = parse_var::<usize, _>(&lookup, ENV_OUTPUT_LIMIT) {
            config.output_buffer_limit = limit.max(1);
        }
        if let Some(baud) = parse_var::<u32, _>(&lookup, ENV_BAUD_RATE) {
            config.baud_rate = baud;
        }
        if let Some(encoding) = parse_var::<Encoding, _>(&lookup, ENV_ENCODING) {
            config.encoding = encoding;
        }
        if let Some(raw) = lookup(ENV_COLOR_DEPTH) {
            match ColorDepth::parse(&raw) {
                Some(depth) => config.color_depth = depth,
                None => {
                    vtcomp_core::warn!(var = ENV_COLOR_DEPTH, value = %raw, "ignoring unparsable value");
                }
            }
        }
        config
    }

    #[must_use]
    pub fn with_baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = baud;
        self
    }

    #[must_use]
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    #[must_use]
    pub fn with_color_depth(mut self, depth: ColorDepth) -> Self {
        self.color_depth = depth;
        self
    }

    #[must_use]
    pub fn with_flush_waits(mut self, min: Duration, max: Duration) -> Self {
        self.min_flush_wait = min;
        self.max_flush_wait = max;
        self
    }

    #[must_use]
    pub fn with_output_limit(mut self, limit: usize) -> Self {
        self.output_buffer_limit = limit.max(1);
        self
    }

    #[must_use]
    pub fn with_move_limit(mut self, limit: u16) -> Self {
        self.move_limit = limit;
        self
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            vtcomp_core::warn!(var = key, value = %raw, "ignoring unparsable value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = CompositorConfig::default();
        assert_eq!(config.min_flush_wait, Duration::from_micros(16_667));
        assert_eq!(config.max_flush_wait, Duration::from_millis(200));
        assert_eq!(config.output_buffer_limit, 32 * 1024);
        assert_eq!(config.move_limit, 7);
        assert_eq!(config.encoding, Encoding::Utf8);
    }

    #[test]
    fn environment_overlays_defaults() {
        let config = CompositorConfig::from_lookup(lookup(&[
            (ENV_MIN_FLUSH_WAIT, "1000"),
            (ENV_MAX_FLUSH_WAIT, "50000"),
            (ENV_OUTPUT_LIMIT, "4096"),
            (ENV_BAUD_RATE, "9600"),
            (ENV_ENCODING, "ASCII"),
            (ENV_COLOR_DEPTH, "truecolor"),
        ]));
        assert_eq!(config.min_flush_wait, Duration::from_millis(1));
        assert_eq!(config.max_flush_wait, Duration::from_millis(50));
        assert_eq!(config.output_buffer_limit, 4096);
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.encoding, Encoding::Ascii);
        assert_eq!(config.color_depth, ColorDepth::TrueColor);
    }

    #[test]
    fn garbage_is_ignored() {
        let config = CompositorConfig::from_lookup(lookup(&[
            (ENV_BAUD_RATE, "fast"),
            (ENV_ENCODING, "ebcdic"),
            (ENV_COLOR_DEPTH, "lots"),
        ]));
        assert_eq!(config, CompositorConfig::default());
    }

    #[test]
    fn encoding_picks_writer() {
        let cell = crate::cell::CellFormat::from_char('─');
        let mut out = String::new();
        (Encoding::Ascii.put_char())(&cell, &mut out);
        (Encoding::Utf8.put_char())(&cell, &mut out);
        assert_eq!(out, "-─");
    }

    #[test]
    fn builder_setters() {
        let config = CompositorConfig::default()
            .with_baud_rate(300)
            .with_output_limit(0)
            .with_move_limit(3);
        assert_eq!(config.baud_rate, 300);
        assert_eq!(config.output_buffer_limit, 1);
        assert_eq!(config.move_limit, 3);
    }
}
