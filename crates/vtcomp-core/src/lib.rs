#![forbid(unsafe_code)]

//! Core: geometry, colors, glyph widths, and terminal capability costs.

pub mod capabilities;
pub mod color;
pub mod geometry;
pub mod glyph;
pub mod logging;
pub mod tparm;

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{
    debug, debug_span, error, error_span, info, info_span, trace, trace_span, warn, warn_span,
};
