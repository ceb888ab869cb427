#![forbid(unsafe_code)]

//! Render kernel: surfaces, compositing, and minimal-output presentation.
//!
//! Data flows one way:
//!
//! ```text
//! widget draws ─► Surface (per window, dirty spans)
//!                    │  Compositor::merge_all
//!                    ▼
//!                 root Surface (what the screen should show)
//!                    │  Presenter::present
//!                    ▼
//!                 OutputChannel (fragments, adaptive flush) ─► terminal
//! ```
//!
//! [`compositor::Compositor`] ties the pieces together; the other modules
//! are usable on their own, e.g. a [`presenter::Presenter`] can diff any
//! surface into any writer.

pub mod ansi;
pub mod cell;
pub mod compositor;
pub mod config;
pub mod counting_writer;
pub mod cursor_motion;
pub mod flush;
pub mod output;
pub mod presenter;
pub mod surface;
pub mod surface_pool;
pub mod terminal_model;

pub use cell::{CellAttrs, CellFormat, CompositeFlags, StyleFlags};
pub use compositor::{Compositor, CompositorError, SurfaceOwner, TerminalUpdates, WindowKind};
pub use config::CompositorConfig;
pub use surface::{Surface, SurfaceError};
pub use surface_pool::{SurfaceId, SurfacePool};
