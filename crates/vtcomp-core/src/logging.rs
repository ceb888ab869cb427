#![forbid(unsafe_code)]

//! Logging and tracing support.
//!
//! With the `tracing` feature the usual `tracing` macros are re-exported at the
//! crate root. Without it, no-op macros with the same names are provided so
//! call sites compile unchanged in both configurations.
//!
//! The `tracing-json` feature additionally offers [`init_json_subscriber`],
//! a one-call JSON subscriber filtered by the `VTCOMP_LOG` environment
//! variable.

#[cfg(feature = "tracing")]
pub use tracing::{
    debug, debug_span, error, error_span, info, info_span, trace, trace_span, warn, warn_span,
};

/// Environment variable holding the `EnvFilter` directive for
/// [`init_json_subscriber`].
pub const LOG_ENV: &str = "VTCOMP_LOG";

/// Filter used when `VTCOMP_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "warn";

// When tracing is not enabled, provide no-op macros
#[cfg(not(feature = "tracing"))]
mod noop_macros {
    /// No-op debug macro when tracing is disabled.
    #[macro_export]
    macro_rules! debug {
        ($($arg:tt)*) => {};
    }

    /// No-op debug_span macro when tracing is disabled.
    #[macro_export]
    macro_rules! debug_span {
        ($($arg:tt)*) => {
            $crate::logging::NoopSpan
        };
    }

    /// No-op error macro when tracing is disabled.
    #[macro_export]
    macro_rules! error {
        ($($arg:tt)*) => {};
    }

    /// No-op error_span macro when tracing is disabled.
    #[macro_export]
    macro_rules! error_span {
        ($($arg:tt)*) => {
            $crate::logging::NoopSpan
        };
    }

    /// No-op info macro when tracing is disabled.
    #[macro_export]
    macro_rules! info {
        ($($arg:tt)*) => {};
    }

    /// No-op info_span macro when tracing is disabled.
    #[macro_export]
    macro_rules! info_span {
        ($($arg:tt)*) => {
            $crate::logging::NoopSpan
        };
    }

    /// No-op trace macro when tracing is disabled.
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {};
    }

    /// No-op trace_span macro when tracing is disabled.
    #[macro_export]
    macro_rules! trace_span {
        ($($arg:tt)*) => {
            $crate::logging::NoopSpan
        };
    }

    /// No-op warn macro when tracing is disabled.
    #[macro_export]
    macro_rules! warn {
        ($($arg:tt)*) => {};
    }

    /// No-op warn_span macro when tracing is disabled.
    #[macro_export]
    macro_rules! warn_span {
        ($($arg:tt)*) => {
            $crate::logging::NoopSpan
        };
    }
}

/// A no-op span for when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub struct NoopSpan;

#[cfg(not(feature = "tracing"))]
impl NoopSpan {
    /// Enter the no-op span (does nothing).
    pub fn enter(&self) -> NoopGuard {
        NoopGuard
    }
}

/// A no-op span guard.
#[cfg(not(feature = "tracing"))]
pub struct NoopGuard;

/// Failure to install the global subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitError(pub String);

impl core::fmt::Display for InitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "failed to install log subscriber: {}", self.0)
    }
}

impl std::error::Error for InitError {}

/// Install a JSON `tracing` subscriber for the whole process.
///
/// The filter is read from `VTCOMP_LOG` (e.g. `vtcomp_render=debug`) and
/// falls back to [`DEFAULT_FILTER`]. Calling this twice returns an error
/// instead of replacing the first subscriber.
#[cfg(feature = "tracing-json")]
pub fn init_json_subscriber() -> Result<(), InitError> {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| InitError(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_error_display_names_cause() {
        let err = InitError("already set".into());
        assert_eq!(
            err.to_string(),
            "failed to install log subscriber: already set"
        );
    }

    #[cfg(not(feature = "tracing"))]
    #[test]
    fn noop_macros_accept_tracing_syntax() {
        crate::debug!(cells = 12, "ignored {}", 1);
        crate::warn!("ignored");
        let span = crate::debug_span!("noop", rows = 3);
        let _guard = span.enter();
    }

    #[cfg(feature = "tracing-json")]
    #[test]
    fn second_init_is_an_error() {
        let _ = init_json_subscriber();
        assert!(init_json_subscriber().is_err());
    }
}
