//! Logging for the compiler, the proof graph and the simulator.
//!
//! Built with the `tracing` feature this module forwards to the `tracing`
//! crate. Without it every macro expands to nothing, so merge loops and
//! rollouts pay nothing for their log statements.
//!
//! ```rust,ignore
//! use crate::trace::{debug, debug_span};
//!
//! let _span = debug_span!("prove_or", relation = %name).entered();
//! debug!(rows = data.len(), "disjunction proved");
//! ```

#[cfg(feature = "tracing")]
pub use tracing::{debug, debug_span, info, info_span, warn, Span};

#[cfg(not(feature = "tracing"))]
mod noop {
    /// Stand-in for `tracing::Span`.
    pub struct Span;

    impl Span {
        pub fn none() -> Self {
            Span
        }

        pub fn entered(self) -> SpanGuard {
            SpanGuard
        }
    }

    pub struct SpanGuard;

    #[macro_export]
    macro_rules! debug {
        ($($tt:tt)*) => {};
    }

    #[macro_export]
    macro_rules! info {
        ($($tt:tt)*) => {};
    }

    #[macro_export]
    macro_rules! warn {
        ($($tt:tt)*) => {};
    }

    #[macro_export]
    macro_rules! debug_span {
        ($($tt:tt)*) => {
            $crate::trace::Span::none()
        };
    }

    #[macro_export]
    macro_rules! info_span {
        ($($tt:tt)*) => {
            $crate::trace::Span::none()
        };
    }

    pub use crate::{debug, debug_span, info, info_span, warn};
}

#[cfg(not(feature = "tracing"))]
pub use noop::*;

/// Environment variable read before `RUST_LOG` when picking a log filter.
pub const LOG_ENV: &str = "GDLSIM_LOG";

/// Install a stderr subscriber. The filter comes from `GDLSIM_LOG`, then
/// `RUST_LOG`, then `default_directive`. Repeated calls are ignored.
#[cfg(feature = "tracing")]
pub fn init_subscriber(default_directive: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(false),
        )
        .with(filter)
        .try_init()
        .ok();
}

#[cfg(not(feature = "tracing"))]
pub fn init_subscriber(_default_directive: &str) {}

/// Record folded stacks for a flamegraph into `path`.
///
/// Stacks are flushed when the returned guard drops.
#[cfg(feature = "tracing")]
pub fn init_flamegraph(path: &str) -> crate::error::Result<impl Drop> {
    use tracing_flame::FlameLayer;
    use tracing_subscriber::{prelude::*, registry::Registry};

    let (flame_layer, guard) = FlameLayer::with_file(path)
        .map_err(|e| crate::error::GdlError::Config(format!("flamegraph output {path}: {e}")))?;

    Registry::default().with(flame_layer).try_init().ok();

    Ok(guard)
}

#[cfg(not(feature = "tracing"))]
pub fn init_flamegraph(path: &str) -> crate::error::Result<impl Drop> {
    struct NoFlame;
    impl Drop for NoFlame {
        fn drop(&mut self) {}
    }
    if path.is_empty() {
        return Err(crate::error::GdlError::Config(
            "flamegraph output path is empty".to_string(),
        ));
    }
    Ok(NoFlame)
}

#[cfg(test)]
#[path = "tests/trace.rs"]
mod tests;
