//! Tracing setup for applications embedding `chart-connect`.
//!
//! Hosts either call `init_default_tracing` or install their own
//! `tracing` subscriber; registry and export events are emitted either way.

/// Installs a compact `fmt` subscriber filtered by `RUST_LOG` (default
/// `info`) when the `telemetry` feature is enabled.
///
/// Returns `false` when the feature is disabled or a global subscriber is
/// already set.
#[must_use]
pub fn init_default_tracing() -> bool {
    #[cfg(feature = "telemetry")]
    {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        return tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .try_init()
            .is_ok();
    }

    #[cfg(not(feature = "telemetry"))]
    {
        false
    }
}
