//! Logging setup for applications embedding dirscroll
//!
//! The library only emits `tracing` events. Installing a subscriber is left to
//! the application; these helpers cover the common case.

use tracing_subscriber::{EnvFilter, fmt};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "dirscroll=info,warn";

/// Error returned when a global subscriber is already installed.
pub type InitError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Install a `fmt` subscriber filtered by `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
pub fn init_tracing() -> Result<(), InitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    install(filter, false)
}

/// Install a `fmt` subscriber with an explicit filter directive.
///
/// Thread names are included so balancer events stand out.
pub fn init_tracing_with_filter(filter: &str) -> Result<(), InitError> {
    install(EnvFilter::new(filter), true)
}

fn install(filter: EnvFilter, thread_names: bool) -> Result<(), InitError> {
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(thread_names)
        .with_file(false)
        .with_line_number(false)
        .try_init()
}
