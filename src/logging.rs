//! Logging and tracing setup for the provider.
//!
//! All logs go to **stderr**; stdout belongs to the host that embeds the
//! provider. Request traces from the REST client are emitted at `debug`
//! under the `instana_provider::restapi` target, so they can be enabled
//! without flooding the rest of the output.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Controls log levels (e.g., `info`, `instana_provider=debug`)
//!
//! # Examples
//!
//! ```bash
//! # Show info logs (default)
//! RUST_LOG=info ./instana-provider
//!
//! # Trace every Instana API call
//! RUST_LOG=instana_provider::restapi=debug ./instana-provider
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

/// Initialize the default logging subscriber.
///
/// This sets up a `tracing` subscriber that:
/// - Writes to **stderr**
/// - Respects the `RUST_LOG` environment variable for filtering
/// - Defaults to `info` level if `RUST_LOG` is not set
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
///
/// # Example
///
/// ```ignore
/// use instana_provider::init_logging;
///
/// fn main() {
///     init_logging();
///     tracing::info!("Provider starting");
/// }
/// ```
pub fn init_logging() {
    init_logging_with_default(DEFAULT_LOG_LEVEL);
}

/// Initialize logging with a custom default level.
///
/// Like [`init_logging`], but `default_level` is used when `RUST_LOG`
/// is not set.
///
/// ```ignore
/// use instana_provider::init_logging_with_default;
///
/// init_logging_with_default("instana_provider=debug");
/// ```
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Try to initialize logging, returning false if already initialized.
///
/// Unlike [`init_logging`], this does not panic if a subscriber has already
/// been set, which makes it safe to call from tests.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(env_filter(DEFAULT_LOG_LEVEL))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}
