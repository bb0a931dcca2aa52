//! Logging infrastructure.
//!
//! Installs a `tracing` subscriber that writes to stderr, so stdout stays
//! reserved for answers and JSON output.

use std::io::IsTerminal;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{AppError, AppResult};

/// Default filter when neither an explicit level nor `RUST_LOG` is set.
const DEFAULT_FILTER: &str = "info";

/// Initialize the tracing subscriber with stderr output.
///
/// The filter is taken from `log_level` when given, otherwise from
/// `RUST_LOG`, otherwise `info`. Accepts full `EnvFilter` directives such as
/// `citerag_knowledge=debug,warn`.
///
/// # Example
/// ```no_run
/// use citerag_core::logging::init_logging;
///
/// init_logging(None, false).expect("Failed to initialize logging");
/// ```
pub fn init_logging(log_level: Option<&str>, no_color: bool) -> AppResult<()> {
    let env_filter = build_filter(log_level)?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(!no_color && supports_color());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| AppError::Config(format!("Failed to init logging: {}", e)))?;

    Ok(())
}

/// Resolve the filter directive string into an `EnvFilter`.
fn build_filter(log_level: Option<&str>) -> AppResult<EnvFilter> {
    let from_env = std::env::var("RUST_LOG").ok();
    let directives = log_level
        .map(str::to_string)
        .or(from_env)
        .unwrap_or_else(|| DEFAULT_FILTER.to_string());

    EnvFilter::try_new(&directives)
        .map_err(|e| AppError::Config(format!("Invalid log filter '{}': {}", directives, e)))
}

/// Color only when stderr is a terminal and `NO_COLOR` is unset.
fn supports_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }

    std::io::stderr().is_terminal()
}
