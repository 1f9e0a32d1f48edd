//! Logging setup.
//!
//! Output goes to **stderr**; the host owns stdout. The filter is taken from
//! `RUST_LOG` when set, otherwise from the host's `TF_LOG` level, otherwise
//! from the supplied default.
//!
//! ```bash
//! # Request bodies and version bookkeeping
//! RUST_LOG=fastly_provider=debug terraform apply
//!
//! # Follow the host's log level
//! TF_LOG=DEBUG terraform apply
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Level used when neither `RUST_LOG` nor `TF_LOG` is set.
pub const DEFAULT_LEVEL: &str = "info";

/// Host log level variable.
pub const TF_LOG_ENV: &str = "TF_LOG";

/// Install the global subscriber at the default level.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default(DEFAULT_LEVEL);
}

/// Install the global subscriber, falling back to `default_level`.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Like [`init_logging`], but returns `false` instead of panicking when a
/// subscriber is already installed (tests, repeated configure calls).
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(env_filter(DEFAULT_LEVEL))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}

/// Pick the filter directive from the environment.
///
/// `TF_LOG` only contributes when it names a level; values such as `JSON`
/// are ignored.
pub fn filter_directive<F>(env: F, default_level: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |name: &str| env(name).filter(|v| !v.trim().is_empty());

    if let Some(directive) = non_empty(EnvFilter::DEFAULT_ENV) {
        return directive;
    }
    match non_empty(TF_LOG_ENV).map(|v| v.trim().to_ascii_lowercase()) {
        Some(level) if matches!(level.as_str(), "trace" | "debug" | "info" | "warn" | "error") => level,
        _ => default_level.to_string(),
    }
}

fn env_filter(default_level: &str) -> EnvFilter {
    let directive = filter_directive(|name| std::env::var(name).ok(), default_level);
    EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(default_level))
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
