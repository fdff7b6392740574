//! Logging setup for the demo binary.
//!
//! `RUST_LOG` overrides the default filter; logs go to stderr so stdout
//! stays valid JSON.

use std::io;

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn build_env_filter(level: Level) -> EnvFilter {
    let level = level.as_str().to_lowercase();
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,applytrack_cli={level},applytrack_core={level}"
        ))
    })
}

pub fn init_logging(level: Level) {
    let layer = fmt::layer()
        .compact()
        .with_writer(io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(build_env_filter(level))
        .with(layer)
        .init();
}
