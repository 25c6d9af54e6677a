//! # Observability
//!
//! - `metrics`: Prometheus metrics collection
//! - `init_tracing`: `tracing-subscriber` setup for the binary

pub mod metrics;

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. `RUST_LOG` wins over the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "qust_operator=info".into()),
        )
        .with_target(false)
        .init();
}
