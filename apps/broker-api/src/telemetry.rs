//! Logging setup.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Installs the global subscriber. `RUST_LOG` overrides `log_level`.
///
/// Returns `false` when a subscriber was already installed.
pub fn init(log_level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber).is_ok()
}
