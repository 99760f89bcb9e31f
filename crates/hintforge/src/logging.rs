//! Tracing subscriber setup for binaries embedding the client.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs a console subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` (for example the
/// configured `log_filter`) applies. Calling this twice is harmless: the
/// second call leaves the first subscriber in place and returns `false`.
pub fn init_logging(default_filter: &str) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .is_ok()
}
