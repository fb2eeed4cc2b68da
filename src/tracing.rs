use tracing_subscriber::{EnvFilter, fmt::SubscriberBuilder};

/// Installs the global tracing subscriber shared by the library and the CLI.
///
/// `default_filter` is used when `RUST_LOG` is not set, so every binary gets
/// the same formatting rules and a sane default verbosity.
pub fn init_tracing(default_filter: &str) -> Result<(), anyhow::Error> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))
}
