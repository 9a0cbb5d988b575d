use crate::config;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Layer;
use tracing_subscriber::Registry;

/// Installs the global subscriber, printing events up to the configured log level.
pub fn init() -> Result<(), SetGlobalDefaultError> {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();
    let subscriber = Registry::default().with(stdout_log.with_filter(*config::LOG_LEVEL));

    tracing::subscriber::set_global_default(subscriber)
}
