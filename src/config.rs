use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;
use tracing::metadata::LevelFilter;

pub const DEFAULT_LOCK_TIMEOUT: u64 = 10_000; //ms
pub const DEFAULT_MAX_ACTIVE_TRANSACTIONS: usize = 1024;
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::INFO;

const ENV_LOCK_TIMEOUT: &str = "LOCK_TIMEOUT";
const ENV_MAX_ACTIVE_TRANSACTIONS: &str = "MAX_ACTIVE_TRANSACTIONS";
const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

/// Maximum time a transaction may wait for a record lock before being aborted.
pub static LOCK_TIMEOUT: Lazy<Duration> = Lazy::new(|| {
    Duration::from_millis(
        env::var(ENV_LOCK_TIMEOUT)
            .map(|timeout| {
                timeout
                    .parse()
                    .expect("lock timeout must be an unsigned number of milliseconds")
            })
            .unwrap_or(DEFAULT_LOCK_TIMEOUT),
    )
});

pub static MAX_ACTIVE_TRANSACTIONS: Lazy<usize> = Lazy::new(|| {
    env::var(ENV_MAX_ACTIVE_TRANSACTIONS)
        .map(|max| max.parse().expect("max active transactions must be a number"))
        .unwrap_or(DEFAULT_MAX_ACTIVE_TRANSACTIONS)
});

pub static LOG_LEVEL: Lazy<LevelFilter> = Lazy::new(|| {
    env::var(ENV_LOG_LEVEL)
        .map(|level| level.parse().expect("log level must be a valid level filter"))
        .unwrap_or(DEFAULT_LOG_LEVEL)
});
