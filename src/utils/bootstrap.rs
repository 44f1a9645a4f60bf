//! Bootstrap utilities shared by the btc binaries.

use std::future::Future;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LOG_ENV_VAR;

/// Initialize tracing from the `BTC_LOG` environment variable.
///
/// Defaults to "info" level if BTC_LOG is not set.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Extract the value of `--config <path>` (or `--config=<path>`) from args.
///
/// The first element is taken to be the program name and skipped.
pub fn config_path_from_args<I>(args: I) -> Option<String>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next();
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(path.to_string());
        }
    }
    None
}

/// Parse `--config` from the process arguments.
pub fn parse_config_path() -> Option<String> {
    config_path_from_args(std::env::args())
}

/// Parse the first positional argument as a user id.
///
/// The first element is taken to be the program name and skipped, as are
/// flags and the value following `--config`.
pub fn user_id_from_args<I>(args: I) -> Result<Option<i64>, std::num::ParseIntError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            args.next();
            continue;
        }
        if arg.starts_with("--") {
            continue;
        }
        return arg.parse().map(Some);
    }
    Ok(None)
}

/// Parse the positional user id from the process arguments.
pub fn parse_user_id() -> Result<Option<i64>, std::num::ParseIntError> {
    user_id_from_args(std::env::args())
}

/// Connect to a service with exponential backoff retry.
///
/// # Arguments
/// * `service_name` - Human-readable name for logging (e.g., "ledger")
/// * `address` - The address to connect to
/// * `connect` - Async function that attempts to establish a connection
///
/// # Returns
/// The connection on success, or the last error after max retries.
pub async fn connect_with_retry<T, E, F, Fut>(
    service_name: &str,
    address: &str,
    connect: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    const MAX_RETRIES: usize = 30;

    let mut backoff = ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(5))
        .with_max_times(MAX_RETRIES)
        .build();
    let mut attempt = 0;

    loop {
        attempt += 1;
        match connect().await {
            Ok(conn) => {
                info!(service = %service_name, address = %address, "Connected");
                return Ok(conn);
            }
            Err(e) => match backoff.next() {
                Some(delay) => {
                    warn!(
                        service = %service_name,
                        attempt,
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "Connection failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    error!(
                        service = %service_name,
                        attempts = attempt,
                        error = %e,
                        "Connection failed, giving up"
                    );
                    return Err(e);
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_config_path_from_args() {
        assert_eq!(
            config_path_from_args(args(&["btc-server", "--config", "prod.yaml"])),
            Some("prod.yaml".to_string())
        );
        assert_eq!(
            config_path_from_args(args(&["btc-server", "--config=dev.yaml"])),
            Some("dev.yaml".to_string())
        );
        assert_eq!(config_path_from_args(args(&["btc-server"])), None);
        assert_eq!(config_path_from_args(args(&["btc-server", "--config"])), None);
    }

    #[test]
    fn test_user_id_from_args() {
        assert_eq!(user_id_from_args(args(&["btc-client"])), Ok(None));
        assert_eq!(user_id_from_args(args(&["btc-client", "1988"])), Ok(Some(1988)));
        assert_eq!(
            user_id_from_args(args(&["btc-client", "--config", "7.yaml", "42"])),
            Ok(Some(42))
        );
        assert_eq!(
            user_id_from_args(args(&["btc-client", "--config=dev.yaml", "42"])),
            Ok(Some(42))
        );
        assert!(user_id_from_args(args(&["btc-client", "abc"])).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_with_retry_succeeds_after_failures() {
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;

        let result: Result<u32, String> = connect_with_retry("ledger", "localhost:1", move || async move {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(format!("attempt {} refused", n))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result, Ok(3));
    }
}
