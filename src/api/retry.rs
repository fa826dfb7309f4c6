// Retry policy for the workflow backend.
// Transport failures are retried with growing delays; any HTTP answer is final.

use std::time::Duration;

use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::{RetryTransientMiddleware, Retryable, RetryableStrategy};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Retries timeouts and connection failures only. 4xx/5xx responses surface immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportOnlyStrategy;

impl RetryableStrategy for TransportOnlyStrategy {
    fn handle(
        &self,
        res: &Result<reqwest::Response, reqwest_middleware::Error>,
    ) -> Option<Retryable> {
        match res {
            Ok(_) => None,
            Err(reqwest_middleware::Error::Reqwest(err))
                if err.is_timeout() || err.is_connect() || err.is_request() =>
            {
                tracing::warn!(error = %err, "Transient transport failure, retrying");
                Some(Retryable::Transient)
            }
            Err(_) => Some(Retryable::Fatal),
        }
    }
}

/// Wrap a reqwest client with the transport-only retry middleware.
pub fn with_retry(http: reqwest::Client, config: &RetryConfig) -> ClientWithMiddleware {
    let max_delay = config.max_delay.max(config.base_delay);
    let policy = ExponentialBackoff::builder()
        .retry_bounds(config.base_delay, max_delay)
        .build_with_max_retries(config.max_retries);

    ClientBuilder::new(http)
        .with(RetryTransientMiddleware::new_with_policy_and_strategy(
            policy,
            TransportOnlyStrategy,
        ))
        .build()
}
