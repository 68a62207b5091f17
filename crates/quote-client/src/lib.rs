pub mod eastmoney;
pub mod finnhub;
pub mod pacer;
pub mod sentiment;
pub mod yahoo;

pub use eastmoney::{ConnectFlowSource, EastMoneySource};
pub use finnhub::FinnhubSource;
pub use pacer::RequestPacer;
pub use sentiment::{CnnFearGreedSource, YahooIndicatorSource};
pub use yahoo::YahooChartSource;

use market_core::{FetchError, HttpConfig, RetryPolicy};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

/// Outcome of a single HTTP attempt.
enum AttemptError {
    /// Transport failure, 5xx or 429
    Retryable(String),
    /// Other 4xx or an undecodable body
    Fatal(String),
}

/// Shared HTTP plumbing for every upstream: pacing, timeout, bounded retries with
/// exponential back-off, and cancellation.
#[derive(Clone)]
pub struct QuoteClient {
    client: Client,
    pacer: RequestPacer,
    retry: RetryPolicy,
}

impl QuoteClient {
    pub fn new(http: &HttpConfig, retry: RetryPolicy) -> Self {
        let client = Client::builder()
            .timeout(http.timeout())
            .user_agent(http.user_agent.clone())
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            pacer: RequestPacer::per_minute(http.rate_limit_per_minute, http.request_delay()),
            retry,
        }
    }

    /// GET `url` and decode the JSON body, retrying transient failures.
    /// Returns `FetchError::Cancelled` as soon as `cancel` fires, including mid-backoff.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        source: &str,
        symbol: &str,
        url: &str,
        query: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> Result<T, FetchError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_reason = String::new();

        for attempt in 0..max_attempts {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                _ = self.pacer.acquire() => {}
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                outcome = self.attempt::<T>(url, query) => outcome,
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(AttemptError::Fatal(reason)) => {
                    tracing::warn!("{} request for {} failed: {}", source, symbol, reason);
                    return Err(FetchError::unavailable(source, symbol, attempt + 1, reason));
                }
                Err(AttemptError::Retryable(reason)) => {
                    tracing::warn!(
                        "{} request for {} failed (attempt {}/{}): {}",
                        source,
                        symbol,
                        attempt + 1,
                        max_attempts,
                        reason
                    );
                    last_reason = reason;

                    if attempt + 1 < max_attempts {
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                            _ = tokio::time::sleep(self.retry.delay_for(attempt)) => {}
                        }
                    }
                }
            }
        }

        Err(FetchError::unavailable(source, symbol, max_attempts, last_reason))
    }

    async fn attempt<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T, AttemptError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| AttemptError::Retryable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| AttemptError::Fatal(format!("invalid payload: {}", e)));
        }

        let reason = format!("HTTP {}", status);
        if status.is_server_error() || status.as_u16() == 429 {
            Err(AttemptError::Retryable(reason))
        } else {
            Err(AttemptError::Fatal(reason))
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Client with no pacing and millisecond back-off.
    pub fn fast_client() -> QuoteClient {
        let http = HttpConfig {
            timeout_secs: 5,
            request_delay_ms: 0,
            ..HttpConfig::default()
        };
        QuoteClient::new(
            &http,
            RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 1,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::fast_client;
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_server_errors_exhaust_retries() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/quote")
            .with_status(500)
            .expect(3)
            .create_async()
            .await;

        let client = fast_client();
        let url = format!("{}/quote", server.url());
        let result: Result<serde_json::Value, _> =
            client.get_json("Test", "AAPL", &url, &[], &CancellationToken::new()).await;

        match result {
            Err(FetchError::Unavailable(e)) => {
                assert_eq!(e.attempts, 3);
                assert_eq!(e.symbol, "AAPL");
                assert!(e.reason.contains("500"));
            }
            other => panic!("expected SourceUnavailable, got {:?}", other),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_error_fails_fast() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/quote")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let client = fast_client();
        let url = format!("{}/quote", server.url());
        let result: Result<serde_json::Value, _> =
            client.get_json("Test", "AAPL", &url, &[], &CancellationToken::new()).await;

        assert!(matches!(result, Err(FetchError::Unavailable(ref e)) if e.attempts == 1));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_cancelled_during_backoff() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/quote")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;

        let http = HttpConfig {
            timeout_secs: 5,
            request_delay_ms: 0,
            ..HttpConfig::default()
        };
        let client = QuoteClient::new(
            &http,
            RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 60_000,
            },
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let url = format!("{}/quote", server.url());
        let result: Result<serde_json::Value, _> =
            tokio::time::timeout(Duration::from_secs(5), client.get_json("Test", "AAPL", &url, &[], &cancel))
                .await
                .expect("back-off was not interrupted");

        assert_eq!(result.unwrap_err(), FetchError::Cancelled);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_cancel_interrupts_unanswered_request() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });

        let client = fast_client();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let url = format!("http://{}/quote", addr);
        let result: Result<serde_json::Value, _> =
            tokio::time::timeout(Duration::from_secs(3), client.get_json("Test", "AAPL", &url, &[], &cancel))
                .await
                .expect("request was not cancelled");
        assert_eq!(result.unwrap_err(), FetchError::Cancelled);
    }

    #[tokio::test]
    async fn test_cancelled_before_request() {
        let client = fast_client();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<serde_json::Value, _> = client
            .get_json("Test", "AAPL", "http://127.0.0.1:9/unreachable", &[], &cancel)
            .await;
        assert_eq!(result.unwrap_err(), FetchError::Cancelled);
    }
}
