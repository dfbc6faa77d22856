//! Readiness polling - wait for a server to answer with HTTP 200.

use std::time::Duration;

use reqwest::StatusCode;
use tokio::time::sleep;

/// Polls an HTTP endpoint until it answers `200 OK` or the attempt budget runs out.
#[derive(Debug, Clone)]
pub struct ReadinessPoller {
    /// Timeout for a single probe
    pub attempt_timeout: Duration,

    /// Delay between failed probes
    pub interval: Duration,
}

impl Default for ReadinessPoller {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(1),
            interval: Duration::from_secs(1),
        }
    }
}

impl ReadinessPoller {
    /// Create a poller with the default 1s timeout and 1s interval.
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe `url` at most `max_attempts` times.
    ///
    /// Returns `true` on the first `200 OK`. Other statuses, connection errors and
    /// timeouts all count as "not ready yet". There is no delay after the final
    /// attempt. Never fails; the return value is the only signal.
    pub async fn wait_until_ready(&self, url: &str, max_attempts: u32) -> bool {
        // Probes go straight to the local server, never through HTTP_PROXY.
        let client = match reqwest::Client::builder()
            .timeout(self.attempt_timeout)
            .no_proxy()
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!("Failed to build HTTP client: {}", e);
                return false;
            }
        };

        for attempt in 1..=max_attempts {
            match client.get(url).send().await {
                Ok(resp) if resp.status() == StatusCode::OK => {
                    tracing::debug!("{} ready after {} attempt(s)", url, attempt);
                    return true;
                }
                Ok(resp) => {
                    tracing::debug!("Attempt {}: {} returned {}", attempt, url, resp.status());
                }
                Err(e) if e.is_timeout() => {
                    tracing::debug!("Attempt {}: {} timed out", attempt, url);
                }
                Err(e) => {
                    tracing::debug!("Attempt {}: {} unreachable: {}", attempt, url, e);
                }
            }

            if attempt < max_attempts {
                sleep(self.interval).await;
            }
        }

        false
    }
}

/// Probe `url` with the default timings. See [`ReadinessPoller::wait_until_ready`].
pub async fn wait_until_ready(url: &str, max_attempts: u32) -> bool {
    ReadinessPoller::default()
        .wait_until_ready(url, max_attempts)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    use axum::{http::StatusCode as AxumStatus, routing::get, Router};

    fn fast_poller() -> ReadinessPoller {
        ReadinessPoller {
            attempt_timeout: Duration::from_millis(200),
            interval: Duration::from_millis(150),
        }
    }

    /// Start a server whose `/` answers with `status`, counting hits.
    async fn serve_status(status: AxumStatus) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let app = Router::new().route(
            "/",
            get(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    status
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}/", addr), hits)
    }

    /// A URL on a port nothing listens on.
    async fn closed_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn succeeds_on_first_ok_response() {
        let (url, hits) = serve_status(AxumStatus::OK).await;

        assert!(fast_poller().wait_until_ready(&url, 5).await);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts_on_non_ok_status() {
        let (url, hits) = serve_status(AxumStatus::SERVICE_UNAVAILABLE).await;

        assert!(!fast_poller().wait_until_ready(&url, 3).await);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn treats_other_success_statuses_as_not_ready() {
        let (url, hits) = serve_status(AxumStatus::NO_CONTENT).await;

        assert!(!fast_poller().wait_until_ready(&url, 2).await);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn no_delay_after_final_attempt() {
        let url = closed_url().await;
        let poller = fast_poller();

        let start = Instant::now();
        assert!(!poller.wait_until_ready(&url, 1).await);
        assert!(start.elapsed() < poller.interval);

        let start = Instant::now();
        assert!(!poller.wait_until_ready(&url, 3).await);
        let elapsed = start.elapsed();
        assert!(elapsed >= poller.interval * 2);
        assert!(elapsed < poller.interval * 3 + poller.attempt_timeout * 3);
    }

    #[tokio::test]
    async fn zero_attempts_is_never_ready() {
        let (url, hits) = serve_status(AxumStatus::OK).await;

        assert!(!fast_poller().wait_until_ready(&url, 0).await);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn times_out_slow_responses() {
        let app = Router::new().route(
            "/",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let start = Instant::now();
        assert!(!fast_poller().wait_until_ready(&format!("http://{}/", addr), 2).await);
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
