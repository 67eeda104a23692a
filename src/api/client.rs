use crate::api::{AvailabilitySource, TransportError};
use crate::core::settings::{ApiSettings, APP_NAME};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// HTTP client for the availability endpoint. The inner `reqwest::Client`
/// keeps its connection pool across ticks.
pub struct ApiClient {
    client: reqwest::Client,
    endpoint: Url,
    timeout: Option<Duration>,
}

impl ApiClient {
    pub fn new(settings: &ApiSettings) -> Result<Self> {
        let endpoint = Url::parse(&settings.endpoint)
            .with_context(|| format!("Invalid API endpoint: {}", settings.endpoint))?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("kimsufi-watch/", env!("CARGO_PKG_VERSION")))
            .build()
            .with_context(|| format!("Failed to build {APP_NAME} HTTP client"))?;

        Ok(Self {
            client,
            endpoint,
            timeout: settings.timeout(),
        })
    }

    async fn request(&self) -> Result<Bytes, TransportError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .send()
            .await
            .map_err(TransportError::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status,
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        response.bytes().await.map_err(TransportError::Network)
    }

    async fn bounded_request(&self) -> Result<Bytes, TransportError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.request())
                .await
                .unwrap_or_else(|_| Err(TransportError::TimedOut(limit))),
            None => self.request().await,
        }
    }
}

#[async_trait]
impl AvailabilitySource for ApiClient {
    async fn fetch(&self, cancel: &CancellationToken) -> Result<Bytes, TransportError> {
        tracing::trace!(endpoint = %self.endpoint, "API call started");
        let started = Instant::now();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            result = self.bounded_request() => result,
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(body) => tracing::debug!(elapsed_ms, bytes = body.len(), "API HTTP call completed"),
            Err(e) => tracing::debug!(elapsed_ms, error = %e, "API HTTP call failed"),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    const BODY: &str = r#"{"answer":{"availabilities":[]},"error":null}"#;

    async fn spawn_upstream() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new()
            .route("/ok", get(|| async { BODY }))
            .route(
                "/unavailable",
                get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
            )
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    BODY
                }),
            );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn client(addr: SocketAddr, path: &str, timeout_ms: Option<u64>) -> ApiClient {
        ApiClient::new(&ApiSettings {
            endpoint: format!("http://{addr}{path}"),
            timeout_ms,
            period_ms: 60_000,
            sku: "150sk30".to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_success_returns_buffered_body() {
        let addr = spawn_upstream().await;
        let client = client(addr, "/ok", Some(5_000));

        let body = client.fetch(&CancellationToken::new()).await.unwrap();
        assert_eq!(body, Bytes::from_static(BODY.as_bytes()));
    }

    #[tokio::test]
    async fn test_error_status_is_a_transport_failure() {
        let addr = spawn_upstream().await;
        let client = client(addr, "/unavailable", Some(5_000));

        let err = client.fetch(&CancellationToken::new()).await.unwrap_err();
        match err {
            TransportError::Status { status, reason } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(reason, "Service Unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_reports_cancelled() {
        let addr = spawn_upstream().await;
        let client = client(addr, "/slow", Some(100));

        let started = Instant::now();
        let err = client.fetch(&CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, TransportError::TimedOut(_)));
        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_cancellation_aborts_in_flight_call() {
        let addr = spawn_upstream().await;
        let client = client(addr, "/slow", None);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = client.fetch(&cancel).await.unwrap_err();

        assert!(matches!(err, TransportError::Cancelled));
        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_already_cancelled_token_skips_call() {
        let addr = spawn_upstream().await;
        let client = client(addr, "/ok", Some(5_000));
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(matches!(
            client.fetch(&cancel).await,
            Err(TransportError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_connection_refused_is_a_network_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client(addr, "/ok", Some(5_000));
        let err = client.fetch(&CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, TransportError::Network(_)));
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_rejects_invalid_endpoint() {
        let settings = ApiSettings {
            endpoint: "::not-a-url".to_string(),
            ..ApiSettings::default()
        };
        assert!(ApiClient::new(&settings).is_err());
    }
}
