use super::{AvailabilityEvent, ChannelError, NotificationChannel};
use crate::core::settings::SmsSettings;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Sends a text message through a Twilio-compatible messages endpoint.
pub struct SmsChannel {
    settings: SmsSettings,
    client: Client,
}

impl SmsChannel {
    pub fn new(settings: SmsSettings) -> Result<Self> {
        Self::with_timeout(settings, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(settings: SmsSettings, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build SMS gateway HTTP client")?;

        Ok(Self { settings, client })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.settings.api_base.trim_end_matches('/'),
            self.settings.account_sid
        )
    }
}

#[async_trait]
impl NotificationChannel for SmsChannel {
    fn name(&self) -> &'static str {
        "sms"
    }

    async fn deliver(&self, event: &AvailabilityEvent) -> Result<(), ChannelError> {
        let body = event.body();
        let form = [
            ("To", self.settings.to.as_str()),
            ("From", self.settings.from.as_str()),
            ("Body", body.as_str()),
        ];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.settings.account_sid, Some(&self.settings.auth_token))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::Rejected { status, body });
        }

        tracing::debug!(to = %self.settings.to, "SMS accepted by gateway");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Form;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    type Captured = (Option<String>, HashMap<String, String>);

    async fn spawn_gateway(status: StatusCode) -> (SocketAddr, mpsc::UnboundedReceiver<Captured>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = Router::new().route(
            "/2010-04-01/Accounts/AC123/Messages.json",
            post(move |headers: HeaderMap, Form(form): Form<HashMap<String, String>>| {
                let tx = tx.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    let _ = tx.send((auth, form));
                    (status, "{}")
                }
            }),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, rx)
    }

    fn settings(addr: SocketAddr) -> SmsSettings {
        SmsSettings {
            account_sid: "AC123".to_string(),
            auth_token: "secret".to_string(),
            from: "+15550001".to_string(),
            to: "+15550002".to_string(),
            api_base: format!("http://{addr}/"),
        }
    }

    #[tokio::test]
    async fn test_posts_message_form() {
        let (addr, mut rx) = spawn_gateway(StatusCode::CREATED).await;
        let channel = SmsChannel::new(settings(addr)).unwrap();

        channel
            .deliver(&AvailabilityEvent::new("150sk30", vec!["gra".to_string()]))
            .await
            .unwrap();

        let (auth, form) = rx.recv().await.unwrap();
        assert!(auth.unwrap().starts_with("Basic "));
        assert_eq!(form["To"], "+15550002");
        assert_eq!(form["From"], "+15550001");
        assert_eq!(form["Body"], "Server 150sk30 can be ordered now in: gra.");
    }

    #[tokio::test]
    async fn test_rejected_message_is_a_channel_error() {
        let (addr, _rx) = spawn_gateway(StatusCode::UNAUTHORIZED).await;
        let channel = SmsChannel::new(settings(addr)).unwrap();

        let err = channel
            .deliver(&AvailabilityEvent::new("150sk30", vec![]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ChannelError::Rejected { status, .. } if status == StatusCode::UNAUTHORIZED
        ));
    }

    #[tokio::test]
    async fn test_stalled_gateway_hits_request_timeout() {
        let app = Router::new().route(
            "/2010-04-01/Accounts/AC123/Messages.json",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                (StatusCode::CREATED, "{}")
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let channel = SmsChannel::with_timeout(settings(addr), Duration::from_millis(100)).unwrap();
        let err = channel
            .deliver(&AvailabilityEvent::new("150sk30", vec![]))
            .await
            .unwrap_err();

        assert!(matches!(err, ChannelError::Request(ref e) if e.is_timeout()));
    }
}
