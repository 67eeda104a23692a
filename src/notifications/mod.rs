mod desktop;
mod sms;

use crate::core::settings::NotificationSettings;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use thiserror::Error;

pub use desktop::DesktopChannel;
pub use sms::SmsChannel;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityEvent {
    pub sku: String,
    pub zones: Vec<String>,
    pub detected_at: DateTime<Utc>,
}

impl AvailabilityEvent {
    pub fn new(sku: impl Into<String>, zones: Vec<String>) -> Self {
        Self {
            sku: sku.into(),
            zones,
            detected_at: Utc::now(),
        }
    }

    pub fn summary(&self) -> String {
        format!("Server {} is available", self.sku)
    }

    pub fn body(&self) -> String {
        if self.zones.is_empty() {
            format!("Server {} can be ordered now.", self.sku)
        } else {
            format!(
                "Server {} can be ordered now in: {}.",
                self.sku,
                self.zones.join(", ")
            )
        }
    }
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("delivery request failed")]
    Request(#[from] reqwest::Error),

    #[error("gateway rejected message with status {status}: {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("acknowledgement was lost: {0}")]
    Acknowledgement(String),
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, event: &AvailabilityEvent) -> Result<(), ChannelError>;
}

#[derive(Debug)]
pub struct ChannelOutcome {
    pub channel: &'static str,
    pub result: Result<(), ChannelError>,
}

#[derive(Debug, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<ChannelOutcome>,
}

impl DispatchReport {
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &ChannelOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }
}

#[derive(Clone, Default)]
pub struct Dispatcher {
    channels: Vec<Arc<dyn NotificationChannel>>,
}

impl Dispatcher {
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    pub fn from_settings(settings: &NotificationSettings) -> Result<Self> {
        let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();

        if settings.desktop {
            channels.push(Arc::new(DesktopChannel::new()));
        }

        if settings.sms.is_configured() {
            channels.push(Arc::new(SmsChannel::new(settings.sms.clone())?));
        } else {
            tracing::debug!("SMS credentials incomplete, SMS channel disabled");
        }

        if channels.is_empty() {
            tracing::warn!("No notification channels configured; availability will only be logged");
        }

        Ok(Self { channels })
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Runs every channel to completion. A failing channel never stops the others.
    pub async fn dispatch(&self, event: &AvailabilityEvent) -> DispatchReport {
        let deliveries = self.channels.iter().map(|channel| async move {
            let result = channel.deliver(event).await;
            match &result {
                Ok(()) => tracing::info!(channel = channel.name(), sku = %event.sku, "Notification delivered"),
                Err(e) => tracing::error!(channel = channel.name(), error = %e, "Notification channel failed"),
            }
            ChannelOutcome {
                channel: channel.name(),
                result,
            }
        });

        DispatchReport {
            outcomes: join_all(deliveries).await,
        }
    }
}
