use crate::api::{self, AvailabilitySource, DecodeError, TransportError};
use crate::core::availability::{self, EvaluationError};
use crate::core::diagnostics::{error_chain, Diagnostics};
use crate::core::gate::NotificationGate;
use crate::notifications::{AvailabilityEvent, DispatchReport, Dispatcher};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug)]
pub enum PollOutcome {
    TransportFailure(TransportError),
    DecodeFailure(DecodeError),
    ApiError(String),
    SkuNotUniquelyIdentified { matches: usize },
    Evaluated { available: bool, zones: Vec<String> },
}

impl PollOutcome {
    pub fn is_available(&self) -> bool {
        matches!(self, PollOutcome::Evaluated { available: true, .. })
    }
}

#[derive(Debug)]
pub enum Delivery {
    NotAttempted,
    /// Another pass holds the gate; this signal was dropped.
    Suppressed,
    Dispatched(DispatchReport),
}

#[derive(Debug)]
pub struct PassReport {
    pub tick: u64,
    pub outcome: PollOutcome,
    pub delivery: Delivery,
}

/// One poll-decode-evaluate-notify pass, shared by every tick.
pub struct Pipeline {
    source: Arc<dyn AvailabilitySource>,
    sku: String,
    gate: NotificationGate,
    dispatcher: Dispatcher,
    diagnostics: Diagnostics,
    cooldown: Duration,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn AvailabilitySource>,
        sku: impl Into<String>,
        gate: NotificationGate,
        dispatcher: Dispatcher,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            source,
            sku: sku.into(),
            gate,
            dispatcher,
            diagnostics,
            cooldown: Duration::ZERO,
        }
    }

    /// Keeps the gate closed for `cooldown` after each dispatch, for channels
    /// that return before anyone has seen the alert.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn gate(&self) -> &NotificationGate {
        &self.gate
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub async fn poll(&self, cancel: &CancellationToken) -> PollOutcome {
        let payload = match self.source.fetch(cancel).await {
            Ok(payload) => payload,
            Err(e) => {
                if e.is_cancelled() {
                    tracing::info!(reason = %e, "API call cancelled by timeout or shutdown");
                } else {
                    let correlation_id = Uuid::new_v4();
                    tracing::error!(%correlation_id, chain = %error_chain(&e), "API call failed");
                }
                return PollOutcome::TransportFailure(e);
            }
        };

        let response = match api::decode(payload) {
            Ok(response) => response,
            Err(e) => {
                let correlation_id = Uuid::new_v4();
                let captured = self.diagnostics.capture_payload(correlation_id, &e.payload);
                tracing::error!(
                    %correlation_id,
                    ?captured,
                    chain = %error_chain(&e),
                    "JSON deserialization failed"
                );
                return PollOutcome::DecodeFailure(e);
            }
        };

        match availability::evaluate(&response, &self.sku) {
            Ok(evaluation) => {
                let available = evaluation.is_available();
                let zones = evaluation.zone_names();
                if available {
                    tracing::warn!(sku = %self.sku, ?zones, "Server available");
                } else {
                    tracing::info!(sku = %self.sku, "Server not available");
                }
                PollOutcome::Evaluated { available, zones }
            }
            Err(EvaluationError::ApiReported(message)) => {
                tracing::error!(error = %message, "API returned an error");
                PollOutcome::ApiError(message)
            }
            Err(EvaluationError::SkuNotUniquelyIdentified { sku, matches }) => {
                tracing::error!(%sku, matches, "Availability check failed: SKU not uniquely identified");
                PollOutcome::SkuNotUniquelyIdentified { matches }
            }
        }
    }

    /// Polls, then notifies through the gate. Dispatch ignores `cancel` so an
    /// in-flight notification is never cut short by shutdown; the cool-down
    /// after it does not.
    pub async fn run_pass(&self, tick: u64, cancel: &CancellationToken) -> PassReport {
        tracing::trace!(tick, "Poll pass started");

        let outcome = self.poll(cancel).await;

        let delivery = match &outcome {
            PollOutcome::Evaluated {
                available: true,
                zones,
            } => self.notify(zones.clone(), cancel).await,
            _ => Delivery::NotAttempted,
        };

        tracing::trace!(tick, "Poll pass completed");
        PassReport {
            tick,
            outcome,
            delivery,
        }
    }

    async fn notify(&self, zones: Vec<String>, cancel: &CancellationToken) -> Delivery {
        let Some(permit) = self.gate.try_enter() else {
            tracing::debug!("Notification already in flight, dropping signal");
            return Delivery::Suppressed;
        };

        let event = AvailabilityEvent::new(self.sku.clone(), zones);
        let report = self.dispatcher.dispatch(&event).await;

        if !self.cooldown.is_zero() {
            tracing::debug!(cooldown_ms = self.cooldown.as_millis() as u64, "Holding notification gate");
            tokio::select! {
                _ = tokio::time::sleep(self.cooldown) => {}
                _ = cancel.cancelled() => {}
            }
        }
        permit.exit();

        Delivery::Dispatched(report)
    }
}
