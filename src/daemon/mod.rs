mod pass;
mod scheduler;
mod shutdown;

use crate::api::ApiClient;
use crate::core::diagnostics::Diagnostics;
use crate::core::gate::NotificationGate;
use crate::core::settings::Settings;
use crate::notifications::Dispatcher;
use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub use pass::{Pipeline, PollOutcome};
pub use scheduler::{Scheduler, SchedulerState};

pub fn build_pipeline(settings: &Settings, dispatcher: Dispatcher) -> Result<Pipeline> {
    let client = ApiClient::new(&settings.api)?;
    let diagnostics = Diagnostics::new(settings.diagnostics.capture_dir());

    if let Some(dir) = diagnostics.capture_dir() {
        tracing::debug!(?dir, "Undecodable payloads will be captured");
    }

    Ok(Pipeline::new(
        Arc::new(client),
        settings.api.sku.clone(),
        NotificationGate::new(),
        dispatcher,
        diagnostics,
    )
    .with_cooldown(settings.notifications.cooldown()))
}

pub async fn run(settings: Settings) -> Result<()> {
    tracing::info!(sku = %settings.api.sku, endpoint = %settings.api.endpoint, "Starting kimsufi-watch daemon");

    let dispatcher = Dispatcher::from_settings(&settings.notifications)?;
    tracing::info!(channels = ?dispatcher.channel_names(), "Notification channels ready");

    let pipeline = Arc::new(build_pipeline(&settings, dispatcher)?);
    let scheduler = Scheduler::new(
        pipeline,
        settings.api.period(),
        settings.daemon.shutdown_grace(),
    );

    let mut state = scheduler.subscribe();
    tokio::spawn(async move {
        while state.changed().await.is_ok() {
            let current = *state.borrow_and_update();
            tracing::debug!(state = ?current, "Scheduler state changed");
            if current == SchedulerState::Stopped {
                break;
            }
        }
    });

    let shutdown = CancellationToken::new();
    shutdown::spawn_listener(shutdown.clone());

    scheduler.run(shutdown).await;

    tracing::info!("Application stopped");
    Ok(())
}
