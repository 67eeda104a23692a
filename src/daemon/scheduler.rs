use crate::core::diagnostics::report_fault;
use crate::daemon::pass::{Delivery, PassReport, Pipeline, PollOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSummary {
    pub passes_started: u64,
    pub passes_completed: u64,
    pub passes_aborted: u64,
    pub notifications: u64,
}

pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    period: Duration,
    shutdown_grace: Duration,
    state: watch::Sender<SchedulerState>,
}

impl Scheduler {
    pub fn new(pipeline: Arc<Pipeline>, period: Duration, shutdown_grace: Duration) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            pipeline,
            period,
            shutdown_grace,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Fires a pass immediately and then every period until `shutdown` is
    /// cancelled. Passes may overlap; they only serialise at the gate.
    ///
    /// On shutdown, in-flight passes get `shutdown_grace` to finish (a dialog
    /// still waiting for acknowledgement, typically). Whatever is left after
    /// that is aborted and the gate is force-reset.
    pub async fn run(self, shutdown: CancellationToken) -> SchedulerSummary {
        let mut summary = SchedulerSummary::default();
        let mut passes: JoinSet<PassReport> = JoinSet::new();
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.state.send_replace(SchedulerState::Running);
        tracing::info!(
            period_ms = self.period.as_millis() as u64,
            sku = self.pipeline.sku(),
            "Scheduler running"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                Some(joined) = passes.join_next(), if !passes.is_empty() => {
                    observe(joined, &mut summary);
                }
                _ = ticker.tick() => {
                    summary.passes_started += 1;
                    let tick = summary.passes_started;
                    let pipeline = Arc::clone(&self.pipeline);
                    let cancel = shutdown.child_token();
                    passes.spawn(async move { pipeline.run_pass(tick, &cancel).await });
                }
            }
        }

        self.state.send_replace(SchedulerState::Stopping);
        tracing::info!(
            in_flight = passes.len(),
            notification_open = self.pipeline.gate().is_held(),
            "Scheduler stopping"
        );

        let drained = tokio::time::timeout(self.shutdown_grace, async {
            while let Some(joined) = passes.join_next().await {
                observe(joined, &mut summary);
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                remaining = passes.len(),
                grace_ms = self.shutdown_grace.as_millis() as u64,
                "Shutdown grace elapsed, aborting in-flight passes"
            );
            passes.abort_all();
            while let Some(joined) = passes.join_next().await {
                match joined {
                    Err(e) if e.is_cancelled() => summary.passes_aborted += 1,
                    other => observe(other, &mut summary),
                }
            }
            self.pipeline.gate().force_reset();
        }

        self.state.send_replace(SchedulerState::Stopped);
        tracing::info!(
            started = summary.passes_started,
            completed = summary.passes_completed,
            aborted = summary.passes_aborted,
            notifications = summary.notifications,
            "Scheduler stopped"
        );

        summary
    }
}

fn observe(joined: Result<PassReport, JoinError>, summary: &mut SchedulerSummary) {
    match joined {
        Ok(report) => {
            summary.passes_completed += 1;
            if let Delivery::Dispatched(dispatch) = &report.delivery {
                summary.notifications += 1;
                for failed in dispatch.failed() {
                    if let Err(e) = &failed.result {
                        tracing::warn!(tick = report.tick, channel = failed.channel, error = %e, "Notification not delivered");
                    }
                }
                tracing::debug!(tick = report.tick, delivered = dispatch.delivered(), "Notification pass finished");
            }
            if !matches!(report.outcome, PollOutcome::Evaluated { .. }) {
                tracing::debug!(tick = report.tick, outcome = ?report.outcome, "Pass ended without a determination");
            }
        }
        Err(e) if e.is_cancelled() => {
            summary.passes_aborted += 1;
        }
        Err(e) => {
            report_fault("poll pass panicked", &e);
        }
    }
}
