use super::{AvailabilityEvent, ChannelError, NotificationChannel};
use crate::core::settings::APP_NAME;
use async_trait::async_trait;
use notify_rust::{Notification, Timeout};
use tokio::sync::oneshot;

/// Persistent desktop notification. On XDG desktops delivery only completes
/// once the user clicks or dismisses it, which keeps the gate held meanwhile.
/// Elsewhere `show` returns immediately and `notifications.cooldown_ms` keeps
/// the gate closed instead.
pub struct DesktopChannel;

impl DesktopChannel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DesktopChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationChannel for DesktopChannel {
    fn name(&self) -> &'static str {
        "desktop"
    }

    async fn deliver(&self, event: &AvailabilityEvent) -> Result<(), ChannelError> {
        let summary = event.summary();
        let body = event.body();
        let (tx, rx) = oneshot::channel();

        // A plain thread rather than spawn_blocking: an unacknowledged dialog
        // must not hold up runtime shutdown.
        std::thread::Builder::new()
            .name("desktop-notification".to_string())
            .spawn(move || {
                let _ = tx.send(show_and_wait(&summary, &body));
            })
            .map_err(|e| ChannelError::Delivery(e.to_string()))?;

        rx.await
            .map_err(|_| ChannelError::Acknowledgement("notification thread exited".to_string()))?
    }
}

fn show_and_wait(summary: &str, body: &str) -> Result<(), ChannelError> {
    let mut notification = Notification::new();
    notification
        .summary(summary)
        .body(body)
        .appname(APP_NAME)
        .timeout(Timeout::Never);

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        let handle = notification
            .show()
            .map_err(|e| ChannelError::Delivery(e.to_string()))?;
        tracing::debug!("Waiting for desktop notification acknowledgement");
        handle.wait_for_action(|action| {
            tracing::debug!(action, "User acknowledged desktop notification");
        });
    }

    #[cfg(not(all(unix, not(target_os = "macos"))))]
    {
        notification
            .show()
            .map_err(|e| ChannelError::Delivery(e.to_string()))?;
    }

    Ok(())
}
