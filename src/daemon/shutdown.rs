use std::io::{BufRead, IsTerminal};
use tokio_util::sync::CancellationToken;

/// Cancels `token` on Ctrl-C, SIGTERM, or Enter pressed on an interactive stdin.
pub fn spawn_listener(token: CancellationToken) {
    if std::io::stdin().is_terminal() {
        watch_stdin(token.clone());
        tracing::info!("Press ENTER to stop");
    }

    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = os_signal() => {
                tracing::info!("Shutdown requested by signal");
                token.cancel();
            }
        }
    });
}

// Detached OS thread: a blocking stdin read must not keep the runtime alive.
fn watch_stdin(token: CancellationToken) {
    let spawned = std::thread::Builder::new()
        .name("stdin-shutdown".to_string())
        .spawn(move || {
            let mut line = String::new();
            match std::io::stdin().lock().read_line(&mut line) {
                Ok(0) => tracing::debug!("stdin closed, ENTER shutdown disabled"),
                Ok(_) => {
                    tracing::info!("Shutdown requested by user");
                    token.cancel();
                }
                Err(e) => tracing::warn!(error = %e, "Failed to read stdin"),
            }
        });

    if let Err(e) = spawned {
        tracing::warn!(error = %e, "Failed to start stdin listener");
    }
}

#[cfg(unix)]
async fn os_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn os_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
