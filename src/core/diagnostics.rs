use std::error::Error;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Writes payloads that failed to decode next to a correlation id that also
/// appears in the log line.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    capture_dir: Option<PathBuf>,
}

impl Diagnostics {
    pub fn new(capture_dir: Option<PathBuf>) -> Self {
        Self { capture_dir }
    }

    #[cfg(test)]
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn capture_dir(&self) -> Option<&Path> {
        self.capture_dir.as_deref()
    }

    pub fn capture_payload(&self, correlation_id: Uuid, payload: &[u8]) -> Option<PathBuf> {
        let dir = self.capture_dir.as_ref()?;
        let path = dir.join(format!("{correlation_id}.json"));

        let written = std::fs::create_dir_all(dir).and_then(|()| std::fs::write(&path, payload));
        match written {
            Ok(()) => {
                tracing::debug!(?path, bytes = payload.len(), "Captured undecodable payload");
                Some(path)
            }
            Err(e) => {
                tracing::warn!(?path, error = %e, "Failed to capture undecodable payload");
                None
            }
        }
    }
}

/// Renders an error and every `source()` below it, one per line.
pub fn error_chain(error: &dyn Error) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();

    while let Some(cause) = source {
        let _ = write!(rendered, "\n  caused by: {cause}");
        source = cause.source();
    }

    rendered
}

/// Logs a fault that no component classified and returns the id quoted in the log.
pub fn report_fault(context: &str, error: &dyn Error) -> Uuid {
    let correlation_id = Uuid::new_v4();

    tracing::error!(
        %correlation_id,
        occurred_at = %chrono::Utc::now().to_rfc3339(),
        chain = %error_chain(error),
        "Unhandled fault: {context}"
    );

    correlation_id
}
