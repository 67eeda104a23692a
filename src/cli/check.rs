use crate::core::settings::Settings;
use crate::daemon::{self, PollOutcome};
use crate::notifications::Dispatcher;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Serialize)]
struct CheckOutput {
    sku: String,
    status: &'static str,
    available: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    zones: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(with = "chrono::serde::ts_seconds")]
    checked_at: DateTime<Utc>,
}

/// Polls once without notifying anyone.
pub async fn run(settings: &Settings, json: bool) -> Result<()> {
    let pipeline = daemon::build_pipeline(settings, Dispatcher::default())?;
    let outcome = pipeline.poll(&CancellationToken::new()).await;
    let output = to_output(&settings.api.sku, outcome);

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_text_output(&output);
    }

    Ok(())
}

fn to_output(sku: &str, outcome: PollOutcome) -> CheckOutput {
    let available = outcome.is_available();
    let (status, zones, error) = match outcome {
        PollOutcome::Evaluated { zones, .. } => {
            let status = if available { "available" } else { "unavailable" };
            (status, zones, None)
        }
        PollOutcome::TransportFailure(e) => ("transport-failure", Vec::new(), Some(e.to_string())),
        PollOutcome::DecodeFailure(e) => ("decode-failure", Vec::new(), Some(e.to_string())),
        PollOutcome::ApiError(message) => ("api-error", Vec::new(), Some(message)),
        PollOutcome::SkuNotUniquelyIdentified { matches } => (
            "sku-not-unique",
            Vec::new(),
            Some(format!("SKU matched {matches} entries")),
        ),
    };

    CheckOutput {
        sku: sku.to_string(),
        status,
        available: error.is_none().then_some(available),
        zones,
        error,
        checked_at: Utc::now(),
    }
}

fn print_text_output(output: &CheckOutput) {
    println!("{}", output.sku);

    if let Some(error) = &output.error {
        println!("  Error ({}): {}", output.status, error);
        return;
    }

    match output.available {
        Some(true) => println!("  Available in: {}", output.zones.join(", ")),
        _ => println!("  Not available"),
    }
}
