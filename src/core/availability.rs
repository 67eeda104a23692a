use crate::core::models::{AvailabilityResponse, Zone};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    #[error("API returned an error: {0}")]
    ApiReported(String),

    #[error("SKU {sku} matched {matches} availability entries, expected exactly one")]
    SkuNotUniquelyIdentified { sku: String, matches: usize },
}

/// Zones of the target SKU whose status signals real availability.
#[derive(Debug)]
pub struct Evaluation<'a> {
    pub zones: Vec<&'a Zone>,
}

impl Evaluation<'_> {
    pub fn is_available(&self) -> bool {
        !self.zones.is_empty()
    }

    pub fn zone_names(&self) -> Vec<String> {
        self.zones.iter().map(|z| z.name.clone()).collect()
    }
}

pub fn evaluate<'a>(
    response: &'a AvailabilityResponse,
    sku: &str,
) -> Result<Evaluation<'a>, EvaluationError> {
    if let Some(message) = response.api_error() {
        return Err(EvaluationError::ApiReported(message.to_string()));
    }

    let matching: Vec<_> = response
        .availabilities()
        .iter()
        .filter(|entry| entry.reference == sku)
        .collect();

    let [entry] = matching[..] else {
        return Err(EvaluationError::SkuNotUniquelyIdentified {
            sku: sku.to_string(),
            matches: matching.len(),
        });
    };

    let zones = entry
        .zones
        .iter()
        .filter(|zone| zone.status().is_available())
        .collect();

    Ok(Evaluation { zones })
}
