use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub answer: Option<Answer>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub id: Option<i64>,
}

impl AvailabilityResponse {
    pub fn api_error(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.is_empty())
    }

    pub fn availabilities(&self) -> &[Availability] {
        self.answer
            .as_ref()
            .map_or(&[], |answer| answer.availabilities.as_slice())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Answer {
    #[serde(default)]
    pub availabilities: Vec<Availability>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub reference: String,
    #[serde(default)]
    pub display_metazones: bool,
    #[serde(default)]
    pub meta_zones: Vec<Zone>,
    #[serde(default)]
    pub zones: Vec<Zone>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    #[serde(rename = "zone")]
    pub name: String,
    pub availability: String,
}

impl Zone {
    pub fn status(&self) -> AvailabilityStatus {
        AvailabilityStatus::classify(&self.availability)
    }
}

/// Classification of a zone's opaque availability string.
///
/// Only the two sentinels below mean "cannot be ordered". Every other value,
/// including empty strings and degraded states like `"1H-low"`, counts as
/// available because the API's positive vocabulary is open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityStatus {
    Unknown,
    Unavailable,
    Available,
}

impl AvailabilityStatus {
    pub const UNKNOWN: &'static str = "unknown";
    pub const UNAVAILABLE: &'static str = "unavailable";

    pub fn classify(raw: &str) -> Self {
        match raw {
            Self::UNKNOWN => AvailabilityStatus::Unknown,
            Self::UNAVAILABLE => AvailabilityStatus::Unavailable,
            _ => AvailabilityStatus::Available,
        }
    }

    pub fn is_available(self) -> bool {
        matches!(self, AvailabilityStatus::Available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_sentinels_are_case_sensitive() {
        assert_eq!(AvailabilityStatus::classify("unknown"), AvailabilityStatus::Unknown);
        assert_eq!(
            AvailabilityStatus::classify("unavailable"),
            AvailabilityStatus::Unavailable
        );
        assert!(AvailabilityStatus::classify("Unknown").is_available());
        assert!(AvailabilityStatus::classify("UNAVAILABLE").is_available());
    }

    #[test]
    fn test_any_other_status_is_available() {
        for raw in ["high", "low", "1H-low", "72H", ""] {
            assert!(AvailabilityStatus::classify(raw).is_available(), "{raw:?}");
        }
    }

    #[test]
    fn test_full_wire_payload() {
        let json = r#"{
            "answer": {
                "availabilities": [{
                    "displayMetazones": true,
                    "reference": "150sk30",
                    "metaZones": [{"zone": "fr", "availability": "unknown"}],
                    "zones": [
                        {"zone": "gra", "availability": "unknown"},
                        {"zone": "rbx", "availability": "1H-low"}
                    ]
                }]
            },
            "version": "1.0",
            "error": null,
            "id": 42
        }"#;

        let response: AvailabilityResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.id, Some(42));
        assert!(response.api_error().is_none());

        let entry = &response.availabilities()[0];
        assert!(entry.display_metazones);
        assert_eq!(entry.meta_zones.len(), 1);
        assert_eq!(entry.zones[1].name, "rbx");
        assert!(entry.zones[1].status().is_available());
    }

    #[test]
    fn test_null_answer_has_no_availabilities() {
        let response: AvailabilityResponse =
            serde_json::from_str(r#"{"answer": null, "error": "Session expired"}"#).unwrap();

        assert!(response.availabilities().is_empty());
        assert_eq!(response.api_error(), Some("Session expired"));
    }

    #[test]
    fn test_empty_error_string_is_not_an_api_error() {
        let response: AvailabilityResponse =
            serde_json::from_str(r#"{"answer": {"availabilities": []}, "error": ""}"#).unwrap();

        assert!(response.api_error().is_none());
    }
}
