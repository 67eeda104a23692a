use crate::core::models::AvailabilityResponse;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Failed to decode availability response ({} bytes)", .payload.len())]
pub struct DecodeError {
    #[source]
    pub source: serde_json::Error,
    pub payload: Bytes,
}

pub fn decode(payload: Bytes) -> Result<AvailabilityResponse, DecodeError> {
    let started = std::time::Instant::now();

    match serde_json::from_slice(&payload) {
        Ok(response) => {
            tracing::debug!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "API response decoded"
            );
            Ok(response)
        }
        Err(source) => Err(DecodeError { source, payload }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid_payload() {
        let payload = Bytes::from_static(
            br#"{"answer":{"availabilities":[{"reference":"150sk30","zones":[{"zone":"gra","availability":"unknown"}]}]},"error":null}"#,
        );

        let response = decode(payload).unwrap();
        assert_eq!(response.availabilities()[0].reference, "150sk30");
        assert_eq!(response.availabilities()[0].zones[0].availability, "unknown");
    }

    #[test]
    fn test_truncated_payload_keeps_bytes() {
        let payload = Bytes::from_static(br#"{"answer":{"availabilities":[{"refer"#);

        let err = decode(payload.clone()).unwrap_err();
        assert!(err.source.is_eof());
        assert_eq!(err.payload, payload);
    }

    #[test]
    fn test_type_mismatch_is_a_decode_error() {
        let payload = Bytes::from_static(br#"{"answer":{"availabilities":"none"},"error":null}"#);

        let err = decode(payload).unwrap_err();
        assert!(err.source.is_data());
    }

    #[test]
    fn test_null_zone_status_is_a_decode_error() {
        let payload = Bytes::from_static(
            br#"{"answer":{"availabilities":[{"reference":"x","zones":[{"zone":"gra","availability":null}]}]}}"#,
        );

        assert!(decode(payload).is_err());
    }

    #[test]
    fn test_non_json_payload() {
        let payload = Bytes::from_static(b"<html>502 Bad Gateway</html>");

        let err = decode(payload).unwrap_err();
        assert!(err.source.is_syntax());
        assert!(err.to_string().contains("28 bytes"));
    }
}
