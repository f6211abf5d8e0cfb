//! Wire Format Codec
//!
//! Both tracker variants ship base64-encoded UTF-8 text. The streaming
//! exercise tracker sends a single decimal calorie delta per notification;
//! the glucose tracker's read characteristic returns four comma-separated
//! fields in fixed order: glucose, calories, tag, ISO-8601 date.
//!
//! Pure and stateless. A garbled payload yields a typed error, never a
//! panic; callers decide whether that is fatal (one-shot) or a dropped
//! sample (streaming).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};

use crate::domain::models::StructuredReading;
use crate::error::CodecError;

fn decode_text(payload: &[u8]) -> Result<String, CodecError> {
    let raw = BASE64
        .decode(payload)
        .map_err(|e| CodecError::InvalidFormat(format!("bad base64: {e}")))?;
    String::from_utf8(raw).map_err(|_| CodecError::InvalidFormat("payload is not UTF-8".into()))
}

fn parse_finite(field: &str, name: &str) -> Result<f64, CodecError> {
    let value: f64 = field
        .trim()
        .parse()
        .map_err(|_| CodecError::InvalidFormat(format!("{name} field {field:?} is not a number")))?;
    if !value.is_finite() {
        return Err(CodecError::InvalidFormat(format!(
            "{name} field {field:?} is not finite"
        )));
    }
    Ok(value)
}

/// Decode one streaming notification into a calorie delta.
pub fn decode_calorie_sample(payload: &[u8]) -> Result<f64, CodecError> {
    let text = decode_text(payload)?;
    parse_finite(&text, "calorie")
}

/// Decode a glucose tracker characteristic value into a [`StructuredReading`].
///
/// Fewer than four fields is `IncompleteData`; a present but unparseable
/// numeric or date field is `InvalidFormat`. Only the first four fields
/// are consumed.
pub fn decode_structured_reading(payload: &[u8]) -> Result<StructuredReading, CodecError> {
    let text = decode_text(payload)?;
    let fields: Vec<&str> = text.split(',').collect();
    if fields.len() < 4 {
        return Err(CodecError::IncompleteData(fields.len()));
    }

    let glucose = parse_finite(fields[0], "glucose")?;
    let calories = parse_finite(fields[1], "calories")?;
    let tag = fields[2].to_string();
    let timestamp = DateTime::parse_from_rfc3339(fields[3].trim())
        .map_err(|e| CodecError::InvalidFormat(format!("date field {:?}: {e}", fields[3])))?
        .with_timezone(&Utc);

    Ok(StructuredReading {
        glucose,
        calories,
        tag,
        timestamp,
    })
}

/// Inverse of [`decode_structured_reading`]; used by the mock peripheral
/// and round-trip tests.
pub fn encode_structured_reading(reading: &StructuredReading) -> String {
    BASE64.encode(format!(
        "{},{},{},{}",
        reading.glucose,
        reading.calories,
        reading.tag,
        reading.timestamp.to_rfc3339()
    ))
}

/// Encode a single calorie delta the way the exercise tracker does.
pub fn encode_calorie_sample(value: f64) -> String {
    BASE64.encode(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn calorie_sample_round_trip() {
        let payload = encode_calorie_sample(12.5);
        assert_eq!(decode_calorie_sample(payload.as_bytes()).unwrap(), 12.5);
    }

    #[test]
    fn calorie_sample_rejects_garbage() {
        assert!(decode_calorie_sample(b"!!not-base64!!").is_err());
        let not_a_number = BASE64.encode("kcal");
        assert!(matches!(
            decode_calorie_sample(not_a_number.as_bytes()),
            Err(CodecError::InvalidFormat(_))
        ));
        let nan = BASE64.encode("NaN");
        assert!(decode_calorie_sample(nan.as_bytes()).is_err());
    }

    #[test]
    fn structured_reading_decodes_reference_payload() {
        let payload = BASE64.encode("145.2,38.0,Post-Meal,2024-03-01T08:00:00Z");
        let reading = decode_structured_reading(payload.as_bytes()).unwrap();
        assert_eq!(reading.glucose, 145.2);
        assert_eq!(reading.calories, 38.0);
        assert_eq!(reading.tag, "Post-Meal");
        assert_eq!(
            reading.timestamp,
            Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn structured_reading_round_trip() {
        let reading = StructuredReading {
            glucose: 101.0,
            calories: 24.5,
            tag: "Fasting".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 6, 12, 7, 30, 0).unwrap(),
        };
        let payload = encode_structured_reading(&reading);
        assert_eq!(
            decode_structured_reading(payload.as_bytes()).unwrap(),
            reading
        );
    }

    #[test]
    fn short_payload_is_incomplete_data() {
        let payload = BASE64.encode("145.2,38.0,Post-Meal");
        assert_eq!(
            decode_structured_reading(payload.as_bytes()),
            Err(CodecError::IncompleteData(3))
        );
    }

    #[test]
    fn non_numeric_glucose_is_invalid_format() {
        let payload = BASE64.encode("high,38.0,Post-Meal,2024-03-01T08:00:00Z");
        assert!(matches!(
            decode_structured_reading(payload.as_bytes()),
            Err(CodecError::InvalidFormat(_))
        ));
    }

    #[test]
    fn bad_date_is_invalid_format() {
        let payload = BASE64.encode("145.2,38.0,Post-Meal,yesterday");
        assert!(matches!(
            decode_structured_reading(payload.as_bytes()),
            Err(CodecError::InvalidFormat(_))
        ));
    }
}
