// Watermark validation
//
// Accepts the positional overlay description [url, position, scale, opacity] as
// a JSON array, an object keyed by slot index ("0".."3") or by field name, or a
// string holding any of those serialized. All-or-nothing: a single bad slot
// rejects the whole watermark.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::errors::{ValidationError, WatermarkError};
use super::models::{WatermarkAnchor, WatermarkNumber, WatermarkPosition, WatermarkSpec};

const SLOTS: [&str; 4] = ["url", "position", "scale", "opacity"];

lazy_static! {
    static ref OFFSET_RE: Regex = Regex::new(r"^(\d{1,4}):(\d{1,4})$").unwrap();
}

/// Validator for the optional overlay attached to a request.
pub struct WatermarkValidator;

impl WatermarkValidator {
    /// Validate a structured watermark value.
    pub fn validate(input: &Value) -> Result<WatermarkSpec, ValidationError> {
        Self::validate_fields(input).map_err(|e| ValidationError::watermark(input.to_string(), e))
    }

    /// Validate a serialized watermark (JSON array or object).
    pub fn validate_str(input: &str) -> Result<WatermarkSpec, ValidationError> {
        let value: Value = serde_json::from_str(input).map_err(|e| {
            ValidationError::watermark(input, WatermarkError::Malformed(e.to_string()))
        })?;
        Self::validate_fields(&value).map_err(|e| ValidationError::watermark(input, e))
    }

    fn validate_fields(input: &Value) -> Result<WatermarkSpec, WatermarkError> {
        let [url, position, scale, opacity] = Self::slots(input)?;

        let url = Self::parse_url(url)?;
        let position = match position {
            None | Some(Value::Null) => WatermarkPosition::default(),
            Some(value) => Self::parse_position(value)?,
        };
        let scale = match scale {
            None | Some(Value::Null) => None,
            Some(value) => Some(
                Self::number(value)
                    .filter(|s| s.value() > 0.0)
                    .ok_or_else(|| WatermarkError::InvalidScale(Self::text(value)))?,
            ),
        };
        let opacity = match opacity {
            None | Some(Value::Null) => None,
            Some(value) => Some(
                Self::number(value)
                    .filter(|o| (0.0..=1.0).contains(&o.value()))
                    .ok_or_else(|| WatermarkError::InvalidOpacity(Self::text(value)))?,
            ),
        };

        Ok(WatermarkSpec {
            url,
            position,
            scale,
            opacity,
        })
    }

    /// Map positional slots to named fields.
    fn slots(input: &Value) -> Result<[Option<&Value>; 4], WatermarkError> {
        let mut slots: [Option<&Value>; 4] = [None; 4];
        match input {
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    match slots.get_mut(index) {
                        Some(slot) => *slot = Some(item),
                        None => debug!(index, "ignoring extra watermark slot"),
                    }
                }
            }
            Value::Object(map) => {
                for (key, item) in map {
                    let index = key
                        .parse::<usize>()
                        .ok()
                        .or_else(|| SLOTS.iter().position(|name| name == key));
                    match index.and_then(|i| slots.get_mut(i)) {
                        Some(slot) => *slot = Some(item),
                        None => debug!(key = %key, "ignoring unknown watermark slot"),
                    }
                }
            }
            _ => return Err(WatermarkError::UnexpectedShape),
        }
        Ok(slots)
    }

    fn parse_url(value: Option<&Value>) -> Result<String, WatermarkError> {
        let raw = match value {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim(),
            None | Some(Value::Null) => return Err(WatermarkError::Missing("url")),
            Some(Value::String(_)) => return Err(WatermarkError::Missing("url")),
            Some(other) => return Err(WatermarkError::InvalidUrl(other.to_string())),
        };

        let parsed = Url::parse(raw).map_err(|_| WatermarkError::InvalidUrl(raw.to_string()))?;
        let scheme_ok = matches!(parsed.scheme(), "http" | "https" | "ftp");
        if !scheme_ok || parsed.host_str().is_none() {
            return Err(WatermarkError::InvalidUrl(raw.to_string()));
        }
        Ok(raw.to_string())
    }

    fn parse_position(value: &Value) -> Result<WatermarkPosition, WatermarkError> {
        let Value::String(raw) = value else {
            return Err(WatermarkError::InvalidPosition(value.to_string()));
        };

        if let Ok(anchor) = raw.parse::<WatermarkAnchor>() {
            return Ok(WatermarkPosition::Anchor(anchor));
        }

        let captures = OFFSET_RE
            .captures(raw)
            .ok_or_else(|| WatermarkError::InvalidPosition(raw.clone()))?;
        let x = captures[1]
            .parse()
            .map_err(|_| WatermarkError::InvalidPosition(raw.clone()))?;
        let y = captures[2]
            .parse()
            .map_err(|_| WatermarkError::InvalidPosition(raw.clone()))?;
        Ok(WatermarkPosition::Offset {
            x,
            y,
            raw: raw.clone(),
        })
    }

    /// Numbers may arrive as JSON numbers or numeric strings; the input is kept as is.
    fn number(value: &Value) -> Option<WatermarkNumber> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|n| n.is_finite())
        .map(|n| WatermarkNumber::new(n, value.clone()))
    }

    fn text(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_named_watermark_validates() {
        let spec = WatermarkValidator::validate(&json!({
            "url": "https://x/a.png",
            "position": "center",
            "scale": 1.5,
            "opacity": 0.5
        }))
        .unwrap();

        assert_eq!(spec.url, "https://x/a.png");
        assert_eq!(spec.position, WatermarkPosition::Anchor(WatermarkAnchor::Center));
        assert_eq!(spec.scale.as_ref().map(WatermarkNumber::value), Some(1.5));
        assert_eq!(spec.opacity.as_ref().map(WatermarkNumber::value), Some(0.5));
    }

    #[test]
    fn test_positional_forms_agree() {
        let from_array =
            WatermarkValidator::validate(&json!(["https://x/a.png", "10:20", "2", 1])).unwrap();
        let from_indexed = WatermarkValidator::validate_str(
            r#"{"0":"https://x/a.png","1":"10:20","2":"2","3":1}"#,
        )
        .unwrap();

        assert_eq!(from_array, from_indexed);
        assert_eq!(
            from_array.position,
            WatermarkPosition::Offset {
                x: 10,
                y: 20,
                raw: "10:20".into()
            }
        );
        assert_eq!(from_array.scale.as_ref().map(WatermarkNumber::value), Some(2.0));
        assert_eq!(from_array.opacity.as_ref().map(WatermarkNumber::value), Some(1.0));
    }

    #[test]
    fn test_defaults_applied() {
        let spec = WatermarkValidator::validate(&json!(["https://x/a.png"])).unwrap();
        assert_eq!(spec.position, WatermarkPosition::Anchor(WatermarkAnchor::TopLeft));
        assert_eq!(spec.scale, None);
        assert_eq!(spec.opacity, None);
    }

    #[test]
    fn test_serializes_values_as_supplied() {
        let input = json!({
            "url": "https://x/a.png",
            "position": "0010:0020",
            "scale": "1.50",
            "opacity": 0.25
        });
        let spec = WatermarkValidator::validate(&input).unwrap();

        assert!(matches!(spec.position, WatermarkPosition::Offset { x: 10, y: 20, .. }));
        assert_eq!(spec.scale.as_ref().map(WatermarkNumber::value), Some(1.5));
        assert_eq!(serde_json::to_value(&spec).unwrap(), input);
    }

    #[test]
    fn test_url_required() {
        let err = WatermarkValidator::validate(&json!({"position": "9999:9999"})).unwrap_err();
        assert_eq!(err.field, "watermark");
        assert_eq!(err.cause, Some(WatermarkError::Missing("url")));

        let err = WatermarkValidator::validate(&json!({"url": "not-a-url"})).unwrap_err();
        assert!(matches!(err.cause, Some(WatermarkError::InvalidUrl(_))));
    }

    #[test]
    fn test_invalid_slots_reject_whole_watermark() {
        let cases = [
            (json!(["https://x/a.png", "middle"]), "position"),
            (json!(["https://x/a.png", "12345:1"]), "position"),
            (json!(["https://x/a.png", "center", 0]), "scale"),
            (json!(["https://x/a.png", "center", -1.0]), "scale"),
            (json!(["https://x/a.png", "center", 1, 1.5]), "opacity"),
            (json!(["https://x/a.png", "center", 1, "abc"]), "opacity"),
        ];

        for (input, slot) in cases {
            let err = WatermarkValidator::validate(&input).unwrap_err();
            let cause = err.cause.expect("field error should be embedded");
            let matched = match slot {
                "position" => matches!(cause, WatermarkError::InvalidPosition(_)),
                "scale" => matches!(cause, WatermarkError::InvalidScale(_)),
                _ => matches!(cause, WatermarkError::InvalidOpacity(_)),
            };
            assert!(matched, "{} should fail on {}", input, slot);
        }
    }

    #[test]
    fn test_malformed_serialized_form() {
        let err = WatermarkValidator::validate_str("[not json").unwrap_err();
        assert!(matches!(err.cause, Some(WatermarkError::Malformed(_))));

        let err = WatermarkValidator::validate_str("\"https://x/a.png\"").unwrap_err();
        assert_eq!(err.cause, Some(WatermarkError::UnexpectedShape));
    }
}
