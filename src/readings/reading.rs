use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One estimated glucose value as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlucoseReading {
    #[serde(deserialize_with = "deserialize_provider_time")]
    pub system_time: DateTime<Utc>,
    /// mg/dL, exactly as reported.
    pub value: f64,
    #[serde(default, deserialize_with = "deserialize_null_as_empty")]
    pub status: String,
    #[serde(default, deserialize_with = "deserialize_optional_provider_time")]
    pub display_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub trend: Option<String>,
    #[serde(default)]
    pub trend_rate: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub record_id: Option<String>,
}

/// Readings endpoint envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct ReadingsEnvelope {
    #[serde(default)]
    pub(crate) records: Vec<GlucoseReading>,
}

/// Accepts RFC 3339 or the provider's zone-less `YYYY-MM-DDThh:mm:ss[.f]` (taken as UTC).
pub(crate) fn parse_provider_time(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn deserialize_provider_time<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_provider_time(&text)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid reading time: {text:?}")))
}

fn deserialize_null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn deserialize_optional_provider_time<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(text) => parse_provider_time(&text)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid reading time: {text:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_rfc3339_and_naive_times() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_provider_time("2024-01-01T10:00:00Z"), Some(expected));
        assert_eq!(parse_provider_time("2024-01-01T11:00:00+01:00"), Some(expected));
        assert_eq!(parse_provider_time("2024-01-01T10:00:00"), Some(expected));
        assert_eq!(parse_provider_time("2024-01-01T10:00:00.000"), Some(expected));
        assert_eq!(parse_provider_time("yesterday"), None);
    }

    #[test]
    fn envelope_keeps_provider_order_and_extra_fields() {
        let envelope: ReadingsEnvelope = serde_json::from_str(
            r#"{
                "recordType": "egv",
                "records": [
                    {"systemTime": "2024-01-01T09:55:00", "value": 104, "status": "ok",
                     "trend": "flat", "trendRate": 0.1, "unit": "mg/dL", "recordId": "a1",
                     "displayTime": "2024-01-01T10:55:00"},
                    {"systemTime": "2024-01-01T10:00:00Z", "value": 110, "status": null}
                ]
            }"#,
        )
        .unwrap_or_else(|e| panic!("decode failed: {e}"));

        assert_eq!(envelope.records.len(), 2);
        let first = &envelope.records[0];
        assert_eq!(first.value, 104.0);
        assert_eq!(first.trend.as_deref(), Some("flat"));
        assert_eq!(first.record_id.as_deref(), Some("a1"));
        assert!(first.display_time.is_some());
        assert_eq!(envelope.records[1].value, 110.0);
        assert_eq!(envelope.records[1].status, "");
        assert!(envelope.records[0].system_time < envelope.records[1].system_time);
    }

    #[test]
    fn missing_records_field_is_empty() {
        let envelope: ReadingsEnvelope = serde_json::from_str("{}").unwrap();
        assert!(envelope.records.is_empty());
    }
}
