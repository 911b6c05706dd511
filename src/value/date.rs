//! Tagged date values
//!
//! JSON has no date type, so dates travel as `{"$$date": <epoch millis>}`.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde_json::{json, Value};

/// Key of the single field in a tagged date object
pub const DATE_TAG: &str = "$$date";

/// Encode a timestamp as a tagged date value
pub fn date_value(date: DateTime<Utc>) -> Value {
    json!({ DATE_TAG: date.timestamp_millis() })
}

/// Decode a tagged date value.
///
/// Returns None for anything that is not exactly `{"$$date": <integer>}`.
pub fn as_date(value: &Value) -> Option<DateTime<Utc>> {
    let map = value.as_object()?;
    if map.len() != 1 {
        return None;
    }
    let millis = map.get(DATE_TAG)?.as_i64()?;
    Utc.timestamp_millis_opt(millis).single()
}

/// Canonical string form of a date, used for group identity
pub(crate) fn canonical_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}
