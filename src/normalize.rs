use crate::model::{Play, RawEntry};
use serde_json::Value;

const TIMESTAMP_KEY: &str = "ts";
const MS_PLAYED_KEY: &str = "ms_played";
const TRACK_URI_KEY: &str = "spotify_track_uri";
const TRACK_NAME_KEY: &str = "master_metadata_track_name";
const ARTIST_NAME_KEY: &str = "master_metadata_album_artist_name";
const ALBUM_NAME_KEY: &str = "master_metadata_album_album_name";

/// Returns `None` only when the entry has no usable timestamp. Every other field falls back to a
/// default instead of failing.
pub fn normalize(raw: &RawEntry, source: &str, ordinal: usize) -> Option<Play> {
    let timestamp = raw
        .get(TIMESTAMP_KEY)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|ts| !ts.is_empty())?
        .to_string();

    Some(Play {
        id: format!("{timestamp}-{ordinal}"),
        ms_played: coerce_ms(raw.get(MS_PLAYED_KEY)),
        track_name: coerce_text(raw.get(TRACK_NAME_KEY)),
        artist_name: coerce_text(raw.get(ARTIST_NAME_KEY)),
        album_name: coerce_text(raw.get(ALBUM_NAME_KEY)),
        track_uri: coerce_text(raw.get(TRACK_URI_KEY)),
        source: source.to_string(),
        timestamp,
    })
}

pub fn normalize_value(value: &Value, source: &str, ordinal: usize) -> Option<Play> {
    value
        .as_object()
        .and_then(|raw| normalize(raw, source, ordinal))
}

fn coerce_ms(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(number)) => number
            .as_u64()
            .or_else(|| number.as_f64().map(float_to_ms))
            .unwrap_or(0),
        Some(Value::String(text)) => text
            .trim()
            .parse::<f64>()
            .map(float_to_ms)
            .unwrap_or(0),
        Some(Value::Bool(flag)) => u64::from(*flag),
        _ => 0,
    }
}

fn float_to_ms(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.floor() as u64
    } else {
        0
    }
}

fn coerce_text(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text.clone()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    }
}
