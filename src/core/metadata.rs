// Resilient decode of the embedded JSON metadata block
//
// The scope firmware NUL-pads the block and routinely emits trailing commas
// before a closing brace or bracket. Recovery is bounded to two stages by
// contract: (1) comma repair + parse, (2) truncate at the last closing brace,
// re-repair, parse. Whatever still fails is reported as corrupt.

use serde_json::Value;
use tracing::{debug, warn};

use crate::core::constants::{
    AVAILABILITY_TRUE, KEY_AVAILABILITY, KEY_CHANNEL_LIST, KEY_IDN, KEY_INDEX, KEY_MODEL,
    KEY_PROBE_MAGNIFICATION, KEY_REFERENCE_ZERO, KEY_VOLTAGE_RATE,
};
use crate::core::error::{Result, ScopeError};
use crate::core::format::{ChannelMetadata, DeviceInfo};

/// Decode the raw metadata block into device fields and the ordered channel
/// list. `raw` is the `L`-byte slice following the container header.
pub fn decode_metadata(raw: &[u8]) -> Result<(DeviceInfo, Vec<ChannelMetadata>)> {
    let text = String::from_utf8_lossy(raw).replace('\u{FFFD}', "");
    let text = text.trim_end_matches('\0');

    let root = parse_with_recovery(text)?;
    let root = match root {
        Value::Object(map) => map,
        other => {
            return Err(ScopeError::MetadataShape(format!(
                "expected top-level object, got {}",
                json_kind(&other)
            )))
        }
    };

    let device = DeviceInfo {
        model: root.get(KEY_MODEL).and_then(value_string),
        identification: root.get(KEY_IDN).and_then(value_string),
    };

    let mut channels = Vec::new();
    match root.get(KEY_CHANNEL_LIST) {
        None => {}
        Some(Value::Array(entries)) => {
            for (i, entry) in entries.iter().enumerate() {
                let obj = match entry {
                    Value::Object(obj) => obj,
                    other => {
                        warn!("channel entry {} is {}, skipping", i, json_kind(other));
                        continue;
                    }
                };

                let name = obj
                    .get(KEY_INDEX)
                    .and_then(value_string)
                    .unwrap_or_else(|| format!("CH{}", i + 1));
                let available = obj
                    .get(KEY_AVAILABILITY)
                    .and_then(value_string)
                    .map(|flag| flag == AVAILABILITY_TRUE)
                    .unwrap_or(false);

                channels.push(ChannelMetadata {
                    name,
                    available,
                    reference_zero: obj.get(KEY_REFERENCE_ZERO).and_then(value_i64),
                    voltage_rate: obj.get(KEY_VOLTAGE_RATE).and_then(value_string),
                    probe_magnification: obj.get(KEY_PROBE_MAGNIFICATION).and_then(value_string),
                    raw: obj.clone(),
                });
            }
        }
        Some(other) => {
            return Err(ScopeError::MetadataShape(format!(
                "'{}' is {}, expected array",
                KEY_CHANNEL_LIST,
                json_kind(other)
            )))
        }
    }

    Ok((device, channels))
}

/// Two-stage parse: comma repair first, brace truncation second. No further
/// attempts after that.
fn parse_with_recovery(text: &str) -> Result<Value> {
    let repaired = strip_trailing_commas(text);
    let first_err = match serde_json::from_str(&repaired) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    debug!(
        "metadata parse failed ({}), retrying after brace truncation",
        first_err
    );

    let last_brace = repaired
        .rfind('}')
        .ok_or_else(|| ScopeError::MetadataCorrupt("no closing brace in block".to_string()))?;
    let truncated = strip_trailing_commas(&repaired[..=last_brace]);

    serde_json::from_str(&truncated).map_err(|e| ScopeError::MetadataCorrupt(e.to_string()))
}

/// Drop every comma whose next non-whitespace character closes an object or
/// array. This is the firmware defect the recovery exists for.
fn strip_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.char_indices() {
        if c == ',' {
            let rest = text[i + 1..].trim_start();
            if rest.starts_with('}') || rest.starts_with(']') {
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn value_string(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn value_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
