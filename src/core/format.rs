// Data structures shared by the SPBXDS and text decoders

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Device-level fields from the container metadata block.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeviceInfo {
    pub model: Option<String>,
    pub identification: Option<String>,
}

/// Metadata for a single channel.
///
/// The fields the pipeline needs are lifted into typed members; every key the
/// firmware emitted is also kept verbatim in `raw`, in declared order, so the
/// host can display fields this reader has never heard of.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChannelMetadata {
    pub name: String,
    pub available: bool,
    pub reference_zero: Option<i64>,
    pub voltage_rate: Option<String>,
    pub probe_magnification: Option<String>,
    pub raw: serde_json::Map<String, Value>,
}

impl ChannelMetadata {
    /// Raw metadata value rendered for display (strings unquoted, everything
    /// else as JSON text).
    pub fn raw_str(&self, key: &str) -> Option<String> {
        self.raw.get(key).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// `Voltage_Rate` with its unit suffix stripped, e.g. "0.78125mv" -> 0.78125.
    pub fn voltage_rate_value(&self) -> Option<f64> {
        self.voltage_rate.as_deref().and_then(decimal_prefix)
    }

    /// `Probe_Magnification` with its multiplier suffix stripped, e.g. "10X" -> 10.0.
    pub fn probe_factor(&self) -> Option<f64> {
        self.probe_magnification.as_deref().and_then(decimal_prefix)
    }

    /// Sampling interval string, wherever the source format put it. The binary
    /// container uses `Time_Interval`, the text export `Time interval`.
    pub fn time_interval(&self) -> Option<String> {
        self.raw_str("Time_Interval")
            .or_else(|| self.raw_str("Time interval"))
    }
}

/// Leading decimal in a firmware value string, ignoring whatever suffix
/// ("mv", "X", "uS") the firmware appended.
pub(crate) fn decimal_prefix(s: &str) -> Option<f64> {
    let t = s.trim();
    let end = t
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '+' || c == '-'))
        .unwrap_or(t.len());
    t[..end].parse().ok()
}

/// Calibrated voltage arrays for every channel of one capture.
///
/// All arrays share one index range; shorter channels are NaN-padded up to the
/// longest during assembly. Never mutated after the parse returns.
#[derive(Debug, Clone, Default)]
pub struct SampleTable {
    pub indices: Vec<i64>,
    pub channel_names: Vec<String>,
    pub channel_data: HashMap<String, Vec<f64>>,
}

impl SampleTable {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn channel(&self, name: &str) -> Option<&[f64]> {
        self.channel_data.get(name).map(Vec::as_slice)
    }

    /// Pad every array with trailing NaN to the longest channel's length and
    /// regenerate `indices` as 0..max. Used by the binary path, where channels
    /// may decode different sample counts.
    pub fn pad_to_uniform(&mut self) {
        let max_len = self
            .channel_data
            .values()
            .map(Vec::len)
            .max()
            .unwrap_or(0);

        for data in self.channel_data.values_mut() {
            data.resize(max_len, f64::NAN);
        }
        self.indices = (0..max_len as i64).collect();
    }
}

/// Aggregated non-fatal problem counts from one parse. Fatal problems surface
/// as `ScopeError` instead; these are reported once as a summary.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ParseReport {
    /// Calibration fields that did not parse and fell back to defaults.
    pub calibration_fallbacks: u32,
    /// Channels whose declared data length ran past the end of the buffer.
    pub truncated_channels: u32,
    /// Text rows dropped because they were short or failed numeric parse.
    pub bad_rows: u32,
}

impl ParseReport {
    pub fn has_warnings(&self) -> bool {
        self.calibration_fallbacks > 0 || self.truncated_channels > 0 || self.bad_rows > 0
    }
}

impl fmt::Display for ParseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} calibration fallback(s), {} truncated channel(s), {} bad row(s)",
            self.calibration_fallbacks, self.truncated_channels, self.bad_rows
        )
    }
}

/// One fully-decoded capture file, whichever format it came from.
#[derive(Debug, Clone, Default)]
pub struct Capture {
    pub device: DeviceInfo,
    pub channels: Vec<ChannelMetadata>,
    pub data: SampleTable,
    pub report: ParseReport,
}

impl Capture {
    pub fn channel_names(&self) -> &[String] {
        &self.data.channel_names
    }

    pub fn channel_metadata(&self, name: &str) -> Option<&ChannelMetadata> {
        self.channels.iter().find(|ch| ch.name == name)
    }

    pub fn samples(&self, name: &str) -> Option<&[f64]> {
        self.data.channel(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_prefix() {
        assert_eq!(decimal_prefix("0.78125mv"), Some(0.78125));
        assert_eq!(decimal_prefix("10X"), Some(10.0));
        assert_eq!(decimal_prefix("  2.5 V  "), Some(2.5));
        assert_eq!(decimal_prefix("-12mV"), Some(-12.0));
        assert_eq!(decimal_prefix("garbage"), None);
        assert_eq!(decimal_prefix(""), None);
    }

    #[test]
    fn test_pad_to_uniform() {
        let mut table = SampleTable {
            indices: Vec::new(),
            channel_names: vec!["CH1".to_string(), "CH2".to_string()],
            channel_data: HashMap::from([
                ("CH1".to_string(), vec![1.0, 2.0, 3.0]),
                ("CH2".to_string(), vec![4.0]),
            ]),
        };
        table.pad_to_uniform();

        assert_eq!(table.len(), 3);
        assert_eq!(table.channel("CH1").unwrap().len(), 3);
        let ch2 = table.channel("CH2").unwrap();
        assert_eq!(ch2.len(), 3);
        assert_eq!(ch2[0], 4.0);
        assert!(ch2[1].is_nan() && ch2[2].is_nan());
        assert_eq!(table.indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_raw_str_rendering() {
        let mut raw = serde_json::Map::new();
        raw.insert("Vscale".to_string(), Value::String("500mv".to_string()));
        raw.insert("Storage_Depth".to_string(), Value::from(4096));
        let ch = ChannelMetadata {
            name: "CH1".to_string(),
            raw,
            ..Default::default()
        };

        assert_eq!(ch.raw_str("Vscale").as_deref(), Some("500mv"));
        assert_eq!(ch.raw_str("Storage_Depth").as_deref(), Some("4096"));
        assert_eq!(ch.raw_str("missing"), None);
    }
}
