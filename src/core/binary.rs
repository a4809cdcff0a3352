// SPBXDS container decode
//
// Layout: MAGIC(6), metadata length L (u32 LE), L bytes of JSON, then one
// block per channel in metadata-declared order: data length D (u32 LE)
// followed by D bytes of big-endian u16 samples. A block occupies 4 + D
// bytes whether or not the channel is available, so offsets are computed
// sequentially over all channels before any decoding starts.

use rayon::prelude::*;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

use crate::core::constants::{
    ADC_SCALE, CHANNEL_LEN_SIZE, FALLBACK_PROBE_MAGNIFICATION, FALLBACK_REFERENCE_OFFSET,
    FALLBACK_VOLTAGE_RATE, HEADER_SIZE, MAGIC, MILLIVOLTS_PER_VOLT, PROGRESS_CONVERSION,
    PROGRESS_DATA_END, PROGRESS_DATA_START, PROGRESS_METADATA_DONE, PROGRESS_METADATA_START,
    REFERENCE_MODULUS,
};
use crate::core::error::{Result, ScopeError};
use crate::core::format::{Capture, ChannelMetadata, ParseReport, SampleTable};
use crate::core::metadata::decode_metadata;
use crate::core::progress::ProgressSink;

/// Cheap sniff used for format routing before a full parse.
pub fn looks_like_container(bytes: &[u8]) -> bool {
    bytes.starts_with(MAGIC)
}

/// Decode a complete SPBXDS buffer into a `Capture`.
///
/// Fatal problems (bad signature, metadata length past the buffer, metadata
/// beyond repair) return an error with no partial result. Per-channel problems
/// degrade that channel only and are tallied in the capture's `ParseReport`.
pub fn parse_capture(bytes: &[u8], progress: &ProgressSink<'_>) -> Result<Capture> {
    progress.emit(PROGRESS_METADATA_START, "Reading container header");
    let meta_len = read_header(bytes)?;

    let (device, channels) = decode_metadata(&bytes[HEADER_SIZE..HEADER_SIZE + meta_len])?;
    progress.emit(PROGRESS_METADATA_DONE, "Metadata decoded");
    debug!(
        "container: model {:?}, {} channel(s), {} byte metadata block",
        device.model,
        channels.len(),
        meta_len
    );

    let mut report = ParseReport::default();
    let blocks = layout_blocks(bytes, HEADER_SIZE + meta_len, &channels, &mut report);

    progress.emit(PROGRESS_DATA_START, "Decoding channel data");
    let decoded = decode_blocks(bytes, &channels, &blocks, progress);

    let mut table = SampleTable::default();
    for outcome in decoded {
        report.calibration_fallbacks += outcome.calibration_fallbacks;
        table.channel_names.push(outcome.name.clone());
        table.channel_data.insert(outcome.name, outcome.samples);
    }

    progress.emit(PROGRESS_CONVERSION, "Assembling sample table");
    table.pad_to_uniform();

    if report.has_warnings() {
        warn!("capture decoded with {}", report);
    }

    Ok(Capture {
        device,
        channels,
        data: table,
        report,
    })
}

/// Validate the signature and return the metadata block length.
pub(crate) fn read_header(bytes: &[u8]) -> Result<usize> {
    if !bytes.starts_with(MAGIC) {
        let got = bytes.get(..MAGIC.len()).unwrap_or(bytes).to_vec();
        return Err(ScopeError::InvalidMagic {
            expected: MAGIC.to_vec(),
            got,
        });
    }

    let meta_len = read_u32_le(bytes, MAGIC.len()).ok_or(ScopeError::Truncated {
        offset: MAGIC.len(),
        needed: CHANNEL_LEN_SIZE,
        available: bytes.len().saturating_sub(MAGIC.len()),
    })? as usize;

    match HEADER_SIZE.checked_add(meta_len) {
        Some(end) if end <= bytes.len() => Ok(meta_len),
        _ => Err(ScopeError::Truncated {
            offset: HEADER_SIZE,
            needed: meta_len,
            available: bytes.len().saturating_sub(HEADER_SIZE),
        }),
    }
}

struct ChannelBlock {
    data: Range<usize>,
}

/// Sequential pass over the per-channel blocks. Each channel's offset depends
/// on the previous channel's declared length, so this cannot be parallelized;
/// it is cheap because no sample data is touched. Declared lengths running
/// past the buffer clip the affected channel and are counted, not fatal.
fn layout_blocks(
    bytes: &[u8],
    mut offset: usize,
    channels: &[ChannelMetadata],
    report: &mut ParseReport,
) -> Vec<ChannelBlock> {
    let mut blocks = Vec::with_capacity(channels.len());
    for ch in channels {
        let declared = match read_u32_le(bytes, offset) {
            Some(d) => d as usize,
            None => {
                if ch.available {
                    warn!("channel {}: length field past end of buffer", ch.name);
                    report.truncated_channels += 1;
                }
                blocks.push(ChannelBlock {
                    data: bytes.len()..bytes.len(),
                });
                offset = offset.saturating_add(CHANNEL_LEN_SIZE);
                continue;
            }
        };

        let start = offset + CHANNEL_LEN_SIZE;
        let declared_end = start.saturating_add(declared);
        let end = declared_end.min(bytes.len());
        if declared_end > bytes.len() && ch.available {
            warn!(
                "channel {}: declared {} data bytes, only {} available, clipping",
                ch.name,
                declared,
                end - start.min(end)
            );
            report.truncated_channels += 1;
        }
        blocks.push(ChannelBlock {
            data: start.min(end)..end,
        });
        // the block is consumed in full even when the buffer ends early
        offset = declared_end;
    }
    blocks
}

struct ChannelOutcome {
    name: String,
    samples: Vec<f64>,
    calibration_fallbacks: u32,
}

/// Fan the available channels out over the worker pool. Each task reads its
/// own slice of the shared buffer and writes its own output, so the only
/// synchronization is inside the progress sink. Results come back in declared
/// channel order regardless of completion order.
fn decode_blocks(
    bytes: &[u8],
    channels: &[ChannelMetadata],
    blocks: &[ChannelBlock],
    progress: &ProgressSink<'_>,
) -> Vec<ChannelOutcome> {
    let work: Vec<(usize, &ChannelMetadata)> = channels
        .iter()
        .enumerate()
        .filter(|(_, ch)| ch.available)
        .collect();
    let total = work.len();
    let done = AtomicUsize::new(0);
    let span = (PROGRESS_DATA_END - PROGRESS_DATA_START) as usize;

    work.par_iter()
        .map(|&(i, ch)| {
            let outcome = decode_channel(&bytes[blocks[i].data.clone()], ch);
            let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
            let percent = PROGRESS_DATA_START as usize + span * finished / total;
            progress.emit(percent as u8, &format!("Decoded channel {}", ch.name));
            outcome
        })
        .collect()
}

/// Convert one channel's raw bytes to calibrated volts. The calibration is
/// constant across the channel, so the conversion is a single pass with one
/// subtract and one multiply per sample. A trailing odd byte is ignored.
fn decode_channel(raw: &[u8], meta: &ChannelMetadata) -> ChannelOutcome {
    let calib = Calibration::resolve(meta);
    let samples: Vec<f64> = raw
        .chunks_exact(2)
        .map(|pair| {
            let sample = f64::from(u16::from_be_bytes([pair[0], pair[1]]));
            (sample - calib.offset) * calib.factor
        })
        .collect();
    debug!("channel {}: {} samples", meta.name, samples.len());
    ChannelOutcome {
        name: meta.name.clone(),
        samples,
        calibration_fallbacks: calib.fallbacks,
    }
}

/// Per-channel conversion parameters folded into one multiplier:
/// volts = (raw - offset) * factor, where offset = (Reference_Zero / 2) mod 256
/// and factor = Voltage_Rate * 256 * Probe_Magnification / 1000.
struct Calibration {
    offset: f64,
    factor: f64,
    fallbacks: u32,
}

impl Calibration {
    fn resolve(meta: &ChannelMetadata) -> Self {
        let mut fallbacks = 0;

        let offset = match meta.reference_zero {
            Some(zero) => (zero as f64 / 2.0).rem_euclid(REFERENCE_MODULUS as f64),
            None => {
                warn!(
                    "channel {}: Reference_Zero unusable, offset falls back to {}",
                    meta.name, FALLBACK_REFERENCE_OFFSET
                );
                fallbacks += 1;
                FALLBACK_REFERENCE_OFFSET
            }
        };

        let rate = match meta.voltage_rate_value() {
            Some(v) => v,
            None => {
                warn!(
                    "channel {}: Voltage_Rate {:?} unusable, using {}",
                    meta.name, meta.voltage_rate, FALLBACK_VOLTAGE_RATE
                );
                fallbacks += 1;
                FALLBACK_VOLTAGE_RATE
            }
        };

        let probe = match meta.probe_factor() {
            Some(v) => v,
            None => {
                warn!(
                    "channel {}: Probe_Magnification {:?} unusable, using {}",
                    meta.name, meta.probe_magnification, FALLBACK_PROBE_MAGNIFICATION
                );
                fallbacks += 1;
                FALLBACK_PROBE_MAGNIFICATION
            }
        };

        Calibration {
            offset,
            factor: rate * ADC_SCALE * probe / MILLIVOLTS_PER_VOLT,
            fallbacks,
        }
    }
}

fn read_u32_le(bytes: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(CHANNEL_LEN_SIZE)?;
    let slice = bytes.get(offset..end)?;
    Some(u32::from_le_bytes(slice.try_into().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn build_container(metadata: &str, blocks: &[&[u16]]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&(metadata.len() as u32).to_le_bytes());
        buf.extend_from_slice(metadata.as_bytes());
        for samples in blocks {
            buf.extend_from_slice(&((samples.len() * 2) as u32).to_le_bytes());
            for &s in *samples {
                buf.extend_from_slice(&s.to_be_bytes());
            }
        }
        buf
    }

    fn channel_entry(name: &str, available: bool, reference_zero: i64) -> String {
        format!(
            r#"{{"Index": "{}", "Availability_Flag": "{}", "Reference_Zero": {},
                "Voltage_Rate": "0.5mv", "Probe_Magnification": "10X"}}"#,
            name,
            if available { "TRUE" } else { "FALSE" },
            reference_zero
        )
    }

    #[test]
    fn test_bad_magic_rejected() {
        let err = parse_capture(b"NOTSPB\x00\x00\x00\x00", &ProgressSink::ignore()).unwrap_err();
        assert!(matches!(err, ScopeError::InvalidMagic { .. }));
        let err = parse_capture(b"SP", &ProgressSink::ignore()).unwrap_err();
        assert!(matches!(err, ScopeError::InvalidMagic { .. }));
    }

    #[test]
    fn test_metadata_length_past_buffer_rejected() {
        let mut buf = MAGIC.to_vec();
        buf.extend_from_slice(&100u32.to_le_bytes());
        buf.extend_from_slice(b"short");
        let err = parse_capture(&buf, &ProgressSink::ignore()).unwrap_err();
        assert!(matches!(err, ScopeError::Truncated { .. }));
    }

    #[test]
    fn test_calibration_roundtrip() {
        // offset = (200 / 2) mod 256 = 100, factor = 0.5 * 256 * 10 / 1000 = 1.28
        let metadata = format!(r#"{{"channel": [{}]}}"#, channel_entry("CH1", true, 200));
        let buf = build_container(&metadata, &[&[161, 100, 50]]);
        let capture = parse_capture(&buf, &ProgressSink::ignore()).unwrap();

        let samples = capture.samples("CH1").unwrap();
        assert_eq!(samples.len(), 3);
        assert!((samples[0] - 61.0 * 1.28).abs() < 1e-9);
        assert!(samples[1].abs() < 1e-9);
        assert!((samples[2] + 50.0 * 1.28).abs() < 1e-9);
        assert_eq!(capture.report.calibration_fallbacks, 0);
    }

    #[test]
    fn test_unavailable_channel_block_still_consumed() {
        let metadata = format!(
            r#"{{"channel": [{}, {}, {}]}}"#,
            channel_entry("CH1", true, 0),
            channel_entry("CH2", false, 0),
            channel_entry("CH3", true, 0),
        );
        // CH2's block is junk the decoder must skip over byte-exactly
        let buf = build_container(&metadata, &[&[10, 20], &[9999, 9999, 9999], &[30]]);
        let capture = parse_capture(&buf, &ProgressSink::ignore()).unwrap();

        assert_eq!(capture.channel_names(), ["CH1", "CH3"]);
        let ch3 = capture.samples("CH3").unwrap();
        assert!((ch3[0] - 30.0 * 1.28).abs() < 1e-9);
        assert_eq!(capture.report.truncated_channels, 0);
    }

    #[test]
    fn test_declared_length_past_buffer_clips_channel() {
        let metadata = format!(r#"{{"channel": [{}]}}"#, channel_entry("CH1", true, 0));
        let mut buf = build_container(&metadata, &[&[1, 2, 3, 4]]);
        buf.truncate(buf.len() - 4); // lose the last two samples
        let capture = parse_capture(&buf, &ProgressSink::ignore()).unwrap();

        assert_eq!(capture.samples("CH1").unwrap().len(), 2);
        assert_eq!(capture.report.truncated_channels, 1);
    }

    #[test]
    fn test_missing_length_field_zeroes_channel() {
        let metadata = format!(
            r#"{{"channel": [{}, {}]}}"#,
            channel_entry("CH1", true, 0),
            channel_entry("CH2", true, 0),
        );
        let buf = build_container(&metadata, &[&[5, 6]]); // CH2's block absent entirely
        let capture = parse_capture(&buf, &ProgressSink::ignore()).unwrap();

        assert_eq!(capture.report.truncated_channels, 1);
        // padded up to CH1's length with NaN
        let ch2 = capture.samples("CH2").unwrap();
        assert_eq!(ch2.len(), 2);
        assert!(ch2.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_trailing_comma_metadata_full_parse() {
        let metadata = format!(
            r#"{{"MODEL": "DSO2D15", "channel": [{}, ], }}"#,
            channel_entry("CH1", true, 0)
        );
        let buf = build_container(&metadata, &[&[1]]);
        let capture = parse_capture(&buf, &ProgressSink::ignore()).unwrap();
        assert_eq!(capture.channels.len(), 1);
        assert_eq!(capture.device.model.as_deref(), Some("DSO2D15"));
    }

    #[test]
    fn test_calibration_fallbacks_counted() {
        let metadata = r#"{"channel": [
            {"Index": "CH1", "Availability_Flag": "TRUE",
             "Voltage_Rate": "fast", "Probe_Magnification": "1X"}
        ]}"#;
        // Reference_Zero missing and Voltage_Rate unparseable: offset 128, rate 1.0
        let buf = build_container(metadata, &[&[128, 129]]);
        let capture = parse_capture(&buf, &ProgressSink::ignore()).unwrap();

        assert_eq!(capture.report.calibration_fallbacks, 2);
        let samples = capture.samples("CH1").unwrap();
        assert!(samples[0].abs() < 1e-9);
        assert!((samples[1] - 0.256).abs() < 1e-9);
    }

    #[test]
    fn test_channels_padded_to_common_length() {
        let metadata = format!(
            r#"{{"channel": [{}, {}]}}"#,
            channel_entry("CH1", true, 0),
            channel_entry("CH2", true, 0),
        );
        let buf = build_container(&metadata, &[&[1, 2, 3, 4], &[7, 8]]);
        let capture = parse_capture(&buf, &ProgressSink::ignore()).unwrap();

        assert_eq!(capture.data.len(), 4);
        let ch2 = capture.samples("CH2").unwrap();
        assert!(!ch2[1].is_nan() && ch2[2].is_nan() && ch2[3].is_nan());
        assert_eq!(capture.data.indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_empty_channel_list() {
        let buf = build_container(r#"{"MODEL": "X", "channel": []}"#, &[]);
        let capture = parse_capture(&buf, &ProgressSink::ignore()).unwrap();
        assert!(capture.data.is_empty());
        assert!(!capture.report.has_warnings());
    }

    #[test]
    fn test_progress_checkpoints() {
        let metadata = format!(r#"{{"channel": [{}]}}"#, channel_entry("CH1", true, 0));
        let buf = build_container(&metadata, &[&[1, 2]]);

        let seen = Mutex::new(Vec::new());
        let sink = ProgressSink::new(|pct, _msg: &str| seen.lock().unwrap().push(pct));
        parse_capture(&buf, &sink).unwrap();
        drop(sink);

        let seen = seen.into_inner().unwrap();
        for expected in [5, 10, 15, 95] {
            assert!(seen.contains(&expected), "missing checkpoint {}", expected);
        }
        assert!(seen.iter().all(|&p| p <= 95));
    }
}
