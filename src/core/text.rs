// Delimited text export decode
//
// Shape: a first line declaring channel names after a colon, then
// "key: value-per-channel" lines until a line starting with "index", then an
// optional "Voltage" column header, then tab-separated data rows. Decoding is
// single-threaded and streaming; progress is reported once per batch of rows
// using byte position against the file size when it is known.

use flate2::read::GzDecoder;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, warn};

use crate::core::constants::{
    GZIP_MAGIC, PROGRESS_CONVERSION, PROGRESS_DATA_END, PROGRESS_DATA_START,
    PROGRESS_METADATA_DONE, PROGRESS_METADATA_START, TEXT_BATCH_SIZE, TEXT_DATA_SENTINEL,
};
use crate::core::error::{Result, ScopeError};
use crate::core::format::{Capture, ChannelMetadata, DeviceInfo, ParseReport, SampleTable};
use crate::core::progress::ProgressSink;

/// Open a text export, decompressing transparently when the file is gzipped.
/// Gzipped input reports no byte-based progress since the decompressed size
/// is unknown up front.
pub fn parse_text_file(path: &Path, progress: &ProgressSink<'_>) -> Result<Capture> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 2];
    let n = file.read(&mut magic)?;
    file.seek(SeekFrom::Start(0))?;

    if n == magic.len() && magic == *GZIP_MAGIC {
        debug!("gzip compressed text export: {}", path.display());
        parse_text_stream(BufReader::new(GzDecoder::new(file)), None, progress)
    } else {
        let total = file.metadata()?.len();
        parse_text_stream(BufReader::new(file), Some(total), progress)
    }
}

/// Decode a text export from any buffered reader.
pub fn parse_text_stream<R: BufRead>(
    reader: R,
    total_bytes: Option<u64>,
    progress: &ProgressSink<'_>,
) -> Result<Capture> {
    progress.emit(PROGRESS_METADATA_START, "Reading metadata");

    let mut lines = reader.lines();
    let mut meta_lines: Vec<String> = Vec::new();
    let mut bytes_seen = 0u64;
    let mut found_sentinel = false;
    for line in &mut lines {
        let line = line?;
        bytes_seen += line.len() as u64 + 1;
        if line.starts_with(TEXT_DATA_SENTINEL) {
            found_sentinel = true;
            break;
        }
        meta_lines.push(line);
    }
    if !found_sentinel {
        return Err(ScopeError::Parse(format!(
            "no '{}' marker separating metadata from data",
            TEXT_DATA_SENTINEL
        )));
    }

    progress.emit(PROGRESS_METADATA_DONE, "Parsing metadata");
    let (channel_names, channels) = parse_metadata_lines(&meta_lines)?;
    debug!("text export: {} channel(s)", channel_names.len());

    progress.emit(PROGRESS_DATA_START, "Parsing data rows");
    let mut indices: Vec<i64> = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); channel_names.len()];
    let mut bad_rows = 0u32;
    let mut header_pending = true;
    let mut lines_in_batch = 0usize;

    for line in &mut lines {
        let line = line?;
        bytes_seen += line.len() as u64 + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        // the firmware writes one column-header line right after the marker
        if header_pending {
            header_pending = false;
            if line.contains("Voltage") {
                continue;
            }
        }

        match parse_row(line, channel_names.len()) {
            Some((index, values)) => {
                indices.push(index);
                for (column, value) in columns.iter_mut().zip(values) {
                    column.push(value);
                }
            }
            None => bad_rows += 1,
        }

        lines_in_batch += 1;
        if lines_in_batch >= TEXT_BATCH_SIZE {
            lines_in_batch = 0;
            if let Some(total) = total_bytes.filter(|&t| t > 0) {
                let span = (PROGRESS_DATA_END - PROGRESS_DATA_START) as u64;
                let percent = PROGRESS_DATA_START as u64 + bytes_seen * span / total;
                progress.emit(percent.min(PROGRESS_DATA_END as u64) as u8, "Parsing data rows");
            }
        }
    }

    progress.emit(PROGRESS_CONVERSION, "Building sample table");
    let mut channel_data = HashMap::new();
    for (name, column) in channel_names.iter().zip(columns) {
        channel_data.insert(name.clone(), column);
    }
    let table = SampleTable {
        indices,
        channel_names,
        channel_data,
    };

    let report = ParseReport {
        bad_rows,
        ..Default::default()
    };
    if report.has_warnings() {
        warn!("text import finished with {}", report);
    }

    Ok(Capture {
        device: DeviceInfo::default(),
        channels,
        data: table,
        report,
    })
}

/// First line: channel names after the colon. Remaining lines: one metadata
/// value per channel, keyed by the text before the colon. A line with fewer
/// values than channels fills from the left, like the firmware writes it.
fn parse_metadata_lines(meta_lines: &[String]) -> Result<(Vec<String>, Vec<ChannelMetadata>)> {
    let first = meta_lines
        .first()
        .ok_or_else(|| ScopeError::Parse("empty file".to_string()))?;
    let names_part = match first.split_once(':') {
        Some((_, rest)) => rest,
        None => {
            return Err(ScopeError::Parse(format!(
                "first line declares no channels: {:?}",
                first
            )))
        }
    };
    let channel_names: Vec<String> = names_part
        .split('\t')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    if channel_names.is_empty() {
        return Err(ScopeError::Parse("no channel names in header".to_string()));
    }

    let mut channels: Vec<ChannelMetadata> = channel_names
        .iter()
        .map(|name| ChannelMetadata {
            name: name.clone(),
            available: true,
            ..Default::default()
        })
        .collect();

    for line in meta_lines.iter().skip(1) {
        let (key, rest) = match line.split_once(':') {
            Some(pair) => pair,
            None => continue,
        };
        let key = key.trim();
        let values: Vec<&str> = rest
            .split('\t')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect();
        for (channel, value) in channels.iter_mut().zip(values) {
            channel
                .raw
                .insert(key.to_string(), Value::String(value.to_string()));
        }
    }

    Ok((channel_names, channels))
}

/// One data row: index then one voltage per channel, tab separated, empty
/// cells dropped, extra columns ignored. Short rows and numeric failures
/// return None; a row is committed whole or not at all, so the index array
/// never drifts out of step with the channel arrays.
fn parse_row(line: &str, channel_count: usize) -> Option<(i64, Vec<f64>)> {
    let mut parts = line.split('\t').map(str::trim).filter(|p| !p.is_empty());
    let index = parts.next()?.parse().ok()?;
    let mut values = Vec::with_capacity(channel_count);
    for _ in 0..channel_count {
        values.push(parts.next()?.parse().ok()?);
    }
    Some((index, values))
}
