// Example usage of the capture reader - handles both container and text exports

use scope_reader::{looks_like_container, parse_capture, parse_text_file, ProgressSink, Result};
use tracing::{info, Level};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "data/capture.spbxds".to_string());

    let progress = ProgressSink::new(|pct: u8, msg: &str| info!("[{:3}%] {}", pct, msg));

    // Sniff the magic so the same demo opens .spbxds, .txt and .txt.gz files
    let bytes = std::fs::read(&path)?;
    let capture = if looks_like_container(&bytes) {
        parse_capture(&bytes, &progress)?
    } else {
        parse_text_file(std::path::Path::new(&path), &progress)?
    };

    if let Some(model) = &capture.device.model {
        info!("Device model: {}", model);
    }
    if let Some(idn) = &capture.device.identification {
        info!("Identification: {}", idn);
    }

    info!("Channels:");
    for ch in &capture.channels {
        info!("  {} (available: {})", ch.name, ch.available);
        if let Some(rate) = &ch.voltage_rate {
            info!("      Voltage rate: {}", rate);
        }
        if let Some(probe) = &ch.probe_magnification {
            info!("      Probe: {}", probe);
        }
        if let Some(interval) = ch.time_interval() {
            info!("      Time interval: {}", interval);
        }
    }

    info!("Decoded {} sample rows", capture.data.len());
    for name in capture.channel_names() {
        if let Some(samples) = capture.samples(name) {
            let first = samples.first().copied().unwrap_or(f64::NAN);
            let last = samples.last().copied().unwrap_or(f64::NAN);
            info!(
                "  {}: {} samples, first={:.4} V, last={:.4} V",
                name,
                samples.len(),
                first,
                last
            );
        }
    }

    if capture.report.has_warnings() {
        info!("Parse warnings: {}", capture.report);
    }

    Ok(())
}
