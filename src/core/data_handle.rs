use axum::extract::ws::{Message, WebSocket};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::core::decode::parse_time_interval_us;
use crate::core::format::Capture;

#[derive(Serialize)]
struct SignalPayload {
    timestamp: f64,
    value: f64,
    desc: String,
    seq: u64,
    end_flag: bool,
}

pub async fn handle_ws_fetch(mut socket: WebSocket, capture: Arc<Capture>, channel_name: String) {
    info!("ws_fetch streaming started: {}", channel_name);

    let samples = match capture.samples(&channel_name) {
        Some(samples) => samples,
        None => {
            error!("channel not found: {}", channel_name);
            return;
        }
    };

    // sample index times the channel's interval gives the timestamp in us
    let interval_us = capture
        .channel_metadata(&channel_name)
        .and_then(|meta| meta.time_interval())
        .map(|raw| parse_time_interval_us(&raw))
        .unwrap_or(crate::core::constants::DEFAULT_TIME_INTERVAL_US);

    let mut seq: u64 = 0;

    for (i, &value) in samples.iter().enumerate() {
        // NaN tail padding carries no measurement, skip it
        if value.is_nan() {
            continue;
        }

        let index = capture.data.indices.get(i).copied().unwrap_or(i as i64);
        let payload = SignalPayload {
            timestamp: index as f64 * interval_us,
            value,
            desc: String::new(),
            seq,
            end_flag: false,
        };

        let json = match serde_json::to_string(&payload) {
            Ok(j) => j,
            Err(e) => {
                error!("json serialize error: {}", e);
                return;
            }
        };

        if let Err(e) = socket.send(Message::Text(json.into())).await {
            warn!("ws send failed: {}", e);
            return;
        }

        seq += 1;
    }

    // end flag closes the stream for the host
    let end_payload = SignalPayload {
        timestamp: 0.0,
        value: 0.0,
        desc: String::new(),
        seq,
        end_flag: true,
    };

    if let Ok(json) = serde_json::to_string(&end_payload) {
        let _ = socket.send(Message::Text(json.into())).await;
    }

    info!("ws_fetch finished: {}", channel_name);
}
