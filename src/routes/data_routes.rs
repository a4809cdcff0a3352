use axum::{
    routing::{get, post},
    Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
    extract::{
        Path,
        State,
        ws::WebSocketUpgrade,
    },
};

use std::sync::Arc;

use tracing::{info, debug, error};
use serde::{Serialize, Deserialize};

use crate::state::app_state::AppState;
use scope_reader::core::constants::DEFAULT_TIME_INTERVAL_US;
use scope_reader::{
    bits_to_hex, bits_to_string, decode_transactions, handle_ws_fetch, looks_like_container,
    parse_capture, parse_text_file, parse_time_interval_us, Capture, Instruction, ProgressSink,
    ScopeError, Transaction,
};

use std::collections::HashMap;

#[derive(Serialize)]
pub struct ReaderSummary {
    pub id: String,            // hex pointer id
    pub signals_count: usize,  // number of signals registered for this capture
    pub headers: Vec<String>,  // unique header list (original names)
}

/// Response for GET /readers/{id}/headers
#[derive(Serialize)]
pub struct ReaderHeaders {
    pub id: String,
    pub headers: Vec<String>,
}

#[derive(Deserialize, Debug)]
pub struct FileReadRequest {
    pub mode: String, // "online" | "offline"
    pub path: String,
}

#[derive(Serialize, Debug)]
pub struct FileReadResponse {
    pub id: String,
    pub name: String,
    pub path: String,
    pub source: String,
    pub headers: Option<Vec<String>>,
    pub desc: Option<String>,
    pub tags: Option<Vec<String>>,
    pub created_at: Option<String>,
    pub source_url: Option<String>,
}

/// Channel assignment for a decode run. `di` carries the instruction bits and
/// is required; `do` is only mapped when the capture probed the data-out pin.
#[derive(Deserialize, Debug)]
pub struct SignalMapping {
    pub sk: String,
    pub cs: String,
    pub di: String,
    #[serde(rename = "do")]
    pub dout: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct DecodeRequest {
    pub capture_id: String,
    pub mapping: SignalMapping,
    /// Overrides the sampling interval from the capture metadata, e.g. "4.0ns".
    pub time_interval: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct InstructionView {
    pub name: String,
    pub valid: bool,
    pub opcode: u8,
    pub address: u8,
    pub dummy_bit: u8,
    pub start_bit: u8,
}

#[derive(Serialize, Debug)]
pub struct TransactionView {
    pub start_sample: usize,
    pub end_sample: usize,
    pub start_time_us: f64,
    pub end_time_us: f64,
    pub instruction: Option<InstructionView>,
    pub di_bits: String,
    pub do_bits: String,
    pub data_hex: String,
    pub data_word: Option<u16>,
    pub discarded_di: usize,
    pub discarded_do: usize,
}

#[derive(Serialize, Debug)]
pub struct DecodeResponse {
    pub capture_id: String,
    pub time_interval_us: f64,
    pub transaction_count: usize,
    pub transactions: Vec<TransactionView>,
}

impl From<&Instruction> for InstructionView {
    fn from(instr: &Instruction) -> Self {
        InstructionView {
            name: instr.kind.to_string(),
            valid: instr.valid,
            opcode: instr.opcode,
            address: instr.address,
            dummy_bit: instr.dummy_bit,
            start_bit: instr.start_bit,
        }
    }
}

impl From<&Transaction> for TransactionView {
    fn from(t: &Transaction) -> Self {
        TransactionView {
            start_sample: t.start_sample,
            end_sample: t.end_sample,
            start_time_us: t.start_time_us,
            end_time_us: t.end_time_us,
            instruction: t.instruction.as_ref().map(InstructionView::from),
            di_bits: bits_to_string(&t.di_bits),
            do_bits: bits_to_string(&t.do_bits),
            data_hex: bits_to_hex(t.output_data_bits()),
            data_word: t.data_word(),
            discarded_di: t.discarded_di,
            discarded_do: t.discarded_do,
        }
    }
}


/// =======================
/// ROUTER
/// =======================

pub fn data_routes(state: AppState) -> Router {
    Router::new()
        .route("/read-file", post(read_file))
        .route("/fetch/{:signal}", get(ws_fetch))
        .route("/decode", post(decode_capture))
        .route("/readers", get(list_readers))
        .route("/readers/{:id}/headers", get(reader_headers))
        .with_state(state)
}


/// =======================
/// HANDLERS
/// =======================

async fn read_file(
    State(state): State<AppState>,
    Json(request): Json<FileReadRequest>,
) -> Response {
    debug!("Reading file: mode={}, path={}", request.mode, request.path);

    // Parse on a blocking thread; the big captures take a while.
    let parse_path = request.path.clone();
    let parsed = tokio::task::spawn_blocking(move || parse_any_capture(&parse_path)).await;

    let capture = match parsed {
        Ok(Ok(capture)) => Arc::new(capture),
        Ok(Err(e)) => {
            error!("Failed to read file {}: {}", request.path, e);
            let status = match e {
                ScopeError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            };
            return (status, e.to_string()).into_response();
        }
        Err(e) => {
            error!("Parse task failed for {}: {}", request.path, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let capture_id = uuid::Uuid::new_v4().to_string();

    let mut exposed_headers = Vec::new();
    {
        let mut signals = state.signals.write().await;

        for base_name in capture.channel_names().to_vec() {
            let mut final_name = base_name.clone();

            // 👇 GLOBAL UNIQUE NAME
            if signals.contains_key(&final_name) {
                let mut i = 1;
                loop {
                    let candidate = format!("{}_{}", base_name, i);
                    if !signals.contains_key(&candidate) {
                        final_name = candidate;
                        break;
                    }
                    i += 1;
                }
            }

            info!("Register signal: {} (original: {})", final_name, base_name);

            signals.insert(
                final_name.clone(),
                crate::state::app_state::SignalInfo {
                    capture: capture.clone(),
                    original_name: base_name, // the channel name inside the file
                },
            );

            exposed_headers.push(final_name);
        }
    }

    state
        .captures
        .write()
        .await
        .insert(capture_id.clone(), capture.clone());

    if capture.report.has_warnings() {
        info!(
            "Capture {} loaded with warnings: {}",
            capture_id, capture.report
        );
    }

    let file_name = request
        .path
        .rsplit('/')
        .next()
        .unwrap_or("unknown")
        .to_string();

    Json(FileReadResponse {
        id: capture_id,
        name: file_name,
        path: request.path.clone(),
        source: request.path,
        headers: Some(exposed_headers),
        desc: capture
            .device
            .model
            .clone()
            .or_else(|| capture.device.identification.clone()),
        tags: None,
        created_at: Some(chrono::Utc::now().to_rfc3339()),
        source_url: None,
    })
    .into_response()
}

/// Sniff the leading bytes and hand the file to whichever decoder owns that
/// format. Anything that is not an SPBXDS container goes down the text path,
/// which also covers gzip exports.
fn parse_any_capture(path: &str) -> Result<Capture, ScopeError> {
    let progress = ProgressSink::new(|pct: u8, msg: &str| debug!("Parse {}%: {}", pct, msg));

    let mut head = [0u8; 6];
    let n = {
        use std::io::Read;
        let mut file = std::fs::File::open(path)?;
        file.read(&mut head)?
    };

    if looks_like_container(&head[..n]) {
        let bytes = std::fs::read(path)?;
        parse_capture(&bytes, &progress)
    } else {
        parse_text_file(std::path::Path::new(path), &progress)
    }
}


async fn ws_fetch(
    State(state): State<AppState>,
    Path(signal_name): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let signal_info = {
        let signals = state.signals.read().await;
        signals.get(&signal_name).cloned()
    };

    let signal_info = match signal_info {
        Some(info) => info,
        None => {
            error!("Signal not found: {}", signal_name);
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    ws.on_upgrade(move |socket| {
        handle_ws_fetch(socket, signal_info.capture, signal_info.original_name)
    })
}


async fn decode_capture(
    State(state): State<AppState>,
    Json(request): Json<DecodeRequest>,
) -> Response {
    let capture = {
        let captures = state.captures.read().await;
        captures.get(&request.capture_id).cloned()
    };

    let capture = match capture {
        Some(c) => c,
        None => {
            error!("Capture not found: {}", request.capture_id);
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    let mut wanted = vec![&request.mapping.sk, &request.mapping.cs, &request.mapping.di];
    if let Some(name) = &request.mapping.dout {
        wanted.push(name);
    }
    for name in wanted {
        if capture.samples(name).is_none() {
            error!("Decode requested unknown channel: {}", name);
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                ScopeError::ChannelNotFound(name.clone()).to_string(),
            )
                .into_response();
        }
    }

    // Interval priority: explicit request value, then the clock channel's
    // metadata, then the 1 us default.
    let interval_source = request.time_interval.clone().or_else(|| {
        capture
            .channel_metadata(&request.mapping.sk)
            .and_then(|ch| ch.time_interval())
    });
    let time_interval_us = interval_source
        .as_deref()
        .map(parse_time_interval_us)
        .unwrap_or(DEFAULT_TIME_INTERVAL_US);

    let mapping = request.mapping;
    let outcome = tokio::task::spawn_blocking(move || {
        let clock = capture.samples(&mapping.sk).unwrap_or(&[]);
        let chip_select = capture.samples(&mapping.cs).unwrap_or(&[]);
        let data_in = capture.samples(&mapping.di);
        let data_out = mapping
            .dout
            .as_deref()
            .and_then(|name| capture.samples(name));
        decode_transactions(clock, chip_select, data_in, data_out, time_interval_us)
    })
    .await;

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Decode task failed for {}: {}", request.capture_id, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    info!(
        "Decoded {} transaction(s) from capture {}",
        outcome.transactions.len(),
        request.capture_id
    );

    Json(DecodeResponse {
        capture_id: request.capture_id,
        time_interval_us: outcome.time_interval_us,
        transaction_count: outcome.transactions.len(),
        transactions: outcome
            .transactions
            .iter()
            .map(TransactionView::from)
            .collect(),
    })
    .into_response()
}


async fn list_readers(
    State(state): State<AppState>,
) -> impl IntoResponse {
    // signals: HashMap<String, SignalInfo>
    let signals = state.signals.read().await;

    // Group by Arc pointer address
    let mut groups: HashMap<usize, Vec<String>> = HashMap::new();

    for (_key, info) in signals.iter() {
        // get raw pointer address for grouping
        let ptr = Arc::as_ptr(&info.capture) as usize;
        groups.entry(ptr).or_default().push(info.original_name.clone());
    }

    // Build response
    let mut out: Vec<ReaderSummary> = Vec::with_capacity(groups.len());
    for (ptr, mut names) in groups {
        // unique headers
        names.sort();
        names.dedup();
        let id = format!("{:x}", ptr);
        out.push(ReaderSummary {
            id,
            signals_count: names.len(),
            headers: names,
        });
    }

    Json(out)
}

// --- handler: reader_headers ---
async fn reader_headers(
    State(state): State<AppState>,
    Path(reader_id): Path<String>,
) -> impl IntoResponse {
    // parse hex id
    let ptr_res = usize::from_str_radix(&reader_id, 16);
    let ptr = match ptr_res {
        Ok(p) => p,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };

    let signals = state.signals.read().await;

    // collect headers for matching pointer
    let mut headers: Vec<String> = Vec::new();
    for (_k, info) in signals.iter() {
        if Arc::as_ptr(&info.capture) as usize == ptr {
            headers.push(info.original_name.clone());
        }
    }

    if headers.is_empty() {
        return StatusCode::NOT_FOUND.into_response();
    }

    headers.sort();
    headers.dedup();

    Json(ReaderHeaders {
        id: reader_id,
        headers,
    }).into_response()
}
