use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use scope_reader::Capture;

#[derive(Clone)]
pub struct SignalInfo {
    pub capture: Arc<Capture>,
    pub original_name: String, // The channel name inside the capture file
}

#[derive(Clone)]
pub struct AppState {
    // Maps unique_name -> SignalInfo (capture handle plus original name).
    // Captures are immutable once parsed, so a plain Arc is enough.
    pub signals: Arc<RwLock<HashMap<String, SignalInfo>>>,
    // Maps capture id -> parsed capture, for decode requests
    pub captures: Arc<RwLock<HashMap<String, Arc<Capture>>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            signals: Arc::new(RwLock::new(HashMap::new())),
            captures: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
