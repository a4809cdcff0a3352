// Error handling for the capture readers

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScopeError>;

/// Fatal conditions only. Recoverable problems (calibration fallbacks, clipped
/// channel data, bad text rows) are tallied in `ParseReport` instead, and the
/// parse carries on with best-effort data for the affected channel.
#[derive(Error, Debug)]
pub enum ScopeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid magic bytes: expected {expected:?}, got {got:?}")]
    InvalidMagic { expected: Vec<u8>, got: Vec<u8> },

    #[error("File truncated: need {needed} bytes at offset {offset}, only {available} in buffer")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Metadata block unrecoverable after comma repair and brace truncation: {0}")]
    MetadataCorrupt(String),

    #[error("Metadata shape: {0}")]
    MetadataShape(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Channel not found: {0}")]
    ChannelNotFound(String),
}
