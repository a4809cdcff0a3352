// SPBXDS Scope Capture Reader
// Main library entry point

pub mod core;

// Re-export main types
pub use crate::core::binary::{looks_like_container, parse_capture};
pub use crate::core::data_handle::handle_ws_fetch;
pub use crate::core::decode::{
    bits_to_hex, bits_to_string, decode_transactions, parse_time_interval_us, DecodeOutcome,
    Instruction, InstructionKind, Transaction,
};
pub use crate::core::error::{Result, ScopeError};
pub use crate::core::format::{Capture, ChannelMetadata, DeviceInfo, ParseReport, SampleTable};
pub use crate::core::progress::ProgressSink;
pub use crate::core::text::{parse_text_file, parse_text_stream};

#[cfg(test)]
mod tests {
    #[test]
    fn test_constants() {
        use crate::core::constants::*;
        assert_eq!(MAGIC, b"SPBXDS");
        assert_eq!(HEADER_SIZE, 10);
    }
}
