pub mod binary;
pub mod constants;
pub mod data_handle;
pub mod decode;
pub mod error;
pub mod format;
pub mod metadata;
pub mod progress;
pub mod text;
