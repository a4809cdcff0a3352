// Format constants for the SPBXDS container and the text export

pub const MAGIC: &[u8; 6] = b"SPBXDS";

// Header: MAGIC(6) metadata_len(u32 LE)
pub const HEADER_SIZE: usize = 6 + 4; // 10 bytes

// Per-channel block: data_len(u32 LE) then data_len bytes of u16 BE samples
pub const CHANNEL_LEN_SIZE: usize = 4;

// Metadata keys the firmware emits for every channel; everything else is
// carried through untouched in the raw map
pub const KEY_CHANNEL_LIST: &str = "channel";
pub const KEY_MODEL: &str = "MODEL";
pub const KEY_IDN: &str = "IDN";
pub const KEY_INDEX: &str = "Index";
pub const KEY_AVAILABILITY: &str = "Availability_Flag";
pub const KEY_REFERENCE_ZERO: &str = "Reference_Zero";
pub const KEY_VOLTAGE_RATE: &str = "Voltage_Rate";
pub const KEY_PROBE_MAGNIFICATION: &str = "Probe_Magnification";
pub const AVAILABILITY_TRUE: &str = "TRUE";

// Calibration: offset = (Reference_Zero / 2) mod 256, scale = Voltage_Rate * 256,
// volts = (raw - offset) * scale * probe / 1000. The 128 offset fallback is
// inherited verbatim from older reader builds; it is not documented by the vendor.
pub const REFERENCE_MODULUS: i64 = 256;
pub const FALLBACK_REFERENCE_OFFSET: f64 = 128.0;
pub const FALLBACK_VOLTAGE_RATE: f64 = 1.0;
pub const FALLBACK_PROBE_MAGNIFICATION: f64 = 1.0;
pub const ADC_SCALE: f64 = 256.0;
pub const MILLIVOLTS_PER_VOLT: f64 = 1000.0;

// Text parser settings
pub const TEXT_BATCH_SIZE: usize = 100_000; // lines per batch between progress updates
pub const TEXT_DATA_SENTINEL: &str = "index"; // line that ends the metadata section

// Progress checkpoints (percent), shared by both decoders
pub const PROGRESS_METADATA_START: u8 = 5;
pub const PROGRESS_METADATA_DONE: u8 = 10;
pub const PROGRESS_DATA_START: u8 = 15;
pub const PROGRESS_DATA_END: u8 = 90;
pub const PROGRESS_CONVERSION: u8 = 95;

// Serial EEPROM instruction grammar: dummy(1) + start(1) + opcode(4) + address(4)
pub const INSTRUCTION_BITS: usize = 10;
pub const DATA_WORD_BITS: usize = 16;

// Used when a capture carries no parseable sampling interval
pub const DEFAULT_TIME_INTERVAL_US: f64 = 1.0;

// gzip magic, for transparent decompression of compressed text exports
pub const GZIP_MAGIC: &[u8; 2] = &[0x1f, 0x8b];
