// Serial EEPROM decode over binarized capture channels
//
// The clock (SK) and chip select (CS) channels drive a two-state machine:
// a CS rising edge opens a transaction, every SK rising edge while CS is high
// samples the data-in/data-out channels, a CS falling edge closes it. The
// first ten data-in bits form the instruction (dummy, start, 4-bit opcode,
// 4-bit address); the opcode decides how many payload bits to keep. Bits
// collected past the expected count come from clock jitter and are dropped,
// with the dropped counts kept on the transaction for diagnostics.

use std::fmt;
use tracing::debug;

use crate::core::constants::{DATA_WORD_BITS, DEFAULT_TIME_INTERVAL_US, INSTRUCTION_BITS};

/// One voltage channel thresholded at its midpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct BinarySignal {
    pub bits: Vec<u8>,
    pub threshold: f64,
}

/// Threshold a channel at (min + max) / 2; a sample is 1 iff it is strictly
/// above the threshold. NaN samples (tail padding) never exceed the threshold
/// and are excluded from the min/max scan, so padded captures binarize the
/// same as unpadded ones.
pub fn binarize(samples: &[f64]) -> BinarySignal {
    if samples.is_empty() {
        return BinarySignal {
            bits: Vec::new(),
            threshold: f64::NAN,
        };
    }

    let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let threshold = (min + max) / 2.0;

    BinarySignal {
        bits: samples
            .iter()
            .map(|&v| u8::from(v > threshold))
            .collect(),
        threshold,
    }
}

/// Rising edge at i means bits[i-1] == 0 and bits[i] == 1. Index 0 is never
/// an edge.
pub fn rising_edges(bits: &[u8]) -> Vec<bool> {
    let mut edges = vec![false; bits.len()];
    for i in 1..bits.len() {
        edges[i] = bits[i] == 1 && bits[i - 1] == 0;
    }
    edges
}

/// Instruction classification from the 4-bit opcode. The two high bits decide
/// the register instructions; the four low values are the control
/// instructions, so every 4-bit value maps to exactly one name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionKind {
    Read,
    Write,
    Erase,
    Ewen,
    Ewds,
    Eral,
    Wral,
}

impl InstructionKind {
    pub fn from_opcode(opcode: u8) -> Self {
        match (opcode >> 2) & 0b11 {
            0b10 => InstructionKind::Read,
            0b01 => InstructionKind::Write,
            0b11 => InstructionKind::Erase,
            _ => match opcode & 0b11 {
                0b11 => InstructionKind::Ewen,
                0b00 => InstructionKind::Ewds,
                0b10 => InstructionKind::Eral,
                _ => InstructionKind::Wral,
            },
        }
    }

    /// Expected (data-in, data-out) bit counts for a whole transaction.
    /// WRITE and WRAL carry a 16-bit word after the instruction; READ answers
    /// with one dummy bit followed by a 16-bit word; everything else is the
    /// bare 10-bit instruction.
    pub fn expected_bit_lengths(self) -> (usize, usize) {
        match self {
            InstructionKind::Write | InstructionKind::Wral => {
                (INSTRUCTION_BITS + DATA_WORD_BITS, 0)
            }
            InstructionKind::Read => (INSTRUCTION_BITS, DATA_WORD_BITS + 1),
            _ => (INSTRUCTION_BITS, 0),
        }
    }
}

impl fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstructionKind::Read => "READ",
            InstructionKind::Write => "WRITE",
            InstructionKind::Erase => "ERASE",
            InstructionKind::Ewen => "EWEN",
            InstructionKind::Ewds => "EWDS",
            InstructionKind::Eral => "ERAL",
            InstructionKind::Wral => "WRAL",
        };
        f.write_str(name)
    }
}

/// Decoded 10-bit instruction header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub dummy_bit: u8,
    pub start_bit: u8,
    pub opcode: u8,
    pub address: u8,
    pub kind: InstructionKind,
    pub valid: bool,
}

impl Instruction {
    /// Parse the first ten bits. Returns None when fewer than ten bits were
    /// clocked in. Validity requires dummy 0 and start 1; invalid headers are
    /// still fully decoded so they can be shown.
    pub fn parse(bits: &[u8]) -> Option<Instruction> {
        if bits.len() < INSTRUCTION_BITS {
            return None;
        }
        let dummy_bit = bits[0];
        let start_bit = bits[1];
        let opcode = bits_to_u16(&bits[2..6]) as u8;
        let address = bits_to_u16(&bits[6..10]) as u8;
        Some(Instruction {
            dummy_bit,
            start_bit,
            opcode,
            address,
            kind: InstructionKind::from_opcode(opcode),
            valid: dummy_bit == 0 && start_bit == 1,
        })
    }
}

/// One chip-select-active window and the bits clocked inside it.
///
/// `end_sample` is the index where chip select fell back low, or the last
/// index of the capture if it ended while the window was still open.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub start_sample: usize,
    pub end_sample: usize,
    pub start_time_us: f64,
    pub end_time_us: f64,
    pub di_bits: Vec<u8>,
    pub do_bits: Vec<u8>,
    pub discarded_di: usize,
    pub discarded_do: usize,
    pub instruction: Option<Instruction>,
}

impl Transaction {
    /// The data-out bits with READ's leading dummy bit stripped. For
    /// everything else the bits are returned as collected.
    pub fn output_data_bits(&self) -> &[u8] {
        match &self.instruction {
            Some(instr) if instr.valid && instr.kind == InstructionKind::Read => {
                self.do_bits.get(1..).unwrap_or(&[])
            }
            _ => &self.do_bits,
        }
    }

    /// The 16-bit word this transaction carries, when complete: the data-in
    /// tail for WRITE/WRAL, the dummy-stripped data-out word for READ.
    pub fn data_word(&self) -> Option<u16> {
        let instr = self.instruction.as_ref().filter(|i| i.valid)?;
        match instr.kind {
            InstructionKind::Write | InstructionKind::Wral => {
                let tail = self
                    .di_bits
                    .get(INSTRUCTION_BITS..INSTRUCTION_BITS + DATA_WORD_BITS)?;
                Some(bits_to_u16(tail))
            }
            InstructionKind::Read => {
                let word = self.do_bits.get(1..1 + DATA_WORD_BITS)?;
                Some(bits_to_u16(word))
            }
            _ => None,
        }
    }
}

/// Everything decoded from one run over a capture.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeOutcome {
    pub transactions: Vec<Transaction>,
    pub time_interval_us: f64,
    pub di_enabled: bool,
    pub do_enabled: bool,
}

/// Run the decode over calibrated voltage channels. Data-in/data-out are
/// optional; when unmapped the corresponding bit lists stay empty. Channels
/// of unequal length are clamped to the shorter of clock and chip select.
pub fn decode_transactions(
    clock: &[f64],
    chip_select: &[f64],
    data_in: Option<&[f64]>,
    data_out: Option<&[f64]>,
    time_interval_us: f64,
) -> DecodeOutcome {
    let sk = binarize(clock);
    let cs = binarize(chip_select);
    let di_bin = data_in.map(binarize);
    let do_bin = data_out.map(binarize);
    let sk_rising = rising_edges(&sk.bits);

    let n = sk.bits.len().min(cs.bits.len());
    let mut transactions = Vec::new();
    let mut open: Option<OpenTransaction> = None;

    for i in 0..n {
        let cs_step = if i == 0 {
            0
        } else {
            // bits are 0/1, so the cast is lossless and the step is -1, 0 or 1
            cs.bits[i] as i8 - cs.bits[i - 1] as i8
        };

        if cs_step == 1 {
            open = Some(OpenTransaction {
                start_sample: i,
                raw_di: Vec::new(),
                raw_do: Vec::new(),
            });
        }

        if sk_rising[i] && cs.bits[i] == 1 {
            if let Some(tx) = open.as_mut() {
                if let Some(di) = &di_bin {
                    tx.raw_di.push(di.bits.get(i).copied().unwrap_or(0));
                }
                if let Some(dout) = &do_bin {
                    tx.raw_do.push(dout.bits.get(i).copied().unwrap_or(0));
                }
            }
        }

        if cs_step == -1 {
            if let Some(tx) = open.take() {
                transactions.push(tx.close(i, time_interval_us));
            }
        }
    }

    // a window still open at the end of the capture is emitted, not dropped
    if let Some(tx) = open.take() {
        transactions.push(tx.close(n.saturating_sub(1), time_interval_us));
    }

    debug!(
        "decoded {} transaction(s) over {} samples",
        transactions.len(),
        n
    );

    DecodeOutcome {
        transactions,
        time_interval_us,
        di_enabled: di_bin.is_some(),
        do_enabled: do_bin.is_some(),
    }
}

/// Sampling interval string to microseconds: a number plus ns/us/ms/s suffix,
/// case-insensitive, "µs" accepted. A bare number is taken as microseconds;
/// anything unparseable falls back to 1 µs.
pub fn parse_time_interval_us(raw: &str) -> f64 {
    let s = raw.trim().to_lowercase().replace('µ', "u");
    let (number, factor) = if let Some(v) = s.strip_suffix("ns") {
        (v, 1e-3)
    } else if let Some(v) = s.strip_suffix("us") {
        (v, 1.0)
    } else if let Some(v) = s.strip_suffix("ms") {
        (v, 1e3)
    } else if let Some(v) = s.strip_suffix('s') {
        (v, 1e6)
    } else {
        (s.as_str(), 1.0)
    };
    number
        .trim()
        .parse::<f64>()
        .map(|v| v * factor)
        .unwrap_or(DEFAULT_TIME_INTERVAL_US)
}

/// Bits rendered as a plain "0101..." string.
pub fn bits_to_string(bits: &[u8]) -> String {
    bits.iter().map(|&b| if b == 0 { '0' } else { '1' }).collect()
}

/// Bits rendered as hex bytes, left-padded to a byte boundary, "N/A" when
/// empty.
pub fn bits_to_hex(bits: &[u8]) -> String {
    if bits.is_empty() {
        return "N/A".to_string();
    }
    let pad = (8 - bits.len() % 8) % 8;
    let padded: Vec<u8> = std::iter::repeat(0).take(pad).chain(bits.iter().copied()).collect();
    padded
        .chunks(8)
        .map(|byte| format!("0x{:02X}", byte.iter().fold(0u8, |acc, &b| (acc << 1) | b)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn bits_to_u16(bits: &[u8]) -> u16 {
    bits.iter().fold(0u16, |acc, &b| (acc << 1) | u16::from(b))
}

struct OpenTransaction {
    start_sample: usize,
    raw_di: Vec<u8>,
    raw_do: Vec<u8>,
}

impl OpenTransaction {
    fn close(self, end_sample: usize, interval_us: f64) -> Transaction {
        let split = split_payloads(self.raw_di, self.raw_do);
        Transaction {
            start_sample: self.start_sample,
            end_sample,
            start_time_us: self.start_sample as f64 * interval_us,
            end_time_us: end_sample as f64 * interval_us,
            di_bits: split.di_bits,
            do_bits: split.do_bits,
            discarded_di: split.discarded_di,
            discarded_do: split.discarded_do,
            instruction: split.instruction,
        }
    }
}

struct SplitPayloads {
    instruction: Option<Instruction>,
    di_bits: Vec<u8>,
    do_bits: Vec<u8>,
    discarded_di: usize,
    discarded_do: usize,
}

/// Truncate the collected bit lists to the instruction's expected lengths.
/// Under ten data-in bits there is no instruction and everything collected is
/// kept; an invalid instruction keeps its ten header bits and drops all
/// data-out bits.
fn split_payloads(raw_di: Vec<u8>, raw_do: Vec<u8>) -> SplitPayloads {
    match Instruction::parse(&raw_di) {
        None => {
            let discarded_do = raw_do.len();
            SplitPayloads {
                instruction: None,
                di_bits: raw_di,
                do_bits: Vec::new(),
                discarded_di: 0,
                discarded_do,
            }
        }
        Some(instr) => {
            let (want_di, want_do) = if instr.valid {
                instr.kind.expected_bit_lengths()
            } else {
                (INSTRUCTION_BITS, 0)
            };
            let mut di_bits = raw_di;
            let mut do_bits = raw_do;
            let discarded_di = di_bits.len().saturating_sub(want_di);
            let discarded_do = do_bits.len().saturating_sub(want_do);
            di_bits.truncate(want_di);
            do_bits.truncate(want_do);
            SplitPayloads {
                instruction: Some(instr),
                di_bits,
                do_bits,
                discarded_di,
                discarded_do,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HIGH: f64 = 3.3;
    const LOW: f64 = 0.0;

    fn volts(bits: &[u8]) -> Vec<f64> {
        bits.iter().map(|&b| if b == 0 { LOW } else { HIGH }).collect()
    }

    #[test]
    fn test_binarize_midpoint() {
        let signal = binarize(&[0.0, 5.0, 2.4, 2.6, 2.5]);
        assert_eq!(signal.threshold, 2.5);
        // strictly above: the exact midpoint stays low
        assert_eq!(signal.bits, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_binarize_is_idempotent() {
        let samples = [0.1, 3.2, 0.2, 3.1, 1.6];
        assert_eq!(binarize(&samples), binarize(&samples));
    }

    #[test]
    fn test_binarize_ignores_nan_padding() {
        let signal = binarize(&[0.0, 5.0, f64::NAN, f64::NAN]);
        assert_eq!(signal.threshold, 2.5);
        assert_eq!(signal.bits, vec![0, 1, 0, 0]);
    }

    #[test]
    fn test_binarize_empty() {
        let signal = binarize(&[]);
        assert!(signal.bits.is_empty());
        assert!(signal.threshold.is_nan());
    }

    #[test]
    fn test_rising_edges() {
        assert_eq!(
            rising_edges(&[0, 1, 1, 0, 1]),
            vec![false, true, false, false, true]
        );
        // a signal that starts high has no edge at index 0
        assert_eq!(rising_edges(&[1, 1, 0, 1]), vec![false, false, false, true]);
        assert_eq!(rising_edges(&[1]), vec![false]);
        assert!(rising_edges(&[]).is_empty());
    }

    #[test]
    fn test_instruction_kinds_for_all_opcodes() {
        let expected = [
            (0b0000, InstructionKind::Ewds),
            (0b0001, InstructionKind::Wral),
            (0b0010, InstructionKind::Eral),
            (0b0011, InstructionKind::Ewen),
            (0b0100, InstructionKind::Write),
            (0b0101, InstructionKind::Write),
            (0b0110, InstructionKind::Write),
            (0b0111, InstructionKind::Write),
            (0b1000, InstructionKind::Read),
            (0b1011, InstructionKind::Read),
            (0b1100, InstructionKind::Erase),
            (0b1111, InstructionKind::Erase),
        ];
        for (opcode, kind) in expected {
            assert_eq!(InstructionKind::from_opcode(opcode), kind, "opcode {:04b}", opcode);
        }
    }

    #[test]
    fn test_expected_bit_lengths() {
        assert_eq!(InstructionKind::Write.expected_bit_lengths(), (26, 0));
        assert_eq!(InstructionKind::Wral.expected_bit_lengths(), (26, 0));
        assert_eq!(InstructionKind::Read.expected_bit_lengths(), (10, 17));
        assert_eq!(InstructionKind::Erase.expected_bit_lengths(), (10, 0));
        assert_eq!(InstructionKind::Ewen.expected_bit_lengths(), (10, 0));
        assert_eq!(InstructionKind::Ewds.expected_bit_lengths(), (10, 0));
        assert_eq!(InstructionKind::Eral.expected_bit_lengths(), (10, 0));
    }

    #[test]
    fn test_instruction_parse_write_to_address_five() {
        // dummy 0, start 1, opcode 0110, address 0101
        let instr = Instruction::parse(&[0, 1, 0, 1, 1, 0, 0, 1, 0, 1]).unwrap();
        assert!(instr.valid);
        assert_eq!(instr.opcode, 0b0110);
        assert_eq!(instr.kind, InstructionKind::Write);
        assert_eq!(instr.address, 5);
    }

    #[test]
    fn test_instruction_wrong_offset_invalid() {
        let instr = Instruction::parse(&[1, 0, 1, 1, 0, 0, 1, 0, 1, 0]).unwrap();
        assert!(!instr.valid);
        assert_eq!(instr.dummy_bit, 1);
        assert_eq!(instr.start_bit, 0);
    }

    #[test]
    fn test_instruction_under_ten_bits() {
        assert!(Instruction::parse(&[0, 1, 0, 1]).is_none());
    }

    #[test]
    fn test_two_disjoint_windows() {
        let cs = volts(&[0, 1, 1, 1, 0, 0, 1, 1, 1, 0]);
        let sk = volts(&[0, 0, 1, 0, 0, 0, 0, 1, 0, 0]);
        let di = volts(&[0, 1, 1, 1, 0, 0, 0, 0, 0, 0]);

        let outcome = decode_transactions(&sk, &cs, Some(&di), None, 2.0);
        assert_eq!(outcome.transactions.len(), 2);

        let first = &outcome.transactions[0];
        assert_eq!((first.start_sample, first.end_sample), (1, 4));
        assert_eq!((first.start_time_us, first.end_time_us), (2.0, 8.0));
        assert_eq!(first.di_bits, vec![1]);

        let second = &outcome.transactions[1];
        assert_eq!((second.start_sample, second.end_sample), (6, 9));
        assert_eq!(second.di_bits, vec![0]);

        assert!(outcome.di_enabled);
        assert!(!outcome.do_enabled);
    }

    #[test]
    fn test_open_window_at_capture_end_is_emitted() {
        let cs = volts(&[0, 1, 1]);
        let sk = volts(&[0, 1, 0]);
        let di = volts(&[0, 1, 0]);

        let outcome = decode_transactions(&sk, &cs, Some(&di), None, 1.0);
        assert_eq!(outcome.transactions.len(), 1);
        let tx = &outcome.transactions[0];
        // chip select rises at 1 with a clock edge on the same sample
        assert_eq!(tx.start_sample, 1);
        assert_eq!(tx.end_sample, 2);
        assert_eq!(tx.di_bits, vec![1]);
    }

    #[test]
    fn test_back_to_back_windows() {
        // select toggles every sample; each one-sample window still closes cleanly
        let cs = volts(&[0, 1, 0, 1, 0]);
        let sk = volts(&[0, 0, 0, 0, 0]);
        let outcome = decode_transactions(&sk, &cs, None, None, 1.0);

        assert_eq!(outcome.transactions.len(), 2);
        let first = &outcome.transactions[0];
        assert_eq!((first.start_sample, first.end_sample), (1, 2));
        let second = &outcome.transactions[1];
        assert_eq!((second.start_sample, second.end_sample), (3, 4));
        assert!(first.di_bits.is_empty() && first.instruction.is_none());
    }

    #[test]
    fn test_chip_select_high_from_start_never_opens() {
        let cs = volts(&[1, 1, 1, 1]);
        let sk = volts(&[0, 1, 0, 1]);
        let outcome = decode_transactions(&sk, &cs, None, None, 1.0);
        assert!(outcome.transactions.is_empty());
    }

    fn clocked_capture(di_bits: &[u8], do_bits: &[u8]) -> (Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>) {
        // one sample of idle, CS high for the whole burst, one clock pulse
        // (low, high) per bit, then CS drops
        let n = di_bits.len().max(do_bits.len());
        let mut cs = vec![0u8];
        let mut sk = vec![0u8];
        let mut di = vec![0u8];
        let mut dout = vec![0u8];
        for i in 0..n {
            let di_bit = di_bits.get(i).copied().unwrap_or(0);
            let do_bit = do_bits.get(i).copied().unwrap_or(0);
            cs.extend([1, 1]);
            sk.extend([0, 1]);
            di.extend([di_bit, di_bit]);
            dout.extend([do_bit, do_bit]);
        }
        cs.push(0);
        sk.push(0);
        di.push(0);
        dout.push(0);
        (volts(&sk), volts(&cs), volts(&di), volts(&dout))
    }

    #[test]
    fn test_write_transaction_with_data_word() {
        // WRITE (opcode 0110) to address 0011 = 3, data 0xA5C3
        let mut di = vec![0, 1, 0, 1, 1, 0, 0, 0, 1, 1];
        let word = 0xA5C3u16;
        for i in (0..16).rev() {
            di.push(((word >> i) & 1) as u8);
        }
        assert_eq!(di.len(), 26);
        let (sk, cs, di_v, do_v) = clocked_capture(&di, &[]);

        let outcome = decode_transactions(&sk, &cs, Some(&di_v), Some(&do_v), 1.0);
        assert_eq!(outcome.transactions.len(), 1);
        let tx = &outcome.transactions[0];

        let instr = tx.instruction.as_ref().unwrap();
        assert!(instr.valid);
        assert_eq!(instr.kind, InstructionKind::Write);
        assert_eq!(instr.address, 3);
        assert_eq!(tx.di_bits.len(), 26);
        assert_eq!(tx.data_word(), Some(0xA5C3));
        assert_eq!(tx.discarded_di, 0);
    }

    #[test]
    fn test_read_transaction_strips_do_dummy_bit() {
        // READ (opcode 1000) from address 1; the response leads with a dummy 0
        let di = [0, 1, 1, 0, 0, 0, 0, 0, 0, 1];
        let mut dout = vec![0u8];
        let word = 0x0F0Fu16;
        for i in (0..16).rev() {
            dout.push(((word >> i) & 1) as u8);
        }
        let (sk, cs, di_v, do_v) = clocked_capture(&di, &dout);

        let outcome = decode_transactions(&sk, &cs, Some(&di_v), Some(&do_v), 1.0);
        let tx = &outcome.transactions[0];

        let instr = tx.instruction.as_ref().unwrap();
        assert_eq!(instr.kind, InstructionKind::Read);
        assert_eq!(tx.di_bits.len(), 10);
        assert_eq!(tx.do_bits.len(), 17);
        assert_eq!(tx.output_data_bits().len(), 16);
        assert_eq!(tx.data_word(), Some(0x0F0F));
        assert_eq!(tx.discarded_do, 0);
        // DI idles low while the 17 response bits clock out
        assert_eq!(tx.discarded_di, 7);
    }

    #[test]
    fn test_jitter_bits_discarded_with_counts() {
        // EWEN (opcode 0011) plus three jitter bits on DI, four stray DO bits
        let di = [0, 1, 0, 0, 1, 1, 0, 0, 0, 0, 1, 0, 1];
        let dout = [0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 1];
        let (sk, cs, di_v, do_v) = clocked_capture(&di, &dout);

        let outcome = decode_transactions(&sk, &cs, Some(&di_v), Some(&do_v), 1.0);
        let tx = &outcome.transactions[0];

        assert_eq!(tx.instruction.as_ref().unwrap().kind, InstructionKind::Ewen);
        assert_eq!(tx.di_bits.len(), 10);
        assert_eq!(tx.discarded_di, 3);
        assert!(tx.do_bits.is_empty());
        assert_eq!(tx.discarded_do, 13);
        assert_eq!(tx.data_word(), None);
    }

    #[test]
    fn test_invalid_instruction_keeps_header_only() {
        let di = [1, 1, 0, 1, 1, 0, 0, 1, 0, 1, 1, 1];
        let (sk, cs, di_v, _) = clocked_capture(&di, &[]);

        let outcome = decode_transactions(&sk, &cs, Some(&di_v), None, 1.0);
        let tx = &outcome.transactions[0];

        assert!(!tx.instruction.as_ref().unwrap().valid);
        assert_eq!(tx.di_bits.len(), 10);
        assert_eq!(tx.discarded_di, 2);
        assert_eq!(tx.data_word(), None);
    }

    #[test]
    fn test_short_burst_has_no_instruction() {
        let di = [0, 1, 1, 0];
        let (sk, cs, di_v, _) = clocked_capture(&di, &[]);

        let outcome = decode_transactions(&sk, &cs, Some(&di_v), None, 1.0);
        let tx = &outcome.transactions[0];

        assert!(tx.instruction.is_none());
        assert_eq!(tx.di_bits, vec![0, 1, 1, 0]);
        assert!(tx.do_bits.is_empty());
    }

    #[test]
    fn test_unmapped_data_channels() {
        let cs = volts(&[0, 1, 1, 1, 0]);
        let sk = volts(&[0, 0, 1, 0, 0]);
        let outcome = decode_transactions(&sk, &cs, None, None, 1.0);

        assert_eq!(outcome.transactions.len(), 1);
        assert!(outcome.transactions[0].di_bits.is_empty());
        assert!(!outcome.di_enabled);
        assert!(!outcome.do_enabled);
    }

    #[test]
    fn test_empty_capture() {
        let outcome = decode_transactions(&[], &[], None, None, 1.0);
        assert!(outcome.transactions.is_empty());
    }

    #[test]
    fn test_parse_time_interval_units() {
        assert_eq!(parse_time_interval_us("0.400000us"), 0.4);
        assert_eq!(parse_time_interval_us("400ns"), 0.4);
        assert_eq!(parse_time_interval_us("0.001ms"), 1.0);
        assert_eq!(parse_time_interval_us("2s"), 2_000_000.0);
        assert_eq!(parse_time_interval_us("0.5µs"), 0.5);
        assert_eq!(parse_time_interval_us("  1.5 "), 1.5);
        assert_eq!(parse_time_interval_us("fast"), 1.0);
        assert_eq!(parse_time_interval_us(""), 1.0);
    }

    #[test]
    fn test_bits_to_hex() {
        assert_eq!(bits_to_hex(&[1, 0, 1, 0, 0, 1, 0, 1]), "0xA5");
        assert_eq!(bits_to_hex(&[1, 0, 1, 0, 0, 1, 0, 1, 1, 0]), "0x02 0x96");
        assert_eq!(bits_to_hex(&[]), "N/A");
    }

    #[test]
    fn test_bits_to_string() {
        assert_eq!(bits_to_string(&[0, 1, 1, 0]), "0110");
        assert_eq!(bits_to_string(&[]), "");
    }
}
