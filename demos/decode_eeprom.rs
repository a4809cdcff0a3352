// Decodes a synthetic three-wire EEPROM capture built from noisy analog levels

use rand::{rngs::StdRng, Rng, SeedableRng};
use scope_reader::{bits_to_hex, decode_transactions};
use tracing::{info, Level};

const SAMPLES_PER_PHASE: usize = 2;
const HIGH_V: f64 = 3.3;
const LOW_V: f64 = 0.0;

/// Four analog channels being synthesized sample by sample.
struct Playback {
    rng: StdRng,
    sk: Vec<f64>,
    cs: Vec<f64>,
    di: Vec<f64>,
    dout: Vec<f64>,
}

impl Playback {
    fn new(seed: u64) -> Self {
        Playback {
            rng: StdRng::seed_from_u64(seed),
            sk: Vec::new(),
            cs: Vec::new(),
            di: Vec::new(),
            dout: Vec::new(),
        }
    }

    fn level(&mut self, bit: u8) -> f64 {
        let base = if bit == 1 { HIGH_V } else { LOW_V };
        base + self.rng.gen_range(-0.2..0.2)
    }

    fn sample(&mut self, sk: u8, cs: u8, di: u8, dout: u8) {
        let v = self.level(sk);
        self.sk.push(v);
        let v = self.level(cs);
        self.cs.push(v);
        let v = self.level(di);
        self.di.push(v);
        let v = self.level(dout);
        self.dout.push(v);
    }

    fn idle(&mut self, samples: usize) {
        for _ in 0..samples {
            self.sample(0, 0, 0, 0);
        }
    }

    /// One chip-select window clocking `di_bits` out and `do_bits` back.
    /// Every bit gets a clock-low phase then a clock-high phase, so the
    /// rising edge lands mid-bit while both data lines are stable.
    fn transaction(&mut self, di_bits: &[u8], do_bits: &[u8]) {
        let bits = di_bits.len().max(do_bits.len());

        // select rises before the first clock
        self.sample(0, 1, 0, 0);

        for i in 0..bits {
            let di = di_bits.get(i).copied().unwrap_or(0);
            let dout = do_bits.get(i).copied().unwrap_or(0);
            for _ in 0..SAMPLES_PER_PHASE {
                self.sample(0, 1, di, dout);
            }
            for _ in 0..SAMPLES_PER_PHASE {
                self.sample(1, 1, di, dout);
            }
        }

        // select falls, closing the window
        self.sample(0, 0, 0, 0);
    }
}

/// MSB-first bits of a 16-bit word.
fn word_bits(word: u16) -> Vec<u8> {
    (0..16).rev().map(|i| ((word >> i) & 1) as u8).collect()
}

fn header(opcode: u8, address: u8) -> Vec<u8> {
    let mut bits = vec![0, 1];
    bits.extend((0..4).rev().map(|i| (opcode >> i) & 1));
    bits.extend((0..4).rev().map(|i| (address >> i) & 1));
    bits
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    let mut pb = Playback::new(7);
    pb.idle(8);

    // EWEN: opcode 00 with 11 in the low bits, no payload
    pb.transaction(&header(0b0011, 0), &[]);
    pb.idle(4);

    // WRITE 0xBEEF to address 5
    let mut write_bits = header(0b0100, 5);
    write_bits.extend(word_bits(0xBEEF));
    pb.transaction(&write_bits, &[]);
    pb.idle(4);

    // READ address 5: the device answers with a dummy 0 then the word
    let mut read_back = vec![0u8];
    read_back.extend(word_bits(0xCAFE));
    pb.transaction(&header(0b1000, 5), &read_back);
    pb.idle(8);

    let outcome = decode_transactions(&pb.sk, &pb.cs, Some(&pb.di), Some(&pb.dout), 0.5);

    info!(
        "Decoded {} transaction(s) at {} us/sample",
        outcome.transactions.len(),
        outcome.time_interval_us
    );

    for (i, t) in outcome.transactions.iter().enumerate() {
        match &t.instruction {
            Some(instr) => info!(
                "#{} [{:.1}..{:.1} us] {} addr=0x{:X} valid={} data={}",
                i,
                t.start_time_us,
                t.end_time_us,
                instr.kind,
                instr.address,
                instr.valid,
                bits_to_hex(t.output_data_bits()),
            ),
            None => info!(
                "#{} [{:.1}..{:.1} us] short burst ({} bits)",
                i,
                t.start_time_us,
                t.end_time_us,
                t.di_bits.len()
            ),
        }
        if t.discarded_di > 0 || t.discarded_do > 0 {
            info!("    discarded bits: {} DI, {} DO", t.discarded_di, t.discarded_do);
        }
        if let Some(word) = t.data_word() {
            info!("    word: 0x{:04X}", word);
        }
    }
}
