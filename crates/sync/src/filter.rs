//! Bloom filter over store keys seen during a diff sync.
//!
//! For `m` bits, `k` hash functions and `n` inserted keys the false
//! positive rate is about `(1 - e^(-kn/m))^k`. Given the expected `n` and a
//! target rate `p`, the filter picks `m = -n ln p / (ln 2)^2` and
//! `k = (m / n) ln 2`.
//!
//! Bit indexes use double hashing, `h_i(x) = h1(x) + i * h2(x) mod m`, with
//! `h1` and `h2` from two seeded SeaHash passes.

use std::f64::consts::LN_2;

const MAX_HASHES: u32 = 16;

const SEEDS: [[u64; 4]; 2] = [
    [0x16f1_1fe8_9b0d_677c, 0xb480_a793_d8e6_c86c, 0x6fe2_e5aa_f078_ebc9, 0x14f9_94a4_c525_9381],
    [0x2d35_8dcc_aa6c_78a5, 0x8bb8_4b93_962e_acc9, 0x4b33_a62e_d433_d4a3, 0x4d5a_2da5_1de1_aa47],
];

/// Probabilistic set of keys. Never reports a false negative.
#[derive(Clone)]
pub struct KeyFilter {
    bits: Vec<u64>,
    num_bits: u64,
    hashes: u32,
    inserted: u64,
}

impl KeyFilter {
    /// Filter sized for `expected` keys at false-positive rate `fp_rate`.
    pub fn new(expected: u64, fp_rate: f64) -> Self {
        let n = expected.max(1) as f64;
        let p = fp_rate.clamp(f64::MIN_POSITIVE, 0.5);
        let num_bits = ((-n * p.ln()) / (LN_2 * LN_2)).ceil().max(64.0) as u64;
        let hashes = ((num_bits as f64 / n) * LN_2).round().clamp(1.0, f64::from(MAX_HASHES)) as u32;
        let words = num_bits.div_ceil(64) as usize;
        Self { bits: vec![0; words], num_bits: words as u64 * 64, hashes, inserted: 0 }
    }

    pub fn insert(&mut self, key: &[u8]) {
        let (h1, h2) = hash_pair(key);
        for i in 0..self.hashes {
            let bit = self.bit_index(h1, h2, i);
            self.bits[(bit / 64) as usize] |= 1 << (bit % 64);
        }
        self.inserted += 1;
    }

    /// `false` means the key was never inserted.
    pub fn may_contain(&self, key: &[u8]) -> bool {
        let (h1, h2) = hash_pair(key);
        (0..self.hashes).all(|i| {
            let bit = self.bit_index(h1, h2, i);
            self.bits[(bit / 64) as usize] & (1 << (bit % 64)) != 0
        })
    }

    /// Number of insert calls.
    pub fn inserted(&self) -> u64 {
        self.inserted
    }

    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    fn bit_index(&self, h1: u64, h2: u64, i: u32) -> u64 {
        h1.wrapping_add(u64::from(i).wrapping_mul(h2)) % self.num_bits
    }
}

impl std::fmt::Debug for KeyFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set_bits: u32 = self.bits.iter().map(|w| w.count_ones()).sum();
        f.debug_struct("KeyFilter")
            .field("num_bits", &self.num_bits)
            .field("hashes", &self.hashes)
            .field("inserted", &self.inserted)
            .field("set_bits", &set_bits)
            .finish()
    }
}

/// Expected entry count for the next run: the previous total doubled and
/// rounded up to a power of two, never below `floor`.
pub fn expected_entries(previous: Option<u64>, floor: u64) -> u64 {
    let grown = previous
        .unwrap_or(0)
        .saturating_mul(2)
        .checked_next_power_of_two()
        .unwrap_or(u64::MAX);
    grown.max(floor)
}

fn hash_pair(key: &[u8]) -> (u64, u64) {
    let h1 = seahash::hash_seeded(key, SEEDS[0][0], SEEDS[0][1], SEEDS[0][2], SEEDS[0][3]);
    let h2 = seahash::hash_seeded(key, SEEDS[1][0], SEEDS[1][1], SEEDS[1][2], SEEDS[1][3]);
    // An even step would cycle through only half the bit positions.
    (h1, h2 | 1)
}
