use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

/// A single inverted bit: `proof[byte_index] ^= 1 << bit_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BitFlip {
    pub byte_index: usize,
    pub bit_index: u8,
}

impl BitFlip {
    /// Pick a byte uniformly in `[0, len)` and a bit uniformly in `[0, 7]`.
    ///
    /// Returns `None` for an empty proof, which has nothing to flip.
    pub fn choose<R: Rng>(rng: &mut R, len: usize) -> Option<Self> {
        if len == 0 {
            return None;
        }
        Some(Self {
            byte_index: rng.gen_range(0..len),
            bit_index: rng.gen_range(0..8),
        })
    }

    /// Return a tampered copy of `proof`. The input is left untouched.
    ///
    /// Panics if `byte_index` is out of range; callers get flips from
    /// [`BitFlip::choose`] with the same length.
    pub fn apply(&self, proof: &[u8]) -> Vec<u8> {
        let mut tampered = proof.to_vec();
        tampered[self.byte_index] ^= 1 << self.bit_index;
        tampered
    }
}

/// Tamper RNG: pinned when a seed is given, OS entropy otherwise.
pub fn rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}
