//! Winning-number derivation.
//!
//! The draw is a pure function of a 32-byte seed. Seeds are produced by a
//! [`SeedSource`] when a round opens, committed to by hash, and revealed when
//! the round closes so anyone can recompute the result.

pub mod commitment;

pub use commitment::{seed_from_hex, seed_to_hex, SeedCommitment};

use crate::constants::{MAX_NUMBER, MIN_NUMBER, NUMBERS_PER_TICKET};
use crate::types::{NumberSet, RoundId};
use rand::RngCore;
use sha2::{Digest, Sha256};

pub type Seed = [u8; 32];

/// Supplies the entropy for each round's draw.
pub trait SeedSource: Send + Sync {
    fn next_seed(&mut self, round_id: RoundId) -> Seed;
}

/// Seeds from the thread-local CSPRNG (reseeded from the OS).
#[derive(Debug, Default, Clone, Copy)]
pub struct OsSeedSource;

impl SeedSource for OsSeedSource {
    fn next_seed(&mut self, _round_id: RoundId) -> Seed {
        generate_seed()
    }
}

/// Returns the same seed for every round. Draws become fully predictable.
#[derive(Debug, Clone, Copy)]
pub struct FixedSeedSource(pub Seed);

impl SeedSource for FixedSeedSource {
    fn next_seed(&mut self, _round_id: RoundId) -> Seed {
        self.0
    }
}

/// Rnd seed for a new round
pub fn generate_seed() -> Seed {
    let mut seed = [0u8; 32];
    rand::rng().fill_bytes(&mut seed);
    seed
}

/// Derives five distinct numbers from `seed`.
///
/// Each attempt hashes `seed || attempt` (big-endian u64), reduces the first
/// eight digest bytes modulo the number range and keeps the candidate only if
/// it was not drawn yet.
pub fn draw_numbers(seed: &[u8]) -> NumberSet {
    let span = (MAX_NUMBER - MIN_NUMBER + 1) as u64;
    let mut picked: Vec<u8> = Vec::with_capacity(NUMBERS_PER_TICKET);
    let mut attempt: u64 = 0;

    while picked.len() < NUMBERS_PER_TICKET {
        let digest = Sha256::new()
            .chain_update(seed)
            .chain_update(attempt.to_be_bytes())
            .finalize();

        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let candidate = (u64::from_be_bytes(head) % span) as u8 + MIN_NUMBER;

        if !picked.contains(&candidate) {
            picked.push(candidate);
        }
        attempt += 1;
    }

    let mut numbers = [0u8; NUMBERS_PER_TICKET];
    numbers.copy_from_slice(&picked);
    numbers.sort_unstable();
    NumberSet::from_drawn(numbers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_is_deterministic() {
        let seed = [7u8; 32];
        assert_eq!(draw_numbers(&seed), draw_numbers(&seed));
    }

    #[test]
    fn test_draw_output_is_valid() {
        for i in 0..200u8 {
            let mut seed = [0u8; 32];
            seed[0] = i;
            seed[31] = i.wrapping_mul(31);

            let drawn = draw_numbers(&seed);
            let numbers = drawn.as_slice();
            assert_eq!(numbers.len(), NUMBERS_PER_TICKET);
            assert!(numbers.windows(2).all(|pair| pair[0] < pair[1]));
            assert!(numbers
                .iter()
                .all(|n| (MIN_NUMBER..=MAX_NUMBER).contains(n)));
            // re-validating must succeed
            assert_eq!(NumberSet::from_slice(numbers).unwrap(), drawn);
        }
    }

    #[test]
    fn test_different_seeds_usually_differ() {
        let distinct: std::collections::HashSet<NumberSet> = (0..20u8)
            .map(|i| draw_numbers(&[i; 32]))
            .collect();
        assert!(distinct.len() > 1);
    }

    #[test]
    fn test_seed_sources() {
        let mut fixed = FixedSeedSource([3u8; 32]);
        assert_eq!(fixed.next_seed(1), fixed.next_seed(2));

        let mut os = OsSeedSource;
        assert_ne!(os.next_seed(1), os.next_seed(1));
    }
}
