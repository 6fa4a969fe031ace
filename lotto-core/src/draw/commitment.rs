use crate::draw::{draw_numbers, Seed};
use crate::error::{LotteryError, Result};
use crate::types::NumberSet;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hash commitment to a round seed, published when the round opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedCommitment {
    hash: Vec<u8>,
}

impl SeedCommitment {
    pub fn new(seed: &Seed) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(seed);
        let hash = hasher.finalize().to_vec();

        Self { hash }
    }

    pub fn from_hex(hex_hash: &str) -> Result<Self> {
        let hash = hex::decode(hex_hash)
            .map_err(|e| LotteryError::internal(format!("Invalid commitment hex: {}", e)))?;
        Ok(Self { hash })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.hash)
    }

    pub fn verify(&self, seed: &[u8]) -> bool {
        let mut hasher = Sha256::new();
        hasher.update(seed);
        let computed_hash = hasher.finalize();
        computed_hash.as_slice() == self.hash
    }

    /// Checks a revealed seed against this commitment and the published result.
    pub fn verify_draw(&self, revealed_seed: &[u8], winning: &NumberSet) -> bool {
        self.verify(revealed_seed) && draw_numbers(revealed_seed) == *winning
    }
}

pub fn seed_to_hex(seed: &Seed) -> String {
    hex::encode(seed)
}

pub fn seed_from_hex(hex_seed: &str) -> Result<Seed> {
    let bytes = hex::decode(hex_seed)
        .map_err(|e| LotteryError::internal(format!("Invalid seed hex: {}", e)))?;
    bytes
        .try_into()
        .map_err(|_| LotteryError::internal("Seed must be 32 bytes"))
}
