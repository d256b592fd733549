use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Generator handed to every seeded routine. ChaCha streams are stable across
/// platforms and crate releases, which keeps saved seeds reproducible.
pub type MissionRng = ChaCha8Rng;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Folds `bytes` into an FNV-1a state. Process-randomized std hashers cannot
/// be used for seeds that must survive restarts.
const fn fnv1a(mut state: u64, bytes: &[u8]) -> u64 {
    let mut index = 0;
    while index < bytes.len() {
        state = (state ^ bytes[index] as u64).wrapping_mul(FNV_PRIME);
        index += 1;
    }
    state
}

/// Produces independent generators keyed by an arbitrary string plus a base seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngFactory {
    base_seed: u64,
}

impl RngFactory {
    pub fn new(base_seed: u64) -> Self {
        Self { base_seed }
    }

    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    /// Seed of the stream named `key`: the key's bytes, then the base seed,
    /// folded through FNV-1a.
    pub fn seed_for(&self, key: &str) -> u64 {
        let keyed = fnv1a(FNV_OFFSET, key.as_bytes());
        fnv1a(keyed, &self.base_seed.to_le_bytes())
    }

    pub fn rng(&self, key: &str) -> MissionRng {
        MissionRng::seed_from_u64(self.seed_for(key))
    }
}
