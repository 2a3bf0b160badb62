//! Deterministic random streams.
//!
//! There is no process-wide generator. Every consumer (a settings group's
//! bin sequence, one unit instance of one iteration, ...) derives its own
//! `StdRng` from the run seed plus its own index path, so the order in which
//! parallel workers execute can never change the output.

use rand::rngs::StdRng;
use rand::SeedableRng;

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(GOLDEN_GAMMA);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Mix a base seed with an index path into a stream seed.
///
/// Distinct index paths give statistically independent streams; the same
/// path always gives the same seed.
pub fn stream_seed(base: u64, indices: &[u64]) -> u64 {
    let mut state = splitmix64(base);
    for (depth, &index) in indices.iter().enumerate() {
        state = splitmix64(state ^ index.wrapping_add(depth as u64).wrapping_mul(GOLDEN_GAMMA));
    }
    state
}

/// Seeded generator for one stream.
pub fn stream_rng(base: u64, indices: &[u64]) -> StdRng {
    StdRng::seed_from_u64(stream_seed(base, indices))
}
