//! Subagent identifiers.
//!
//! Ids are [`ID_LENGTH`] lowercase hex characters drawn from the OS random
//! source. If that source is unavailable the bytes come from a PRNG seeded
//! with the current time and PID instead.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use tracing::warn;

/// Length of a subagent id in hex characters.
pub const ID_LENGTH: usize = 16;

/// Generate a new random subagent id.
pub fn generate_id() -> String {
    let mut bytes = [0u8; ID_LENGTH / 2];
    if let Err(e) = OsRng.try_fill_bytes(&mut bytes) {
        warn!(error = %e, "OS random source unavailable, using seeded fallback");
        StdRng::seed_from_u64(fallback_seed()).fill_bytes(&mut bytes);
    }
    hex::encode(bytes)
}

/// Whether `id` has the shape of a generated id.
pub fn is_valid_id(id: &str) -> bool {
    id.len() == ID_LENGTH
        && id
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

fn fallback_seed() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    now.as_secs() ^ u64::from(now.subsec_nanos()) ^ u64::from(std::process::id())
}
