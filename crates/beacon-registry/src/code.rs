//! Room code generation.

use beacon_protocol::RoomCode;
use rand::Rng;

use crate::RegistryError;

/// Characters a room code may contain. Visually ambiguous characters
/// (`0`/`O`, `1`/`I`) are excluded so codes survive being read aloud or
/// scribbled on a whiteboard.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of every room code.
pub const CODE_LEN: usize = 6;

/// Draws one random candidate code.
fn random_code() -> RoomCode {
    let mut rng = rand::rng();
    let code: String = (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect();
    RoomCode(code)
}

/// Generates a code that `is_taken` rejects, retrying up to `attempts`
/// times before failing with [`RegistryError::CodesExhausted`].
///
/// Codes are not unique by construction, only by checking against the
/// live room set, so this must run under the same exclusion as the
/// insertion that follows it. Two generators racing outside the lock
/// could both pick the same code.
pub fn generate_unique(
    attempts: u32,
    mut is_taken: impl FnMut(&RoomCode) -> bool,
) -> Result<RoomCode, RegistryError> {
    for _ in 0..attempts {
        let code = random_code();
        if !is_taken(&code) {
            return Ok(code);
        }
    }
    tracing::warn!(attempts, "room code generation exhausted its attempts");
    Err(RegistryError::CodesExhausted)
}

/// Whether `s` has the shape of a generated room code.
pub fn is_valid_code(s: &str) -> bool {
    s.len() == CODE_LEN && s.bytes().all(|b| CODE_ALPHABET.contains(&b))
}
