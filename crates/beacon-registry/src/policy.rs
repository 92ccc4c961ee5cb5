//! Validation policy for usernames and room codes.
//!
//! These run after the rate gate and before any registry mutation. The
//! rules are deliberately forgiving where the user can't reasonably be
//! blamed: surrounding whitespace is trimmed and over-long names are cut
//! to fit rather than rejected.

use beacon_protocol::RoomCode;

use crate::code::CODE_LEN;
use crate::error::ValidationError;

/// Checks and normalizes a display name.
///
/// Rules, in order:
/// 1. trim surrounding whitespace; empty after trimming is an error
/// 2. truncate to `max_len` characters (silently)
/// 3. only letters, digits, spaces, hyphens, and underscores are allowed
/// 4. a name that is all spaces is an error
pub fn sanitize_username(
    raw: &str,
    max_len: usize,
) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::UsernameEmpty);
    }

    let name: String = trimmed.chars().take(max_len).collect();

    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == ' ' || c == '-' || c == '_')
    {
        return Err(ValidationError::UsernameInvalidChars);
    }

    // Unreachable after the trim above, kept as a backstop so the
    // registry can never hold a name that renders as nothing.
    if name.chars().all(|c| c == ' ') {
        return Err(ValidationError::UsernameBlank);
    }

    Ok(name)
}

/// Normalizes client-supplied room code input.
///
/// Codes are case-insensitive on input and canonically uppercase in the
/// registry. Only the length is checked here; a well-formed code that
/// matches no live room surfaces as "room not found", not as a
/// validation failure.
pub fn normalize_room_code(raw: &str) -> Result<RoomCode, ValidationError> {
    let code = raw.trim().to_uppercase();
    if code.chars().count() != CODE_LEN {
        return Err(ValidationError::CodeLength);
    }
    Ok(RoomCode(code))
}
