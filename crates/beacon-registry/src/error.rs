//! Error types for the registry layer.
//!
//! Every variant's message is user-facing: the server forwards it
//! verbatim in an `error` event, so the wording is written for the person
//! typing the room code, not for the operator reading logs.

use beacon_protocol::RoomCode;

/// A username or room code that failed the validation policy.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The name was empty after trimming whitespace.
    #[error("username cannot be empty")]
    UsernameEmpty,

    /// The name contains characters outside the allowed set.
    #[error("username may only contain letters, numbers, spaces, hyphens, and underscores")]
    UsernameInvalidChars,

    /// The name contains nothing but spaces once sanitized.
    #[error("username cannot be blank")]
    UsernameBlank,

    /// The room code is not exactly six characters.
    #[error("room codes are exactly 6 characters")]
    CodeLength,
}

/// Errors that can occur during registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The connection exceeded its action budget for the current window.
    /// Checked before anything else, so a throttled operation does no
    /// validation work at all.
    #[error("too many requests, slow down")]
    RateLimited,

    /// The relay is at its room capacity.
    #[error("the server is full, try again later")]
    ServerFull,

    /// No live room has this code.
    #[error("room {0} not found, check the code and try again")]
    RoomNotFound(RoomCode),

    /// The room has no free member slots.
    #[error("room {0} is full")]
    RoomFull(RoomCode),

    /// Another member of the room already uses this name
    /// (case-insensitively).
    #[error("the name {0:?} is already taken in that room")]
    UsernameTaken(String),

    /// The generator could not find an unused code within its attempt
    /// budget. The registry is saturated.
    #[error("no room codes available, try again later")]
    CodesExhausted,

    /// Input failed the validation policy.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_converts_into_registry_error() {
        let err: RegistryError = ValidationError::UsernameEmpty.into();
        assert!(matches!(
            err,
            RegistryError::Invalid(ValidationError::UsernameEmpty)
        ));
        assert_eq!(err.to_string(), "username cannot be empty");
    }

    #[test]
    fn test_room_errors_name_the_room() {
        let err = RegistryError::RoomFull(RoomCode("K3M7XQ".into()));
        assert!(err.to_string().contains("K3M7XQ"));
    }
}
