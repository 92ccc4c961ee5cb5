//! Registry configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the room registry and its rate limiter.
///
/// The defaults match a small public relay; operators can override any of
/// them when building the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Maximum number of live rooms before `create-room` is refused.
    pub max_rooms: usize,

    /// Maximum members per room.
    pub max_users_per_room: usize,

    /// Display names longer than this are silently truncated.
    pub max_username_len: usize,

    /// How many random draws the code generator makes before giving up.
    /// Hitting this bound means the code space is effectively saturated.
    pub code_attempts: u32,

    /// Length of one rate-limit window.
    pub rate_window: Duration,

    /// Actions allowed per connection within one window.
    pub rate_max_actions: u32,

    /// Rooms with no activity for this long are reaped as abandoned.
    pub idle_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_rooms: 500,
            max_users_per_room: 10,
            max_username_len: 20,
            code_attempts: 100,
            rate_window: Duration::from_secs(5),
            rate_max_actions: 10,
            idle_timeout: Duration::from_secs(60 * 60),
        }
    }
}

impl RegistryConfig {
    /// Clamp degenerate values so the config is safe to use.
    ///
    /// Called automatically by `RoomRegistry::new`. A zero room capacity,
    /// zero generator attempts, or a zero rate ceiling would make every
    /// operation fail unconditionally, which is never what an operator
    /// meant.
    pub fn validated(mut self) -> Self {
        if self.max_users_per_room == 0 {
            tracing::warn!("max_users_per_room of 0 clamped to 1");
            self.max_users_per_room = 1;
        }
        if self.code_attempts == 0 {
            tracing::warn!("code_attempts of 0 clamped to 1");
            self.code_attempts = 1;
        }
        if self.rate_max_actions == 0 {
            tracing::warn!("rate_max_actions of 0 clamped to 1");
            self.rate_max_actions = 1;
        }
        self
    }
}
