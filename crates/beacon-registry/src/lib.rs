//! Room and membership state machine for the Beacon signaling relay.
//!
//! This crate owns every piece of mutable relay state:
//!
//! - **Room code generation** ([`generate_unique`]): short, human-typable
//!   identifiers drawn from an ambiguity-reduced alphabet.
//! - **Validation policy** ([`sanitize_username`], [`normalize_room_code`]):
//!   what counts as an acceptable display name or room code.
//! - **Rate limiting** ([`RateLimiter`]): a per-connection sliding window
//!   applied in front of every room-mutating and signaling operation.
//! - **The registry itself** ([`RoomRegistry`]): create/join/leave/mute
//!   operations, membership invariants, and idle-room reclamation.
//!
//! # Concurrency note
//!
//! `RoomRegistry` is NOT thread-safe by itself. It is a plain synchronous
//! state machine accessed through a `tokio::sync::Mutex` one layer up (the
//! server crate). Every mutating operation completes in bounded time with
//! no I/O: operations return batches of [`Outbound`] notifications that
//! the caller dispatches after releasing the lock, so a slow peer can
//! never stall a mutation. Keeping the struct lock-free here avoids
//! hidden locking overhead and makes the invariants directly testable.

mod code;
mod config;
mod error;
mod limiter;
mod policy;
mod registry;
mod room;

pub use code::{CODE_ALPHABET, CODE_LEN, generate_unique, is_valid_code};
pub use config::RegistryConfig;
pub use error::{RegistryError, ValidationError};
pub use limiter::RateLimiter;
pub use policy::{normalize_room_code, sanitize_username};
pub use registry::{
    CreateRoomOutcome, JoinRoomOutcome, Outbound, RelayRoute, RoomRegistry,
    RoomSnapshot, dispatch,
};
pub use room::PeerSender;
