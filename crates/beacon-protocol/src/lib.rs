//! Wire protocol for Beacon.
//!
//! This crate defines the "language" that signaling clients and the relay
//! speak:
//!
//! - **Types** ([`ClientMessage`], [`ServerEvent`], [`PeerId`],
//!   [`RoomCode`], etc.): the message structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages are
//!   converted to/from JSON text.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw frames) and the registry
//! (room membership). It doesn't know about connections or rooms; it only
//! knows how to serialize and deserialize messages. In particular it never
//! looks inside a relayed `payload`: offer/answer/candidate bodies are
//! opaque JSON carried through unchanged.

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    ClientMessage, MemberInfo, PeerId, PeerInfo, RoomCode, ServerEvent,
    SignalKind,
};
