//! Core protocol types for Beacon's wire format.
//!
//! Every type here travels on the wire as JSON text. The shape follows the
//! conventions browser signaling clients expect: messages are internally
//! tagged (`"type": "join-room"`), event names are kebab-case, and field
//! names are camelCase (`roomCode`, `targetId`, `fromUsername`).

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for one live client connection.
///
/// Assigned by the transport at accept time and valid for the lifetime of
/// that connection. Peers address each other by `PeerId` when exchanging
/// offer/answer/candidate messages.
///
/// `#[serde(transparent)]` makes this serialize as the bare number, so a
/// `PeerId(42)` is just `42` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// A six-character, human-typable room identifier.
///
/// Always stored uppercase; codes are drawn from an ambiguity-reduced
/// alphabet (no `0`/`O`/`1`/`I`) so they survive being read out loud.
/// Normalization of client input happens in the registry's validation
/// policy; a `RoomCode` held by the registry is already canonical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(pub String);

impl RoomCode {
    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Room member views
// ---------------------------------------------------------------------------

/// A member entry in the `existingUsers` snapshot sent to a joiner.
///
/// Carries the peer id because the joiner needs it to address offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    pub peer_id: PeerId,
    pub username: String,
}

/// A member entry in a `room-info` response.
///
/// Deliberately carries no peer id: room-info is a read-only view and
/// leaks no connection identifiers beyond the requester's own context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberInfo {
    pub username: String,
    pub muted: bool,
}

// ---------------------------------------------------------------------------
// Signal kinds
// ---------------------------------------------------------------------------

/// The three relayed negotiation message kinds.
///
/// The relay never interprets the payloads these name; the kind only
/// selects which outbound event wraps the forwarded payload. `Offer` is
/// the initiating kind and is the only one that carries the sender's
/// username alongside their id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offer => f.write_str("offer"),
            Self::Answer => f.write_str("answer"),
            Self::IceCandidate => f.write_str("ice-candidate"),
        }
    }
}

// ---------------------------------------------------------------------------
// Client → server messages
// ---------------------------------------------------------------------------

/// Everything a client can send to the relay.
///
/// `#[serde(tag = "type")]` produces the internally tagged form:
/// `{ "type": "join-room", "roomCode": "K3M7XQ", "username": "bob" }`.
/// Relay payloads are [`serde_json::Value`]: opaque blobs the server
/// forwards without inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Create a new room and become its first member.
    CreateRoom { username: String },

    /// Join an existing room by code. The code is case-insensitive on
    /// input; the registry normalizes it.
    JoinRoom { room_code: String, username: String },

    /// Leave the current room. No-op when not in a room.
    LeaveRoom,

    /// Update this member's muted flag; broadcast to the whole room.
    MuteStatus { muted: bool },

    /// Forward a connection offer to one peer in the same room.
    Offer {
        target_id: PeerId,
        payload: serde_json::Value,
    },

    /// Forward an answer to a previously received offer.
    Answer {
        target_id: PeerId,
        payload: serde_json::Value,
    },

    /// Forward an ICE candidate.
    IceCandidate {
        target_id: PeerId,
        payload: serde_json::Value,
    },

    /// Request a read-only snapshot of the current room.
    GetRoomInfo,
}

// ---------------------------------------------------------------------------
// Server → client events
// ---------------------------------------------------------------------------

/// Everything the relay can emit to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Reply to `create-room`: the assigned code and sanitized username.
    RoomCreated { room_code: RoomCode, username: String },

    /// Reply to `join-room`. `existing_users` is a snapshot of the room
    /// taken before the joiner was inserted, in join order, and never
    /// includes the joiner itself.
    RoomJoined {
        room_code: RoomCode,
        username: String,
        existing_users: Vec<PeerInfo>,
    },

    /// Broadcast to a room when a new member joins (joiner excluded).
    UserJoined { peer_id: PeerId, username: String },

    /// Broadcast to the remaining members when someone leaves.
    UserLeft { peer_id: PeerId, username: String },

    /// Broadcast to the whole room, including the member that changed,
    /// so the originator gets state confirmation.
    UserMuteChanged { peer_id: PeerId, muted: bool },

    /// Reply to `get-room-info`.
    RoomInfo {
        member_count: usize,
        members: Vec<MemberInfo>,
    },

    /// A user-facing failure: validation, capacity, conflict, throttle.
    Error { message: String },

    /// A relayed offer. The initiating kind also names the sender so the
    /// receiver can label the incoming connection.
    Offer {
        from_id: PeerId,
        from_username: String,
        payload: serde_json::Value,
    },

    /// A relayed answer.
    Answer {
        from_id: PeerId,
        payload: serde_json::Value,
    },

    /// A relayed ICE candidate.
    IceCandidate {
        from_id: PeerId,
        payload: serde_json::Value,
    },
}
