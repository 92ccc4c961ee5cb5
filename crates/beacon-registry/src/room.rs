//! Room and peer records owned by the registry.
//!
//! These are private data of [`RoomRegistry`](crate::RoomRegistry): no
//! other component reads or writes them directly, which is what makes the
//! membership invariants enforceable in one place.

use std::time::Instant;

use beacon_protocol::{PeerId, RoomCode, ServerEvent};
use tokio::sync::mpsc;

/// Channel sender for delivering outbound events to one connection.
///
/// Cheap to clone. The receiving half lives in that connection's writer
/// task; if the connection is gone the send fails and is ignored.
pub type PeerSender = mpsc::UnboundedSender<ServerEvent>;

/// One live connection's membership record.
///
/// A `Peer` exists exactly while its connection is in a room, so every
/// record always points at a live room that contains it. There is no
/// "unjoined" or "zombie" state to clean up lazily.
pub(crate) struct Peer {
    pub username: String,
    pub room: RoomCode,
    pub joined_at: Instant,
    pub muted: bool,
    pub sender: PeerSender,
}

/// A named membership group.
pub(crate) struct Room {
    pub code: RoomCode,
    /// Members in join order. Order matters: the `existingUsers`
    /// snapshot sent to a joiner preserves it.
    pub members: Vec<PeerId>,
    pub created_at: Instant,
    pub last_activity: Instant,
}

impl Room {
    pub fn new(code: RoomCode, now: Instant) -> Self {
        Self {
            code,
            members: Vec::new(),
            created_at: now,
            last_activity: now,
        }
    }

    /// Marks the room as active.
    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }

    /// Removes a member, preserving the join order of the rest.
    /// Returns whether the member was present.
    pub fn remove_member(&mut self, peer_id: PeerId) -> bool {
        match self.members.iter().position(|m| *m == peer_id) {
            Some(idx) => {
                self.members.remove(idx);
                true
            }
            None => false,
        }
    }
}
