//! The room registry: every mutable piece of relay state, in one place.
//!
//! All mutation is routed through the operations here, executed by the
//! caller under a single mutex. Operations validate, mutate, and compute
//! who must hear about the change; the resulting [`Outbound`] batch is
//! dispatched by the caller *after* the lock is released, so transport
//! hiccups never extend the critical section.
//!
//! Two invariants hold at every operation boundary:
//!
//! - membership is bidirectional: a peer record points at a room that
//!   lists it, and every listed member has a peer record
//! - a room with zero members does not exist; emptying a room deletes it
//!   synchronously within the same operation

use std::collections::HashMap;
use std::time::Instant;

use beacon_protocol::{
    MemberInfo, PeerId, PeerInfo, RoomCode, ServerEvent,
};

use crate::room::{Peer, PeerSender, Room};
use crate::{RateLimiter, RegistryConfig, RegistryError, code, policy};

// ---------------------------------------------------------------------------
// Operation outputs
// ---------------------------------------------------------------------------

/// One notification to deliver once the registry lock is released.
#[derive(Debug)]
pub struct Outbound {
    /// The recipient, for logging and tests.
    pub to: PeerId,
    /// The recipient's event channel.
    pub sender: PeerSender,
    /// The event to deliver.
    pub event: ServerEvent,
}

/// Delivers a notification batch. Fire-and-forget: a closed channel means
/// the recipient disconnected while the batch was in flight, which is an
/// expected race, not a fault.
pub fn dispatch(batch: Vec<Outbound>) {
    for out in batch {
        let _ = out.sender.send(out.event);
    }
}

/// Successful `create_room` result.
#[derive(Debug)]
pub struct CreateRoomOutcome {
    pub room_code: RoomCode,
    pub username: String,
    /// Departure notifications for the room the creator implicitly left,
    /// if any.
    pub notifications: Vec<Outbound>,
}

/// Successful `join_room` result.
#[derive(Debug)]
pub struct JoinRoomOutcome {
    pub room_code: RoomCode,
    pub username: String,
    /// The room as it was before this join, in join order, without the
    /// joiner.
    pub existing_users: Vec<PeerInfo>,
    /// `user-joined` for the rest of the room, plus departure events for
    /// any room the joiner implicitly left.
    pub notifications: Vec<Outbound>,
}

/// Read-only view of a room for its members.
pub struct RoomSnapshot {
    pub member_count: usize,
    pub members: Vec<MemberInfo>,
}

/// Routing data for one relayed signal.
pub struct RelayRoute {
    /// The target's event channel.
    pub target: PeerSender,
    /// The sender's display name, attached to initiating signals.
    pub from_username: String,
}

// ---------------------------------------------------------------------------
// RoomRegistry
// ---------------------------------------------------------------------------

/// Owns all room, membership, and rate-limit state.
///
/// See the crate docs for the concurrency contract: plain synchronous
/// struct, one `Mutex` around it at the server layer, notification
/// dispatch outside the lock.
pub struct RoomRegistry {
    config: RegistryConfig,
    rooms: HashMap<RoomCode, Room>,
    peers: HashMap<PeerId, Peer>,
    limiter: RateLimiter,
}

impl RoomRegistry {
    /// Creates an empty registry with a validated config.
    pub fn new(config: RegistryConfig) -> Self {
        let config = config.validated();
        let limiter =
            RateLimiter::new(config.rate_window, config.rate_max_actions);
        Self {
            config,
            rooms: HashMap::new(),
            peers: HashMap::new(),
            limiter,
        }
    }

    /// Creates a new room with `peer_id` as its sole, unmuted member.
    ///
    /// A connection already in a room leaves it first, with the usual
    /// departure notification. At most one membership per connection
    /// exists at any time.
    ///
    /// # Errors
    /// [`RegistryError::RateLimited`], a validation error,
    /// [`RegistryError::ServerFull`], or
    /// [`RegistryError::CodesExhausted`]. Failures happen before the
    /// implicit leave, so a failed create changes nothing.
    pub fn create_room(
        &mut self,
        peer_id: PeerId,
        raw_username: &str,
        sender: PeerSender,
    ) -> Result<CreateRoomOutcome, RegistryError> {
        if !self.limiter.check(peer_id) {
            return Err(RegistryError::RateLimited);
        }
        let username =
            policy::sanitize_username(raw_username, self.config.max_username_len)?;

        if self.rooms.len() >= self.config.max_rooms {
            return Err(RegistryError::ServerFull);
        }
        let attempts = self.config.code_attempts;
        let code =
            code::generate_unique(attempts, |c| self.rooms.contains_key(c))?;

        let notifications = self.remove_from_room(peer_id, true);

        let now = Instant::now();
        let mut room = Room::new(code.clone(), now);
        room.members.push(peer_id);
        self.rooms.insert(code.clone(), room);
        self.peers.insert(
            peer_id,
            Peer {
                username: username.clone(),
                room: code.clone(),
                joined_at: now,
                muted: false,
                sender,
            },
        );

        tracing::info!(%peer_id, username = %username, room = %code, "room created");
        Ok(CreateRoomOutcome {
            room_code: code,
            username,
            notifications,
        })
    }

    /// Adds `peer_id` to the room named by `raw_code`.
    ///
    /// Capacity and username-uniqueness checks run against the target
    /// room in the same critical section as the insertion; there is no
    /// window in which two racing joins can both pass against a stale
    /// view. A connection already in a room (including this one) leaves
    /// it first, with notification.
    ///
    /// # Errors
    /// [`RegistryError::RateLimited`], a validation error,
    /// [`RegistryError::RoomNotFound`], [`RegistryError::RoomFull`], or
    /// [`RegistryError::UsernameTaken`]. All fire before any mutation.
    pub fn join_room(
        &mut self,
        peer_id: PeerId,
        raw_code: &str,
        raw_username: &str,
        sender: PeerSender,
    ) -> Result<JoinRoomOutcome, RegistryError> {
        if !self.limiter.check(peer_id) {
            return Err(RegistryError::RateLimited);
        }
        let code = policy::normalize_room_code(raw_code)?;
        let username =
            policy::sanitize_username(raw_username, self.config.max_username_len)?;

        let room = self
            .rooms
            .get(&code)
            .ok_or_else(|| RegistryError::RoomNotFound(code.clone()))?;

        // Every check excludes the joiner itself, which matters when a
        // connection re-joins the room it is already in.
        let occupied =
            room.members.iter().filter(|m| **m != peer_id).count();
        if occupied >= self.config.max_users_per_room {
            return Err(RegistryError::RoomFull(code));
        }

        let folded = username.to_lowercase();
        for member in room.members.iter().filter(|m| **m != peer_id) {
            if let Some(peer) = self.peers.get(member) {
                if peer.username.to_lowercase() == folded {
                    return Err(RegistryError::UsernameTaken(username));
                }
            }
        }

        // Snapshot before insertion: join order, joiner excluded.
        let existing_users: Vec<PeerInfo> = room
            .members
            .iter()
            .filter(|m| **m != peer_id)
            .filter_map(|m| {
                self.peers.get(m).map(|p| PeerInfo {
                    peer_id: *m,
                    username: p.username.clone(),
                })
            })
            .collect();

        // Implicit leave of any prior room. Re-joining the current room
        // must not tear the room down mid-operation when the joiner was
        // its only member, so that case skips empty-room deletion; the
        // zero-member invariant binds at operation boundaries.
        let rejoining = self
            .peers
            .get(&peer_id)
            .is_some_and(|p| p.room == code);
        let mut notifications = if rejoining {
            let peer = self.peers.remove(&peer_id).expect("checked above");
            let room =
                self.rooms.get_mut(&code).expect("room looked up above");
            room.remove_member(peer_id);
            self.notify_members(&code, None, ServerEvent::UserLeft {
                peer_id,
                username: peer.username,
            })
        } else {
            self.remove_from_room(peer_id, true)
        };

        let now = Instant::now();
        let room = self
            .rooms
            .get_mut(&code)
            .expect("target room verified above");
        room.members.push(peer_id);
        room.touch(now);
        let member_count = room.members.len();
        self.peers.insert(
            peer_id,
            Peer {
                username: username.clone(),
                room: code.clone(),
                joined_at: now,
                muted: false,
                sender,
            },
        );

        notifications.extend(self.notify_members(
            &code,
            Some(peer_id),
            ServerEvent::UserJoined {
                peer_id,
                username: username.clone(),
            },
        ));

        tracing::info!(
            %peer_id,
            username = %username,
            room = %code,
            members = member_count,
            "member joined"
        );
        Ok(JoinRoomOutcome {
            room_code: code,
            username,
            existing_users,
            notifications,
        })
    }

    /// Removes `peer_id` from its room and drops its rate state.
    ///
    /// No-op for an unknown connection. When `notify`, the remaining
    /// members receive `user-left`; the departing connection itself
    /// receives nothing either way.
    pub fn leave_room(&mut self, peer_id: PeerId, notify: bool) -> Vec<Outbound> {
        let batch = self.remove_from_room(peer_id, notify);
        self.limiter.forget(peer_id);
        batch
    }

    /// Updates a member's muted flag and broadcasts the new state to the
    /// whole room, the member itself included, as confirmation.
    ///
    /// No-op (but still rate-gated) for a connection not in any room.
    pub fn set_muted(
        &mut self,
        peer_id: PeerId,
        muted: bool,
    ) -> Result<Vec<Outbound>, RegistryError> {
        if !self.limiter.check(peer_id) {
            return Err(RegistryError::RateLimited);
        }
        let Some(peer) = self.peers.get_mut(&peer_id) else {
            return Ok(Vec::new());
        };
        peer.muted = muted;
        let code = peer.room.clone();
        if let Some(room) = self.rooms.get_mut(&code) {
            room.touch(Instant::now());
        }

        tracing::debug!(%peer_id, muted, room = %code, "mute state changed");
        Ok(self.notify_members(&code, None, ServerEvent::UserMuteChanged {
            peer_id,
            muted,
        }))
    }

    /// Read-only view of the caller's room, or `None` when not in one.
    /// Not rate-gated: reads mutate nothing and are cheap.
    pub fn room_snapshot(&self, peer_id: PeerId) -> Option<RoomSnapshot> {
        let peer = self.peers.get(&peer_id)?;
        let room = self.rooms.get(&peer.room)?;
        let members: Vec<MemberInfo> = room
            .members
            .iter()
            .filter_map(|m| self.peers.get(m))
            .map(|p| MemberInfo {
                username: p.username.clone(),
                muted: p.muted,
            })
            .collect();
        Some(RoomSnapshot {
            member_count: members.len(),
            members,
        })
    }

    /// Records one action against `peer_id`'s rate window. Exposed for
    /// the signaling relay, which gates forwards the same way mutations
    /// are gated.
    pub fn check_rate(&mut self, peer_id: PeerId) -> bool {
        self.limiter.check(peer_id)
    }

    /// Routing data for a signal from `from` to `to`.
    ///
    /// `Some` only while both connections are members of the same room.
    /// Anything else (unknown target, different rooms, sender not in a
    /// room) is `None`: the caller drops the signal silently, because a
    /// racing disconnect and a hostile request are indistinguishable to
    /// the sender and neither deserves an error.
    pub fn relay_route(&self, from: PeerId, to: PeerId) -> Option<RelayRoute> {
        let sender = self.peers.get(&from)?;
        let target = self.peers.get(&to)?;
        if sender.room != target.room {
            return None;
        }
        Some(RelayRoute {
            target: target.sender.clone(),
            from_username: sender.username.clone(),
        })
    }

    /// Force-closes abandoned rooms. Returns how many were reaped.
    ///
    /// A room is abandoned when its last activity is older than the idle
    /// timeout; zero-member rooms are also caught here as a backstop,
    /// though synchronous deletion means none should exist. Reaping is
    /// silent: no notifications, any attached peer records and their rate
    /// state are simply removed.
    pub fn reap_idle(&mut self) -> usize {
        let timeout = self.config.idle_timeout;
        let stale: Vec<RoomCode> = self
            .rooms
            .values()
            .filter(|r| {
                r.members.is_empty() || r.last_activity.elapsed() > timeout
            })
            .map(|r| r.code.clone())
            .collect();

        for code in &stale {
            if let Some(room) = self.rooms.remove(code) {
                for member in room.members {
                    self.peers.remove(&member);
                    self.limiter.forget(member);
                }
                tracing::info!(
                    room = %code,
                    age = ?room.created_at.elapsed(),
                    "idle room reaped"
                );
            }
        }
        stale.len()
    }

    /// Evicts stale rate-limiter entries. Returns how many were dropped.
    pub fn sweep_rate_states(&mut self) -> usize {
        self.limiter.sweep()
    }

    // -- Introspection (status reporting, tests) --

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of connections currently in rooms.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// The room a connection is in, if any.
    pub fn member_room(&self, peer_id: PeerId) -> Option<RoomCode> {
        self.peers.get(&peer_id).map(|p| p.room.clone())
    }

    /// A room's members in join order, or `None` for a dead code.
    pub fn room_members(&self, code: &RoomCode) -> Option<Vec<PeerId>> {
        self.rooms.get(code).map(|r| r.members.clone())
    }

    // -- Internals --

    /// Removes `peer_id` from its room, deleting the room if that leaves
    /// it empty. Returns `user-left` notifications for the remaining
    /// members when `notify`.
    ///
    /// This is the one place membership is torn down; `create_room` and
    /// `join_room` call it directly while already mutating, which is why
    /// the registry needs no re-entrant locking: nesting happens at the
    /// method level, inside the caller's single critical section.
    fn remove_from_room(&mut self, peer_id: PeerId, notify: bool) -> Vec<Outbound> {
        let Some(peer) = self.peers.remove(&peer_id) else {
            return Vec::new();
        };
        let Some(room) = self.rooms.get_mut(&peer.room) else {
            tracing::warn!(%peer_id, room = %peer.room, "peer pointed at a dead room");
            return Vec::new();
        };
        room.remove_member(peer_id);
        tracing::info!(
            %peer_id,
            username = %peer.username,
            room = %peer.room,
            in_room_for = ?peer.joined_at.elapsed(),
            "member left"
        );

        if room.members.is_empty() {
            let room = self
                .rooms
                .remove(&peer.room)
                .expect("room fetched above");
            tracing::info!(
                room = %peer.room,
                lifetime = ?room.created_at.elapsed(),
                "room deleted (empty)"
            );
            return Vec::new();
        }

        room.touch(Instant::now());
        if !notify {
            return Vec::new();
        }
        self.notify_members(&peer.room, None, ServerEvent::UserLeft {
            peer_id,
            username: peer.username.clone(),
        })
    }

    /// Builds a notification batch for a room's members, optionally
    /// excluding one of them.
    fn notify_members(
        &self,
        code: &RoomCode,
        exclude: Option<PeerId>,
        event: ServerEvent,
    ) -> Vec<Outbound> {
        let Some(room) = self.rooms.get(code) else {
            return Vec::new();
        };
        room.members
            .iter()
            .filter(|m| Some(**m) != exclude)
            .filter_map(|m| {
                self.peers.get(m).map(|p| Outbound {
                    to: *m,
                    sender: p.sender.clone(),
                    event: event.clone(),
                })
            })
            .collect()
    }
}
