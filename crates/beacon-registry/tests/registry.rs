//! Integration tests for the room registry state machine.

use std::time::Duration;

use beacon_protocol::{PeerId, ServerEvent};
use beacon_registry::{
    PeerSender, RegistryConfig, RegistryError, RoomRegistry, ValidationError,
    dispatch, is_valid_code,
};
use tokio::sync::mpsc::{self, UnboundedReceiver};

// =========================================================================
// Helpers
// =========================================================================

fn pid(id: u64) -> PeerId {
    PeerId(id)
}

/// Creates a peer sender whose receiver is dropped immediately, for tests
/// that don't inspect deliveries.
fn sink() -> PeerSender {
    mpsc::unbounded_channel().0
}

/// Creates a peer sender plus its receiving half.
fn chan() -> (PeerSender, UnboundedReceiver<ServerEvent>) {
    mpsc::unbounded_channel()
}

fn registry() -> RoomRegistry {
    RoomRegistry::new(RegistryConfig::default())
}

/// Checks the bidirectional membership invariant for the given peers:
/// every peer that claims a room is listed in it, and no room it names is
/// empty.
fn assert_membership_consistent(reg: &RoomRegistry, peers: &[PeerId]) {
    for &p in peers {
        if let Some(code) = reg.member_room(p) {
            let members = reg
                .room_members(&code)
                .expect("peer points at a live room");
            assert!(members.contains(&p), "{p} missing from its room");
            assert!(!members.is_empty());
        }
    }
}

// =========================================================================
// create_room
// =========================================================================

#[test]
fn test_create_room_assigns_valid_code() {
    let mut reg = registry();
    let outcome = reg.create_room(pid(1), "alice", sink()).unwrap();

    assert!(is_valid_code(outcome.room_code.as_str()));
    assert_eq!(outcome.username, "alice");
    assert!(outcome.notifications.is_empty());
    assert_eq!(reg.room_count(), 1);
    assert_eq!(
        reg.room_members(&outcome.room_code).unwrap(),
        vec![pid(1)]
    );
}

#[test]
fn test_create_room_sanitizes_username() {
    let mut reg = registry();
    let outcome = reg.create_room(pid(1), "  alice  ", sink()).unwrap();
    assert_eq!(outcome.username, "alice");

    let err = reg.create_room(pid(2), "   ", sink()).unwrap_err();
    assert!(matches!(
        err,
        RegistryError::Invalid(ValidationError::UsernameEmpty)
    ));
    assert_eq!(reg.room_count(), 1);
}

#[test]
fn test_create_room_respects_max_rooms() {
    let config = RegistryConfig {
        max_rooms: 2,
        ..RegistryConfig::default()
    };
    let mut reg = RoomRegistry::new(config);
    reg.create_room(pid(1), "a", sink()).unwrap();
    reg.create_room(pid(2), "b", sink()).unwrap();

    let err = reg.create_room(pid(3), "c", sink()).unwrap_err();
    assert!(matches!(err, RegistryError::ServerFull));
    assert_eq!(reg.room_count(), 2);
}

#[test]
fn test_create_while_in_a_room_leaves_the_old_one() {
    let mut reg = registry();
    let first = reg.create_room(pid(1), "alice", sink()).unwrap();
    let (tx, mut rx) = chan();
    reg.join_room(pid(2), first.room_code.as_str(), "bob", tx)
        .unwrap();

    // Alice creates a second room; bob must hear that she left the first.
    let second = reg.create_room(pid(1), "alice", sink()).unwrap();
    assert_ne!(first.room_code, second.room_code);
    assert_eq!(reg.member_room(pid(1)), Some(second.room_code.clone()));

    assert_eq!(second.notifications.len(), 1);
    assert_eq!(second.notifications[0].to, pid(2));
    dispatch(second.notifications);
    match rx.try_recv().unwrap() {
        ServerEvent::UserLeft { peer_id, username } => {
            assert_eq!(peer_id, pid(1));
            assert_eq!(username, "alice");
        }
        other => panic!("expected user-left, got {other:?}"),
    }

    assert_membership_consistent(&reg, &[pid(1), pid(2)]);
}

// =========================================================================
// join_room
// =========================================================================

#[test]
fn test_join_room_is_case_insensitive_on_code() {
    let mut reg = registry();
    let created = reg.create_room(pid(1), "alice", sink()).unwrap();

    let lowered = created.room_code.as_str().to_lowercase();
    let joined = reg.join_room(pid(2), &lowered, "bob", sink()).unwrap();
    assert_eq!(joined.room_code, created.room_code);
}

#[test]
fn test_join_unknown_code_fails() {
    let mut reg = registry();
    let err = reg
        .join_room(pid(1), "QQQQQQ", "bob", sink())
        .unwrap_err();
    assert!(matches!(err, RegistryError::RoomNotFound(_)));
}

#[test]
fn test_join_malformed_code_fails_validation() {
    let mut reg = registry();
    let err = reg.join_room(pid(1), "ABC", "bob", sink()).unwrap_err();
    assert!(matches!(
        err,
        RegistryError::Invalid(ValidationError::CodeLength)
    ));
}

#[test]
fn test_existing_users_snapshot_preserves_join_order() {
    let mut reg = registry();
    let created = reg.create_room(pid(1), "alice", sink()).unwrap();
    let code = created.room_code.as_str();
    reg.join_room(pid(2), code, "bob", sink()).unwrap();
    reg.join_room(pid(3), code, "carol", sink()).unwrap();

    let joined = reg.join_room(pid(4), code, "dave", sink()).unwrap();
    let names: Vec<&str> = joined
        .existing_users
        .iter()
        .map(|u| u.username.as_str())
        .collect();
    assert_eq!(names, ["alice", "bob", "carol"]);
    assert!(
        joined.existing_users.iter().all(|u| u.peer_id != pid(4)),
        "snapshot must not include the joiner"
    );
}

#[test]
fn test_join_notifies_the_rest_of_the_room_only() {
    let mut reg = registry();
    let created = reg.create_room(pid(1), "alice", sink()).unwrap();
    let joined = reg
        .join_room(pid(2), created.room_code.as_str(), "bob", sink())
        .unwrap();

    assert_eq!(joined.notifications.len(), 1);
    assert_eq!(joined.notifications[0].to, pid(1));
    match &joined.notifications[0].event {
        ServerEvent::UserJoined { peer_id, username } => {
            assert_eq!(*peer_id, pid(2));
            assert_eq!(username, "bob");
        }
        other => panic!("expected user-joined, got {other:?}"),
    }
}

#[test]
fn test_join_full_room_fails_and_changes_nothing() {
    let config = RegistryConfig {
        max_users_per_room: 3,
        ..RegistryConfig::default()
    };
    let mut reg = RoomRegistry::new(config);
    let created = reg.create_room(pid(1), "u1", sink()).unwrap();
    let code = created.room_code.as_str().to_string();
    reg.join_room(pid(2), &code, "u2", sink()).unwrap();
    reg.join_room(pid(3), &code, "u3", sink()).unwrap();

    let err = reg.join_room(pid(4), &code, "u4", sink()).unwrap_err();
    assert!(matches!(err, RegistryError::RoomFull(_)));
    assert_eq!(
        reg.room_members(&created.room_code).unwrap().len(),
        3,
        "membership must be unchanged after a rejected join"
    );
    assert_eq!(reg.member_room(pid(4)), None);
}

#[test]
fn test_username_conflict_is_case_insensitive() {
    let mut reg = registry();
    let created = reg.create_room(pid(1), "Alice", sink()).unwrap();

    let err = reg
        .join_room(pid(2), created.room_code.as_str(), "aLiCe", sink())
        .unwrap_err();
    assert!(matches!(err, RegistryError::UsernameTaken(_)));
    assert_eq!(reg.member_room(pid(2)), None);
}

#[test]
fn test_same_username_is_fine_in_different_rooms() {
    let mut reg = registry();
    reg.create_room(pid(1), "alice", sink()).unwrap();
    let other = reg.create_room(pid(2), "host", sink()).unwrap();
    reg.join_room(pid(3), other.room_code.as_str(), "alice", sink())
        .unwrap();
}

#[test]
fn test_join_moves_between_rooms() {
    let mut reg = registry();
    let first = reg.create_room(pid(1), "alice", sink()).unwrap();
    let (tx, mut rx) = chan();
    reg.join_room(pid(2), first.room_code.as_str(), "bob", tx)
        .unwrap();
    let second = reg.create_room(pid(3), "carol", sink()).unwrap();

    // Bob hops from alice's room to carol's.
    let joined = reg
        .join_room(pid(2), second.room_code.as_str(), "bob", sink())
        .unwrap();
    assert_eq!(reg.member_room(pid(2)), Some(second.room_code.clone()));
    assert_eq!(
        reg.room_members(&first.room_code).unwrap(),
        vec![pid(1)]
    );

    // The departure notification targets alice, the join notification
    // carol; bob himself hears neither.
    let targets: Vec<PeerId> =
        joined.notifications.iter().map(|o| o.to).collect();
    assert_eq!(targets, vec![pid(1), pid(3)]);
    dispatch(joined.notifications);
    assert!(rx.try_recv().is_err(), "bob's own channel hears nothing");
}

#[test]
fn test_rejoining_own_room_keeps_it_alive() {
    let mut reg = registry();
    let created = reg.create_room(pid(1), "alice", sink()).unwrap();
    let code = created.room_code.as_str().to_string();

    // Sole member re-joins the same room, e.g. to change display name.
    let joined = reg.join_room(pid(1), &code, "alicia", sink()).unwrap();
    assert_eq!(joined.room_code, created.room_code);
    assert!(joined.existing_users.is_empty());
    assert_eq!(
        reg.room_members(&created.room_code).unwrap(),
        vec![pid(1)]
    );
    assert_eq!(reg.room_count(), 1);
}

// =========================================================================
// leave_room
// =========================================================================

#[test]
fn test_leaving_last_member_deletes_the_room() {
    let mut reg = registry();
    let created = reg.create_room(pid(1), "alice", sink()).unwrap();

    reg.leave_room(pid(1), true);
    assert_eq!(reg.room_count(), 0);
    assert_eq!(reg.peer_count(), 0);

    // The old code is dead; joining it must fail.
    let err = reg
        .join_room(pid(2), created.room_code.as_str(), "bob", sink())
        .unwrap_err();
    assert!(matches!(err, RegistryError::RoomNotFound(_)));
}

#[test]
fn test_leave_notifies_remaining_members_not_the_leaver() {
    let mut reg = registry();
    let (alice_tx, mut alice_rx) = chan();
    let (bob_tx, mut bob_rx) = chan();
    let created = reg.create_room(pid(1), "alice", alice_tx).unwrap();
    let joined = reg
        .join_room(pid(2), created.room_code.as_str(), "bob", bob_tx)
        .unwrap();
    dispatch(joined.notifications);

    let batch = reg.leave_room(pid(2), true);
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].to, pid(1));
    dispatch(batch);

    // Drain alice's queue past the user-joined from bob's entry.
    match alice_rx.try_recv().unwrap() {
        ServerEvent::UserJoined { .. } => {}
        other => panic!("expected user-joined first, got {other:?}"),
    }
    match alice_rx.try_recv().unwrap() {
        ServerEvent::UserLeft { peer_id, username } => {
            assert_eq!(peer_id, pid(2));
            assert_eq!(username, "bob");
        }
        other => panic!("expected user-left, got {other:?}"),
    }
    assert!(bob_rx.try_recv().is_err(), "the leaver hears nothing");
}

#[test]
fn test_leave_without_notify_is_silent() {
    let mut reg = registry();
    let (alice_tx, mut alice_rx) = chan();
    let created = reg.create_room(pid(1), "alice", alice_tx).unwrap();
    let joined = reg
        .join_room(pid(2), created.room_code.as_str(), "bob", sink())
        .unwrap();
    dispatch(joined.notifications);

    let batch = reg.leave_room(pid(2), false);
    assert!(batch.is_empty());

    match alice_rx.try_recv().unwrap() {
        ServerEvent::UserJoined { .. } => {}
        other => panic!("unexpected {other:?}"),
    }
    assert!(alice_rx.try_recv().is_err());
}

#[test]
fn test_leave_unknown_connection_is_a_noop() {
    let mut reg = registry();
    let batch = reg.leave_room(pid(99), true);
    assert!(batch.is_empty());
    assert_eq!(reg.room_count(), 0);
}

// =========================================================================
// Membership invariants across sequences
// =========================================================================

#[test]
fn test_invariants_hold_across_churn() {
    let mut reg = registry();
    let peers: Vec<PeerId> = (1..=8).map(pid).collect();

    let a = reg.create_room(pid(1), "u1", sink()).unwrap().room_code;
    let b = reg.create_room(pid(2), "u2", sink()).unwrap().room_code;
    reg.join_room(pid(3), a.as_str(), "u3", sink()).unwrap();
    reg.join_room(pid(4), b.as_str(), "u4", sink()).unwrap();
    reg.join_room(pid(5), a.as_str(), "u5", sink()).unwrap();
    assert_membership_consistent(&reg, &peers);

    // Hop a member across rooms, then drain one room completely.
    reg.join_room(pid(3), b.as_str(), "u3", sink()).unwrap();
    assert_membership_consistent(&reg, &peers);

    reg.leave_room(pid(1), true);
    reg.leave_room(pid(5), true);
    assert_membership_consistent(&reg, &peers);
    assert_eq!(reg.room_members(&a), None, "drained room must be gone");

    assert_eq!(reg.room_count(), 1);
    assert_eq!(reg.peer_count(), 3);
}

// =========================================================================
// set_muted
// =========================================================================

#[test]
fn test_mute_broadcast_includes_the_originator() {
    let mut reg = registry();
    let (alice_tx, mut alice_rx) = chan();
    let (bob_tx, mut bob_rx) = chan();
    let created = reg.create_room(pid(1), "alice", alice_tx).unwrap();
    let joined = reg
        .join_room(pid(2), created.room_code.as_str(), "bob", bob_tx)
        .unwrap();
    dispatch(joined.notifications);
    let _ = alice_rx.try_recv(); // user-joined

    let batch = reg.set_muted(pid(2), true).unwrap();
    let targets: Vec<PeerId> = batch.iter().map(|o| o.to).collect();
    assert!(targets.contains(&pid(1)));
    assert!(targets.contains(&pid(2)), "originator gets confirmation");
    dispatch(batch);

    for rx in [&mut alice_rx, &mut bob_rx] {
        match rx.try_recv().unwrap() {
            ServerEvent::UserMuteChanged { peer_id, muted } => {
                assert_eq!(peer_id, pid(2));
                assert!(muted);
            }
            other => panic!("expected user-mute-changed, got {other:?}"),
        }
    }

    // The flag is visible in the next snapshot.
    let snapshot = reg.room_snapshot(pid(1)).unwrap();
    let bob = snapshot
        .members
        .iter()
        .find(|m| m.username == "bob")
        .unwrap();
    assert!(bob.muted);
}

#[test]
fn test_mute_for_unknown_connection_is_a_noop() {
    let mut reg = registry();
    let batch = reg.set_muted(pid(42), true).unwrap();
    assert!(batch.is_empty());
}

// =========================================================================
// Snapshots
// =========================================================================

#[test]
fn test_room_snapshot_reports_members_without_ids() {
    let mut reg = registry();
    let created = reg.create_room(pid(1), "alice", sink()).unwrap();
    reg.join_room(pid(2), created.room_code.as_str(), "bob", sink())
        .unwrap();

    let snapshot = reg.room_snapshot(pid(2)).unwrap();
    assert_eq!(snapshot.member_count, 2);
    let names: Vec<&str> =
        snapshot.members.iter().map(|m| m.username.as_str()).collect();
    assert_eq!(names, ["alice", "bob"]);

    assert!(reg.room_snapshot(pid(99)).is_none());
}

// =========================================================================
// Rate limiting
// =========================================================================

#[test]
fn test_eleventh_action_in_a_window_is_throttled() {
    let mut reg = registry(); // default: 10 actions per 5 s
    reg.create_room(pid(1), "alice", sink()).unwrap(); // action 1

    for _ in 0..9 {
        reg.set_muted(pid(1), true).unwrap(); // actions 2..=10
    }
    let err = reg.set_muted(pid(1), true).unwrap_err();
    assert!(matches!(err, RegistryError::RateLimited));
}

#[test]
fn test_throttled_mutation_broadcasts_nothing() {
    let mut reg = registry();
    let (alice_tx, mut alice_rx) = chan();
    reg.create_room(pid(1), "alice", alice_tx).unwrap();

    for _ in 0..9 {
        dispatch(reg.set_muted(pid(1), false).unwrap());
    }
    assert!(reg.set_muted(pid(1), true).is_err());

    // Nine confirmations arrived; the throttled tenth produced none.
    let mut seen = 0;
    while alice_rx.try_recv().is_ok() {
        seen += 1;
    }
    assert_eq!(seen, 9);
}

#[test]
fn test_relay_gate_shares_the_same_budget() {
    let mut reg = registry();
    reg.create_room(pid(1), "alice", sink()).unwrap(); // action 1
    for _ in 0..9 {
        assert!(reg.check_rate(pid(1))); // actions 2..=10
    }
    assert!(!reg.check_rate(pid(1)));
}

// =========================================================================
// Relay routing
// =========================================================================

#[test]
fn test_relay_route_requires_shared_room() {
    let mut reg = registry();
    let created = reg.create_room(pid(1), "alice", sink()).unwrap();
    reg.join_room(pid(2), created.room_code.as_str(), "bob", sink())
        .unwrap();
    let elsewhere = reg.create_room(pid(3), "carol", sink()).unwrap();
    assert_ne!(created.room_code, elsewhere.room_code);

    let route = reg.relay_route(pid(1), pid(2)).unwrap();
    assert_eq!(route.from_username, "alice");

    assert!(reg.relay_route(pid(1), pid(3)).is_none(), "cross-room");
    assert!(reg.relay_route(pid(1), pid(99)).is_none(), "unknown target");
    assert!(reg.relay_route(pid(99), pid(1)).is_none(), "unknown sender");
}

#[test]
fn test_relay_route_dies_with_the_target_membership() {
    let mut reg = registry();
    let created = reg.create_room(pid(1), "alice", sink()).unwrap();
    reg.join_room(pid(2), created.room_code.as_str(), "bob", sink())
        .unwrap();
    assert!(reg.relay_route(pid(1), pid(2)).is_some());

    reg.leave_room(pid(2), true);
    assert!(reg.relay_route(pid(1), pid(2)).is_none());
}

// =========================================================================
// Idle reaping
// =========================================================================

#[test]
fn test_reap_idle_force_closes_stale_rooms() {
    let config = RegistryConfig {
        idle_timeout: Duration::from_millis(10),
        ..RegistryConfig::default()
    };
    let mut reg = RoomRegistry::new(config);
    reg.create_room(pid(1), "alice", sink()).unwrap();
    reg.create_room(pid(2), "bob", sink()).unwrap();

    std::thread::sleep(Duration::from_millis(25));
    // A third room created after the sleep is still fresh.
    reg.create_room(pid(3), "carol", sink()).unwrap();

    let reaped = reg.reap_idle();
    assert_eq!(reaped, 2);
    assert_eq!(reg.room_count(), 1);
    // Peer records of force-closed rooms are gone with them.
    assert_eq!(reg.member_room(pid(1)), None);
    assert_eq!(reg.member_room(pid(2)), None);
    assert_eq!(reg.peer_count(), 1);
}

#[test]
fn test_reap_idle_spares_active_rooms() {
    let mut reg = registry(); // 1 h timeout
    reg.create_room(pid(1), "alice", sink()).unwrap();
    assert_eq!(reg.reap_idle(), 0);
    assert_eq!(reg.room_count(), 1);
}
