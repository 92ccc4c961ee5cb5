//! Per-connection handler: event loop and lifecycle cleanup.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Derive the peer id from the transport connection
//!   2. Spawn a writer task that drains this peer's event channel to the
//!      socket
//!   3. Loop: decode client messages → registry/relay operations →
//!      dispatch the resulting notifications
//!   4. On any exit, the drop guard performs the implicit leave

use std::sync::Arc;

use beacon_protocol::{ClientMessage, Codec, PeerId, ServerEvent, SignalKind};
use beacon_registry::{PeerSender, RegistryError, dispatch};
use beacon_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::BeaconError;
use crate::relay::relay_signal;
use crate::server::ServerState;

/// Drop guard that removes a peer from its room when the handler exits.
///
/// This ensures cleanup happens however the handler ends: clean close,
/// transport error, or panic, including mid-operation. A disconnect is an
/// implicit `leave-room` with notification. Since `Drop` is synchronous,
/// the async registry access runs in a fire-and-forget task.
struct DisconnectGuard<C: Codec> {
    peer_id: PeerId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for DisconnectGuard<C> {
    fn drop(&mut self) {
        let peer_id = self.peer_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let batch = {
                let mut registry = state.registry.lock().await;
                registry.leave_room(peer_id, true)
            };
            dispatch(batch);
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), BeaconError> {
    let peer_id = PeerId(conn.id().into_inner());
    tracing::debug!(%peer_id, "peer connected");

    // Everything this peer must hear flows through one channel, in order.
    // The writer task owns the socket's send half; registry operations
    // only ever enqueue, so a slow socket never blocks anyone.
    let (events_tx, events_rx) = mpsc::unbounded_channel::<ServerEvent>();
    tokio::spawn(forward_events(
        conn.clone(),
        Arc::clone(&state),
        peer_id,
        events_rx,
    ));

    let _guard = DisconnectGuard {
        peer_id,
        state: Arc::clone(&state),
    };

    loop {
        let text = match conn.recv().await {
            Ok(Some(text)) => text,
            Ok(None) => {
                tracing::info!(%peer_id, "connection closed");
                break;
            }
            Err(e) => {
                tracing::debug!(%peer_id, error = %e, "recv error");
                break;
            }
        };

        let msg: ClientMessage = match state.codec.decode(&text) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(%peer_id, error = %e, "undecodable message");
                let _ = events_tx.send(ServerEvent::Error {
                    message: "invalid message".into(),
                });
                continue;
            }
        };

        dispatch_client_message(&state, peer_id, &events_tx, msg).await;
    }

    // _guard drops here: the implicit leave fires, the registry releases
    // its clone of `events_tx`, and the writer task drains out.
    Ok(())
}

/// Writer task: encodes and sends every queued event for one peer.
async fn forward_events<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
    peer_id: PeerId,
    mut events: mpsc::UnboundedReceiver<ServerEvent>,
) {
    while let Some(event) = events.recv().await {
        let text = match state.codec.encode(&event) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(%peer_id, error = %e, "failed to encode event");
                continue;
            }
        };
        if conn.send(&text).await.is_err() {
            // The socket is gone; the read loop will notice on its own.
            break;
        }
    }
}

/// Routes one decoded client message to the registry or the relay.
async fn dispatch_client_message<C: Codec>(
    state: &Arc<ServerState<C>>,
    peer_id: PeerId,
    events: &PeerSender,
    msg: ClientMessage,
) {
    match msg {
        ClientMessage::CreateRoom { username } => {
            let result = {
                let mut registry = state.registry.lock().await;
                registry.create_room(peer_id, &username, events.clone())
            };
            match result {
                Ok(outcome) => {
                    dispatch(outcome.notifications);
                    let _ = events.send(ServerEvent::RoomCreated {
                        room_code: outcome.room_code,
                        username: outcome.username,
                    });
                }
                Err(e) => send_error(events, &e),
            }
        }

        ClientMessage::JoinRoom { room_code, username } => {
            let result = {
                let mut registry = state.registry.lock().await;
                registry.join_room(peer_id, &room_code, &username, events.clone())
            };
            match result {
                Ok(outcome) => {
                    let _ = events.send(ServerEvent::RoomJoined {
                        room_code: outcome.room_code,
                        username: outcome.username,
                        existing_users: outcome.existing_users,
                    });
                    dispatch(outcome.notifications);
                }
                Err(e) => send_error(events, &e),
            }
        }

        ClientMessage::LeaveRoom => {
            let batch = {
                let mut registry = state.registry.lock().await;
                registry.leave_room(peer_id, true)
            };
            dispatch(batch);
        }

        ClientMessage::MuteStatus { muted } => {
            let result = {
                let mut registry = state.registry.lock().await;
                registry.set_muted(peer_id, muted)
            };
            match result {
                Ok(batch) => dispatch(batch),
                Err(e) => send_error(events, &e),
            }
        }

        ClientMessage::Offer { target_id, payload } => {
            relay_signal(state, SignalKind::Offer, peer_id, target_id, payload, events)
                .await;
        }

        ClientMessage::Answer { target_id, payload } => {
            relay_signal(state, SignalKind::Answer, peer_id, target_id, payload, events)
                .await;
        }

        ClientMessage::IceCandidate { target_id, payload } => {
            relay_signal(
                state,
                SignalKind::IceCandidate,
                peer_id,
                target_id,
                payload,
                events,
            )
            .await;
        }

        ClientMessage::GetRoomInfo => {
            let snapshot = {
                let registry = state.registry.lock().await;
                registry.room_snapshot(peer_id)
            };
            match snapshot {
                Some(info) => {
                    let _ = events.send(ServerEvent::RoomInfo {
                        member_count: info.member_count,
                        members: info.members,
                    });
                }
                None => {
                    let _ = events.send(ServerEvent::Error {
                        message: "you are not in a room".into(),
                    });
                }
            }
        }
    }
}

/// Surfaces a registry failure to the peer as an `error` event.
fn send_error(events: &PeerSender, err: &RegistryError) {
    let _ = events.send(ServerEvent::Error {
        message: err.to_string(),
    });
}
