//! The signaling relay: forwards opaque negotiation payloads between
//! co-located peers.
//!
//! The relay is a router, not a protocol participant. It checks that
//! sender and target currently share a room and then passes the payload
//! through unchanged; it never parses an SDP blob or an ICE candidate.

use std::sync::Arc;

use beacon_protocol::{Codec, PeerId, ServerEvent, SignalKind};
use beacon_registry::{PeerSender, RegistryError};

use crate::server::ServerState;

/// Forwards one signal from `from` to `target_id`.
///
/// Returns whether the signal was delivered to the target's queue.
///
/// Failure modes are deliberately asymmetric: exceeding the rate limit is
/// the sender's own doing and surfaces as an `error` event, but a missing
/// or cross-room target is dropped silently. The sender cannot tell a
/// racing disconnect from a hostile request, and neither should alarm
/// them; the drop is logged for operators and nothing more.
pub(crate) async fn relay_signal<C: Codec>(
    state: &Arc<ServerState<C>>,
    kind: SignalKind,
    from: PeerId,
    target_id: PeerId,
    payload: serde_json::Value,
    events: &PeerSender,
) -> bool {
    let route = {
        let mut registry = state.registry.lock().await;
        if !registry.check_rate(from) {
            Err(RegistryError::RateLimited)
        } else {
            Ok(registry.relay_route(from, target_id))
        }
    };

    let route = match route {
        Err(e) => {
            let _ = events.send(ServerEvent::Error {
                message: e.to_string(),
            });
            return false;
        }
        Ok(None) => {
            tracing::debug!(
                %from,
                target = %target_id,
                signal = %kind,
                "signal dropped: target not reachable from sender"
            );
            return false;
        }
        Ok(Some(route)) => route,
    };

    let event = match kind {
        SignalKind::Offer => ServerEvent::Offer {
            from_id: from,
            from_username: route.from_username,
            payload,
        },
        SignalKind::Answer => ServerEvent::Answer {
            from_id: from,
            payload,
        },
        SignalKind::IceCandidate => ServerEvent::IceCandidate {
            from_id: from,
            payload,
        },
    };

    // Delivery happens outside the registry lock; a dead target channel
    // is the same expected race as a missing target.
    let _ = route.target.send(event);
    true
}
