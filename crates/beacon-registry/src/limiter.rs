//! Per-connection sliding-window rate limiter.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use beacon_protocol::PeerId;

/// One connection's position in the current window.
#[derive(Debug)]
struct RateState {
    window_start: Instant,
    actions: u32,
}

/// A sliding-window action throttle, keyed by connection.
///
/// The gate sits in front of room-mutating and signaling operations, not
/// in front of idempotent reads. State for a connection is dropped when
/// it leaves ([`forget`](Self::forget)) and stale entries are swept
/// periodically so the map stays bounded by the set of recently active
/// connections.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max_actions: u32,
    states: HashMap<PeerId, RateState>,
}

impl RateLimiter {
    /// Creates a limiter allowing `max_actions` per `window`.
    pub fn new(window: Duration, max_actions: u32) -> Self {
        Self {
            window,
            max_actions,
            states: HashMap::new(),
        }
    }

    /// Records one action and returns whether it is allowed.
    ///
    /// The first action for a connection opens its window. Once a window
    /// is older than the configured length it resets transparently; the
    /// caller never has to clear anything.
    pub fn check(&mut self, peer_id: PeerId) -> bool {
        self.check_at(peer_id, Instant::now())
    }

    /// [`check`](Self::check) with an explicit clock, for tests.
    pub fn check_at(&mut self, peer_id: PeerId, now: Instant) -> bool {
        let state = self.states.entry(peer_id).or_insert(RateState {
            window_start: now,
            actions: 0,
        });

        if now.duration_since(state.window_start) >= self.window {
            state.window_start = now;
            state.actions = 0;
        }

        state.actions += 1;
        let allowed = state.actions <= self.max_actions;
        if !allowed {
            tracing::debug!(
                %peer_id,
                actions = state.actions,
                "action throttled"
            );
        }
        allowed
    }

    /// Drops the state for a departed connection.
    pub fn forget(&mut self, peer_id: PeerId) {
        self.states.remove(&peer_id);
    }

    /// Evicts entries whose window went stale more than two windows ago.
    /// Returns how many were dropped.
    pub fn sweep(&mut self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// [`sweep`](Self::sweep) with an explicit clock, for tests.
    pub fn sweep_at(&mut self, now: Instant) -> usize {
        let horizon = self.window * 2;
        let before = self.states.len();
        self.states
            .retain(|_, state| now.duration_since(state.window_start) <= horizon);
        before - self.states.len()
    }

    /// Number of connections currently tracked.
    pub fn tracked(&self) -> usize {
        self.states.len()
    }
}
