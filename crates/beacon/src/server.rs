//! `BeaconServer` builder and accept loop.
//!
//! This is the entry point for running the relay. It ties the layers
//! together: transport (WebSocket) → protocol (JSON events) → registry
//! (room state) → per-connection handlers.

use std::sync::Arc;
use std::time::Duration;

use beacon_protocol::{Codec, JsonCodec};
use beacon_registry::{RegistryConfig, RoomRegistry};
use beacon_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::BeaconError;
use crate::handler::handle_connection;

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The
/// registry sits behind a single mutex: every mutating operation runs in
/// one critical section, which is what upholds the membership invariants
/// under concurrent joins and disconnects. Nothing slow ever happens
/// under that lock; notification dispatch and socket writes occur after
/// it is released.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) registry: Mutex<RoomRegistry>,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a Beacon server.
pub struct BeaconServerBuilder {
    bind_addr: String,
    registry_config: RegistryConfig,
    reap_interval: Duration,
}

impl BeaconServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            registry_config: RegistryConfig::default(),
            reap_interval: Duration::from_secs(60),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the registry configuration (capacities, rate limits, idle
    /// timeout).
    pub fn registry_config(mut self, config: RegistryConfig) -> Self {
        self.registry_config = config;
        self
    }

    /// Sets how often the maintenance task reaps idle rooms and sweeps
    /// stale rate-limiter state.
    pub fn reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }

    /// Builds the server, binding the listener.
    ///
    /// Uses `JsonCodec`; the signaling protocol is JSON text frames.
    pub async fn build(self) -> Result<BeaconServer<JsonCodec>, BeaconError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            registry: Mutex::new(RoomRegistry::new(self.registry_config)),
            codec: JsonCodec,
        });

        Ok(BeaconServer {
            transport,
            state,
            reap_interval: self.reap_interval,
        })
    }
}

impl Default for BeaconServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Beacon signaling relay.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct BeaconServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
    reap_interval: Duration,
}

impl<C: Codec> BeaconServer<C> {
    /// Creates a new builder.
    pub fn builder() -> BeaconServerBuilder {
        BeaconServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the server until the process is terminated.
    ///
    /// Spawns the maintenance task, then accepts connections forever,
    /// one handler task per connection.
    pub async fn run(mut self) -> Result<(), BeaconError> {
        tracing::info!("Beacon signaling relay running");

        let reaper_state = Arc::clone(&self.state);
        let reap_interval = self.reap_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(reap_interval);
            loop {
                ticker.tick().await;
                let (reaped, swept) = {
                    let mut registry = reaper_state.registry.lock().await;
                    (registry.reap_idle(), registry.sweep_rate_states())
                };
                if reaped > 0 || swept > 0 {
                    tracing::debug!(reaped, swept, "maintenance pass");
                }
            }
        });

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
