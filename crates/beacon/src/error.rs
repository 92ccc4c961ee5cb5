//! Unified error type for the Beacon server.

use beacon_protocol::ProtocolError;
use beacon_registry::RegistryError;
use beacon_transport::TransportError;

/// Top-level error that wraps all layer-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so `?` converts layer errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum BeaconError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A registry-level error (validation, capacity, conflicts).
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
