//! # Beacon
//!
//! A signaling relay for peer-to-peer connection setup. Clients create or
//! join rooms identified by short codes, discover each other, and exchange
//! opaque offer/answer/candidate payloads that the relay forwards to one
//! specific peer without ever interpreting them.
//!
//! The layers, bottom-up: `beacon-transport` (WebSocket frames),
//! `beacon-protocol` (typed messages and events), `beacon-registry` (the
//! room/membership state machine), and this crate, which ties them into a
//! running server.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use beacon::BeaconServerBuilder;
//!
//! # async fn run() -> Result<(), beacon::BeaconError> {
//! let server = BeaconServerBuilder::new().bind("0.0.0.0:3000").build().await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod relay;
mod server;

pub use error::BeaconError;
pub use server::{BeaconServer, BeaconServerBuilder};
