//! Beacon signaling relay entry point.
//!
//! Configuration is environment-driven: `PORT` selects the listen port
//! (default 3000) and `RUST_LOG` controls log verbosity.

use beacon::{BeaconError, BeaconServerBuilder};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), BeaconError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(3000);

    let server = BeaconServerBuilder::new()
        .bind(&format!("0.0.0.0:{port}"))
        .build()
        .await?;

    tracing::info!(port, "beacon listening");
    server.run().await
}
