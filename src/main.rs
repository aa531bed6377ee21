//! proto-registry daemon.
//!
//! ```text
//!   serverProtos / clientProtos files
//!              │
//!              ▼
//!     ┌─────────────────┐   SchemaEvent   ┌──────────────┐
//!     │  ReloadWatcher  │────────────────▶│ reload task  │
//!     └─────────────────┘                 └──────┬───────┘
//!                                                ▼
//!     SIGHUP ───────────────────────────▶ Registry::reload
//!     SIGINT / SIGTERM ─────────────────▶ Registry::stop
//! ```
//!
//! Loads the configuration, starts the registry and keeps it running until a
//! shutdown signal arrives.

use std::path::PathBuf;

use clap::Parser;

use proto_registry::lifecycle::{bootstrap, Signal, SignalListener};
use proto_registry::Direction;

#[derive(Parser)]
#[command(name = "proto-registry")]
#[command(about = "Runtime protocol schema registry", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let registry = bootstrap(args.config.as_deref()).await?;
    tracing::info!(
        version = registry.version(),
        outbound = registry.generation(Direction::Outbound).is_available(),
        inbound = registry.generation(Direction::Inbound).is_available(),
        "proto-registry v{} running",
        env!("CARGO_PKG_VERSION")
    );

    let mut signals = SignalListener::new()?;
    loop {
        match signals.recv().await {
            Signal::Reload => {
                tracing::info!("Reload requested");
                for direction in Direction::ALL {
                    match registry.reload(direction).await {
                        Ok(outcome) => tracing::info!(
                            direction = %direction,
                            outcome = outcome.as_str(),
                            version = registry.version(),
                            "Reload finished"
                        ),
                        Err(e) => tracing::warn!(direction = %direction, error = %e, "Reload rejected"),
                    }
                }
            }
            Signal::Shutdown => {
                tracing::info!("Shutdown requested");
                break;
            }
        }
    }

    registry.stop(false).await;
    tracing::info!("Shutdown complete");
    Ok(())
}
