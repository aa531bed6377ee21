use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::{Parser, Subcommand};
use serde_json::Value;

use proto_registry::config::load_config;
use proto_registry::{Direction, Registry, RegistryConfig};

#[derive(Parser)]
#[command(name = "proto-cli")]
#[command(about = "Inspect schemas and encode/decode messages offline", long_about = None)]
struct Cli {
    /// Registry configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print both schema bundles and the version as JSON
    Protos,
    /// Print the schema version
    Version,
    /// List the routes of a direction (outbound/server, inbound/client)
    Routes { direction: Direction },
    /// Resolve a route to its message type
    Check { direction: Direction, route: String },
    /// Encode a JSON message with the outbound schema, printed as base64
    Encode { route: String, json: String },
    /// Decode a base64 message with the inbound schema, printed as JSON
    Decode { route: String, base64: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RegistryConfig::default(),
    };
    config.watch_for_changes = false;

    let registry = Registry::new(config);
    registry.start().await?;

    let result = run(&registry, cli.command);
    registry.stop(true).await;
    result
}

fn run(registry: &Registry, command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Protos => {
            println!("{}", serde_json::to_string_pretty(&registry.protos())?);
        }
        Commands::Version => {
            println!("{}", registry.version());
        }
        Commands::Routes { direction } => {
            for route in registry.routes(direction)? {
                println!("{}", route);
            }
        }
        Commands::Check { direction, route } => match registry.check(direction, &route)? {
            Some(descriptor) => println!(
                "{} -> {} (generation {})",
                route,
                descriptor.full_name(),
                descriptor.generation()
            ),
            None => return Err(format!("{}: not found in {} schema", route, direction).into()),
        },
        Commands::Encode { route, json } => {
            let value: Value = serde_json::from_str(&json)?;
            let bytes = registry.encode(&route, &value)?;
            println!("{}", STANDARD.encode(bytes));
        }
        Commands::Decode { route, base64 } => {
            let bytes = STANDARD.decode(base64.trim())?;
            let value = registry.decode(&route, &bytes)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }
    Ok(())
}
