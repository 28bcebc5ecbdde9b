//! Demo daemon: a multiserve server driven by a TOML configuration.
//!
//! With no configuration file the daemon exposes just the debug server
//! on loopback, which is enough to watch probes and metrics.

use std::path::PathBuf;

use clap::Parser;

use multiserve::config::loader;
use multiserve::{observability, Server, ServerConfiguration};

#[derive(Debug, Parser)]
#[command(name = "multiserve", about = "Multi-protocol server runtime")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server name used in lifecycle logs.
    #[arg(long, default_value = "multiserve")]
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    observability::logging::init();

    let args = Args::parse();

    let configuration = match &args.config {
        Some(path) => loader::load_configuration(path)?,
        None => {
            let mut defaults = ServerConfiguration::default();
            defaults.services.debug =
                Some(multiserve::config::ServiceConfiguration::at("127.0.0.1:9500"));
            defaults
        }
    };

    let server = Server::builder(args.name)
        .with_configuration(configuration)
        .build()?;

    server.serve().await?;

    tracing::info!("shutdown complete");
    Ok(())
}
