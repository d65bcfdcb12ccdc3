#![cfg_attr(not(test), deny(clippy::panic))]

use clap::Parser;
use masterlink_server::{config, logging, server::MasterServer};

/// masterlink-server -- lightweight UDP master server for P2P game networking
#[derive(Parser, Debug)]
#[command(name = "masterlink-server")]
#[command(about = "A lightweight, in-memory UDP master server for peer-to-peer game networking")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without binding the socket.
    /// Useful for CI/CD pipelines and pre-deployment checks.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    /// Useful for debugging configuration loading from multiple sources.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load();

    if cli.print_config {
        let json = serde_json::to_string_pretty(&cfg)
            .map_err(|err| anyhow::anyhow!("failed to serialize config: {err}"))?;
        println!("{json}");
        return Ok(());
    }

    let validation_result = config::validate(&cfg);

    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Port: {}", cfg.port);
                println!("  Peer timeout: {}s", cfg.peer_timeout_secs);
                println!("  Peer cleanup interval: {}s", cfg.peer_cleanup_interval_secs);
                println!("  Lobby retention: {}s", cfg.lobby_retention_secs);
                println!("  Relay connection timeout: {}s", cfg.relay_connection_timeout_secs);
                println!("  Master server id: {:#018x}", cfg.master_server_id);
                println!("  Log level: {}", cfg.log_level);
                return Ok(());
            }
            Err(err) => {
                eprintln!("Configuration validation failed:\n{err}");
                std::process::exit(1);
            }
        }
    }

    validation_result?;

    logging::init(cfg.log_level, &cfg.logging);

    tracing::info!(port = cfg.port, "starting masterlink-server");

    let server = MasterServer::bind(cfg).await?;
    tracing::info!(addr = %server.local_addr()?, "UDP socket bound");

    server.run().await?;

    tracing::info!("masterlink-server shut down cleanly");
    Ok(())
}
