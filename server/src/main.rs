use clap::Parser;
use log::{error, info};
use pong_server::config::ServerConfig;
use pong_server::network::Server;
use std::time::Duration;

/// Authoritative two-player Pong server
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "5555")]
    port: u16,

    /// Simulation ticks per second
    #[arg(short, long, default_value = "60")]
    tick_rate: u32,

    /// State broadcasts per second
    #[arg(short, long, default_value = "60")]
    broadcast_rate: u32,

    /// Milliseconds a single write may take before the player is dropped
    #[arg(short, long, default_value = "250")]
    write_timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Tip: Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        tick_rate: args.tick_rate,
        broadcast_rate: args.broadcast_rate,
        write_timeout: Duration::from_millis(args.write_timeout_ms),
    };

    info!(
        "Starting server on {} at {} Hz (broadcast {} Hz)",
        config.address(),
        config.tick_rate,
        config.broadcast_rate
    );

    let server = Server::new(config).await?;
    let shutdown = server.shutdown_handle();
    let mut running = tokio::spawn(server.run());

    tokio::select! {
        result = &mut running => {
            match result {
                Ok(Ok(())) => info!("Server stopped"),
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task panicked: {}", e),
            }
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            shutdown.shutdown();
        }
    }

    running.await??;
    Ok(())
}
