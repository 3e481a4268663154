use clap::Parser;
use log::{error, info};
use server::config::SimConfig;
use server::network::{Server, ServerMessage};

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,

    /// Tick rate (updates per second)
    #[clap(short, long, default_value_t = shared::TICK_RATE)]
    tick_rate: u32,

    /// Maximum number of concurrent clients
    #[clap(short, long, default_value = "1000")]
    max_clients: usize,

    /// Ticks between two full-state updates
    #[clap(long, default_value_t = shared::FULL_STATE_INTERVAL)]
    full_state_interval: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);

    let config = SimConfig {
        tick_rate: args.tick_rate,
        max_clients: args.max_clients,
        full_state_interval: args.full_state_interval,
        stats_interval_ticks: args.tick_rate.saturating_mul(5),
        ..SimConfig::default()
    };

    info!("Starting server on {}", addr);
    info!(
        "Tick rate: {} Hz, max clients: {}, world {}x{}, cell size {}",
        config.tick_rate,
        config.max_clients,
        config.world_width,
        config.world_height,
        config.cell_size
    );

    let mut server = Server::new(&addr, config).await?;
    let control = server.control_handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down gracefully...");
            let _ = control.send(ServerMessage::Shutdown);
        }
    });

    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        return Err(e);
    }

    Ok(())
}
