use clap::Parser;
use client::bot::RandomBot;
use client::config::ClientConfig;
use client::network::Client;
use log::info;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Chance per frame that the bot fires (0.0 - 1.0)
    #[arg(long, default_value = "0.05")]
    shoot_chance: f64,

    /// Seed for the bot's decisions
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many seconds
    #[arg(short = 'd', long)]
    duration: Option<u64>,

    /// Camera width reported to the server
    #[arg(short = 'w', long, default_value_t = shared::DEFAULT_CAMERA_WIDTH)]
    width: f32,

    /// Camera height reported to the server (no short flag to avoid conflict with --help)
    #[arg(long, default_value_t = shared::DEFAULT_CAMERA_HEIGHT)]
    height: f32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting headless client...");
    info!("Connecting to: {}", args.server);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }

    let config = ClientConfig {
        camera_width: args.width,
        camera_height: args.height,
        ..ClientConfig::default()
    };

    let mut bot = RandomBot::new(args.seed, args.shoot_chance, args.width, args.height);
    let mut client = Client::new(&args.server, config, args.fake_ping).await?;

    client
        .run(&mut bot, args.duration.map(Duration::from_secs))
        .await?;

    Ok(())
}
