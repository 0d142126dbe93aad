use clap::Parser;
use client::bot::play_match;
use client::{ClientConfig, GameClient};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{PartsConfiguration, DELIMITER, DEFAULT_HOST, DEFAULT_PORT};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server host
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Server port
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Seconds a single read may wait
    #[arg(short = 't', long, default_value = "60")]
    timeout_secs: u64,

    /// Account to sign in with
    #[arg(short = 'u', long)]
    user: String,

    #[arg(long, default_value = "")]
    password: String,

    /// Six comma separated part ids
    #[arg(long, default_value = "0,1,2,3,4,5")]
    parts: String,

    /// Times to queue before giving up
    #[arg(short = 'm', long, default_value = "3")]
    match_attempts: u32,

    /// Rounds after which the bot forfeits
    #[arg(short = 'r', long, default_value = "50")]
    rounds_limit: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let fields: Vec<&str> = args.parts.split(DELIMITER).map(str::trim).collect();
    let parts = PartsConfiguration::from_fields(&fields)?;

    let config = ClientConfig::new(args.host, args.port)
        .with_read_timeout(Duration::from_secs(args.timeout_secs));
    info!("Connecting to: {}", config.address());

    let client = GameClient::new(config);
    if !client.login(&args.user, &args.password).await? {
        warn!("Login refused for {}", args.user);
        return Ok(());
    }
    client.set_parts(parts).await;

    let outcome = tokio::select! {
        result = play_match(&client, StdRng::from_entropy(), args.match_attempts, args.rounds_limit) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            Ok(None)
        }
    };

    match outcome {
        Ok(Some(summary)) => info!(
            "{} after {} rounds against {} ({} to {})",
            summary.final_report.status,
            summary.rounds,
            summary.opponent_id,
            summary.final_report.health,
            summary.final_report.opponent_health
        ),
        Ok(None) => info!("No match played"),
        Err(err) => warn!("Match aborted: {}", err),
    }

    client.shutdown().await;
    Ok(())
}
