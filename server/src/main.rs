use clap::Parser;
use log::{error, info};
use server::config::{parse_account, Account, DEFAULT_MATCH_WAIT_SECS, DEFAULT_MAX_CLIENTS};
use server::{Server, ServerConfig};
use shared::{DEFAULT_HOST, DEFAULT_PORT};
use std::time::Duration;

/// Parses arguments, binds the listener and serves until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = DEFAULT_HOST)]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Seconds a queued player waits for an opponent
        #[clap(short, long, default_value_t = DEFAULT_MATCH_WAIT_SECS)]
        match_wait_secs: u64,
        /// Maximum concurrent connections
        #[clap(short = 'c', long, default_value_t = DEFAULT_MAX_CLIENTS)]
        max_clients: usize,
        /// Account as id:password; repeat for more. Without any, registration is open.
        #[clap(short, long = "account", value_parser = parse_account)]
        accounts: Vec<Account>,
    }

    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        match_wait: Duration::from_secs(args.match_wait_secs),
        max_clients: args.max_clients,
        accounts: args.accounts,
        ..ServerConfig::default()
    };
    if config.accounts.is_empty() {
        info!("No accounts configured, registration is open");
    }

    let server = Server::bind(config).await?;
    let server_handle = tokio::spawn(server.run());

    // Handle shutdown gracefully
    tokio::select! {
        result = server_handle => {
            match result {
                Ok(Err(e)) => error!("Server stopped: {}", e),
                Err(e) => error!("Server task panicked: {}", e),
                Ok(Ok(())) => {}
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
