//! # Arena Server Library
//!
//! A reference server for the robot arena protocol. It is the peer the client
//! is developed and tested against, and it keeps the same wire rules: every
//! message is one 100-byte frame of comma separated text, and the meaning of a
//! frame depends only on where the conversation is.
//!
//! ## Core Responsibilities
//!
//! ### Accounts and Presence
//! Logins are checked against the configured accounts, or registered on first
//! use when none are configured. An account can be signed in once at a time;
//! a second login is answered with `fail,` and the socket is closed.
//!
//! ### Matchmaking
//! A match request puts the player in a queue. The first two waiting players
//! are paired; a player left alone for the match wait gets an empty assignment
//! and returns to the lobby.
//!
//! ### Battles
//! Each match runs in its own task. It waits for both confirmations, sends the
//! opening report and then resolves one round per pair of moves until a robot
//! is down, someone forfeits or the turn limit is reached.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Shared bookkeeping behind one mutex:
//! - Connection admission against `max_clients`
//! - Login, sign-out and records
//! - The quick-match queue
//! - The player list ordered by points
//!
//! ### Game Module (`game`)
//! Pure battle rules: robot stats from parts, damage, defence, heals,
//! cooldowns and the end-of-match standings.
//!
//! ### Network Module (`network`)
//! The accept loop, one task per connection and one per battle. Connection
//! tasks talk to their battle over channels; a connection that drops during a
//! match forfeits it.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod game;
pub mod network;

pub use config::ServerConfig;
pub use network::Server;
