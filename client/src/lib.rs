//! # Arena Client Library
//!
//! A stateful client for the robot arena: one persistent TCP connection per
//! session, fixed 100-byte text frames, strict request/response alternation.
//!
//! ## Architecture Overview
//!
//! Calls flow down one layer at a time and results flow back up the same path:
//!
//! ```text
//! GameClient  ->  Session  ->  shared::codec  ->  Transport
//! ```
//!
//! ### Transport (`transport`)
//! Owns the byte stream and nothing else:
//! - Connects through a [`transport::Connector`] (plain TCP in production,
//!   scripted streams in tests)
//! - Reads exactly one frame under the read timeout
//! - Closes itself on any read failure so a partial frame is never reused
//! - Peeks for pending data without blocking
//!
//! ### Session (`session`)
//! The state machine. It knows which operation is legal in which state,
//! builds the typed request for each exchange and decodes the typed reply:
//! - `Disconnected -> Connected -> SignedIn` through sign-in and login confirmation
//! - `SignedIn -> AwaitingMatch -> InMatch` through match request and start
//! - `InMatch -> SignedIn` through end of match
//! - `Ended` after a timeout or lost connection, until a new session or sign-out
//!
//! ### Facade (`network`)
//! [`network::GameClient`] serializes callers through an async mutex and keeps
//! the opponent's loadout readable while an operation is in flight.
//!
//! ### Bot (`bot`)
//! A scripted player used by the `client` binary and the end-to-end tests.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::config::ClientConfig;
//! use client::network::GameClient;
//! use shared::{Action, MatchStart, PartsConfiguration};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = GameClient::new(ClientConfig::new("127.0.0.1", 6789));
//! if !client.login("user1", "secret").await? {
//!     return Ok(());
//! }
//!
//! client.set_parts(PartsConfiguration::new(["0", "1", "2", "3", "4", "5"])?).await;
//! client.request_match().await?;
//! if let MatchStart::Matched(assignment) = client.start_match().await? {
//!     println!("Playing {}", assignment.opponent_id);
//!     client.confirm().await?;
//!     let mut report = client.get_result().await?;
//!     while !report.status.is_final() {
//!         client.make_move(Action::Attack).await?;
//!         report = client.get_result().await?;
//!     }
//!     client.end_match().await?;
//! }
//!
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure Model
//!
//! Nothing is retried. Connect failures, timeouts and decode errors surface as
//! [`error::ClientError`] values; a decode error leaves the session in the state
//! it had before the call, while a lost connection moves it to `Ended`.

pub mod bot;
pub mod config;
pub mod error;
pub mod network;
pub mod session;
pub mod transport;

pub use config::ClientConfig;
pub use error::ClientError;
pub use network::GameClient;
pub use session::{Session, SessionState};
