//! The client facade.
//!
//! [`GameClient`] is what the rest of an application talks to. It owns one
//! [`Session`] behind an async mutex, so concurrent callers are served one
//! protocol operation at a time and a read in progress is never interleaved
//! with another write. The opponent's loadout is reachable without the lock.

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::session::{OpponentParts, Session, SessionState};
use crate::transport::{Connector, TcpConnector};
use log::{info, warn};
use shared::{Action, MatchStart, PartsConfiguration, RoundReport};
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct GameClient<C: Connector = TcpConnector> {
    session: Mutex<Session<C>>,
    opponent_parts: OpponentParts,
}

impl GameClient<TcpConnector> {
    pub fn new(config: ClientConfig) -> Self {
        Self::from_session(Session::new(config))
    }
}

impl<C: Connector> GameClient<C> {
    pub fn with_connector(config: ClientConfig, connector: C) -> Self {
        Self::from_session(Session::with_connector(config, connector))
    }

    fn from_session(session: Session<C>) -> Self {
        let opponent_parts = session.opponent_parts();
        Self {
            session: Mutex::new(session),
            opponent_parts,
        }
    }

    pub async fn sign_in(&self, user_id: &str, password: &str) -> Result<(), ClientError> {
        self.session.lock().await.sign_in(user_id, password).await
    }

    pub async fn confirm_login(&self) -> Result<bool, ClientError> {
        self.session.lock().await.confirm_login().await
    }

    /// Signs in and reads the reply under a single lock.
    pub async fn login(&self, user_id: &str, password: &str) -> Result<bool, ClientError> {
        let mut session = self.session.lock().await;
        session.sign_in(user_id, password).await?;
        session.confirm_login().await
    }

    pub async fn sign_out(&self) -> Result<(), ClientError> {
        self.session.lock().await.sign_out().await
    }

    pub async fn new_session(&self) -> Result<bool, ClientError> {
        self.session.lock().await.new_session().await
    }

    pub async fn request_closest_players(&self) -> Result<(), ClientError> {
        self.session.lock().await.request_closest_players().await
    }

    pub async fn read_closest_players(&self) -> Result<Vec<String>, ClientError> {
        self.session.lock().await.read_closest_players().await
    }

    pub async fn request_match(&self) -> Result<(), ClientError> {
        self.session.lock().await.request_match().await
    }

    pub async fn start_match(&self) -> Result<MatchStart, ClientError> {
        self.session.lock().await.start_match().await
    }

    pub async fn make_move(&self, action: Action) -> Result<(), ClientError> {
        self.session.lock().await.make_move(action).await
    }

    pub async fn get_result(&self) -> Result<RoundReport, ClientError> {
        self.session.lock().await.get_result().await
    }

    pub async fn confirm(&self) -> Result<(), ClientError> {
        self.session.lock().await.confirm().await
    }

    pub async fn end_match(&self) -> Result<(), ClientError> {
        self.session.lock().await.end_match()
    }

    pub async fn is_data_available(&self) -> bool {
        self.session.lock().await.is_data_available().await
    }

    pub async fn set_parts(&self, parts: PartsConfiguration) {
        self.session.lock().await.set_parts(parts);
    }

    pub async fn my_parts(&self) -> Option<PartsConfiguration> {
        self.session.lock().await.my_parts().cloned()
    }

    /// Latest opponent snapshot. Does not wait for an operation in progress.
    pub fn other_parts(&self) -> Option<Arc<PartsConfiguration>> {
        self.opponent_parts.load()
    }

    pub fn set_other_parts(&self, parts: Option<PartsConfiguration>) {
        self.opponent_parts.store(parts);
    }

    pub async fn state(&self) -> SessionState {
        self.session.lock().await.state()
    }

    pub async fn available_parts(&self) -> Vec<String> {
        self.session.lock().await.available_parts().to_vec()
    }

    pub async fn session_id(&self) -> Option<String> {
        self.session.lock().await.session_id().map(str::to_string)
    }

    pub async fn opponent_id(&self) -> Option<String> {
        self.session.lock().await.opponent_id().map(str::to_string)
    }

    /// Best-effort sign-out for application exit. Does nothing when already
    /// disconnected and only logs a failure.
    pub async fn shutdown(&self) {
        let mut session = self.session.lock().await;
        if session.state() == SessionState::Disconnected {
            return;
        }
        match session.sign_out().await {
            Ok(()) => info!("Client shut down"),
            Err(err) => warn!("Sign-out during shutdown failed: {}", err),
        }
    }
}
