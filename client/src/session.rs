//! The session state machine.
//!
//! A [`Session`] owns at most one [`Transport`] and walks it through the
//! protocol: sign in, confirm the login, queue for a match, play it, and sign
//! out. Every operation checks the current [`SessionState`] first and fails
//! with [`ClientError::InvalidStateTransition`] when it does not apply.
//!
//! Reads and writes strictly alternate as the protocol dictates and nothing is
//! retried. When the connection is lost (read timeout, peer close or a failed
//! write) the session moves to [`SessionState::Ended`]; from there only
//! [`Session::new_session`] and [`Session::sign_out`] are accepted. Protocol
//! operations fail with [`ClientError::ConnectionClosed`], signing in again
//! with [`ClientError::InvalidStateTransition`].
//!
//! A failed [`Session::new_session`] leaves the session disconnected with the
//! credentials forgotten, as a sign-out would.

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::transport::{Connector, TcpConnector, Transport};
use log::{debug, info, warn};
use shared::{
    decode, frame, Action, ClosestPlayer, LoginReply, LoginRequest, MatchRequest, MatchStart,
    MoveRequest, PartsConfiguration, RoundReport, WireMessage, CONFIRM, FRAME_SIZE, LIST_REQUEST,
    SIGNOUT,
};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Disconnected,
    /// Login request sent, reply not read yet.
    Connected,
    SignedIn,
    AwaitingMatch,
    InMatch,
    /// The connection was lost; credentials are kept for [`Session::new_session`].
    Ended,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connected => "connected",
            SessionState::SignedIn => "signed in",
            SessionState::AwaitingMatch => "awaiting a match",
            SessionState::InMatch => "in a match",
            SessionState::Ended => "ended",
        };
        f.write_str(name)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user_id: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_id", &self.user_id)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The opponent's loadout, replaced as a whole snapshot.
///
/// Clones share the same slot, so a handle can be read from other tasks while
/// the session is busy with a blocking read.
#[derive(Debug, Clone, Default)]
pub struct OpponentParts {
    current: Arc<RwLock<Option<Arc<PartsConfiguration>>>>,
}

impl OpponentParts {
    pub fn load(&self) -> Option<Arc<PartsConfiguration>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn store(&self, parts: Option<PartsConfiguration>) {
        let snapshot = parts.map(Arc::new);
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = snapshot;
    }
}

pub struct Session<C: Connector = TcpConnector> {
    config: ClientConfig,
    connector: C,
    transport: Option<Transport<C::Stream>>,
    state: SessionState,
    credentials: Option<Credentials>,
    session_id: Option<String>,
    opponent_id: Option<String>,
    my_parts: Option<PartsConfiguration>,
    other_parts: OpponentParts,
    /// Part ids the server listed in the login reply.
    available_parts: Vec<String>,
}

impl Session<TcpConnector> {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_connector(config, TcpConnector)
    }
}

impl<C: Connector> Session<C> {
    pub fn with_connector(config: ClientConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            transport: None,
            state: SessionState::Disconnected,
            credentials: None,
            session_id: None,
            opponent_id: None,
            my_parts: None,
            other_parts: OpponentParts::default(),
            available_parts: Vec::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.user_id.as_str())
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn opponent_id(&self) -> Option<&str> {
        self.opponent_id.as_deref()
    }

    pub fn available_parts(&self) -> &[String] {
        &self.available_parts
    }

    pub fn my_parts(&self) -> Option<&PartsConfiguration> {
        self.my_parts.as_ref()
    }

    pub fn set_parts(&mut self, parts: PartsConfiguration) {
        self.my_parts = Some(parts);
    }

    pub fn other_parts(&self) -> Option<Arc<PartsConfiguration>> {
        self.other_parts.load()
    }

    pub fn set_other_parts(&self, parts: Option<PartsConfiguration>) {
        self.other_parts.store(parts);
    }

    /// A handle onto the opponent snapshot that outlives borrows of the session.
    pub fn opponent_parts(&self) -> OpponentParts {
        self.other_parts.clone()
    }

    fn check(&self, operation: &'static str, allowed: &[SessionState]) -> Result<(), ClientError> {
        if allowed.contains(&self.state) {
            return Ok(());
        }
        // Operations that need a live connection fail as closed once it is gone.
        if self.state == SessionState::Ended && !allowed.contains(&SessionState::Disconnected) {
            return Err(ClientError::ConnectionClosed);
        }
        Err(ClientError::InvalidStateTransition {
            operation,
            state: self.state,
        })
    }

    fn user_id_or(&self, operation: &'static str) -> Result<String, ClientError> {
        self.user_id()
            .map(str::to_string)
            .ok_or(ClientError::InvalidStateTransition {
                operation,
                state: self.state,
            })
    }

    async fn send<S: AsRef<str>>(&mut self, fields: &[S]) -> Result<(), ClientError> {
        let bytes = frame(fields)?;
        let result = match self.transport.as_mut() {
            Some(transport) => transport.write(&bytes).await,
            None => Err(ClientError::ConnectionClosed),
        };
        if let Err(err) = result {
            self.connection_lost(&err).await;
            return Err(err);
        }
        debug!("Sent frame: {}", String::from_utf8_lossy(&shared::encode(fields)));
        Ok(())
    }

    async fn receive(&mut self) -> Result<WireMessage, ClientError> {
        let result = match self.transport.as_mut() {
            Some(transport) => transport.read_fixed(FRAME_SIZE).await,
            None => Err(ClientError::ConnectionClosed),
        };
        match result {
            Ok(bytes) => {
                let message = decode(&bytes);
                debug!("Received frame: {:?}", message.cleaned().collect::<Vec<_>>());
                Ok(message)
            }
            Err(err) => {
                self.connection_lost(&err).await;
                Err(err)
            }
        }
    }

    async fn connection_lost(&mut self, err: &ClientError) {
        warn!("Connection lost while {}: {}", self.state, err);
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
        self.clear_match();
        self.state = SessionState::Ended;
    }

    fn clear_match(&mut self) {
        self.session_id = None;
        self.opponent_id = None;
        self.other_parts.store(None);
    }

    /// Sends a best-effort `signout` and closes the connection whatever happens.
    async fn kill_session(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            match frame(&[SIGNOUT]) {
                Ok(bytes) => {
                    if let Err(err) = transport.write(&bytes).await {
                        warn!("Could not send signout: {}", err);
                    }
                }
                Err(err) => warn!("Could not frame signout: {}", err),
            }
            transport.close().await;
        }
        self.clear_match();
    }

    /// Connects and sends the login request. Read the reply with
    /// [`Session::confirm_login`].
    ///
    /// On any failure the session stays disconnected.
    pub async fn sign_in(&mut self, user_id: &str, password: &str) -> Result<(), ClientError> {
        self.check("sign in", &[SessionState::Disconnected])?;

        let request = LoginRequest {
            user_id: user_id.to_string(),
            password: password.to_string(),
        };
        let bytes = frame(&request.to_fields())?;

        let address = self.config.address();
        let mut transport =
            Transport::connect(&self.connector, &address, self.config.read_timeout).await?;
        info!("Connected to {}", address);
        self.state = SessionState::Connected;

        if let Err(err) = transport.write(&bytes).await {
            transport.close().await;
            self.state = SessionState::Disconnected;
            return Err(err);
        }

        self.transport = Some(transport);
        self.credentials = Some(Credentials {
            user_id: request.user_id,
            password: request.password,
        });
        Ok(())
    }

    /// Reads the login reply. `true` only for an exact `logged in`.
    ///
    /// A rejection is not an error: the server hangs up, so the connection is
    /// closed, the credentials are dropped and the session is disconnected.
    pub async fn confirm_login(&mut self) -> Result<bool, ClientError> {
        self.check("confirm login", &[SessionState::Connected])?;

        let message = self.receive().await?;
        match LoginReply::from_message(&message) {
            LoginReply::Accepted { parts } => {
                info!(
                    "Signed in as {}",
                    self.user_id().unwrap_or_default()
                );
                self.available_parts = parts;
                self.state = SessionState::SignedIn;
                Ok(true)
            }
            LoginReply::Rejected { reason } => {
                warn!("Login rejected: {:?}", reason);
                if let Some(mut transport) = self.transport.take() {
                    transport.close().await;
                }
                self.credentials = None;
                self.available_parts.clear();
                self.state = SessionState::Disconnected;
                Ok(false)
            }
        }
    }

    /// Asks for the players whose points are closest to ours.
    pub async fn request_closest_players(&mut self) -> Result<(), ClientError> {
        self.check("request closest players", &[SessionState::SignedIn])?;
        let user_id = self.user_id_or("request closest players")?;
        self.send(&[user_id.as_str(), LIST_REQUEST]).await
    }

    /// Reads the player list, each entry as `user points`.
    pub async fn read_closest_players(&mut self) -> Result<Vec<String>, ClientError> {
        self.check("read closest players", &[SessionState::SignedIn])?;
        let message = self.receive().await?;
        Ok(ClosestPlayer::normalize_list(&message))
    }

    /// Queues for a match with the local loadout.
    pub async fn request_match(&mut self) -> Result<(), ClientError> {
        self.check("request match", &[SessionState::SignedIn])?;
        let parts = self.my_parts.clone().ok_or(ClientError::PartsNotConfigured)?;
        let request = MatchRequest {
            user_id: self.user_id_or("request match")?,
            parts,
        };

        self.send(&request.to_fields()).await?;
        self.state = SessionState::AwaitingMatch;
        Ok(())
    }

    /// Waits for the match assignment.
    ///
    /// [`MatchStart::NoOpponent`] puts the session back to signed in so the
    /// caller can queue again. A malformed assignment leaves the state as it was.
    pub async fn start_match(&mut self) -> Result<MatchStart, ClientError> {
        self.check("start match", &[SessionState::AwaitingMatch])?;

        let message = self.receive().await?;
        let start = MatchStart::from_message(&message)?;
        match &start {
            MatchStart::Matched(assignment) => {
                info!(
                    "Match {} against {}",
                    assignment.session_id, assignment.opponent_id
                );
                self.session_id = Some(assignment.session_id.clone());
                self.opponent_id = Some(assignment.opponent_id.clone());
                self.other_parts
                    .store(Some(assignment.opponent_parts.clone()));
                self.state = SessionState::InMatch;
            }
            MatchStart::NoOpponent => {
                info!("No opponent found");
                self.state = SessionState::SignedIn;
            }
        }
        Ok(start)
    }

    pub async fn make_move(&mut self, action: Action) -> Result<(), ClientError> {
        self.check("make move", &[SessionState::InMatch])?;
        let session_id = self
            .session_id
            .clone()
            .ok_or(ClientError::InvalidStateTransition {
                operation: "make move",
                state: self.state,
            })?;

        let request = MoveRequest { session_id, action };
        self.send(&request.to_fields()).await
    }

    /// Reads one round report.
    pub async fn get_result(&mut self) -> Result<RoundReport, ClientError> {
        self.check("get result", &[SessionState::InMatch])?;
        let message = self.receive().await?;
        Ok(RoundReport::from_message(&message)?)
    }

    pub async fn confirm(&mut self) -> Result<(), ClientError> {
        self.check("confirm", &[SessionState::InMatch])?;
        self.send(&[CONFIRM, ""]).await
    }

    /// Leaves the match locally. Nothing is sent.
    pub fn end_match(&mut self) -> Result<(), ClientError> {
        self.check("end match", &[SessionState::InMatch])?;
        self.clear_match();
        self.state = SessionState::SignedIn;
        Ok(())
    }

    /// Drops the current connection and signs in again with the same credentials.
    ///
    /// Returns the outcome of the new login, like [`Session::confirm_login`].
    pub async fn new_session(&mut self) -> Result<bool, ClientError> {
        self.check(
            "new session",
            &[
                SessionState::Connected,
                SessionState::SignedIn,
                SessionState::AwaitingMatch,
                SessionState::InMatch,
                SessionState::Ended,
            ],
        )?;
        let credentials = self.credentials.clone().ok_or(ClientError::InvalidStateTransition {
            operation: "new session",
            state: self.state,
        })?;

        self.kill_session().await;
        self.state = SessionState::Disconnected;
        let outcome = match self.sign_in(&credentials.user_id, &credentials.password).await {
            Ok(()) => self.confirm_login().await,
            Err(err) => Err(err),
        };
        if let Err(err) = &outcome {
            warn!("New session for {} failed: {}", credentials.user_id, err);
            self.reset().await;
        }
        outcome
    }

    /// Sends `signout`, closes the connection and forgets the credentials.
    pub async fn sign_out(&mut self) -> Result<(), ClientError> {
        self.check(
            "sign out",
            &[
                SessionState::Connected,
                SessionState::SignedIn,
                SessionState::AwaitingMatch,
                SessionState::InMatch,
                SessionState::Ended,
            ],
        )?;

        self.reset().await;
        Ok(())
    }

    /// Back to a clean disconnected session with no credentials.
    async fn reset(&mut self) {
        self.kill_session().await;
        if let Some(credentials) = self.credentials.take() {
            info!("Signed out {}", credentials.user_id);
        }
        self.available_parts.clear();
        self.state = SessionState::Disconnected;
    }

    /// Non-blocking check for an unread frame.
    pub async fn is_data_available(&mut self) -> bool {
        match self.transport.as_mut() {
            Some(transport) => transport.is_data_available().await,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::MatchStatus;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio_test::io::{Builder, Mock};

    struct MockConnector {
        streams: Mutex<VecDeque<Mock>>,
    }

    impl MockConnector {
        fn with(streams: Vec<Mock>) -> Self {
            Self {
                streams: Mutex::new(streams.into()),
            }
        }
    }

    impl Connector for MockConnector {
        type Stream = Mock;

        async fn connect(&self, _address: &str) -> io::Result<Mock> {
            self.streams
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
        }
    }

    fn wire(fields: &[&str]) -> Vec<u8> {
        frame(fields).unwrap().to_vec()
    }

    fn text(raw: &str) -> Vec<u8> {
        let mut buffer = vec![0u8; FRAME_SIZE];
        buffer[..raw.len()].copy_from_slice(raw.as_bytes());
        buffer
    }

    fn session(streams: Vec<Mock>) -> Session<MockConnector> {
        Session::with_connector(
            ClientConfig::default().with_read_timeout(Duration::from_millis(100)),
            MockConnector::with(streams),
        )
    }

    fn loadout() -> PartsConfiguration {
        PartsConfiguration::new(["0", "1", "2", "3", "4", "5"]).unwrap()
    }

    /// A builder already scripted through a successful login of `user1`.
    fn logged_in() -> Builder {
        let mut builder = Builder::new();
        builder
            .write(&wire(&["user1", "pw", ""]))
            .read(&text("logged in,0,1,2,3,4,5,"));
        builder
    }

    async fn signed_in(mock: Mock) -> Session<MockConnector> {
        let mut session = session(vec![mock]);
        session.sign_in("user1", "pw").await.unwrap();
        assert!(session.confirm_login().await.unwrap());
        session
    }

    #[tokio::test]
    async fn test_sign_in_and_confirm() {
        let mut session = session(vec![logged_in().build()]);

        session.sign_in("user1", "pw").await.unwrap();
        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(session.user_id(), Some("user1"));

        assert!(session.confirm_login().await.unwrap());
        assert_eq!(session.state(), SessionState::SignedIn);
        assert_eq!(session.available_parts(), ["0", "1", "2", "3", "4", "5"]);
    }

    #[tokio::test]
    async fn test_rejected_login_disconnects() {
        let mock = Builder::new()
            .write(&wire(&["user1", "bad", ""]))
            .read(&text("fail,"))
            .build();
        let mut session = session(vec![mock]);

        session.sign_in("user1", "bad").await.unwrap();
        assert!(!session.confirm_login().await.unwrap());
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.credentials().is_none());
        assert!(!session.is_data_available().await);
    }

    #[tokio::test]
    async fn test_connect_failure_stays_disconnected() {
        let mut session = session(vec![]);
        let result = session.sign_in("user1", "pw").await;
        assert!(matches!(result, Err(ClientError::ConnectFailed { .. })));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.credentials().is_none());
    }

    #[tokio::test]
    async fn test_oversized_login_is_rejected_before_connecting() {
        let mut session = session(vec![]);
        let password = "x".repeat(FRAME_SIZE);
        let result = session.sign_in("user1", &password).await;
        assert!(matches!(result, Err(ClientError::Frame(_))));
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_sign_in_twice_is_invalid() {
        let mut session = signed_in(logged_in().build()).await;
        let result = session.sign_in("user1", "pw").await;
        assert!(matches!(
            result,
            Err(ClientError::InvalidStateTransition {
                operation: "sign in",
                state: SessionState::SignedIn
            })
        ));
    }

    #[tokio::test]
    async fn test_match_operations_before_start_are_invalid() {
        let mut session = signed_in(logged_in().build()).await;

        assert!(matches!(
            session.make_move(Action::Attack).await,
            Err(ClientError::InvalidStateTransition { .. })
        ));
        assert!(matches!(
            session.get_result().await,
            Err(ClientError::InvalidStateTransition { .. })
        ));
        assert!(matches!(
            session.confirm().await,
            Err(ClientError::InvalidStateTransition { .. })
        ));
        assert!(matches!(
            session.end_match(),
            Err(ClientError::InvalidStateTransition { .. })
        ));
        assert_eq!(session.state(), SessionState::SignedIn);
    }

    #[tokio::test]
    async fn test_request_match_needs_parts() {
        let mut session = signed_in(logged_in().build()).await;
        assert!(matches!(
            session.request_match().await,
            Err(ClientError::PartsNotConfigured)
        ));
        assert_eq!(session.state(), SessionState::SignedIn);
    }

    #[tokio::test]
    async fn test_full_match() {
        let mock = logged_in()
            .write(&wire(&["user1", "0", "1", "2", "3", "4", "5"]))
            .read(&text("sess1,opp7,H,T,LA,RA,L,X"))
            .write(&wire(&["confirm", ""]))
            .read(&text("60,58,none,0,0,0,,"))
            .write(&wire(&["sess1", "charge"]))
            .read(&text("60,-4,win,2,0,1,attack,"))
            .build();
        let mut session = signed_in(mock).await;
        session.set_parts(loadout());

        session.request_match().await.unwrap();
        assert_eq!(session.state(), SessionState::AwaitingMatch);

        let start = session.start_match().await.unwrap();
        assert!(matches!(start, MatchStart::Matched(_)));
        assert_eq!(session.state(), SessionState::InMatch);
        assert_eq!(session.session_id(), Some("sess1"));
        assert_eq!(session.opponent_id(), Some("opp7"));
        assert_eq!(
            session.other_parts().unwrap().as_slice(),
            ["H", "T", "LA", "RA", "L", "X"]
        );

        session.confirm().await.unwrap();
        let opening = session.get_result().await.unwrap();
        assert_eq!(opening.turn, 0);
        assert_eq!(opening.opponent_action, None);

        session.make_move(Action::Charge).await.unwrap();
        let last = session.get_result().await.unwrap();
        assert_eq!(last.status, MatchStatus::Win);
        assert_eq!(last.opponent_action, Some(Action::Attack));

        session.end_match().unwrap();
        assert_eq!(session.state(), SessionState::SignedIn);
        assert!(session.session_id().is_none());
        assert!(session.other_parts().is_none());
        assert_eq!(session.my_parts(), Some(&loadout()));
    }

    #[tokio::test]
    async fn test_no_opponent_returns_to_signed_in() {
        let mock = logged_in()
            .write(&wire(&["user1", "0", "1", "2", "3", "4", "5"]))
            .read(&text(",,,,,,,,,"))
            .build();
        let mut session = signed_in(mock).await;
        session.set_parts(loadout());

        session.request_match().await.unwrap();
        assert_eq!(session.start_match().await.unwrap(), MatchStart::NoOpponent);
        assert_eq!(session.state(), SessionState::SignedIn);
        assert!(session.session_id().is_none());
    }

    #[tokio::test]
    async fn test_malformed_assignment_keeps_state() {
        let mock = logged_in()
            .write(&wire(&["user1", "0", "1", "2", "3", "4", "5"]))
            .read(&text("sess1,opp7,H,T"))
            .build();
        let mut session = signed_in(mock).await;
        session.set_parts(loadout());
        session.request_match().await.unwrap();

        let result = session.start_match().await;
        assert!(matches!(result, Err(ClientError::ProtocolDecode(_))));
        assert_eq!(session.state(), SessionState::AwaitingMatch);
        assert!(session.other_parts().is_none());
    }

    #[tokio::test]
    async fn test_read_timeout_ends_session() {
        let mock = logged_in()
            .write(&wire(&["user1", "0", "1", "2", "3", "4", "5"]))
            .wait(Duration::from_secs(30))
            .build();
        let mut session = signed_in(mock).await;
        session.set_parts(loadout());
        session.request_match().await.unwrap();

        let result = session.start_match().await;
        assert!(matches!(result, Err(ClientError::ReadTimedOut(_))));
        assert_eq!(session.state(), SessionState::Ended);
        assert_eq!(session.user_id(), Some("user1"));

        assert!(matches!(
            session.request_match().await,
            Err(ClientError::ConnectionClosed)
        ));
        assert!(matches!(
            session.sign_in("user1", "pw").await,
            Err(ClientError::InvalidStateTransition {
                state: SessionState::Ended,
                ..
            })
        ));

        // No signout reaches the closed stream; the mock would fail the write.
        session.sign_out().await.unwrap();
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_sign_out_closes_even_when_write_fails() {
        let mock = logged_in()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            .build();
        let mut session = signed_in(mock).await;

        session.sign_out().await.unwrap();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.credentials().is_none());
        assert!(session.available_parts().is_empty());
        assert!(!session.is_data_available().await);
    }

    #[tokio::test]
    async fn test_sign_in_again_after_sign_out() {
        let first = logged_in().write(&wire(&["signout"])).build();
        let second = logged_in().build();
        let mut session = session(vec![first, second]);

        session.sign_in("user1", "pw").await.unwrap();
        assert!(session.confirm_login().await.unwrap());
        session.sign_out().await.unwrap();
        assert!(session.credentials().is_none());

        session.sign_in("user1", "pw").await.unwrap();
        assert!(session.confirm_login().await.unwrap());
        assert_eq!(session.state(), SessionState::SignedIn);
    }

    #[tokio::test]
    async fn test_sign_out_when_disconnected_is_invalid() {
        let mut session = session(vec![]);
        assert!(matches!(
            session.sign_out().await,
            Err(ClientError::InvalidStateTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_new_session_reauthenticates() {
        let first = logged_in()
            .write(&wire(&["user1", "0", "1", "2", "3", "4", "5"]))
            .read(&text("sess1,opp7,H,T,LA,RA,L,X"))
            .write(&wire(&["signout"]))
            .build();
        let second = logged_in().build();
        let mut session = session(vec![first, second]);
        session.sign_in("user1", "pw").await.unwrap();
        session.confirm_login().await.unwrap();
        session.set_parts(loadout());
        session.request_match().await.unwrap();
        session.start_match().await.unwrap();

        assert!(session.new_session().await.unwrap());
        assert_eq!(session.state(), SessionState::SignedIn);
        assert!(session.session_id().is_none());
        assert!(session.other_parts().is_none());
    }

    #[tokio::test]
    async fn test_new_session_connect_failure_forgets_credentials() {
        let mock = logged_in().write(&wire(&["signout"])).build();
        let mut session = signed_in(mock).await;

        let result = session.new_session().await;
        assert!(matches!(result, Err(ClientError::ConnectFailed { .. })));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.credentials().is_none());
        assert!(session.available_parts().is_empty());
    }

    #[tokio::test]
    async fn test_new_session_timeout_forgets_credentials() {
        let first = logged_in().write(&wire(&["signout"])).build();
        let second = Builder::new()
            .write(&wire(&["user1", "pw", ""]))
            .wait(Duration::from_secs(30))
            .build();
        let mut session = session(vec![first, second]);
        session.sign_in("user1", "pw").await.unwrap();
        assert!(session.confirm_login().await.unwrap());

        let result = session.new_session().await;
        assert!(matches!(result, Err(ClientError::ReadTimedOut(_))));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.credentials().is_none());
        assert!(matches!(
            session.sign_out().await,
            Err(ClientError::InvalidStateTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_closest_players() {
        let mock = logged_in()
            .write(&wire(&["user1", "list"]))
            .read(&text("alice;36,bob;5,"))
            .build();
        let mut session = signed_in(mock).await;

        session.request_closest_players().await.unwrap();
        let players = session.read_closest_players().await.unwrap();
        assert_eq!(players, vec!["alice 36", "bob 5"]);
    }

    #[tokio::test]
    async fn test_opponent_parts_handle_is_shared() {
        let session = session(vec![]);
        let handle = session.opponent_parts();
        session.set_other_parts(Some(loadout()));
        assert_eq!(handle.load().as_deref(), Some(&loadout()));

        handle.store(None);
        assert!(session.other_parts().is_none());
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let credentials = Credentials {
            user_id: "user1".into(),
            password: "hunter2".into(),
        };
        let printed = format!("{:?}", credentials);
        assert!(printed.contains("user1"));
        assert!(!printed.contains("hunter2"));
    }
}
