//! Server settings.

use shared::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_READ_TIMEOUT_SECS};
use std::time::Duration;

pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 180;
pub const DEFAULT_MATCH_WAIT_SECS: u64 = 15;
pub const DEFAULT_MAX_CLIENTS: usize = 100;

/// A preconfigured login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub user_id: String,
    pub password: String,
}

/// Parses `id:password`, the form used on the command line.
pub fn parse_account(raw: &str) -> Result<Account, String> {
    let (user_id, password) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected id:password, got {:?}", raw))?;
    if user_id.is_empty() {
        return Err("account id is empty".to_string());
    }
    if user_id.contains(shared::DELIMITER) || password.contains(shared::DELIMITER) {
        return Err(format!("{:?} contains the frame delimiter", raw));
    }
    Ok(Account {
        user_id: user_id.to_string(),
        password: password.to_string(),
    })
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Limit for reads during login and inside a match.
    pub read_timeout: Duration,
    /// A signed-in connection that stays silent this long is dropped.
    pub idle_timeout: Duration,
    /// How long a queued player waits for an opponent.
    pub match_wait: Duration,
    pub max_clients: usize,
    /// Empty means open registration: any id may sign in and is created on first login.
    pub accounts: Vec<Account>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
            match_wait: Duration::from_secs(DEFAULT_MATCH_WAIT_SECS),
            max_clients: DEFAULT_MAX_CLIENTS,
            accounts: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
