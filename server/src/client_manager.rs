//! Accounts, presence and the quick-match queue
//!
//! This module keeps the server-side bookkeeping every connection task shares:
//! - Connection admission against the configured capacity
//! - Account lookup and login, with at most one live login per account
//! - Win/draw/loss records and the points derived from them
//! - The quick-match queue that pairs the first two waiting players
//!
//! The manager is plain data behind a mutex; it never touches a socket.

use crate::config::Account;
use crate::network::MatchTicket;
use log::info;
use shared::{ClosestPlayer, MatchStatus, PartsConfiguration};
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::sync::oneshot;

/// Most players returned by [`ClientManager::closest_players`].
pub const PLAYER_LIST_LIMIT: usize = 10;
/// Part ids every account owns.
pub const DEFAULT_PART_COUNT: u32 = 12;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoginError {
    #[error("unknown user {0}")]
    UnknownUser(String),
    #[error("wrong password for {0}")]
    WrongPassword(String),
    #[error("{0} is already signed in")]
    AlreadySignedIn(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Record {
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
}

impl Record {
    pub fn points(&self) -> u32 {
        self.wins * 12 + self.draws * 5 + self.losses
    }
}

#[derive(Debug)]
struct AccountEntry {
    password: String,
    parts: Vec<String>,
    record: Record,
}

impl AccountEntry {
    fn new(password: &str) -> Self {
        Self {
            password: password.to_string(),
            parts: (0..DEFAULT_PART_COUNT).map(|id| id.to_string()).collect(),
            record: Record::default(),
        }
    }
}

/// A player waiting in the quick-match queue.
#[derive(Debug)]
pub struct QueueEntry {
    pub user_id: String,
    pub parts: PartsConfiguration,
    /// Receives the match once the player is paired.
    pub ticket: oneshot::Sender<MatchTicket>,
}

pub struct ClientManager {
    accounts: HashMap<String, AccountEntry>,
    open_registration: bool,
    online: HashSet<String>,
    queue: VecDeque<QueueEntry>,
    connections: HashMap<u32, SocketAddr>,
    next_connection_id: u32,
    max_clients: usize,
    next_session: u32,
}

impl ClientManager {
    /// With no accounts, registration is open and any id is created on first login.
    pub fn new(max_clients: usize, accounts: &[Account]) -> Self {
        Self {
            accounts: accounts
                .iter()
                .map(|account| (account.user_id.clone(), AccountEntry::new(&account.password)))
                .collect(),
            open_registration: accounts.is_empty(),
            online: HashSet::new(),
            queue: VecDeque::new(),
            connections: HashMap::new(),
            next_connection_id: 1,
            max_clients,
            next_session: 1,
        }
    }

    /// Returns a connection id, or `None` when the server is full.
    pub fn admit(&mut self, addr: SocketAddr) -> Option<u32> {
        if self.connections.len() >= self.max_clients {
            return None;
        }
        let connection_id = self.next_connection_id;
        self.next_connection_id += 1;
        info!("Connection {} from {}", connection_id, addr);
        self.connections.insert(connection_id, addr);
        Some(connection_id)
    }

    pub fn release(&mut self, connection_id: u32) -> bool {
        self.connections.remove(&connection_id).is_some()
    }

    /// Number of open connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Checks the password and marks the user online. Returns the owned part ids.
    pub fn sign_in(&mut self, user_id: &str, password: &str) -> Result<Vec<String>, LoginError> {
        if !self.accounts.contains_key(user_id) {
            if !self.open_registration {
                return Err(LoginError::UnknownUser(user_id.to_string()));
            }
            info!("Registered {}", user_id);
            self.accounts
                .insert(user_id.to_string(), AccountEntry::new(password));
        }

        let account = self
            .accounts
            .get(user_id)
            .ok_or_else(|| LoginError::UnknownUser(user_id.to_string()))?;
        if account.password != password {
            return Err(LoginError::WrongPassword(user_id.to_string()));
        }
        if !self.online.insert(user_id.to_string()) {
            return Err(LoginError::AlreadySignedIn(user_id.to_string()));
        }
        info!("{} signed in", user_id);
        Ok(account.parts.clone())
    }

    /// Marks the user offline and drops any queue entry. Returns false if they were not online.
    pub fn sign_out(&mut self, user_id: &str) -> bool {
        self.withdraw(user_id);
        let removed = self.online.remove(user_id);
        if removed {
            info!("{} signed out", user_id);
        }
        removed
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.online.contains(user_id)
    }

    pub fn record(&self, user_id: &str) -> Option<Record> {
        self.accounts.get(user_id).map(|account| account.record)
    }

    pub fn record_result(&mut self, user_id: &str, status: MatchStatus) {
        let Some(account) = self.accounts.get_mut(user_id) else {
            return;
        };
        match status {
            MatchStatus::Win => account.record.wins += 1,
            MatchStatus::Draw => account.record.draws += 1,
            MatchStatus::Lose | MatchStatus::Forfeit => account.record.losses += 1,
            MatchStatus::None => {}
        }
    }

    /// Other players ordered by how close their points are to `user_id`'s.
    pub fn closest_players(&self, user_id: &str) -> Vec<ClosestPlayer> {
        let mine = self
            .record(user_id)
            .map(|record| record.points())
            .unwrap_or_default();

        let mut players: Vec<ClosestPlayer> = self
            .accounts
            .iter()
            .filter(|(id, _)| id.as_str() != user_id)
            .map(|(id, account)| ClosestPlayer {
                user_id: id.clone(),
                points: account.record.points(),
            })
            .collect();
        players.sort_by(|a, b| {
            a.points
                .abs_diff(mine)
                .cmp(&b.points.abs_diff(mine))
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        players.truncate(PLAYER_LIST_LIMIT);
        players
    }

    /// Queues a player, or pairs them with whoever has waited longest.
    ///
    /// Entries whose connection has already given up are discarded on the way.
    pub fn enqueue(&mut self, entry: QueueEntry) -> Option<(QueueEntry, QueueEntry)> {
        self.withdraw(&entry.user_id);
        while let Some(waiting) = self.queue.pop_front() {
            if waiting.ticket.is_closed() {
                continue;
            }
            return Some((waiting, entry));
        }
        self.queue.push_back(entry);
        None
    }

    /// Removes the user from the queue. False if they were not waiting.
    pub fn withdraw(&mut self, user_id: &str) -> bool {
        let before = self.queue.len();
        self.queue.retain(|entry| entry.user_id != user_id);
        self.queue.len() != before
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn next_session_id(&mut self) -> String {
        let id = format!("match-{}", self.next_session);
        self.next_session += 1;
        id
    }
}
