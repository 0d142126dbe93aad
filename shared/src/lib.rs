//! # Arena Wire Protocol
//!
//! Types and constants shared by the arena client and the reference server.
//! Every message on the wire is a single fixed-size frame of comma separated
//! text; there is no length prefix and no type tag, so the meaning of a frame
//! is decided by whichever operation reads it.
//!
//! - [`codec`] turns ordered fields into padded frames and back.
//! - [`messages`] gives each protocol exchange its own typed request/response
//!   with the field-count validation that exchange needs.
//! - [`parts`] holds the six-part robot loadout.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod codec;
pub mod messages;
pub mod parts;

pub use codec::{decode, encode, frame, FrameError, WireMessage};
pub use messages::{
    ClientRequest, ClosestPlayer, DecodeError, LoginReply, LoginRequest, MatchAssignment,
    MatchRequest, MatchStart, MoveRequest, RoundReport,
};
pub use parts::{PartsConfiguration, PartsError, PARTS_LEN};

/// Size of every frame read from or written to the stream.
pub const FRAME_SIZE: usize = 100;
/// Field separator inside a frame.
pub const DELIMITER: char = ',';
/// Separator between user id and points inside a player descriptor.
pub const PLAYER_FIELD_SEPARATOR: char = ';';

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 6789;
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 60;

pub const LOGGED_IN: &str = "logged in";
pub const LOGIN_FAILED: &str = "fail";
pub const SIGNOUT: &str = "signout";
pub const CONFIRM: &str = "confirm";
pub const LIST_REQUEST: &str = "list";

/// A move a player can make during a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Attack,
    Defend,
    Heal,
    Charge,
    Forfeit,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Attack,
        Action::Defend,
        Action::Heal,
        Action::Charge,
        Action::Forfeit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Attack => "attack",
            Action::Defend => "defend",
            Action::Heal => "heal",
            Action::Charge => "charge",
            Action::Forfeit => "forfeit",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Standing of a player at the end of a round. `None` means the match goes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Win,
    Lose,
    Draw,
    Forfeit,
    None,
}

impl MatchStatus {
    const ALL: [MatchStatus; 5] = [
        MatchStatus::Win,
        MatchStatus::Lose,
        MatchStatus::Draw,
        MatchStatus::Forfeit,
        MatchStatus::None,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Win => "win",
            MatchStatus::Lose => "lose",
            MatchStatus::Draw => "draw",
            MatchStatus::Forfeit => "forfeit",
            MatchStatus::None => "none",
        }
    }

    pub fn is_final(&self) -> bool {
        !matches!(self, MatchStatus::None)
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MatchStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}
