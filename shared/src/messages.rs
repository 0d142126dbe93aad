//! Typed protocol messages.
//!
//! The wire carries no message tag, so each exchange decodes the frame it
//! expects with its own field-count check. Requests produce their fields with
//! `to_fields`; responses are read back with `from_message`.

use crate::codec::WireMessage;
use crate::parts::{PartsConfiguration, PartsError, PARTS_LEN};
use crate::{
    Action, MatchStatus, CONFIRM, LIST_REQUEST, LOGGED_IN, LOGIN_FAILED,
    PLAYER_FIELD_SEPARATOR, SIGNOUT,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fields in a match assignment: session id, opponent id and six parts.
pub const MATCH_ASSIGNMENT_FIELDS: usize = 2 + PARTS_LEN;
/// Fields in a round report.
pub const ROUND_REPORT_FIELDS: usize = 7;
/// Fields in the empty assignment sent when no opponent was found.
const NO_OPPONENT_FIELDS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{message} needs at least {expected} fields, got {actual}")]
    MissingFields {
        message: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{message} field {index} is invalid: {value:?}")]
    InvalidField {
        message: &'static str,
        index: usize,
        value: String,
    },
    #[error("unrecognised request {0:?}")]
    UnknownRequest(String),
}

fn invalid(message: &'static str, index: usize, value: &str) -> DecodeError {
    DecodeError::InvalidField {
        message,
        index,
        value: value.to_string(),
    }
}

/// Reads six parts starting at field `offset`.
fn parts_at(
    message: &WireMessage,
    name: &'static str,
    offset: usize,
) -> Result<PartsConfiguration, DecodeError> {
    let fields: Vec<&str> = message
        .cleaned()
        .skip(offset)
        .take(PARTS_LEN)
        .map(str::trim)
        .collect();
    PartsConfiguration::from_fields(&fields).map_err(|err| match err {
        PartsError::EmptyPart(i) | PartsError::InvalidCharacter(i) => {
            invalid(name, offset + i, fields[i])
        }
        PartsError::WrongLength(actual) => DecodeError::MissingFields {
            message: name,
            expected: offset + PARTS_LEN,
            actual: offset + actual,
        },
    })
}

/// `userID,password,`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub user_id: String,
    pub password: String,
}

impl LoginRequest {
    const NAME: &'static str = "login request";

    pub fn to_fields(&self) -> Vec<String> {
        vec![self.user_id.clone(), self.password.clone(), String::new()]
    }

    pub fn from_message(message: &WireMessage) -> Result<Self, DecodeError> {
        message.require(Self::NAME, 2)?;
        let user_id = message.field(0).unwrap_or_default().trim();
        let password = message.field(1).unwrap_or_default().trim();
        if user_id.is_empty() {
            return Err(invalid(Self::NAME, 0, user_id));
        }
        Ok(Self {
            user_id: user_id.to_string(),
            password: password.to_string(),
        })
    }
}

/// Answer to a login request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginReply {
    /// `logged in,<part ids>,`: the parts are the ones the account owns.
    Accepted { parts: Vec<String> },
    /// Anything else in field 0.
    Rejected { reason: String },
}

impl LoginReply {
    pub fn rejected() -> Self {
        LoginReply::Rejected {
            reason: LOGIN_FAILED.to_string(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, LoginReply::Accepted { .. })
    }

    pub fn to_fields(&self) -> Vec<String> {
        let mut fields = match self {
            LoginReply::Accepted { parts } => {
                let mut fields = vec![LOGGED_IN.to_string()];
                fields.extend(parts.iter().cloned());
                fields
            }
            LoginReply::Rejected { reason } => vec![reason.clone()],
        };
        fields.push(String::new());
        fields
    }

    /// Never fails: a first field other than exactly `logged in` is a rejection.
    pub fn from_message(message: &WireMessage) -> Self {
        let first = message.field(0).unwrap_or_default();
        if first == LOGGED_IN {
            LoginReply::Accepted {
                parts: message
                    .cleaned()
                    .skip(1)
                    .filter(|part| !part.is_empty())
                    .map(str::to_string)
                    .collect(),
            }
        } else {
            LoginReply::Rejected {
                reason: first.to_string(),
            }
        }
    }
}

/// `userID,part0,...,part5`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRequest {
    pub user_id: String,
    pub parts: PartsConfiguration,
}

impl MatchRequest {
    const NAME: &'static str = "match request";

    pub fn to_fields(&self) -> Vec<String> {
        let mut fields = vec![self.user_id.clone()];
        fields.extend(self.parts.iter().map(str::to_string));
        fields
    }

    pub fn from_message(message: &WireMessage) -> Result<Self, DecodeError> {
        message.require(Self::NAME, 1 + PARTS_LEN)?;
        Ok(Self {
            user_id: message.field(0).unwrap_or_default().trim().to_string(),
            parts: parts_at(message, Self::NAME, 1)?,
        })
    }
}

/// `sessionID,otherID,part0,...,part5,`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchAssignment {
    pub session_id: String,
    pub opponent_id: String,
    pub opponent_parts: PartsConfiguration,
}

/// Answer to a match request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchStart {
    Matched(MatchAssignment),
    /// The server gave up waiting for an opponent (`,,,,,,,,,`).
    NoOpponent,
}

impl MatchStart {
    const NAME: &'static str = "match assignment";

    pub fn to_fields(&self) -> Vec<String> {
        match self {
            MatchStart::Matched(assignment) => {
                let mut fields = vec![
                    assignment.session_id.clone(),
                    assignment.opponent_id.clone(),
                ];
                fields.extend(assignment.opponent_parts.iter().map(str::to_string));
                fields.push(String::new());
                fields
            }
            MatchStart::NoOpponent => vec![String::new(); NO_OPPONENT_FIELDS],
        }
    }

    pub fn from_message(message: &WireMessage) -> Result<Self, DecodeError> {
        message.require(Self::NAME, MATCH_ASSIGNMENT_FIELDS)?;

        let session_id = message.field(0).unwrap_or_default().trim();
        if session_id.is_empty() {
            return Ok(MatchStart::NoOpponent);
        }

        let opponent_id = message.field(1).unwrap_or_default().trim();
        if opponent_id.is_empty() {
            return Err(invalid(Self::NAME, 1, opponent_id));
        }

        Ok(MatchStart::Matched(MatchAssignment {
            session_id: session_id.to_string(),
            opponent_id: opponent_id.to_string(),
            opponent_parts: parts_at(message, Self::NAME, 2)?,
        }))
    }
}

/// `sessionID,move`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
    pub session_id: String,
    pub action: Action,
}

impl MoveRequest {
    const NAME: &'static str = "move";

    pub fn to_fields(&self) -> Vec<String> {
        vec![self.session_id.clone(), self.action.as_str().to_string()]
    }

    pub fn from_message(message: &WireMessage) -> Result<Self, DecodeError> {
        message.require(Self::NAME, 2)?;
        let raw = message.field(1).unwrap_or_default().trim();
        let action = raw.parse::<Action>().map_err(|_| invalid(Self::NAME, 1, raw))?;
        Ok(Self {
            session_id: message.field(0).unwrap_or_default().trim().to_string(),
            action,
        })
    }
}

/// `myHealth,otherHealth,status,chargeCooldown,healCooldown,turn,otherAction,`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundReport {
    pub health: i32,
    pub opponent_health: i32,
    pub status: MatchStatus,
    pub charge_cooldown: u32,
    pub heal_cooldown: u32,
    pub turn: u32,
    /// Empty before the first round has been played.
    pub opponent_action: Option<Action>,
}

impl RoundReport {
    const NAME: &'static str = "round report";

    pub fn to_fields(&self) -> Vec<String> {
        vec![
            self.health.to_string(),
            self.opponent_health.to_string(),
            self.status.as_str().to_string(),
            self.charge_cooldown.to_string(),
            self.heal_cooldown.to_string(),
            self.turn.to_string(),
            self.opponent_action
                .map(|action| action.as_str().to_string())
                .unwrap_or_default(),
            String::new(),
        ]
    }

    pub fn from_message(message: &WireMessage) -> Result<Self, DecodeError> {
        message.require(Self::NAME, ROUND_REPORT_FIELDS)?;

        let field = |index: usize| message.field(index).unwrap_or_default().trim();
        fn number<T: std::str::FromStr>(raw: &str, index: usize) -> Result<T, DecodeError> {
            raw.parse()
                .map_err(|_| invalid(RoundReport::NAME, index, raw))
        }

        let opponent_action = match field(6) {
            "" => None,
            raw => Some(
                raw.parse::<Action>()
                    .map_err(|_| invalid(Self::NAME, 6, raw))?,
            ),
        };

        Ok(Self {
            health: number(field(0), 0)?,
            opponent_health: number(field(1), 1)?,
            status: field(2)
                .parse()
                .map_err(|_| invalid(Self::NAME, 2, field(2)))?,
            charge_cooldown: number(field(3), 3)?,
            heal_cooldown: number(field(4), 4)?,
            turn: number(field(5), 5)?,
            opponent_action,
        })
    }
}

/// A nearby player as listed by the server: `userID;points`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosestPlayer {
    pub user_id: String,
    pub points: u32,
}

impl ClosestPlayer {
    pub fn descriptor(&self) -> String {
        format!("{}{}{}", self.user_id, PLAYER_FIELD_SEPARATOR, self.points)
    }

    /// Parses a descriptor in wire form (`id;points`) or normalized form (`id points`).
    pub fn from_descriptor(descriptor: &str) -> Option<Self> {
        let (user_id, points) = descriptor
            .trim()
            .rsplit_once([PLAYER_FIELD_SEPARATOR, ' '])?;
        Some(Self {
            user_id: user_id.trim().to_string(),
            points: points.trim().parse().ok()?,
        })
    }

    pub fn list_fields(players: &[ClosestPlayer]) -> Vec<String> {
        let mut fields: Vec<String> = players.iter().map(ClosestPlayer::descriptor).collect();
        fields.push(String::new());
        fields
    }

    /// Every non-empty field of a player list with the descriptor separator
    /// replaced by a space.
    pub fn normalize_list(message: &WireMessage) -> Vec<String> {
        message
            .cleaned()
            .filter(|field| !field.trim().is_empty())
            .map(|field| field.replace(PLAYER_FIELD_SEPARATOR, " "))
            .collect()
    }
}

/// What an idle client can ask the server for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    SignOut,
    ListPlayers { user_id: String },
    QuickMatch(MatchRequest),
    Confirm,
}

impl ClientRequest {
    pub fn parse(message: &WireMessage) -> Result<Self, DecodeError> {
        let first = message.field(0).unwrap_or_default().trim();
        let second = message.field(1).map(str::trim);

        if first == SIGNOUT || second == Some(SIGNOUT) {
            return Ok(ClientRequest::SignOut);
        }
        if first == CONFIRM {
            return Ok(ClientRequest::Confirm);
        }
        if second == Some(LIST_REQUEST) {
            return Ok(ClientRequest::ListPlayers {
                user_id: first.to_string(),
            });
        }
        if message.len() > PARTS_LEN {
            return MatchRequest::from_message(message).map(ClientRequest::QuickMatch);
        }
        Err(DecodeError::UnknownRequest(first.to_string()))
    }
}
