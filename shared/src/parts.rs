//! Robot loadout: exactly six body-part identifiers.

use crate::DELIMITER;
use serde::{Deserialize, Serialize};
use std::ops::Index;
use thiserror::Error;

/// Number of parts in a loadout (head, torso, left arm, right arm, legs, extra).
pub const PARTS_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartsError {
    #[error("a loadout needs exactly {PARTS_LEN} parts, got {0}")]
    WrongLength(usize),
    #[error("part {0} is empty")]
    EmptyPart(usize),
    #[error("part {0} contains a reserved character")]
    InvalidCharacter(usize),
}

/// An ordered, validated set of six part identifiers.
///
/// Every constructor validates, so a value of this type can always be put on
/// the wire: no part is empty and none contains the frame delimiter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct PartsConfiguration([String; PARTS_LEN]);

impl PartsConfiguration {
    pub fn new<S: Into<String>>(parts: [S; PARTS_LEN]) -> Result<Self, PartsError> {
        let parts = parts.map(Into::into);
        for (index, part) in parts.iter().enumerate() {
            validate_part(index, part)?;
        }
        Ok(Self(parts))
    }

    /// Builds a loadout from exactly [`PARTS_LEN`] fields.
    pub fn from_fields<S: AsRef<str>>(fields: &[S]) -> Result<Self, PartsError> {
        if fields.len() != PARTS_LEN {
            return Err(PartsError::WrongLength(fields.len()));
        }
        let mut parts: [String; PARTS_LEN] = Default::default();
        for (slot, field) in parts.iter_mut().zip(fields) {
            *slot = field.as_ref().to_string();
        }
        Self::new(parts)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

fn validate_part(index: usize, part: &str) -> Result<(), PartsError> {
    if part.is_empty() {
        return Err(PartsError::EmptyPart(index));
    }
    if part.contains(DELIMITER) || part.contains('\0') {
        return Err(PartsError::InvalidCharacter(index));
    }
    Ok(())
}

impl Index<usize> for PartsConfiguration {
    type Output = str;

    fn index(&self, index: usize) -> &str {
        &self.0[index]
    }
}

impl TryFrom<Vec<String>> for PartsConfiguration {
    type Error = PartsError;

    fn try_from(parts: Vec<String>) -> Result<Self, Self::Error> {
        Self::from_fields(&parts)
    }
}

impl From<PartsConfiguration> for Vec<String> {
    fn from(parts: PartsConfiguration) -> Self {
        parts.0.into()
    }
}
