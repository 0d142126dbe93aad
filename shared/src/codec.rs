//! Fixed-frame text codec.
//!
//! Outgoing messages are joined with [`DELIMITER`], encoded one byte per
//! character and NUL-padded to [`FRAME_SIZE`]. Incoming frames are decoded as a
//! whole and split on the delimiter without stripping anything; the padding
//! ends up inside the last field and is only ignored when a field is read
//! through [`WireMessage::field`].

use crate::messages::DecodeError;
use crate::{DELIMITER, FRAME_SIZE};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("encoded message is {len} bytes but a frame holds {FRAME_SIZE}")]
    TooLarge { len: usize },
    #[error("field {index} contains the frame delimiter")]
    EmbeddedDelimiter { index: usize },
}

/// Joins fields with the delimiter. Characters outside ASCII become `?`.
pub fn encode<S: AsRef<str>>(fields: &[S]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(FRAME_SIZE);
    for (index, field) in fields.iter().enumerate() {
        if index > 0 {
            bytes.push(DELIMITER as u8);
        }
        bytes.extend(
            field
                .as_ref()
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' }),
        );
    }
    bytes
}

/// Encodes fields into one NUL-padded frame.
///
/// Oversized messages are rejected rather than truncated, and a field holding
/// the delimiter would shift every later field, so it is rejected too.
pub fn frame<S: AsRef<str>>(fields: &[S]) -> Result<[u8; FRAME_SIZE], FrameError> {
    if let Some(index) = fields
        .iter()
        .position(|field| field.as_ref().contains(DELIMITER))
    {
        return Err(FrameError::EmbeddedDelimiter { index });
    }

    let encoded = encode(fields);
    if encoded.len() > FRAME_SIZE {
        return Err(FrameError::TooLarge { len: encoded.len() });
    }

    let mut frame = [0u8; FRAME_SIZE];
    frame[..encoded.len()].copy_from_slice(&encoded);
    Ok(frame)
}

/// Decodes a whole buffer and splits it on the delimiter.
pub fn decode(bytes: &[u8]) -> WireMessage {
    let text = String::from_utf8_lossy(bytes);
    WireMessage {
        fields: text.split(DELIMITER).map(str::to_string).collect(),
    }
}

/// One decoded frame: its fields in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    fields: Vec<String>,
}

impl WireMessage {
    pub fn new<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Raw fields, padding included.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field at `index` with frame padding (everything from the first NUL) cut off.
    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(|field| strip_padding(field))
    }

    /// All fields with padding cut off.
    pub fn cleaned(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| strip_padding(field))
    }

    /// Fails with [`DecodeError::MissingFields`] unless at least `expected` fields are present.
    pub fn require(&self, message: &'static str, expected: usize) -> Result<(), DecodeError> {
        if self.fields.len() < expected {
            return Err(DecodeError::MissingFields {
                message,
                expected,
                actual: self.fields.len(),
            });
        }
        Ok(())
    }
}

fn strip_padding(field: &str) -> &str {
    field.split('\0').next().unwrap_or_default()
}
