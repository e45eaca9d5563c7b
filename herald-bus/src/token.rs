//! The bus token: a record id on the wire.
//!
//! Tokens are published as the JSON object `{"id":"<uuid>"}`. Decoding also
//! accepts a bare uuid string so a hand-requeued message (or an older
//! publisher) still routes; anything else is poison and goes to the
//! dead-letter queue.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Wire form of a bus token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: Uuid,
}

/// A token body that cannot be encoded or decoded.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("empty token body")]
    Empty,

    #[error("malformed token body: {0}")]
    Malformed(String),

    #[error("token encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Encode `id` as a token body.
pub fn encode(id: Uuid) -> Result<Vec<u8>, TokenError> {
    Ok(serde_json::to_vec(&Token { id })?)
}

/// Decode a token body back into a record id.
pub fn decode(body: &[u8]) -> Result<Uuid, TokenError> {
    if body.is_empty() {
        return Err(TokenError::Empty);
    }
    if let Ok(token) = serde_json::from_slice::<Token>(body) {
        return Ok(token.id);
    }
    let text = std::str::from_utf8(body)
        .map_err(|err| TokenError::Malformed(err.to_string()))?;
    Uuid::parse_str(text.trim()).map_err(|err| TokenError::Malformed(err.to_string()))
}
