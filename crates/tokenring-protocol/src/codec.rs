//! JSON wire encoding of tokens.
//!
//! A delivery carries exactly one token; the sender closing the connection
//! marks the end of the payload. The body is a JSON array of flat objects
//! mapping metric name to a number or `null`.

use crate::constants::MAX_TOKEN_BYTES;
use crate::token::{Measurement, Token};
use crate::ProtocolError;

pub fn encode_token(token: &Token) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(token).map_err(|e| ProtocolError::Encode(e.to_string()))
}

/// Decode a received payload. Anything other than a non-empty array of
/// well-formed entries is `CorruptToken`; partial results are never returned.
pub fn decode_token(payload: &[u8]) -> Result<Token, ProtocolError> {
    if payload.len() > MAX_TOKEN_BYTES {
        return Err(ProtocolError::CorruptToken(format!(
            "payload of {} bytes exceeds {MAX_TOKEN_BYTES} byte limit",
            payload.len()
        )));
    }

    let entries: Vec<Measurement> = serde_json::from_slice(payload)
        .map_err(|e| ProtocolError::CorruptToken(e.to_string()))?;

    if entries.is_empty() {
        return Err(ProtocolError::CorruptToken("token has no entries".into()));
    }

    Ok(Token::from_entries(entries))
}
