use crate::address::RingAddress;

/// Errors raised while resolving ring configuration or decoding tokens.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("unknown role '{0}' (expected initiator, relay or observer)")]
    UnknownRole(String),

    #[error("invalid ring address '{addr}': {reason}")]
    InvalidAddress { addr: String, reason: String },

    #[error("ring has no members")]
    EmptyRing,

    #[error("own address {0} is not a ring member")]
    SelfNotInRing(RingAddress),

    #[error("own address {addr} is listed {count} times in the ring")]
    SelfListedTwice { addr: RingAddress, count: usize },

    #[error("corrupt token: {0}")]
    CorruptToken(String),

    #[error("failed to encode token: {0}")]
    Encode(String),
}

impl ProtocolError {
    /// Startup configuration problems; these are fatal, everything else is
    /// a runtime condition the round driver recovers from.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ProtocolError::UnknownRole(_)
                | ProtocolError::InvalidAddress { .. }
                | ProtocolError::EmptyRing
                | ProtocolError::SelfNotInRing(_)
                | ProtocolError::SelfListedTwice { .. }
        )
    }
}
