use tokenring_protocol::{ProtocolError, RingAddress};

/// Errors from the token transport and forwarding engine.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: RingAddress,
        source: std::io::Error,
    },

    #[error("failed to accept inbound connection: {0}")]
    Accept(#[source] std::io::Error),

    /// A single hop failed; the forwarding engine moves on to the next successor.
    #[error("{target} unreachable: {reason}")]
    Unreachable { target: RingAddress, reason: String },

    /// Every other ring member failed in one forwarding pass.
    #[error("ring unreachable: all {tried} successors failed")]
    RingUnreachable { tried: usize },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
