//! Skip-ahead token forwarding.
//!
//! The engine tries the immediate successor first, then each following ring
//! member in order, stopping at the first delivery. One pass only: when every
//! other member fails the token is dropped here, and liveness comes back via
//! regeneration at whichever node times out waiting for it.

use std::time::Duration;

use tokenring_protocol::{RingAddress, RingTopology, Token};

use crate::transport::send_token;
use crate::NetworkError;

/// Where a token ended up after a successful forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub target: RingAddress,
    /// Ring offset of `target` from this node (1 = immediate successor).
    pub offset: usize,
    /// Successors that were tried and failed before `target`.
    pub skipped: Vec<RingAddress>,
}

#[derive(Debug, Clone)]
pub struct Forwarder {
    topology: RingTopology,
    hop_timeout: Duration,
}

impl Forwarder {
    pub fn new(topology: RingTopology, hop_timeout: Duration) -> Self {
        Self {
            topology,
            hop_timeout,
        }
    }

    pub fn topology(&self) -> &RingTopology {
        &self.topology
    }

    /// Hand `token` to the first reachable successor.
    ///
    /// Consumes the token: after a delivery the receiver owns it, and after
    /// `RingUnreachable` it is gone.
    pub async fn forward(&self, token: Token) -> Result<Delivery, NetworkError> {
        let mut skipped = Vec::new();

        for (offset, target) in self.topology.successors() {
            match send_token(target, &token, self.hop_timeout).await {
                Ok(()) => {
                    tracing::info!(
                        target = %target,
                        offset,
                        entries = token.len(),
                        "Forwarded token"
                    );
                    return Ok(Delivery {
                        target: target.clone(),
                        offset,
                        skipped,
                    });
                }
                Err(NetworkError::Unreachable { reason, .. }) => {
                    tracing::warn!(
                        target = %target,
                        offset,
                        reason = %reason,
                        "Successor unreachable, trying next"
                    );
                    skipped.push(target.clone());
                }
                Err(e) => return Err(e),
            }
        }

        tracing::error!(
            node = %self.topology.self_address(),
            tried = skipped.len(),
            "All successors unreachable, dropping token"
        );
        Err(NetworkError::RingUnreachable {
            tried: skipped.len(),
        })
    }
}
