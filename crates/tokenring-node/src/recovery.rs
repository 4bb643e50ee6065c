//! Token regeneration after a missed token.

use std::sync::Arc;

use tokenring_network::{Delivery, Forwarder, NetworkError};
use tokenring_protocol::Token;

use crate::sensor::MeasurementSource;

/// Re-injects a fresh single-entry token when the circulating one is
/// presumed lost.
///
/// If the original was only late, two tokens now circulate until one of
/// them is lost; liveness wins over uniqueness here.
pub struct RecoveryController {
    source: Arc<dyn MeasurementSource>,
}

impl RecoveryController {
    pub fn new(source: Arc<dyn MeasurementSource>) -> Self {
        Self { source }
    }

    /// A new circulation holding only this node's current reading.
    pub fn fresh_token(&self) -> Token {
        Token::seed(self.source.measure())
    }

    pub async fn regenerate(&self, forwarder: &Forwarder) -> Result<Delivery, NetworkError> {
        let token = self.fresh_token();
        tracing::info!(
            node = %forwarder.topology().self_address(),
            "No token received, re-initiating circulation"
        );
        forwarder.forward(token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::sensor::FixedSource;
    use tokenring_network::{Inbound, TokenListener};
    use tokenring_protocol::{Measurement, RingAddress, RingTopology};

    #[tokio::test]
    async fn regenerated_token_has_single_local_entry() {
        let me = TokenListener::bind(&RingAddress::new("127.0.0.1", 0)).await.unwrap();
        let next = TokenListener::bind(&RingAddress::new("127.0.0.1", 0)).await.unwrap();
        let third = TokenListener::bind(&RingAddress::new("127.0.0.1", 0)).await.unwrap();
        let ring: Vec<RingAddress> = [&me, &next, &third]
            .iter()
            .map(|l| RingAddress::from(l.local_addr()))
            .collect();
        let forwarder = Forwarder::new(
            RingTopology::resolve(ring.clone(), &ring[0]).unwrap(),
            Duration::from_millis(500),
        );

        let reading = Measurement::new().with("temperature", Some(12.5));
        let recovery = RecoveryController::new(Arc::new(FixedSource::new(reading.clone())));
        let delivery = recovery.regenerate(&forwarder).await.unwrap();
        assert_eq!(delivery.target, ring[1]);

        match next.receive_token(Duration::from_secs(1)).await.unwrap() {
            Inbound::Token { token, .. } => assert_eq!(token, Token::seed(reading)),
            other => panic!("expected regenerated token, got {other:?}"),
        }
    }
}
