//! TCP token transport.
//!
//! Every delivery uses a fresh connection: the sender connects, writes the
//! encoded token and shuts down its write half; the receiver reads to EOF.
//! Both ends run under explicit time budgets so nothing blocks unbounded.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use tokenring_protocol::{decode_token, encode_token, RingAddress, Token, MAX_TOKEN_BYTES};

use crate::NetworkError;

/// Outcome of one bounded wait for a token.
#[derive(Debug)]
pub enum Inbound {
    /// A peer delivered a well-formed token.
    Token { token: Token, from: SocketAddr },
    /// Nobody connected within the wait budget.
    NoToken,
    /// A peer connected but the payload could not be decoded.
    Corrupt { from: SocketAddr, reason: String },
}

/// The node's listening endpoint, bound once at startup.
pub struct TokenListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TokenListener {
    pub async fn bind(addr: &RingAddress) -> Result<Self, NetworkError> {
        let bind_err = |source| NetworkError::Bind {
            addr: addr.clone(),
            source,
        };
        let listener = TcpListener::bind((addr.host(), addr.port()))
            .await
            .map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;
        tracing::info!(addr = %local_addr, "Token listener bound");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait up to `wait_budget` for a peer to connect, then read and decode
    /// its payload. Reading is bounded by the same budget; a peer that
    /// stalls mid-payload yields `Corrupt`.
    pub async fn receive_token(&self, wait_budget: Duration) -> Result<Inbound, NetworkError> {
        let (stream, from) = match timeout(wait_budget, self.listener.accept()).await {
            Err(_) => return Ok(Inbound::NoToken),
            Ok(Err(e)) => return Err(NetworkError::Accept(e)),
            Ok(Ok(conn)) => conn,
        };
        tracing::debug!(peer = %from, "Inbound token connection");

        let payload = match timeout(wait_budget, read_payload(stream)).await {
            Err(_) => {
                return Ok(Inbound::Corrupt {
                    from,
                    reason: format!("payload not completed within {wait_budget:?}"),
                })
            }
            Ok(Err(e)) => {
                return Ok(Inbound::Corrupt {
                    from,
                    reason: format!("read failed: {e}"),
                })
            }
            Ok(Ok(bytes)) => bytes,
        };

        match decode_token(&payload) {
            Ok(token) => Ok(Inbound::Token { token, from }),
            Err(e) => Ok(Inbound::Corrupt {
                from,
                reason: e.to_string(),
            }),
        }
    }
}

/// Read until the sender closes, keeping at most one byte past the size
/// limit so oversized payloads are still detected by the decoder.
async fn read_payload(stream: TcpStream) -> std::io::Result<Vec<u8>> {
    let mut payload = Vec::new();
    stream
        .take(MAX_TOKEN_BYTES as u64 + 1)
        .read_to_end(&mut payload)
        .await?;
    Ok(payload)
}

/// Deliver `token` to `target` over a new connection. Connect and write
/// together must finish within `hop_timeout`.
pub async fn send_token(
    target: &RingAddress,
    token: &Token,
    hop_timeout: Duration,
) -> Result<(), NetworkError> {
    let payload = encode_token(token)?;

    match timeout(hop_timeout, deliver(target, &payload)).await {
        Err(_) => Err(NetworkError::Unreachable {
            target: target.clone(),
            reason: format!("timed out after {hop_timeout:?}"),
        }),
        Ok(Err(e)) => Err(NetworkError::Unreachable {
            target: target.clone(),
            reason: e.to_string(),
        }),
        Ok(Ok(())) => Ok(()),
    }
}

async fn deliver(target: &RingAddress, payload: &[u8]) -> std::io::Result<()> {
    let mut stream = TcpStream::connect((target.host(), target.port())).await?;
    stream.write_all(payload).await?;
    stream.shutdown().await?;
    Ok(())
}
