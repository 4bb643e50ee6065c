//! Token ring networking layer.
//!
//! Moves tokens between ring members over plain TCP:
//! - `transport`: one connection per delivery, bounded waits on both ends
//! - `forwarding`: single-pass skip-ahead delivery around failed successors

pub mod error;
pub mod forwarding;
pub mod transport;

pub use error::NetworkError;
pub use forwarding::{Delivery, Forwarder};
pub use transport::{send_token, Inbound, TokenListener};
