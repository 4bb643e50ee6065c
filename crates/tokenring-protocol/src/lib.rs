//! Token ring protocol - core types and wire codec
//!
//! Describes the ring (addresses, roles, positions), the circulating token
//! and its per-node measurement entries, and the JSON encoding used on the
//! wire. Nothing in this crate performs I/O.

pub mod address;
pub mod codec;
pub mod constants;
pub mod error;
pub mod token;
pub mod topology;

pub use address::*;
pub use codec::{decode_token, encode_token};
pub use constants::*;
pub use error::*;
pub use token::*;
pub use topology::*;
