/// Largest payload accepted for a single token delivery.
pub const MAX_TOKEN_BYTES: usize = 64 * 1024;

/// Smallest ring for which skip-ahead can route around a failed successor.
pub const MIN_RING_SIZE: usize = 3;
