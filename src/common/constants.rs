//! Constants used throughout Vexel

/// Default vector size for processing
pub const STANDARD_VECTOR_SIZE: usize = 2048;

/// Invalid index constant
pub const INVALID_INDEX: usize = usize::MAX;

/// Maximum string length
pub const MAX_STRING_LENGTH: usize = 1 << 30; // 1GB

/// Maximum decimal precision
pub const MAX_DECIMAL_PRECISION: u8 = 38;

/// Strings at or below this length are stored inline in a vector's view
/// table instead of the shared arena.
pub const INLINE_STRING_LENGTH: usize = 12;

/// Microseconds per second, the timestamp storage unit.
pub const MICROS_PER_SECOND: i64 = 1_000_000;
