//! Common utilities and shared components

pub mod constants;
pub mod error;
pub mod pool;

pub use constants::*;
pub use error::*;
pub use pool::MemoryPool;
