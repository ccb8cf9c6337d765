// cache-common - Shared error types for the sharded cache workspace

pub mod error;

pub use error::{CacheError, CacheResult};
