//! Convenience re-exports for common use.

pub use crate::auth::{AuthError, TokenManager, TokenRecord, TokenStatus, TokenStore};
pub use crate::config::{CgmConfig, Environment};
pub use crate::error::{CgmError, Result};
pub use crate::readings::{GlucoseClient, GlucoseReading};
pub use crate::storage::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
