//! cgm-link — CGM provider integration
//!
//! Obtains, caches and proactively refreshes OAuth2 credentials for a
//! continuous glucose-monitoring provider, and reads glucose values on top of
//! them. Concurrent callers share a single in-flight refresh.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use cgm_link::prelude::*;
//!
//! # async fn example() -> cgm_link::error::Result<()> {
//! let config = CgmConfig::from_env()?;
//! let manager = Arc::new(TokenManager::new(&config, config.file_token_store())?);
//! let client = GlucoseClient::new(&config, manager);
//!
//! for reading in client.readings_since(chrono::Duration::hours(1)).await? {
//!     println!("{} {} mg/dL", reading.system_time, reading.value);
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod prelude;
pub mod readings;
pub mod storage;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
