//! OAuth2 credential lifecycle: storage, caching, exchange and refresh.

pub mod cache;
mod endpoint;
pub mod error;
pub mod jwt;
pub mod manager;
pub mod store;
pub mod token;

pub use cache::TokenCache;
pub use error::AuthError;
pub use manager::{TokenManager, TokenStatus};
pub use store::{TokenStore, DEFAULT_TOKEN_KEY};
pub use token::TokenRecord;
