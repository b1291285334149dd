//! Persistent key-value storage for credentials.

pub mod store;

pub use store::{JsonFileStore, KeyValueStore, MemoryStore};

/// Storage keys as constants.
pub mod keys {
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    /// Expiry as epoch milliseconds
    pub const TOKEN_EXPIRY: &str = "token_expiry";
    /// Plain API key saved by older setups, read as an access token
    pub const LEGACY_API_KEY: &str = "api_key";
}
