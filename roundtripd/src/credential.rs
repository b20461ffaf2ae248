//! The transport credential.

use std::env;

use thiserror::Error;

use roundtrip_agent::ApiKey;

/// The env var that holds the transport API key.
pub const API_KEY_ENV: &str = "API_KEY";

/// An error reading the transport credential.
#[derive(Copy, Clone, Debug, Error, Eq, PartialEq)]
pub enum CredentialError {
    /// The env var is not set, or is not valid unicode.
    #[error("env var API_KEY needs to be set")]
    Missing,

    /// The env var is set, but empty.
    #[error("env var API_KEY must not be empty")]
    Empty,
}

/// Reads the transport API key from the [`API_KEY_ENV`] env var.
pub fn api_key_from_env() -> Result<ApiKey, CredentialError> {
    api_key_from(env::var(API_KEY_ENV).ok())
}

/// Parses an API key from an optional env var value.
pub fn api_key_from(value: Option<String>) -> Result<ApiKey, CredentialError> {
    value
        .ok_or(CredentialError::Missing)?
        .parse()
        .map_err(|_| CredentialError::Empty)
}
