//! Core error types for evergreen-core.
//!
//! This module defines a comprehensive error hierarchy using thiserror
//! for better error handling and reporting across the library.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for evergreen-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Storage-related errors
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Authentication-related errors
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Remote sync errors
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load preferences
    #[error("Failed to load preferences from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save preferences
    #[error("Failed to save preferences to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid preference value
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown preference key
    #[error("Unknown preference key: {0}")]
    UnknownKey(String),

    /// Failed to parse preferences
    #[error("Failed to parse preferences: {0}")]
    ParseFailed(String),
}

/// Authentication-specific errors.
#[derive(Error, Debug)]
pub enum AuthError {
    /// No user is signed in
    #[error("Not signed in")]
    NotAuthenticated,

    /// Email/password pair did not match a registered account
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Email already registered
    #[error("An account already exists for {0}")]
    EmailTaken(String),

    /// No account matches the given email
    #[error("No account found for {0}")]
    AccountNotFound(String),

    /// Password below the minimum length
    #[error("Password must be at least {min_len} characters")]
    WeakPassword { min_len: usize },

    /// Operation requires a registered (non-anonymous) account
    #[error("Operation not available for guest accounts")]
    AnonymousAccount,

    /// Stored session token failed verification
    #[error("Session token invalid: {0}")]
    TokenInvalid(String),

    /// Password reset code wrong or expired
    #[error("Password reset code is invalid or expired")]
    ResetCodeInvalid,

    /// Credential storage (keyring or fallback) failed
    #[error("Credential store error: {0}")]
    CredentialStore(String),
}

/// Remote ledger sync errors.
#[derive(Error, Debug)]
pub enum SyncError {
    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server rejected the request
    #[error("Remote rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Malformed base URL
    #[error("Invalid remote base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    /// Response body missing an expected field
    #[error("Malformed remote response: {0}")]
    MalformedResponse(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Session duration of zero is rejected, never clamped
    #[error("Focus duration must be greater than zero")]
    ZeroDuration,

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Malformed email address
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    StoreError::Locked
                } else {
                    StoreError::QueryFailed(err.to_string())
                }
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Store(err.into())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CoreError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        CoreError::Custom(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
