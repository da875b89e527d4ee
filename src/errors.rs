//! Application error model
//!
//! Defines a typed error hierarchy using `thiserror` for internal error
//! handling. Most collaborator failures are absorbed by the pipeline driver
//! and degrade the run instead of aborting it; these variants cover the
//! paths that do propagate (configuration, transport setup, local I/O).

use thiserror::Error;

/// Application error type
///
/// Covers all error cases the digest pipeline may encounter. The pipeline
/// driver decides per stage whether a variant aborts the run or degrades it.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid configuration or user input (validation failed, malformed value)
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Authentication failure (bad credentials, account disabled)
    #[error("authentication failed: {0}")]
    AuthFailed(String),
    /// Operation timeout (TCP connect, TLS handshake, IMAP response)
    #[error("operation timed out: {0}")]
    Timeout(String),
    /// IMAP transport or protocol failure
    #[error("transport error: {0}")]
    Transport(String),
    /// Summarizer call failure (instruction load, HTTP, malformed response)
    #[error("summarizer error: {0}")]
    Summarizer(String),
    /// Downstream delivery failure (speech synthesis, chat upload)
    #[error("delivery error: {0}")]
    Delivery(String),
    /// Local filesystem failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Internal error (unexpected failure, external crate error)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Type alias for fallible return values
///
/// Use this for all internal functions that can fail. Provides a consistent
/// error type throughout the codebase.
pub type AppResult<T> = Result<T, AppError>;
