//! Error taxonomy shared by the retrieval and conversation core.
//!
//! Three categories cross module boundaries:
//!
//! - [`ProviderError`]: the embedding or generation service failed (timeout,
//!   network, quota, bad payload). Retrieval turns this into an empty result and
//!   the conversation flow into a scripted fallback reply; it never reaches end users.
//! - [`StoreError`]: SQLite is unreachable or returned something unreadable.
//!   Surfaced to callers as [`PaintError::StoreUnavailable`].
//! - [`PaintError`]: returned by public operations for validation failures, store
//!   outages and authentication failures.
//!
//! "Not found" is never an error; lookups return `Option`.

use std::time::Duration;

use thiserror::Error;

/// Failure of an external model provider (embeddings or text generation).
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),

    #[error("provider HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("provider returned an unusable response: {0}")]
    Malformed(String),

    #[error("embedding has {actual} dimensions, expected {expected}")]
    Dimension { expected: usize, actual: usize },

    #[error("provider is not configured: {0}")]
    NotConfigured(String),
}

/// Failure of a persistent store (products or sessions).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Unavailable(#[from] rusqlite::Error),

    #[error("stored record is malformed: {0}")]
    Malformed(String),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("store task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        StoreError::Task(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Malformed(e.to_string())
    }
}

/// Error returned by the public retrieval, maintenance and session operations.
#[derive(Debug, Error)]
pub enum PaintError {
    /// Request rejected before any store or provider call was made.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The backing store cannot serve requests. Distinct from "no results".
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("authentication failed: {0}")]
    Auth(String),

    /// Only returned across the conversation responder seam; the turn flow
    /// converts it into a fallback reply.
    #[error("generation failed: {0}")]
    Provider(#[from] ProviderError),
}

impl PaintError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        PaintError::Validation(msg.into())
    }
}

pub type PaintResult<T> = std::result::Result<T, PaintError>;
