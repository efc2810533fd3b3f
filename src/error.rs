//! Error types for finalai-core.

use thiserror::Error;

/// Result type alias using finalai-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building a study plan.
#[derive(Error, Debug)]
pub enum Error {
    /// Generation service signalled a rate limit; retryable with backoff.
    #[error("Generation service rate limited: {0}")]
    RateLimited(String),

    /// Generation service failed (not retryable).
    #[error("Generation service error: {0}")]
    Llm(String),

    /// No readable source documents were available.
    #[error("No source documents to plan from")]
    NoDocuments,

    /// Classification produced no course categories beyond the catch-all.
    #[error("No courses identified from the provided documents")]
    NoCourses,

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed schedule wire data (time slot, day entry, ...).
    #[error("Malformed schedule data: {0}")]
    MalformedSchedule(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a generation-service error.
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Create a rate-limit error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited(message.into())
    }

    /// Create a malformed-schedule error.
    pub fn malformed_schedule(message: impl Into<String>) -> Self {
        Self::MalformedSchedule(message.into())
    }

    /// Whether this error is a transient rate-limit condition.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}
