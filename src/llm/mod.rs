//! Generation-service client abstraction.
//!
//! This module provides a unified interface to the external generation
//! service: a single opaque completion operation, a concrete Gemini REST
//! client, and a bounded exponential-backoff retry helper for transient
//! rate-limit conditions.

mod client;
#[cfg(test)]
pub(crate) mod mock;
mod types;

pub use client::{complete_with_retry, ClientConfig, GoogleClient, LlmClient, RetryPolicy};
pub use types::{
    ChatMessage, ChatRole, CompletionRequest, CompletionResponse, StopReason, TokenUsage,
};

/// Extract the outermost JSON object from a model response.
///
/// Model output routinely arrives wrapped in markdown code fences or with
/// prose around it; everything outside the first `{` and last `}` is
/// discarded. No partial-parse recovery happens beyond that.
pub(crate) fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}
