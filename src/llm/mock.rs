//! Scripted generation-service client for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{Error, Result};

use super::client::LlmClient;
use super::types::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};

/// A mock client that replays a queue of scripted outcomes and records
/// every request it receives.
pub struct MockClient {
    responses: Mutex<VecDeque<Result<String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful completion with the given content.
    pub fn push_ok(&self, content: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(content.into()));
    }

    /// Queue a hard (non-retryable) failure.
    pub fn push_err(&self, message: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(Error::llm(message)));
    }

    /// Queue a transient rate-limit failure.
    pub fn push_rate_limited(&self, message: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(Error::rate_limited(message)));
    }

    /// Number of requests the mock has served so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Concatenated system + user text of the nth request, for prompt
    /// contract assertions.
    pub fn prompt_text(&self, index: usize) -> String {
        let requests = self.requests.lock().unwrap();
        let request = &requests[index];
        let mut text = request.system.clone().unwrap_or_default();
        for message in &request.messages {
            text.push('\n');
            text.push_str(&message.content);
        }
        text
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for MockClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.requests.lock().unwrap().push(request);

        let next = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::llm("mock client response queue exhausted")));

        next.map(|content| CompletionResponse {
            id: "mock".to_string(),
            model: "mock".to_string(),
            content,
            stop_reason: Some(StopReason::EndTurn),
            usage: TokenUsage::default(),
            timestamp: Utc::now(),
        })
    }

    fn provider(&self) -> &str {
        "mock"
    }
}
