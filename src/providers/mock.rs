use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use super::base::{CompletionRequest, Provider, Usage};
use super::types::message::Message;
use crate::cancel::CancelToken;

/// What the mock saw on one `complete` call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub model: String,
    pub temperature: Option<f32>,
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
}

type ScriptedResponse = std::result::Result<(Message, Usage), String>;

/// A provider that plays back pre-configured responses, for tests.
///
/// Clones share the script and the request log, so a test can keep a handle
/// after boxing the provider into a loop.
#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    responses: Arc<Mutex<VecDeque<ScriptedResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<Message>) -> Self {
        Self::with_usage(
            responses
                .into_iter()
                .map(|message| (message, Usage::default()))
                .collect(),
        )
    }

    pub fn with_usage(responses: Vec<(Message, Usage)>) -> Self {
        let provider = Self::default();
        lock(&provider.responses).extend(responses.into_iter().map(Ok));
        provider
    }

    /// Queue a provider failure after the responses already scripted.
    pub fn push_error(&self, message: &str) {
        lock(&self.responses).push_back(Err(message.to_string()));
    }

    pub fn push_response(&self, message: Message, usage: Usage) {
        lock(&self.responses).push_back(Ok((message, usage)));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

impl Provider for MockProvider {
    fn from_env() -> Result<Self> {
        Ok(Self::default())
    }

    fn complete(
        &self,
        request: &CompletionRequest<'_>,
        cancel: &CancelToken,
    ) -> Result<(Message, Usage)> {
        lock(&self.requests).push(RecordedRequest {
            model: request.model.to_string(),
            temperature: request.temperature,
            messages: request.messages.to_vec(),
            tool_names: request.tools.iter().map(|t| t.name.clone()).collect(),
        });

        if cancel.is_cancelled() {
            return Err(anyhow!("request aborted"));
        }

        match lock(&self.responses).pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(anyhow!(message)),
            // Return empty response if no more pre-configured responses
            None => Ok((Message::assistant(""), Usage::default())),
        }
    }
}
