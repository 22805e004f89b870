use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::conversation::Conversation;
use crate::errors::{DispatchError, LoopError, LoopFailure};
use crate::providers::base::{CompletionRequest, Provider};
use crate::providers::types::message::{Message, ToolCall};
use crate::registry::error_envelope;
use crate::usage::UsageMetadata;

/// Requests allowed per run unless the caller says otherwise.
pub const DEFAULT_MAX_ITERATIONS: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopState {
    Sending,
    AwaitingTools,
    Done,
    Failed,
}

/// What to do when the model calls a tool that isn't registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum UnknownToolPolicy {
    /// Answer the call with a "tool not found" error message
    #[default]
    Report,
    /// End the run with `LoopError::UnresolvedToolCall`
    Fail,
    /// Drop the call without answering it
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopOptions {
    /// Ceiling on completion requests per run; `None` means unbounded
    pub max_iterations: Option<usize>,
    pub unknown_tool_policy: UnknownToolPolicy,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            max_iterations: Some(DEFAULT_MAX_ITERATIONS),
            unknown_tool_policy: UnknownToolPolicy::default(),
        }
    }
}

/// Outcome of a successful run. The answer itself is the conversation's last message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopReport {
    pub state: LoopState,
    pub requests: usize,
    pub usage: UsageMetadata,
}

/// Drives a conversation against a provider until the model stops calling tools.
pub struct CompletionLoop {
    provider: Box<dyn Provider>,
    options: LoopOptions,
    cancel: CancelToken,
}

impl CompletionLoop {
    pub fn new(provider: Box<dyn Provider>) -> Self {
        Self {
            provider,
            options: LoopOptions::default(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_options(mut self, options: LoopOptions) -> Self {
        self.options = options;
        self
    }

    /// Use `cancel` to abort runs from another thread or after a deadline.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &LoopOptions {
        &self.options
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Append `text` as a user message, then run the loop.
    pub fn query(
        &self,
        text: &str,
        conversation: &mut Conversation,
    ) -> Result<LoopReport, LoopFailure> {
        conversation.append_user_message(text);
        self.run(conversation)
    }

    /// Exchange messages with the provider, running requested tools, until the
    /// model answers without tool calls.
    pub fn run(&self, conversation: &mut Conversation) -> Result<LoopReport, LoopFailure> {
        let mut usage = UsageMetadata::default();
        let mut requests = 0;

        if self.options.max_iterations == Some(0) {
            return Err(LoopFailure::new(
                LoopError::InvalidConfiguration("max_iterations must be at least 1".to_string()),
                usage,
            ));
        }

        loop {
            debug!(state = ?LoopState::Sending, requests, "completion loop step");
            if let Some(max) = self.options.max_iterations {
                if requests >= max {
                    return Err(self.fail(LoopError::MaxIterationsExceeded(max), usage, requests));
                }
            }
            requests += 1;

            let calls = match self.exchange(conversation, &mut usage) {
                Ok(calls) => calls,
                Err(error) => return Err(self.fail(error, usage, requests)),
            };

            if calls.is_empty() {
                info!(
                    state = ?LoopState::Done,
                    requests,
                    total_tokens = usage.total_tokens,
                    elapsed_ms = usage.elapsed_ms,
                    "completion loop finished"
                );
                return Ok(LoopReport {
                    state: LoopState::Done,
                    requests,
                    usage,
                });
            }

            debug!(state = ?LoopState::AwaitingTools, calls = calls.len(), "dispatching tool calls");
            if let Err(error) = self.dispatch_tool_calls(conversation, calls) {
                return Err(self.fail(error, usage, requests));
            }
        }
    }

    fn fail(&self, error: LoopError, usage: UsageMetadata, requests: usize) -> LoopFailure {
        warn!(state = ?LoopState::Failed, %error, requests, "completion loop failed");
        LoopFailure::new(error, usage)
    }

    /// One request/response exchange with no tool dispatch.
    pub fn request_completion(
        &self,
        conversation: &mut Conversation,
    ) -> Result<UsageMetadata, LoopFailure> {
        let mut usage = UsageMetadata::default();
        match self.exchange(conversation, &mut usage) {
            Ok(_) => Ok(usage),
            Err(error) => Err(self.fail(error, usage, 1)),
        }
    }

    /// Send the conversation and append the reply. Returns the tool calls it carries.
    fn exchange(
        &self,
        conversation: &mut Conversation,
        usage: &mut UsageMetadata,
    ) -> Result<Vec<ToolCall>, LoopError> {
        if self.cancel.is_cancelled() {
            return Err(LoopError::Cancelled);
        }

        let started = Instant::now();
        let result = {
            let request = CompletionRequest {
                model: conversation.model(),
                temperature: conversation.temperature(),
                messages: conversation.history(),
                tools: conversation.tools().enabled(),
            };
            self.provider.complete(&request, &self.cancel)
        };
        let elapsed = started.elapsed();
        usage.add_elapsed(elapsed);

        // a reply that lands after cancellation is dropped, not appended
        if self.cancel.is_cancelled() {
            return Err(LoopError::Cancelled);
        }
        let (message, response_usage) = result.map_err(LoopError::Provider)?;
        debug!(
            model = conversation.model(),
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            tool_calls = message.tool_calls.len(),
            "received completion"
        );

        usage.add_usage(&response_usage);
        let calls = message.tool_calls.clone();
        conversation.push(message);
        Ok(calls)
    }

    /// Answer each call in provider order with exactly one tool message, unless the
    /// policy for unknown tools says otherwise.
    fn dispatch_tool_calls(
        &self,
        conversation: &mut Conversation,
        calls: Vec<ToolCall>,
    ) -> Result<(), LoopError> {
        for call in calls {
            if self.cancel.is_cancelled() {
                return Err(LoopError::Cancelled);
            }

            let output = match conversation.tools().dispatch(&call) {
                Ok(output) => {
                    debug!(tool = %call.function_name, call_id = %call.id, "tool call succeeded");
                    output
                }
                Err(DispatchError::ToolNotFound(name)) => match self.options.unknown_tool_policy {
                    UnknownToolPolicy::Report => {
                        warn!(tool = %name, call_id = %call.id, "model called an unknown tool");
                        error_envelope(&DispatchError::ToolNotFound(name).envelope_message())
                    }
                    UnknownToolPolicy::Fail => {
                        return Err(LoopError::UnresolvedToolCall { id: call.id, name });
                    }
                    UnknownToolPolicy::Skip => {
                        warn!(tool = %name, call_id = %call.id, "skipping call to unknown tool");
                        continue;
                    }
                },
                Err(err) => {
                    warn!(tool = %call.function_name, call_id = %call.id, error = %err, "tool call failed");
                    error_envelope(&err.envelope_message())
                }
            };

            conversation.push(Message::tool_result(&call.id, &call.function_name, &output));
        }
        Ok(())
    }
}
