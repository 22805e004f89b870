use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::types::message::Message;
use super::types::tool::ToolSpec;
use crate::cancel::CancelToken;

/// Token counts reported for one completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

impl Usage {
    pub fn new(
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
        total_tokens: Option<u32>,
    ) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        }
    }
}

/// Everything a provider needs for one completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub temperature: Option<f32>,
    pub messages: &'a [Message],
    pub tools: Vec<&'a ToolSpec>,
}

/// Base trait for completion providers (OpenAI and compatible servers)
pub trait Provider: Send + Sync {
    /// Create a provider instance from environment variables
    fn from_env() -> Result<Self>
    where
        Self: Sized;

    /// Generate the next assistant message for the request.
    ///
    /// Implementations must stop waiting once `cancel` fires. Exactly one
    /// message is returned per call.
    fn complete(
        &self,
        request: &CompletionRequest<'_>,
        cancel: &CancelToken,
    ) -> Result<(Message, Usage)>;
}
