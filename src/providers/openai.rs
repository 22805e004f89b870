use anyhow::{anyhow, Result};
use reqwest::blocking::{Client, RequestBuilder}; // blocking API, the completion loop is synchronous
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::debug;

use super::{
    base::{CompletionRequest, Provider, Usage},
    configs::base::ProviderConfig,
    configs::openai::OpenAiProviderConfig,
    types::message::Message,
    utils::{
        check_openai_context_length_error, get_usage, messages_to_openai_spec,
        openai_response_to_message, tools_to_openai_spec,
    },
};
use crate::cancel::CancelToken;

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { client, config })
    }

    fn post(&self, payload: &Value, cancel: &CancelToken) -> Result<Value> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let mut request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(payload);
        if let Some(remaining) = cancel.remaining() {
            request = request.timeout(remaining.min(self.config.timeout));
        }

        // the blocking send can't observe the token, so it runs on a worker we can abandon
        cancel
            .run_until_cancelled(move || send(request))
            .ok_or_else(|| anyhow!("request cancelled while awaiting {}", url))?
    }
}

fn send(request: RequestBuilder) -> Result<Value> {
    let response = request.send()?;

    match response.status() {
        StatusCode::OK => Ok(response.json()?),
        status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
            Err(anyhow!("Server error: {}", status))
        }
        status => {
            // error bodies usually carry a structured explanation worth surfacing
            let body: Value = response.json().unwrap_or(Value::Null);
            match body.get("error") {
                Some(error) => Err(response_error(error)),
                None => Err(anyhow!("Request failed: {}", status)),
            }
        }
    }
}

fn response_error(error: &Value) -> anyhow::Error {
    match check_openai_context_length_error(error) {
        Some(err) => err.into(),
        None => anyhow!("OpenAI API error: {}", error),
    }
}

impl Provider for OpenAiProvider {
    fn from_env() -> Result<Self> {
        let config = OpenAiProviderConfig::from_env()?;
        Self::new(config)
    }

    fn complete(
        &self,
        request: &CompletionRequest<'_>,
        cancel: &CancelToken,
    ) -> Result<(Message, Usage)> {
        let mut payload = json!({
            "model": request.model,
            "messages": messages_to_openai_spec(request.messages),
        });

        let tools_spec = tools_to_openai_spec(&request.tools)?;
        let tool_count = tools_spec.len();
        if !tools_spec.is_empty() {
            payload["tools"] = json!(tools_spec);
        }
        if let Some(temperature) = request.temperature {
            payload["temperature"] = json!(temperature);
        }

        debug!(
            model = request.model,
            messages = request.messages.len(),
            tools = tool_count,
            "sending chat completion request"
        );
        let response = self.post(&payload, cancel)?;

        if let Some(error) = response.get("error") {
            return Err(response_error(error));
        }

        let message = openai_response_to_message(&response)?;
        let usage = get_usage(&response);

        Ok((message, usage))
    }
}
