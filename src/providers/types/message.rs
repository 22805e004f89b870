use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use super::content::{ContentPart, ImageDetail};
use super::objectid::create_object_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Message body: plain text, or a list of parts for multimodal user input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// A request from the model to invoke a local tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Opaque identifier issued by the provider
    pub id: String,
    pub function_name: String,
    /// Raw arguments as the provider serialized them, parsed only at dispatch
    pub arguments: String,
}

impl ToolCall {
    pub fn new<I, N, A>(id: I, function_name: N, arguments: A) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        A: Into<String>,
    {
        Self {
            id: id.into(),
            function_name: function_name.into(),
            arguments: arguments.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub id: String,
    pub created: i64,
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

impl Message {
    fn with_content(role: Role, content: MessageContent) -> Self {
        Self {
            role,
            id: create_object_id("msg"),
            created: now_secs(),
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn system(text: &str) -> Self {
        Self::with_content(Role::System, MessageContent::Text(text.to_string()))
    }

    pub fn user(text: &str) -> Self {
        Self::with_content(Role::User, MessageContent::Text(text.to_string()))
    }

    /// A user message carrying an image. An empty `text` adds no text part.
    pub fn user_with_image(text: &str, image_url: &str) -> Self {
        let mut parts = Vec::with_capacity(2);
        if !text.is_empty() {
            parts.push(ContentPart::text(text));
        }
        parts.push(ContentPart::image(image_url, ImageDetail::High));
        Self::with_content(Role::User, MessageContent::Parts(parts))
    }

    pub fn assistant(text: &str) -> Self {
        Self::with_content(Role::Assistant, MessageContent::Text(text.to_string()))
    }

    pub fn assistant_with_tool_calls(text: &str, tool_calls: Vec<ToolCall>) -> Self {
        let mut message = Self::assistant(text);
        message.tool_calls = tool_calls;
        message
    }

    /// The answer to `call_id`, produced by running `tool_name`.
    pub fn tool_result(call_id: &str, tool_name: &str, output: &str) -> Self {
        let mut message = Self::with_content(Role::Tool, MessageContent::Text(output.to_string()));
        message.tool_call_id = Some(call_id.to_string());
        message.tool_name = Some(tool_name.to_string());
        message
    }

    pub fn validate(&self) -> Result<()> {
        if !self.tool_calls.is_empty() && self.role != Role::Assistant {
            return Err(anyhow!("Only assistant messages may carry tool calls"));
        }
        if matches!(self.content, MessageContent::Parts(_)) && self.role != Role::User {
            return Err(anyhow!("Only user messages may carry content parts"));
        }
        match self.role {
            Role::Tool => {
                if self.tool_call_id.is_none() {
                    return Err(anyhow!("Tool message must reference a tool call id"));
                }
            }
            _ => {
                if self.tool_call_id.is_some() || self.tool_name.is_some() {
                    return Err(anyhow!("Only tool messages may reference a tool call"));
                }
            }
        }
        Ok(())
    }

    /// All text in the message; text parts of multimodal content are joined by newlines.
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(ContentPart::as_text)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_user_message() {
        let message = Message::user("abcd");
        assert_eq!(message.role, Role::User);
        assert_eq!(message.text(), "abcd");
        assert!(message.validate().is_ok());
    }

    #[test]
    fn test_user_message_with_image() {
        let message = Message::user_with_image("Describe this", "https://example.com/a.png");
        match &message.content {
            MessageContent::Parts(parts) => {
                assert_eq!(parts.len(), 2);
                assert_eq!(parts[0].as_text(), Some("Describe this"));
                assert_eq!(
                    parts[1],
                    ContentPart::image("https://example.com/a.png", ImageDetail::High)
                );
            }
            MessageContent::Text(_) => panic!("expected content parts"),
        }
        assert_eq!(message.text(), "Describe this");
    }

    #[test]
    fn test_image_without_text_has_single_part() {
        let message = Message::user_with_image("", "https://example.com/a.png");
        assert!(matches!(&message.content, MessageContent::Parts(parts) if parts.len() == 1));
        assert_eq!(message.text(), "");
    }

    #[test]
    fn test_tool_result_message() {
        let message = Message::tool_result("call_1", "echo", "{\"ok\":true}");
        assert_eq!(message.role, Role::Tool);
        assert_eq!(message.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(message.tool_name.as_deref(), Some("echo"));
        assert!(message.validate().is_ok());
    }

    #[test]
    fn test_message_validation() {
        let mut message = Message::user("hi");
        message.tool_calls.push(ToolCall::new("1", "tool", "{}"));
        assert!(message.validate().is_err());

        let mut message = Message::tool_result("1", "tool", "out");
        message.tool_call_id = None;
        assert!(message.validate().is_err());

        let mut message = Message::assistant("hi");
        message.tool_call_id = Some("1".to_string());
        assert!(message.validate().is_err());

        let message =
            Message::assistant_with_tool_calls("", vec![ToolCall::new("1", "tool", "{}")]);
        assert!(message.validate().is_ok());
        assert!(message.has_tool_calls());
    }

    #[test]
    fn test_serialization() -> Result<()> {
        let message = Message::assistant_with_tool_calls(
            "Using tool",
            vec![ToolCall::new("call_1", "test_tool", r#"{"key":"value"}"#)],
        );
        let serialized = serde_json::to_string(&message)?;
        let deserialized: Message = serde_json::from_str(&serialized)?;
        assert_eq!(message, deserialized);

        let json_value: Value = serde_json::from_str(&serialized)?;
        assert_eq!(json_value["role"], "assistant");
        assert_eq!(json_value["content"], "Using tool");
        assert!(json_value.get("tool_call_id").is_none());
        Ok(())
    }
}
