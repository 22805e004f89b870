use std::collections::HashSet;
use std::sync::OnceLock;

use anyhow::{anyhow, Result};
use regex::Regex;
use serde_json::{json, Map, Value};

use super::base::Usage;
use super::types::{
    content::ContentPart,
    message::{Message, MessageContent, Role, ToolCall},
    tool::{ParameterType, ToolSpec},
};

/// Convert internal Message format to OpenAI's API message specification
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    messages.iter().map(message_to_openai_spec).collect()
}

fn message_to_openai_spec(message: &Message) -> Value {
    let mut converted = json!({
        "role": message.role
    });

    match &message.content {
        MessageContent::Text(text) => {
            // an assistant turn made only of tool calls carries no content
            if !text.is_empty() || message.tool_calls.is_empty() {
                converted["content"] = json!(text);
            }
        }
        MessageContent::Parts(parts) => {
            converted["content"] = Value::Array(parts.iter().map(ContentPart::to_json).collect());
        }
    }

    if !message.tool_calls.is_empty() {
        converted["tool_calls"] = message
            .tool_calls
            .iter()
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": {
                        "name": sanitize_function_name(&call.function_name),
                        "arguments": call.arguments,
                    }
                })
            })
            .collect();
    }

    if message.role == Role::Tool {
        if let Some(id) = &message.tool_call_id {
            converted["tool_call_id"] = json!(id);
        }
        if let Some(name) = &message.tool_name {
            converted["name"] = json!(name);
        }
    }

    converted
}

/// Map a semantic parameter type to its JSON schema type. There is no datetime
/// schema type, so datetimes travel as strings.
pub fn parameter_type_to_openai(parameter_type: ParameterType) -> &'static str {
    match parameter_type {
        ParameterType::String | ParameterType::Datetime => "string",
        ParameterType::Integer => "integer",
        ParameterType::Real => "number",
        ParameterType::Boolean => "boolean",
    }
}

/// Convert internal Tool format to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[&ToolSpec]) -> Result<Vec<Value>> {
    let mut tool_names = HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(tool.name.as_str()) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }
        if !is_valid_function_name(&tool.name) {
            return Err(anyhow!(
                "Tool name '{}' must match the regex [a-zA-Z0-9_-]+",
                tool.name
            ));
        }

        let properties: Map<String, Value> = tool
            .parameters
            .iter()
            .map(|parameter| {
                (
                    parameter.name.clone(),
                    json!({
                        "type": parameter_type_to_openai(parameter.parameter_type),
                        "description": parameter.description,
                    }),
                )
            })
            .collect();

        result.push(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "strict": false,
                "parameters": {
                    "type": "object",
                    "properties": properties,
                    "required": [],
                },
            }
        }));
    }

    Ok(result)
}

/// Convert OpenAI's API response to internal Message format
pub fn openai_response_to_message(response: &Value) -> Result<Message> {
    let choice = response
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .ok_or_else(|| anyhow!("Response contained no choices"))?;
    let original = choice
        .get("message")
        .ok_or_else(|| anyhow!("Response choice has no message"))?;

    let text = original
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let mut tool_calls = Vec::new();
    if let Some(tool_calls_array) = original.get("tool_calls").and_then(Value::as_array) {
        for tool_call in tool_calls_array {
            let id = tool_call["id"].as_str().unwrap_or_default();
            let function_name = tool_call["function"]["name"].as_str().unwrap_or_default();
            // arguments normally arrive as a JSON string, some servers send an object
            let arguments = match &tool_call["function"]["arguments"] {
                Value::String(raw) => raw.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            tool_calls.push(ToolCall::new(id, function_name, arguments));
        }
    }

    let message = Message::assistant_with_tool_calls(text, tool_calls);
    message.validate()?;
    Ok(message)
}

pub fn get_usage(data: &Value) -> Usage {
    let Some(usage) = data.get("usage") else {
        return Usage::default();
    };

    let count = |key: &str| {
        usage
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
    };

    let prompt_tokens = count("prompt_tokens");
    let completion_tokens = count("completion_tokens");
    let total_tokens = count("total_tokens").or_else(|| match (prompt_tokens, completion_tokens) {
        (Some(prompt), Some(completion)) => Some(prompt + completion),
        _ => None,
    });

    Usage::new(prompt_tokens, completion_tokens, total_tokens)
}

fn invalid_name_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-zA-Z0-9_-]").expect("valid regex"))
}

fn sanitize_function_name(name: &str) -> String {
    invalid_name_chars().replace_all(name, "_").to_string()
}

fn is_valid_function_name(name: &str) -> bool {
    !name.is_empty() && !invalid_name_chars().is_match(name)
}

#[derive(Debug, thiserror::Error)]
#[error("Input message too long. Message: {0}")]
pub struct InitialMessageTooLargeError(String);

pub fn check_openai_context_length_error(error: &Value) -> Option<InitialMessageTooLargeError> {
    let code = error.get("code")?.as_str()?;
    if code == "context_length_exceeded" || code == "string_above_max_length" {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        Some(InitialMessageTooLargeError(message))
    } else {
        None
    }
}
