use anyhow::Result;
use mockito::{Matcher, Server};
use serde_json::json;
use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

use goai::providers::base::{CompletionRequest, Provider, Usage};
use goai::providers::configs::openai::OpenAiProviderConfig;
use goai::providers::openai::OpenAiProvider;
use goai::{
    CancelToken, CompletionLoop, Conversation, LoopError, Message, ParameterType, Role, ToolCall,
    ToolSpec,
};

fn provider_for(url: &str) -> Result<OpenAiProvider> {
    OpenAiProvider::new(OpenAiProviderConfig::new(
        "test-key".to_string(),
        format!("{}/", url),
    ))
}

fn text_response(content: &str, usage: (u32, u32, u32)) -> String {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": usage.0,
            "completion_tokens": usage.1,
            "total_tokens": usage.2
        }
    })
    .to_string()
}

#[test]
fn test_complete_sends_payload_and_parses_reply() -> Result<()> {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer test-key")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o",
            "temperature": 0.5,
            "messages": [{"role": "user", "content": "4 * (3 + 10)"}]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(text_response("52", (12, 1, 13)))
        .create();

    let provider = provider_for(&server.url())?;
    let messages = vec![Message::user("4 * (3 + 10)")];
    let request = CompletionRequest {
        model: "gpt-4o",
        temperature: Some(0.5),
        messages: &messages,
        tools: Vec::new(),
    };

    let (message, usage) = provider.complete(&request, &CancelToken::new())?;

    mock.assert();
    assert_eq!(message.role, Role::Assistant);
    assert_eq!(message.text(), "52");
    assert_eq!(usage, Usage::new(Some(12), Some(1), Some(13)));
    Ok(())
}

#[test]
fn test_complete_sends_tool_specs() -> Result<()> {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_body(Matcher::PartialJson(json!({
            "tools": [{
                "type": "function",
                "function": {
                    "name": "schedule",
                    "description": "Schedule a meeting",
                    "strict": false,
                    "parameters": {
                        "type": "object",
                        "properties": {
                            "at": {"type": "string", "description": "Start time"},
                            "minutes": {"type": "integer", "description": "Duration"}
                        },
                        "required": []
                    }
                }
            }]
        })))
        .with_status(200)
        .with_body(text_response("Scheduled", (1, 1, 2)))
        .create();

    let tool = ToolSpec::new("schedule", "Schedule a meeting", |_| Ok(json!("ok")))
        .with_parameter("at", ParameterType::Datetime, "Start time")
        .with_parameter("minutes", ParameterType::Integer, "Duration");
    let messages = vec![Message::user("book it")];
    let request = CompletionRequest {
        model: "gpt-4o",
        temperature: None,
        messages: &messages,
        tools: vec![&tool],
    };

    provider_for(&server.url())?.complete(&request, &CancelToken::new())?;

    mock.assert();
    Ok(())
}

#[test]
fn test_server_errors_are_reported() -> Result<()> {
    let mut server = Server::new();
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(503)
        .create();

    let messages = vec![Message::user("hi")];
    let request = CompletionRequest {
        model: "gpt-4o",
        temperature: None,
        messages: &messages,
        tools: Vec::new(),
    };

    let err = provider_for(&server.url())?
        .complete(&request, &CancelToken::new())
        .unwrap_err();
    assert!(err.to_string().contains("Server error"), "got {}", err);
    Ok(())
}

#[test]
fn test_context_length_error_is_surfaced() -> Result<()> {
    let mut server = Server::new();
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(400)
        .with_body(
            json!({
                "error": {
                    "code": "context_length_exceeded",
                    "message": "This model's maximum context length is 128000 tokens"
                }
            })
            .to_string(),
        )
        .create();

    let messages = vec![Message::user("very long")];
    let request = CompletionRequest {
        model: "gpt-4o",
        temperature: None,
        messages: &messages,
        tools: Vec::new(),
    };

    let err = provider_for(&server.url())?
        .complete(&request, &CancelToken::new())
        .unwrap_err();
    assert!(err.to_string().starts_with("Input message too long"), "got {}", err);
    Ok(())
}

#[test]
fn test_empty_choices_is_an_error() -> Result<()> {
    let mut server = Server::new();
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body(json!({"choices": [], "usage": {}}).to_string())
        .create();

    let mut conversation = Conversation::new();
    conversation.append_user_message("hi");
    let failure = CompletionLoop::new(Box::new(provider_for(&server.url())?))
        .run(&mut conversation)
        .unwrap_err();

    assert!(matches!(failure.error, LoopError::Provider(_)));
    assert_eq!(conversation.len(), 1);
    Ok(())
}

#[test]
fn test_loop_round_trip_over_http() -> Result<()> {
    let shout_spec = json!({
        "type": "function",
        "function": {
            "name": "shout",
            "description": "Upper-case text",
            "strict": false,
            "parameters": {
                "type": "object",
                "properties": {"text": {"type": "string", "description": "Text to shout"}},
                "required": []
            }
        }
    });
    let mut server = Server::new();
    let first = server
        .mock("POST", "/v1/chat/completions")
        .match_body(Matcher::Json(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "shout hello"}],
            "tools": [shout_spec.clone()]
        })))
        .with_status(200)
        .with_body(
            json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {"name": "shout", "arguments": "{\"text\": \"hello\"}"}
                        }]
                    }
                }],
                "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
            })
            .to_string(),
        )
        .expect(1)
        .create();
    let second = server
        .mock("POST", "/v1/chat/completions")
        .match_body(Matcher::PartialJson(json!({
            "messages": [
                {"role": "user", "content": "shout hello"},
                {
                    "role": "assistant",
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "shout", "arguments": "{\"text\": \"hello\"}"}
                    }]
                },
                {"role": "tool", "content": "HELLO", "tool_call_id": "call_1", "name": "shout"}
            ]
        })))
        .with_status(200)
        .with_body(text_response("HELLO", (8, 3, 11)))
        .expect(1)
        .create();

    let mut conversation = Conversation::new();
    conversation.set_tools(vec![ToolSpec::new("shout", "Upper-case text", |args| {
        Ok(json!(args["text"].as_str().unwrap_or_default().to_uppercase()))
    })
    .with_parameter("text", ParameterType::String, "Text to shout")]);

    let report = CompletionLoop::new(Box::new(provider_for(&server.url())?))
        .query("shout hello", &mut conversation)?;

    first.assert();
    second.assert();
    assert_eq!(report.requests, 2);
    assert_eq!(report.usage.total_tokens, 26);
    assert_eq!(conversation.last_message().map(Message::text).as_deref(), Some("HELLO"));
    assert_eq!(
        conversation.history()[1].tool_calls,
        vec![ToolCall::new("call_1", "shout", "{\"text\": \"hello\"}")]
    );
    Ok(())
}

#[test]
fn test_expired_deadline_cancels_request() -> Result<()> {
    let server = Server::new();
    let mut conversation = Conversation::new();
    conversation.append_user_message("hi");

    let failure = CompletionLoop::new(Box::new(provider_for(&server.url())?))
        .with_cancel_token(CancelToken::with_timeout(Duration::ZERO))
        .run(&mut conversation)
        .unwrap_err();

    assert!(matches!(failure.error, LoopError::Cancelled));
    Ok(())
}

#[test]
fn test_cancel_aborts_request_in_flight() -> Result<()> {
    let mut server = Server::new();
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_chunked_body(|writer| {
            thread::sleep(Duration::from_secs(3));
            writer.write_all(text_response("too late", (5, 5, 10)).as_bytes())
        })
        .create();

    let cancel = CancelToken::new();
    let canceller = cancel.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(200));
        canceller.cancel();
    });

    let mut conversation = Conversation::new();
    conversation.append_user_message("hi");
    let started = Instant::now();
    let failure = CompletionLoop::new(Box::new(provider_for(&server.url())?))
        .with_cancel_token(cancel)
        .run(&mut conversation)
        .unwrap_err();

    assert!(matches!(failure.error, LoopError::Cancelled), "got {}", failure);
    assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
    assert_eq!(conversation.len(), 1);
    Ok(())
}
