use std::collections::HashMap;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::errors::{DispatchError, DispatchResult};
use crate::providers::types::message::ToolCall;
use crate::providers::types::tool::ToolSpec;

/// The tools enabled for a conversation, looked up by name.
///
/// Registration order is preserved. When two specs share a name the first one
/// registered wins, both for dispatch and for what is advertised to the model.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolSpec>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new(specs: Vec<ToolSpec>) -> Self {
        let mut registry = Self::default();
        registry.register(specs);
        registry
    }

    /// Replace the active tool set.
    pub fn register(&mut self, specs: Vec<ToolSpec>) {
        self.index.clear();
        for (position, spec) in specs.iter().enumerate() {
            self.index.entry(spec.name.clone()).or_insert(position);
        }
        self.tools = specs;
    }

    pub fn resolve(&self, name: &str) -> Option<&ToolSpec> {
        self.index.get(name).map(|&position| &self.tools[position])
    }

    /// Specs the model can call: one per name, in registration order.
    pub fn enabled(&self) -> Vec<&ToolSpec> {
        self.tools
            .iter()
            .enumerate()
            .filter(|(position, spec)| self.index.get(&spec.name) == Some(position))
            .map(|(_, spec)| spec)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run the tool a call names and return its serialized output.
    pub fn dispatch(&self, call: &ToolCall) -> DispatchResult<String> {
        let tool = self
            .resolve(&call.function_name)
            .ok_or_else(|| DispatchError::ToolNotFound(call.function_name.clone()))?;
        let arguments = parse_arguments(&call.arguments)?;

        debug!(tool = %tool.name, call_id = %call.id, "invoking tool handler");
        let output = tool
            .call(&arguments)
            .map_err(|e| DispatchError::ExecutionError(format!("{:#}", e)))?;

        Ok(serialize_output(output))
    }
}

/// Parse raw call arguments into a key/value mapping. Blank input is an empty mapping.
pub fn parse_arguments(raw: &str) -> DispatchResult<Map<String, Value>> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(DispatchError::InvalidParameters(format!(
            "expected a JSON object, got {}",
            other
        ))),
        Err(e) => Err(DispatchError::InvalidParameters(e.to_string())),
    }
}

/// String results are passed through untouched, anything else is JSON-encoded.
pub fn serialize_output(output: Value) -> String {
    match output {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

/// The payload injected back into the conversation when a tool call fails.
pub fn error_envelope(message: &str) -> String {
    json!({ "error": message }).to_string()
}
