use crate::errors::LoopError;
use crate::models::{ModelSize, DEFAULT_MODEL};
use crate::providers::types::message::Message;
use crate::providers::types::tool::ToolSpec;
use crate::registry::ToolRegistry;

/// Ordered message history plus the settings used for the next request.
///
/// History is append-only. A conversation has a single writer: the caller between
/// runs, the completion loop during one.
#[derive(Debug)]
pub struct Conversation {
    model: String,
    temperature: Option<f32>,
    tools: ToolRegistry,
    messages: Vec<Message>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            tools: ToolRegistry::default(),
            messages: Vec::new(),
        }
    }

    pub fn append_user_message(&mut self, text: &str) {
        self.push(Message::user(text));
    }

    pub fn append_user_message_with_image(&mut self, text: &str, image_url: &str) {
        self.push(Message::user_with_image(text, image_url));
    }

    pub fn append_system_message(&mut self, text: &str) {
        self.push(Message::system(text));
    }

    pub(crate) fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn set_model_size(&mut self, size: ModelSize) {
        self.model = size.model_name().to_string();
    }

    pub fn set_model_name(&mut self, name: &str) {
        self.model = name.to_string();
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sampling temperature for subsequent requests, within `[0, 2]`.
    pub fn set_temperature(&mut self, temperature: f32) -> Result<(), LoopError> {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(LoopError::InvalidConfiguration(format!(
                "temperature must be within [0, 2], got {}",
                temperature
            )));
        }
        self.temperature = Some(temperature);
        Ok(())
    }

    /// `None` leaves the choice to the provider.
    pub fn temperature(&self) -> Option<f32> {
        self.temperature
    }

    /// Replace the tools the model may call.
    pub fn set_tools(&mut self, tools: Vec<ToolSpec>) {
        self.tools.register(tools);
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Conversational messages, skipping assistant turns that only carried tool calls.
    pub fn messages(&self) -> impl Iterator<Item = &Message> + Clone + '_ {
        self.messages.iter().filter(|m| !m.has_tool_calls())
    }

    /// Every message, tool plumbing included.
    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// An independent copy: same model, temperature and tools, with its own
    /// copy of every message.
    pub fn duplicate(&self) -> Conversation {
        Conversation {
            model: self.model.clone(),
            temperature: self.temperature,
            tools: self.tools.clone(),
            messages: self.messages.to_vec(),
        }
    }
}
