//! Model identifiers understood by the OpenAI chat-completions endpoint.

use serde::{Deserialize, Serialize};

pub const GPT_4O: &str = "gpt-4o";
pub const GPT_4O_MINI: &str = "gpt-4o-mini";
pub const GPT_4_TURBO: &str = "gpt-4-turbo";

pub const DEFAULT_MODEL: &str = GPT_4O;

/// Coarse model choice for callers that don't care about exact names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum ModelSize {
    S,
    L,
    XL,
}

impl ModelSize {
    pub fn model_name(self) -> &'static str {
        match self {
            ModelSize::S => GPT_4O_MINI,
            ModelSize::XL => GPT_4_TURBO,
            ModelSize::L => GPT_4O,
        }
    }
}
