pub mod cancel;
pub mod completion_loop;
pub mod conversation;
pub mod errors;
pub mod models;
pub mod providers;
pub mod registry;
pub mod usage;

pub use cancel::CancelToken;
pub use completion_loop::{CompletionLoop, LoopOptions, LoopReport, LoopState, UnknownToolPolicy};
pub use conversation::Conversation;
pub use errors::{DispatchError, LoopError, LoopFailure};
pub use models::ModelSize;
pub use providers::types::message::{Message, Role, ToolCall};
pub use providers::types::tool::{ParameterType, ToolParameter, ToolSpec};
pub use registry::ToolRegistry;
pub use usage::UsageMetadata;
