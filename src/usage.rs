use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::providers::base::Usage;

/// Running totals across every request of one loop invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub elapsed_ms: u64,
}

impl UsageMetadata {
    /// Add the wall-clock time of one request, successful or not.
    pub fn add_elapsed(&mut self, elapsed: Duration) {
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.elapsed_ms = self.elapsed_ms.saturating_add(ms);
    }

    /// Add the token counts reported for one response. Missing counts add nothing.
    pub fn add_usage(&mut self, usage: &Usage) {
        self.prompt_tokens += u64::from(usage.prompt_tokens.unwrap_or(0));
        self.completion_tokens += u64::from(usage.completion_tokens.unwrap_or(0));
        self.total_tokens += u64::from(usage.total_tokens.unwrap_or(0));
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }
}
