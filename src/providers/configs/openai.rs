use super::base::ProviderConfig;
use anyhow::{Context, Result};
use std::time::Duration;

pub const OPENAI_DEFAULT_HOST: &str = "https://api.openai.com/";
pub const OPENAI_DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

pub struct OpenAiProviderConfig {
    pub api_key: String,
    /// Base URL of an OpenAI-compatible server, without the `/v1` suffix
    pub host: String,
    pub timeout: Duration,
}

impl OpenAiProviderConfig {
    pub fn new(api_key: String, host: String) -> Self {
        Self {
            api_key,
            host,
            timeout: OPENAI_DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl ProviderConfig for OpenAiProviderConfig {
    fn from_env() -> Result<Self> {
        // OPENAI_TOKEN is the older name for the same key
        let api_key = Self::get_env("OPENAI_API_KEY", false, None)?
            .or(Self::get_env("OPENAI_TOKEN", false, None)?)
            .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY (or OPENAI_TOKEN) must be set"))?;

        let host = Self::get_env(
            "OPENAI_API_HOST",
            false,
            Some(OPENAI_DEFAULT_HOST.to_string()),
        )?
        .unwrap_or_else(|| OPENAI_DEFAULT_HOST.to_string());

        let timeout = match Self::get_env("OPENAI_TIMEOUT_SECS", false, None)? {
            Some(secs) => Duration::from_secs(
                secs.parse()
                    .with_context(|| format!("OPENAI_TIMEOUT_SECS is not a number: {}", secs))?,
            ),
            None => OPENAI_DEFAULT_TIMEOUT,
        };

        Ok(Self::new(api_key, host).with_timeout(timeout))
    }
}
