use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Configuration for the vision model endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    /// Base URL for API requests
    pub api_base: String,

    /// API key, sent as the `key` query parameter
    pub api_key: String,

    /// Model name, e.g. `gemini-1.5-flash`
    pub model: String,

    /// Attempts per analysis when the model reports overload (HTTP 503)
    pub max_attempts: u32,

    /// Back-off unit; attempt `n` waits `n` times this long
    pub retry_backoff_ms: u64,
}

impl VisionConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            max_attempts: 3,
            retry_backoff_ms: 1500,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }
}
