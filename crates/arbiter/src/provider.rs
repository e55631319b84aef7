//! Pluggable reasoning capability
//!
//! The core defines the prompt and response contracts, not transport.
//! Anything that can turn a prompt into text can arbitrate.

use crate::errors::ProviderError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Raw provider output plus usage accounting.
#[derive(Debug, Clone, Default)]
pub struct ProviderResponse {
    pub text: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// External reasoning capability.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    /// Provider name for logs and failure reports.
    fn name(&self) -> &str;

    /// One completion round trip. Implementations enforce their own
    /// transport timeout and map transport errors onto
    /// [`ProviderError`] classes.
    async fn complete(&self, prompt: &str) -> Result<ProviderResponse, ProviderError>;
}

/// Per-provider dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub model: String,
    pub endpoint: String,

    /// Environment variable holding the API key; keys never live in
    /// config files.
    pub api_key_env: String,

    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "primary".to_string(),
            model: "gpt-4o-mini".to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key_env: "SELHEAL_API_KEY".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

/// Test double returning a scripted sequence of outcomes.
#[derive(Default)]
pub struct ScriptedProvider {
    name: String,
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: AtomicU32,
}

impl ScriptedProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn push_ok(self, text: impl Into<String>) -> Self {
        self.script.lock().push_back(Ok(text.into()));
        self
    }

    pub fn push_err(self, error: ProviderError) -> Self {
        self.script.lock().push_back(Err(error));
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, _prompt: &str) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().pop_front();
        match next {
            Some(Ok(text)) => Ok(ProviderResponse {
                text,
                prompt_tokens: 100,
                completion_tokens: 50,
            }),
            Some(Err(error)) => Err(error),
            None => Err(ProviderError::UnsupportedShape("script exhausted".into())),
        }
    }
}
