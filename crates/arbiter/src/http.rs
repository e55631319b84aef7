//! Bundled OpenAI-style chat-completions provider
//!
//! The one concrete transport shipped with the engine; anything else
//! plugs in behind [`ReasoningProvider`].

use crate::errors::ProviderError;
use crate::provider::{ProviderConfig, ProviderResponse, ReasoningProvider};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

pub struct HttpProvider {
    config: ProviderConfig,
    client: reqwest::Client,
    api_key: Option<String>,
}

impl HttpProvider {
    pub fn new(config: ProviderConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env).ok();
        // Timeout is set per request; a default client cannot lose it.
        Self {
            config,
            client: reqwest::Client::new(),
            api_key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[async_trait]
impl ReasoningProvider for HttpProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn complete(&self, prompt: &str) -> Result<ProviderResponse, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ProviderError::Auth(format!(
                "API key env '{}' is not set",
                self.config.api_key_env
            ))
        })?;

        let body = json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0.0,
        });

        debug!(provider = %self.config.name, model = %self.config.model, "dispatching arbitration request");
        let response = self
            .client
            .post(&self.config.endpoint)
            .timeout(self.config.timeout)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| map_transport_error(&self.config, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(map_status(status.as_u16()));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::UnsupportedShape(err.to_string()))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::UnsupportedShape("empty choices".into()))?;
        let usage = parsed.usage.unwrap_or_default();

        Ok(ProviderResponse {
            text: choice.message.content,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        })
    }
}

fn map_transport_error(config: &ProviderConfig, err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(config.timeout.as_millis() as u64)
    } else if err.is_connect() {
        ProviderError::ConnectionReset(err.to_string())
    } else {
        ProviderError::MalformedRequest(err.to_string())
    }
}

fn map_status(status: u16) -> ProviderError {
    match status {
        401 | 403 => ProviderError::Auth(format!("http {status}")),
        429 => ProviderError::RateLimited,
        400 | 404 | 422 => ProviderError::MalformedRequest(format!("http {status}")),
        s if s >= 500 => ProviderError::ServerError(s),
        s => ProviderError::UnsupportedShape(format!("http {s}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorClass;

    #[test]
    fn status_mapping_drives_retry_classes() {
        assert_eq!(map_status(429).class(), ErrorClass::Transient);
        assert_eq!(map_status(503).class(), ErrorClass::Transient);
        assert_eq!(map_status(401).class(), ErrorClass::Terminal);
        assert_eq!(map_status(400).class(), ErrorClass::Terminal);
    }
}
