//! Engine configuration.
//!
//! Loaded from a YAML file (explicit path, then the `SELHEAL_CONFIG`
//! environment variable, then built-in defaults). Every field carries
//! a serde default so partial files work.

use crate::errors::ConfigError;
use selheal_arbiter::{ProviderConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// How aggressively healed locators are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealMode {
    /// Healing disabled entirely.
    Off,
    /// Compute and report decisions, never apply them.
    Suggest,
    /// Apply heals for non-destructive actions only.
    AutoSafe,
    /// Apply heals for every action type.
    AutoAll,
}

impl HealMode {
    pub fn applies(&self, destructive: bool) -> bool {
        match self {
            HealMode::Off | HealMode::Suggest => false,
            HealMode::AutoSafe => !destructive,
            HealMode::AutoAll => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub ttl_secs: u64,
    pub capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 24 * 60 * 60,
            capacity: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub open_secs: u64,
    pub half_open_max_attempts: u32,
    pub success_threshold_to_close: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_secs: 60,
            half_open_max_attempts: 3,
            success_threshold_to_close: 2,
        }
    }
}

/// One reasoning provider in the chain (first entry is primary).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub name: String,
    pub model: String,
    pub endpoint: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Price per 1000 prompt tokens, in micro-dollars.
    pub prompt_price_micros_per_1k: u64,
    /// Price per 1000 completion tokens, in micro-dollars.
    pub completion_price_micros_per_1k: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            name: "primary".to_string(),
            model: "gpt-4o-mini".to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key_env: "SELHEAL_API_KEY".to_string(),
            timeout_secs: 30,
            max_retries: 2,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
            // gpt-4o-mini list price: $0.15 / $0.60 per million tokens.
            prompt_price_micros_per_1k: 150,
            completion_price_micros_per_1k: 600,
        }
    }
}

impl ProviderSettings {
    /// Arbitration cost for one episode, in micro-dollars.
    pub fn cost_micros(&self, prompt_tokens: u64, completion_tokens: u64) -> u64 {
        (prompt_tokens * self.prompt_price_micros_per_1k
            + completion_tokens * self.completion_price_micros_per_1k)
            / 1_000
    }

    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            name: self.name.clone(),
            model: self.model.clone(),
            endpoint: self.endpoint.clone(),
            api_key_env: self.api_key_env.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            call_timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealConfig {
    pub mode: HealMode,
    pub min_confidence: f64,
    pub max_heals_per_run: u32,
    pub allow_destructive: bool,
    pub cache: CacheSettings,
    pub breaker: BreakerSettings,
    /// Primary provider followed by ordered fallbacks. Empty means
    /// heuristic-only operation.
    pub providers: Vec<ProviderSettings>,
}

impl Default for HealConfig {
    fn default() -> Self {
        Self {
            mode: HealMode::AutoSafe,
            min_confidence: 0.7,
            max_heals_per_run: 20,
            allow_destructive: false,
            cache: CacheSettings::default(),
            breaker: BreakerSettings::default(),
            providers: vec![ProviderSettings::default()],
        }
    }
}

impl HealConfig {
    /// Load configuration with the usual precedence: explicit path,
    /// then `SELHEAL_CONFIG`, then defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved: Option<PathBuf> = path.map(Path::to_path_buf).or_else(|| {
            std::env::var("SELHEAL_CONFIG")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        });

        let Some(path) = resolved else {
            debug!("no config file, using defaults");
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        config.validate()?;
        info!(path = %path.display(), mode = ?config.mode, "loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::Invalid(format!(
                "min_confidence must be within [0, 1], got {}",
                self.min_confidence
            )));
        }
        if self.breaker.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "breaker failure_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
