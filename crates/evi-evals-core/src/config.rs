//! Runtime configuration for the event feed and scorer backends.
//!
//! Every value has an environment variable and a builder-style override;
//! command-line flags in the CLI take precedence over both.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

pub const HUME_API_KEY: &str = "HUME_API_KEY";
pub const HUME_BASE_URL: &str = "HUME_BASE_URL";
pub const HUME_PAGE_SIZE: &str = "HUME_PAGE_SIZE";
pub const HUME_TIMEOUT_SECS: &str = "HUME_TIMEOUT_SECS";
pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const ANTHROPIC_BASE_URL: &str = "ANTHROPIC_BASE_URL";
pub const SATISFACTION_MODEL: &str = "EVI_EVALS_SATISFACTION_MODEL";
pub const SUCCESS_MODEL: &str = "EVI_EVALS_SUCCESS_MODEL";
pub const SUMMARY_MODEL: &str = "EVI_EVALS_SUMMARY_MODEL";
pub const TIMEOUT_SECS: &str = "EVI_EVALS_TIMEOUT_SECS";
pub const PROMPT_DIR: &str = "EVI_EVALS_PROMPT_DIR";

/// Chat-events API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub page_size: u32,
    /// Per-page request timeout.
    pub timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.hume.ai".to_string(),
            api_key: None,
            page_size: 100,
            timeout: Duration::from_secs(30),
        }
    }
}

impl FeedConfig {
    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn require_api_key(&self) -> ConfigResult<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingCredential(HUME_API_KEY))
    }
}

/// LLM scorer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorerConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub satisfaction_model: String,
    pub success_model: String,
    pub summary_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            api_key: None,
            satisfaction_model: "claude-3-5-haiku-latest".to_string(),
            success_model: "claude-3-5-sonnet-latest".to_string(),
            summary_model: "claude-3-5-haiku-latest".to_string(),
            temperature: 0.5,
            max_tokens: 1024,
            timeout: Duration::from_secs(60),
        }
    }
}

impl ScorerConfig {
    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn require_api_key(&self) -> ConfigResult<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingCredential(ANTHROPIC_API_KEY))
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalConfig {
    pub feed: FeedConfig,
    pub scorer: ScorerConfig,
    /// Directory with prompt overrides; built-in prompts when `None`.
    pub prompt_dir: Option<PathBuf>,
}

impl EvalConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = EvalConfig::default();

        config.feed.api_key = lookup(HUME_API_KEY).filter(|v| !v.is_empty());
        if let Some(url) = lookup(HUME_BASE_URL) {
            config.feed = config.feed.with_base_url(&url);
        }
        if let Some(size) = lookup(HUME_PAGE_SIZE) {
            config.feed.page_size = parse_number(HUME_PAGE_SIZE, &size)?;
        }
        if let Some(secs) = lookup(HUME_TIMEOUT_SECS) {
            config.feed.timeout = Duration::from_secs(parse_number(HUME_TIMEOUT_SECS, &secs)?);
        }

        config.scorer.api_key = lookup(ANTHROPIC_API_KEY).filter(|v| !v.is_empty());
        if let Some(url) = lookup(ANTHROPIC_BASE_URL) {
            config.scorer = config.scorer.with_base_url(&url);
        }
        if let Some(model) = lookup(SATISFACTION_MODEL) {
            config.scorer.satisfaction_model = model;
        }
        if let Some(model) = lookup(SUCCESS_MODEL) {
            config.scorer.success_model = model;
        }
        if let Some(model) = lookup(SUMMARY_MODEL) {
            config.scorer.summary_model = model;
        }
        if let Some(secs) = lookup(TIMEOUT_SECS) {
            config.scorer.timeout = Duration::from_secs(parse_number(TIMEOUT_SECS, &secs)?);
        }

        config.prompt_dir = lookup(PROMPT_DIR).map(PathBuf::from);
        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(var: &'static str, value: &str) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = EvalConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EvalConfig::default());
        assert_eq!(config.scorer.success_model, "claude-3-5-sonnet-latest");
        assert!(config.feed.require_api_key().is_err());
    }

    #[test]
    fn test_environment_overrides() {
        let config = EvalConfig::from_lookup(lookup(&[
            (HUME_API_KEY, "hume-key"),
            (HUME_BASE_URL, "http://localhost:9000/"),
            (HUME_PAGE_SIZE, "25"),
            (HUME_TIMEOUT_SECS, "7"),
            (ANTHROPIC_API_KEY, "sk-test"),
            (SUMMARY_MODEL, "claude-3-5-sonnet-latest"),
            (TIMEOUT_SECS, "5"),
            (PROMPT_DIR, "/etc/evi-evals/prompts"),
        ]))
        .unwrap();

        assert_eq!(config.feed.require_api_key().unwrap(), "hume-key");
        assert_eq!(config.feed.base_url, "http://localhost:9000");
        assert_eq!(config.feed.page_size, 25);
        assert_eq!(config.feed.timeout, Duration::from_secs(7));
        assert_eq!(config.scorer.require_api_key().unwrap(), "sk-test");
        assert_eq!(config.scorer.summary_model, "claude-3-5-sonnet-latest");
        assert_eq!(config.scorer.timeout, Duration::from_secs(5));
        assert_eq!(
            config.prompt_dir,
            Some(PathBuf::from("/etc/evi-evals/prompts"))
        );
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = EvalConfig::from_lookup(lookup(&[(HUME_PAGE_SIZE, "lots")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                var: HUME_PAGE_SIZE,
                ..
            }
        ));
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let config = EvalConfig::from_lookup(lookup(&[(ANTHROPIC_API_KEY, "")])).unwrap();
        assert!(matches!(
            config.scorer.require_api_key(),
            Err(ConfigError::MissingCredential(ANTHROPIC_API_KEY))
        ));
    }
}
