use std::env;
use std::time::Duration;

use crate::security::require_secret;
use crate::{ResearchError, SecretValue};

const API_KEY_ENV_OVERRIDE: &str = "RESEARCH_LLM_API_KEY_ENV";
const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Settings resolved once at startup and handed to the LLM client and tools.
#[derive(Debug, Clone)]
pub struct ResearchConfig {
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: SecretValue,
    pub temperature: f32,
    pub fallback_temperature: f32,
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub web_search_url: String,
    pub arxiv_url: String,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl LlmConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";
    pub const DEFAULT_MODEL: &'static str = "gpt-3.5-turbo";
}

impl SearchConfig {
    pub const DEFAULT_WEB_SEARCH_URL: &'static str = "https://api.duckduckgo.com/";
    pub const DEFAULT_ARXIV_URL: &'static str = "https://export.arxiv.org/api/query";
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            web_search_url: Self::DEFAULT_WEB_SEARCH_URL.to_string(),
            arxiv_url: Self::DEFAULT_ARXIV_URL.to_string(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("research-assistant/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ResearchConfig {
    /// Resolve configuration from the process environment.
    pub fn from_env() -> Result<Self, ResearchError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary key lookup.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ResearchError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let key_env = get(API_KEY_ENV_OVERRIDE).unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string());
        let api_key = require_secret(&key_env, &lookup)?;

        let llm = LlmConfig {
            base_url: get("RESEARCH_LLM_BASE_URL")
                .unwrap_or_else(|| LlmConfig::DEFAULT_BASE_URL.to_string()),
            model: get("RESEARCH_LLM_MODEL").unwrap_or_else(|| LlmConfig::DEFAULT_MODEL.to_string()),
            api_key,
            temperature: parse_or("RESEARCH_LLM_TEMPERATURE", get("RESEARCH_LLM_TEMPERATURE"), 0.0)?,
            fallback_temperature: parse_or(
                "RESEARCH_FALLBACK_TEMPERATURE",
                get("RESEARCH_FALLBACK_TEMPERATURE"),
                0.7,
            )?,
        };

        let search = SearchConfig {
            web_search_url: get("RESEARCH_WEB_SEARCH_URL")
                .unwrap_or_else(|| SearchConfig::DEFAULT_WEB_SEARCH_URL.to_string()),
            arxiv_url: get("RESEARCH_ARXIV_URL")
                .unwrap_or_else(|| SearchConfig::DEFAULT_ARXIV_URL.to_string()),
        };

        let defaults = HttpConfig::default();
        let http = HttpConfig {
            timeout: Duration::from_secs(parse_or(
                "RESEARCH_HTTP_TIMEOUT_SECS",
                get("RESEARCH_HTTP_TIMEOUT_SECS"),
                defaults.timeout.as_secs(),
            )?),
            connect_timeout: Duration::from_secs(parse_or(
                "RESEARCH_CONNECT_TIMEOUT_SECS",
                get("RESEARCH_CONNECT_TIMEOUT_SECS"),
                defaults.connect_timeout.as_secs(),
            )?),
            user_agent: defaults.user_agent,
        };

        let config = Self { llm, search, http };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ResearchError> {
        if !(0.0..=2.0).contains(&self.llm.temperature)
            || !(0.0..=2.0).contains(&self.llm.fallback_temperature)
        {
            return Err(ResearchError::InvalidConfiguration(
                "temperatures must lie within 0.0..=2.0".into(),
            ));
        }
        if self.http.timeout.is_zero() {
            return Err(ResearchError::InvalidConfiguration(
                "RESEARCH_HTTP_TIMEOUT_SECS must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Build the shared HTTP client used by the LLM client and search tools.
    pub fn http_client(&self) -> Result<reqwest::Client, ResearchError> {
        reqwest::Client::builder()
            .timeout(self.http.timeout)
            .connect_timeout(self.http.connect_timeout)
            .user_agent(self.http.user_agent.clone())
            .build()
            .map_err(|err| {
                ResearchError::InvalidConfiguration(format!("failed to build HTTP client: {err}"))
            })
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T, ResearchError>
where
    T: std::str::FromStr,
{
    match raw {
        None => Ok(default),
        Some(value) => value.parse::<T>().map_err(|_| {
            ResearchError::InvalidConfiguration(format!("{key} has an invalid value: {value}"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let config = ResearchConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-test")]))
            .expect("config should load");

        assert_eq!(config.llm.model, "gpt-3.5-turbo");
        assert_eq!(config.llm.base_url, LlmConfig::DEFAULT_BASE_URL);
        assert_eq!(config.llm.api_key.expose(), "sk-test");
        assert_eq!(config.llm.temperature, 0.0);
        assert!((config.llm.fallback_temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.search.arxiv_url, SearchConfig::DEFAULT_ARXIV_URL);
        assert_eq!(config.http.timeout, Duration::from_secs(30));
    }

    #[test]
    fn missing_key_is_reported_by_name() {
        let err = ResearchConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ResearchError::MissingSecret(name) if name == "OPENAI_API_KEY"));
    }

    #[test]
    fn blank_key_counts_as_missing_and_padding_is_trimmed() {
        let err = ResearchConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "  ")])).unwrap_err();
        assert!(matches!(err, ResearchError::MissingSecret(_)));

        let config = ResearchConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-test\n")]))
            .expect("config should load");
        assert_eq!(config.llm.api_key.expose(), "sk-test");
        assert_eq!(format!("{:?}", config.llm.api_key), "***redacted***");
    }

    #[test]
    fn key_variable_name_can_be_redirected() {
        let config = ResearchConfig::from_lookup(lookup(&[
            ("RESEARCH_LLM_API_KEY_ENV", "GATEWAY_TOKEN"),
            ("GATEWAY_TOKEN", "gw-123"),
        ]))
        .expect("config should load");
        assert_eq!(config.llm.api_key.expose(), "gw-123");
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = ResearchConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("RESEARCH_HTTP_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ResearchError::InvalidConfiguration(_)));
    }

    #[test]
    fn out_of_range_temperature_is_rejected() {
        let err = ResearchConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("RESEARCH_LLM_TEMPERATURE", "3.5"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ResearchError::InvalidConfiguration(_)));
    }
}
