//! Runtime configuration loaded from an optional YAML file.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a working configuration. Credentials are never read from
//! here; they come from the CLI / environment.

use crate::error::{Error, Result};
use crate::models::Facet;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub guardian: GuardianConfig,
    pub llm: LlmConfig,
    pub analysis: AnalysisConfig,
}

/// Settings shared by every HTTP client the tool builds.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// Applied uniformly to every request, scraping and LLM alike.
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Comments requested per discussion API page (the API caps this at 100).
    pub page_size: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 60,
            user_agent: concat!("guardian_comments/", env!("CARGO_PKG_VERSION")).to_string(),
            page_size: 100,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct GuardianConfig {
    pub discussion_api_url: String,
    pub content_api_url: String,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            discussion_api_url: "https://discussion.theguardian.com/discussion-api/discussion"
                .to_string(),
            content_api_url: "https://content.guardianapis.com/search".to_string(),
        }
    }
}

/// LLM provider settings (Anthropic Messages API compatible).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub api_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub anthropic_version: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.anthropic.com/v1/messages".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 2000,
            anthropic_version: "2023-06-01".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Comments beyond this many are dropped, lowest engagement first.
    pub max_comments: usize,
    pub batch_size: usize,
    /// Oracle requests in flight at once; 1 means strictly sequential.
    pub concurrency: usize,
    pub top_themes: usize,
    pub top_ideas: usize,
    pub top_notable: usize,
    pub top_questions: usize,
    pub facets: Vec<Facet>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_comments: 200,
            batch_size: 50,
            concurrency: 1,
            top_themes: 7,
            top_ideas: 5,
            top_notable: 5,
            top_questions: 3,
            facets: Facet::DEFAULT.to_vec(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or return the defaults when `path` is `None`.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            debug!("No config file given; using defaults");
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml(&raw)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        // An empty file deserializes to unit, not to an empty mapping.
        let config: Config = if raw.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(raw).map_err(|e| Error::Config(e.to_string()))?
        };
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let zero = [
            ("analysis.max_comments", self.analysis.max_comments == 0),
            ("analysis.batch_size", self.analysis.batch_size == 0),
            ("analysis.concurrency", self.analysis.concurrency == 0),
            ("http.page_size", self.http.page_size == 0),
        ];
        if let Some((name, _)) = zero.iter().find(|(_, is_zero)| *is_zero) {
            return Err(Error::Config(format!("{name} must be greater than zero")));
        }
        if self.analysis.facets.is_empty() {
            return Err(Error::Config("analysis.facets must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_gives_defaults() {
        let config = Config::from_yaml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.analysis.max_comments, 200);
        assert_eq!(config.analysis.batch_size, 50);
        assert_eq!(config.http.request_timeout_secs, 60);
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = r#"
analysis:
  batch_size: 25
  facets: [sentiment, followUpIdeas, commercial]
llm:
  model: claude-test
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.analysis.batch_size, 25);
        assert_eq!(config.analysis.max_comments, 200);
        assert_eq!(
            config.analysis.facets,
            vec![Facet::Sentiment, Facet::FollowUpIdeas, Facet::Commercial]
        );
        assert_eq!(config.llm.model, "claude-test");
        assert_eq!(config.llm.max_tokens, 2000);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let err = Config::from_yaml("analysis:\n  batch_size: 0\n").unwrap_err();
        assert!(err.to_string().contains("analysis.batch_size"));
    }

    #[test]
    fn test_unknown_facet_rejected() {
        assert!(Config::from_yaml("analysis:\n  facets: [horoscope]\n").is_err());
    }

    #[test]
    fn test_load_without_path() {
        assert_eq!(Config::load(None).unwrap(), Config::default());
    }
}
