//! LLM API interaction.
//!
//! The analyzer only needs one capability, "send this prompt for this facet
//! and give me the text back", captured by [`AskAsync`]. Production code uses
//! [`AnthropicClient`]; tests plug in deterministic stubs.
//!
//! Each request is attempted exactly once. A failed request costs one
//! (batch, facet) result, never the whole run, so there is no retry loop.

use crate::config::{HttpConfig, LlmConfig};
use crate::error::{Error, Result};
use crate::models::Facet;
use crate::utils::truncate_for_log;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// Trait for async LLM interaction.
pub trait AskAsync {
    /// Send `prompt` (built for `facet`) and return the model's raw text reply.
    async fn ask(&self, facet: Facet, prompt: &str) -> Result<String>;

    /// Model identifier recorded in report metadata.
    fn model(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Client for the Anthropic Messages API.
pub struct AnthropicClient {
    client: reqwest::Client,
    config: LlmConfig,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(http: &HttpConfig, config: &LlmConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(http.user_agent.as_str())
            .timeout(http.timeout())
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: config.clone(),
            api_key,
        })
    }
}

impl fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("api_url", &self.config.api_url)
            .field("model", &self.config.model)
            .field("max_tokens", &self.config.max_tokens)
            .finish_non_exhaustive()
    }
}

impl AskAsync for AnthropicClient {
    #[instrument(level = "info", skip(self, prompt), fields(prompt_chars = prompt.len()))]
    async fn ask(&self, facet: Facet, prompt: &str) -> Result<String> {
        let t0 = Instant::now();
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.config.anthropic_version)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::AnalysisFailure(format!("provider request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, body = %truncate_for_log(&body, 300), "Provider returned an error");
            return Err(Error::AnalysisFailure(format!(
                "provider returned {status}: {}",
                truncate_for_log(&body, 200)
            )));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| Error::AnalysisFailure(format!("unreadable provider response: {e}")))?;

        if parsed.stop_reason.as_deref() == Some("max_tokens") {
            warn!("Response hit max_tokens; JSON is likely truncated");
        }

        let text = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect::<String>();
        debug!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            chars = text.len(),
            "Provider call succeeded"
        );
        Ok(text)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
