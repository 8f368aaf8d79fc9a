//! Command-line interface definitions.
//!
//! Every analysis knob has a config-file counterpart (see [`crate::config`]);
//! flags given here override the file. Credentials come from flags or the
//! environment only.

use crate::config::Config;
use crate::models::Facet;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Fetch Guardian reader comments and analyze them with an LLM.
///
/// # Examples
///
/// ```sh
/// # Save every comment on an article
/// guardian_comments fetch https://www.theguardian.com/world/2024/mar/04/some-story
///
/// # Analyze the saved file
/// ANTHROPIC_API_KEY=... guardian_comments analyze comments_world_2024_mar_04_some-story.json
///
/// # Find articles to fetch
/// GUARDIAN_API_KEY=... guardian_comments search "rail fares"
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long, global = true, env = "GUARDIAN_COMMENTS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch all comments on an article and save them as JSON
    Fetch(FetchArgs),
    /// Analyze a saved comments file
    Analyze(AnalyzeArgs),
    /// Search the Content API for articles by keyword, optionally analyzing
    /// their comments together for commercial signals
    Search(SearchArgs),
    /// List articles with comments from a section, optionally analyzing
    /// their comments together for commercial signals
    Section(SectionArgs),
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Article URL or its short URL (https://www.theguardian.com/p/xxxxx)
    pub article_url: String,

    /// Output file (default: comments_<url slug>.json)
    pub output: Option<PathBuf>,

    /// HTTP request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Comments file written by `fetch`
    pub input: PathBuf,

    /// Output file (default: <input stem>_analysis.json)
    pub output: Option<PathBuf>,

    /// Anthropic API key
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Plain-text file with the article body, passed to the model as context
    #[arg(long)]
    pub article_text: Option<PathBuf>,

    /// Facets to produce (repeatable); defaults to the configured set
    #[arg(long = "facet", value_enum)]
    pub facets: Vec<Facet>,

    /// Maximum number of comments to analyze
    #[arg(long)]
    pub max_comments: Option<usize>,

    /// Comments per model request
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Model requests in flight at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Model identifier
    #[arg(long)]
    pub model: Option<String>,

    /// HTTP request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Search terms
    pub keyword: String,

    /// Number of results (1-20)
    #[arg(short = 'n', long, default_value_t = 10)]
    pub limit: usize,

    /// Guardian Content API key
    #[arg(long, env = "GUARDIAN_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[command(flatten)]
    pub aggregate: AggregateArgs,
}

#[derive(Args, Debug)]
pub struct SectionArgs {
    /// Section URL, e.g. https://www.theguardian.com/travel
    pub section_url: String,

    /// Number of articles to list
    #[arg(short = 'n', long, default_value_t = 10)]
    pub limit: usize,

    #[command(flatten)]
    pub aggregate: AggregateArgs,
}

/// Cross-article commercial analysis of a `search` or `section` listing.
#[derive(Args, Debug)]
pub struct AggregateArgs {
    /// Fetch every listed article's comments and analyze them together
    #[arg(long)]
    pub analyze: bool,

    /// Report file (default: commercial_<keyword or section>.json)
    #[arg(long, requires = "analyze")]
    pub output: Option<PathBuf>,

    /// Anthropic API key
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: Option<String>,
}

impl FetchArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(secs) = self.timeout {
            config.http.request_timeout_secs = secs;
        }
    }
}

impl AnalyzeArgs {
    /// Fold flag overrides into `config`.
    pub fn apply(&self, config: &mut Config) {
        let analysis = &mut config.analysis;
        if let Some(n) = self.max_comments {
            analysis.max_comments = n;
        }
        if let Some(n) = self.batch_size {
            analysis.batch_size = n;
        }
        if let Some(n) = self.concurrency {
            analysis.concurrency = n;
        }
        if !self.facets.is_empty() {
            analysis.facets = self.facets.clone();
        }
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if let Some(secs) = self.timeout {
            config.http.request_timeout_secs = secs;
        }
    }
}
