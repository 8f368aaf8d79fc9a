//! # Guardian Comments
//!
//! Collects the reader comments on a Guardian article and turns them into a
//! structured analysis report with an LLM.
//!
//! ## Commands
//!
//! - `fetch`: resolve an article's discussion, walk every page of comments and
//!   save them as one JSON document
//! - `analyze`: select and batch the saved comments, ask the model for each
//!   facet of each batch, merge the answers into a report and print a digest
//! - `search` / `section`: list candidate articles that carry a discussion;
//!   with `--analyze`, fetch all of their comments and produce one commercial
//!   report across the articles
//!
//! ## Usage
//!
//! ```sh
//! guardian_comments fetch https://www.theguardian.com/world/2024/mar/04/some-story
//! guardian_comments analyze comments_world_2024_mar_04_some-story.json
//! guardian_comments search "italy holidays" -n 5 --analyze
//! ```
//!
//! ## Exit codes
//!
//! | code | meaning |
//! |------|---------|
//! | 0 | success (including a partial analysis) |
//! | 1 | configuration, file or JSON error |
//! | 2 | no discussion for the article |
//! | 3 | network or HTTP failure |
//! | 4 | analysis produced nothing usable |
//! | 5 | missing API key |

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod analyzer;
mod api;
mod cli;
mod config;
mod error;
mod fetcher;
mod models;
mod outputs;
mod prompts;
mod report;
mod scrapers;
mod utils;

use api::{AnthropicClient, AskAsync};
use cli::{AggregateArgs, AnalyzeArgs, Cli, Command, FetchArgs, SearchArgs, SectionArgs};
use config::{AnalysisConfig, Config};
use error::{Error, Result};
use models::ArticleRef;
use outputs::{digest, json};
use report::{AggregateReport, AnalysisReport};
use scrapers::guardian::GuardianClient;
use scrapers::{DiscussionSource, discovery};

#[tokio::main]
async fn main() -> ExitCode {
    // --- Tracing init ---
    // Logs go to stderr; stdout carries the digest and listings.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    debug!(?args.config, "Parsed CLI arguments");

    match run(args).await {
        Ok(()) => {
            info!(elapsed_ms = start_time.elapsed().as_millis() as u64, "Done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, code = e.exit_code(), "Command failed");
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(args: Cli) -> Result<()> {
    let mut config = Config::load(args.config.as_deref())?;
    match args.command {
        Command::Fetch(cmd) => {
            cmd.apply(&mut config);
            config.validate()?;
            fetch(&config, &cmd).await
        }
        Command::Analyze(cmd) => {
            cmd.apply(&mut config);
            config.validate()?;
            analyze(&config, &cmd).await
        }
        Command::Search(cmd) => {
            config.validate()?;
            search(&config, &cmd).await
        }
        Command::Section(cmd) => {
            config.validate()?;
            section(&config, &cmd).await
        }
    }
}

#[instrument(level = "info", skip_all, fields(url = %cmd.article_url))]
async fn fetch(config: &Config, cmd: &FetchArgs) -> Result<()> {
    let client = GuardianClient::new(&config.http, &config.guardian)?;
    let discussion = fetcher::fetch_discussion(&client, &cmd.article_url).await?;

    let path = cmd
        .output
        .clone()
        .unwrap_or_else(|| json::discussion_path_for(&cmd.article_url));
    json::write_pretty(&discussion, &path).await?;

    println!(
        "Saved {} comments on \"{}\" to {}",
        discussion.total_fetched,
        discussion.title(),
        path.display()
    );
    Ok(())
}

async fn read_article_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })
}

/// Require a non-blank Anthropic key.
fn anthropic_key(key: Option<&str>) -> Result<String> {
    key.map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .ok_or(Error::MissingCredential("ANTHROPIC_API_KEY"))
}

#[instrument(level = "info", skip_all, fields(input = %cmd.input.display()))]
async fn analyze(config: &Config, cmd: &AnalyzeArgs) -> Result<()> {
    // Checked before any file is read so a missing key fails fast.
    let api_key = anthropic_key(cmd.api_key.as_deref())?;
    let oracle = AnthropicClient::new(&config.http, &config.llm, api_key)?;

    let (report, path) = analyze_to_file(
        &oracle,
        &config.analysis,
        &cmd.input,
        cmd.output.as_deref(),
        cmd.article_text.as_deref(),
    )
    .await?;

    print!("{}", digest::render(&report));
    println!("Full report saved to {}", path.display());
    Ok(())
}

/// Analyze the discussion saved at `input` and write the report.
///
/// The report goes to `output`, or beside the input when none is given.
/// Nothing is written when the analysis fails.
async fn analyze_to_file<A: AskAsync>(
    oracle: &A,
    config: &AnalysisConfig,
    input: &Path,
    output: Option<&Path>,
    article_text: Option<&Path>,
) -> Result<(AnalysisReport, PathBuf)> {
    let discussion = json::read_discussion(input).await?;
    let article_text = match article_text {
        Some(path) => Some(read_article_text(path).await?),
        None => None,
    };

    let report = analyzer::analyze(oracle, config, &discussion, article_text.as_deref()).await?;

    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| json::analysis_path_for(input));
    json::write_pretty(&report, &path).await?;
    Ok((report, path))
}

/// Build the oracle for `--analyze` up front so a missing key fails before
/// any listing is fetched.
fn aggregate_oracle(config: &Config, args: &AggregateArgs) -> Result<Option<AnthropicClient>> {
    if !args.analyze {
        return Ok(None);
    }
    let api_key = anthropic_key(args.anthropic_api_key.as_deref())?;
    AnthropicClient::new(&config.http, &config.llm, api_key).map(Some)
}

/// Fetch every article's comments, analyze them together and write the report.
///
/// Articles whose comments cannot be fetched are skipped. Nothing is written
/// when the analysis fails.
async fn aggregate_to_file<A: AskAsync, S: DiscussionSource>(
    oracle: &A,
    source: &S,
    config: &AnalysisConfig,
    query: &str,
    articles: &[ArticleRef],
    output: Option<&Path>,
) -> Result<(AggregateReport, PathBuf)> {
    let fetched = fetcher::fetch_articles(source, articles).await;
    let report =
        analyzer::aggregate::analyze_articles(oracle, config, query, articles.len(), &fetched)
            .await?;

    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| json::aggregate_path_for(query));
    json::write_pretty(&report, &path).await?;
    Ok((report, path))
}

async fn print_aggregate<A: AskAsync>(
    oracle: &A,
    client: &GuardianClient,
    config: &Config,
    query: &str,
    articles: &[ArticleRef],
    args: &AggregateArgs,
) -> Result<()> {
    let (report, path) = aggregate_to_file(
        oracle,
        client,
        &config.analysis,
        query,
        articles,
        args.output.as_deref(),
    )
    .await?;
    print!("{}", digest::render_aggregate(&report));
    println!("Full report saved to {}", path.display());
    Ok(())
}

async fn search(config: &Config, cmd: &SearchArgs) -> Result<()> {
    let api_key = cmd
        .api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .ok_or(Error::MissingCredential("GUARDIAN_API_KEY"))?;
    let oracle = aggregate_oracle(config, &cmd.aggregate)?;

    let client = GuardianClient::new(&config.http, &config.guardian)?;
    let articles = discovery::search(&client, &cmd.keyword, cmd.limit, api_key).await?;
    print!("{}", digest::render_articles(&articles));

    match oracle {
        Some(oracle) => {
            print_aggregate(&oracle, &client, config, &cmd.keyword, &articles, &cmd.aggregate).await
        }
        None => Ok(()),
    }
}

async fn section(config: &Config, cmd: &SectionArgs) -> Result<()> {
    let oracle = aggregate_oracle(config, &cmd.aggregate)?;

    let client = GuardianClient::new(&config.http, &config.guardian)?;
    let articles = discovery::section(&client, &cmd.section_url, cmd.limit).await?;
    print!("{}", digest::render_articles(&articles));

    match oracle {
        Some(oracle) => {
            print_aggregate(&oracle, &client, config, &cmd.section_url, &articles, &cmd.aggregate)
                .await
        }
        None => Ok(()),
    }
}
