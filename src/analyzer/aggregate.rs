//! Commercial analysis across the discussions of several articles.
//!
//! Comments from every fetched article are pooled, selected and batched the
//! same way as a single discussion; each comment is tagged with the article
//! it came from. Only the commercial facet is asked for, with a prompt that
//! names the search topic instead of one article.

use super::facets::FacetResult;
use super::select::{format_tagged, into_batches, select_from};
use super::{Job, ask_all, merge, tally};
use crate::api::AskAsync;
use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use crate::models::{ArticleRef, CommentId, Discussion, Facet};
use crate::prompts;
use crate::report::{AggregateMeta, AggregateReport, ArticleSummary, FacetFailure};
use chrono::Utc;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{info, instrument};

/// Analyze the pooled comments of `fetched` for commercial signals.
///
/// `query` is the keyword or section the articles were found with and
/// `articles_searched` how many articles were listed before fetching.
/// Failure policy matches [`super::analyze`]: a failed batch is dropped and
/// recorded, and the run fails only when no batch survived.
#[instrument(level = "info", skip(oracle, config, fetched), fields(articles = fetched.len()))]
pub async fn analyze_articles<A: AskAsync>(
    oracle: &A,
    config: &AnalysisConfig,
    query: &str,
    articles_searched: usize,
    fetched: &[(ArticleRef, Discussion)],
) -> Result<AggregateReport> {
    let with_comments: Vec<&(ArticleRef, Discussion)> = fetched
        .iter()
        .filter(|(_, d)| !d.comments.is_empty())
        .collect();
    let total_comments: usize = with_comments.iter().map(|(_, d)| d.comments.len()).sum();
    if total_comments == 0 {
        return Err(Error::AnalysisFailure(
            "no comments found across any articles".into(),
        ));
    }

    let t0 = Instant::now();
    let titles: HashMap<&CommentId, &str> = with_comments
        .iter()
        .flat_map(|(article, d)| d.comments.iter().map(move |c| (&c.id, article.title.as_str())))
        .collect();
    let selected = select_from(
        with_comments.iter().flat_map(|(_, d)| &d.comments),
        config.max_comments,
    );
    let batches = into_batches(&selected, config.batch_size);
    info!(
        articles = with_comments.len(),
        total = total_comments,
        selected = selected.len(),
        batches = batches.len(),
        "Starting cross-article analysis"
    );

    let jobs: Vec<Job> = batches
        .iter()
        .map(|batch| Job {
            batch: batch.number,
            facet: Facet::Commercial,
            prompt: prompts::render_commercial_aggregated(
                query,
                with_comments.len(),
                (batch.number, batches.len()),
                &format_tagged(batch, &titles),
            ),
        })
        .collect();

    let mut failures: Vec<FacetFailure> = Vec::new();
    let mut survived = vec![false; batches.len()];
    let mut commercial = Vec::new();
    for outcome in ask_all(oracle, jobs, config.concurrency).await {
        match outcome {
            Ok((batch, FacetResult::Commercial(c))) => {
                survived[batch - 1] = true;
                commercial.push(c);
            }
            // Only commercial jobs are submitted.
            Ok(_) => {}
            Err(failure) => failures.push(failure),
        }
    }

    let (successful_batches, comments_analyzed) = tally(&batches, &survived, failures.len())?;

    let report = AggregateReport {
        meta: AggregateMeta {
            query: query.to_string(),
            articles_searched,
            articles_with_comments: with_comments.len(),
            articles: with_comments
                .iter()
                .map(|(article, d)| ArticleSummary {
                    title: article.title.clone(),
                    url: article.url.clone(),
                    comment_count: d.comments.len(),
                })
                .collect(),
            total_comments,
            comments_selected: selected.len(),
            comments_analyzed,
            batches: batches.len(),
            successful_batches,
            partial: !failures.is_empty(),
            failed_facets: failures,
            model: oracle.model().to_string(),
            analyzed_at: Utc::now(),
        },
        commercial: merge::commercial(commercial).unwrap_or_default(),
    };

    info!(
        elapsed_ms = t0.elapsed().as_millis() as u64,
        analyzed = report.meta.comments_analyzed,
        brands = report.commercial.brands.len(),
        partial = report.meta.partial,
        "Cross-article analysis complete"
    );
    Ok(report)
}
