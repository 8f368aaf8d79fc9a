//! Batch analysis of a fetched discussion.
//!
//! The pipeline:
//! 1. **Select** at most `max_comments` comments, highest engagement first
//! 2. **Batch** the selection into groups of `batch_size`
//! 3. **Ask** the model once per (batch, facet)
//! 4. **Validate** each reply against its facet schema
//! 5. **Merge** the surviving per-batch results into one report
//!
//! A rejected reply loses that (batch, facet) only. A batch counts as
//! analyzed when at least one of its facets survived; the run fails only when
//! no batch survived at all.

pub mod aggregate;
pub mod facets;
pub mod merge;
pub mod select;

use crate::api::AskAsync;
use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use crate::models::{Discussion, Facet};
use crate::prompts::{self, PromptContext};
use crate::report::{AnalysisReport, FacetFailure, ReportMeta};
use chrono::Utc;
use facets::FacetResult;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use select::{Batch, format_batch, into_batches, select_comments};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// One model request: a facet prompt for one batch.
struct Job {
    batch: usize,
    facet: Facet,
    prompt: String,
}

/// A validated result tagged with its 1-based batch number, or the reason it
/// was dropped.
type Outcome = std::result::Result<(usize, FacetResult), FacetFailure>;

/// Send every job, `concurrency` at a time, and validate the replies.
///
/// Outcomes come back in job order whatever order the requests finish in.
async fn ask_all<A: AskAsync>(oracle: &A, jobs: Vec<Job>, concurrency: usize) -> Vec<Outcome> {
    stream::iter(jobs)
        .map(|job| async move {
            debug!(batch = job.batch, facet = %job.facet, "Asking model");
            let parsed = oracle
                .ask(job.facet, &job.prompt)
                .await
                .map_err(|e| e.to_string())
                .and_then(|text| facets::parse(job.facet, &text));
            match parsed {
                Ok(result) => {
                    debug!(batch = job.batch, facet = %result.facet(), "Accepted facet result");
                    Ok((job.batch, result))
                }
                Err(reason) => {
                    warn!(batch = job.batch, facet = %job.facet, %reason, "Dropping facet result");
                    Err(FacetFailure {
                        batch: job.batch,
                        facet: job.facet,
                        reason,
                    })
                }
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}

/// Count surviving batches and the comments they hold.
///
/// Fails when no batch survived: there is nothing to report.
fn tally(batches: &[Batch<'_>], survived: &[bool], rejected: usize) -> Result<(usize, usize)> {
    let successful = survived.iter().filter(|ok| **ok).count();
    if successful == 0 {
        return Err(Error::AnalysisFailure(format!(
            "all {} batches failed ({rejected} facet results rejected)",
            batches.len()
        )));
    }
    let comments = batches
        .iter()
        .zip(survived)
        .filter(|(_, ok)| **ok)
        .map(|(batch, _)| batch.len())
        .sum();
    Ok((successful, comments))
}

/// Analyze `discussion` with `oracle`.
///
/// `article_text`, when given, is included in every prompt as context.
/// Requests run `config.concurrency` at a time; results are consumed in
/// submission order, so the report does not depend on completion order.
#[instrument(level = "info", skip_all, fields(discussion = %discussion.discussion.discussion_id))]
pub async fn analyze<A: AskAsync>(
    oracle: &A,
    config: &AnalysisConfig,
    discussion: &Discussion,
    article_text: Option<&str>,
) -> Result<AnalysisReport> {
    if discussion.comments.is_empty() {
        return Err(Error::AnalysisFailure("no comments to analyze".into()));
    }

    let t0 = Instant::now();
    let requested: Vec<Facet> = config.facets.iter().copied().unique().collect();
    let selected = select_comments(&discussion.comments, config.max_comments);
    let batches = into_batches(&selected, config.batch_size);
    info!(
        total = discussion.comments.len(),
        selected = selected.len(),
        batches = batches.len(),
        facets = %requested.iter().join(","),
        "Starting analysis"
    );

    let index = discussion.index();
    let jobs: Vec<Job> = batches
        .iter()
        .flat_map(|batch| {
            let comments_text = format_batch(batch, &index);
            let ctx = PromptContext {
                article_title: discussion.title(),
                article_text,
                total_comments: discussion.comments.len(),
                batch: (batch.number, batches.len()),
                comments_text: &comments_text,
            };
            requested
                .iter()
                .map(|&facet| Job {
                    batch: batch.number,
                    facet,
                    prompt: prompts::render(facet, &ctx),
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let mut failures: Vec<FacetFailure> = Vec::new();
    let mut survived = vec![false; batches.len()];
    let mut sentiments = Vec::new();
    let mut themes = Vec::new();
    let mut summaries = Vec::new();
    let mut ideas = Vec::new();
    let mut questions = Vec::new();
    let mut commercial = Vec::new();

    for outcome in ask_all(oracle, jobs, config.concurrency).await {
        let (batch, result) = match outcome {
            Ok(accepted) => accepted,
            Err(failure) => {
                failures.push(failure);
                continue;
            }
        };

        survived[batch - 1] = true;
        match result {
            FacetResult::Sentiment(s) => sentiments.push((batches[batch - 1].len(), s)),
            FacetResult::Themes(t) => themes.push(t),
            FacetResult::Summary(s) => summaries.push(s),
            FacetResult::FollowUpIdeas(i) => ideas.push(i),
            FacetResult::DiscussionQuestions(q) => questions.push(q),
            FacetResult::Commercial(c) => commercial.push(c),
        }
    }

    let (successful_batches, comments_analyzed) = tally(&batches, &survived, failures.len())?;

    let questions_requested = requested.contains(&Facet::DiscussionQuestions);
    let report = AnalysisReport {
        meta: ReportMeta {
            article_title: discussion.title().to_string(),
            article_url: discussion.article_url().to_string(),
            discussion_id: discussion.discussion.discussion_id.clone(),
            total_comments: discussion.comments.len(),
            unique_commenters: discussion.unique_commenters(),
            comments_selected: selected.len(),
            comments_analyzed,
            batches: batches.len(),
            successful_batches,
            partial: !failures.is_empty(),
            failed_facets: failures,
            model: oracle.model().to_string(),
            analyzed_at: Utc::now(),
        },
        sentiment: merge::sentiment(&sentiments),
        themes: merge::themes(themes, config.top_themes),
        summary: merge::summary(summaries, &selected, config.top_notable),
        follow_up_ideas: merge::follow_up_ideas(ideas, config.top_ideas),
        discussion_questions: (questions_requested && !questions.is_empty())
            .then(|| merge::discussion_questions(questions, config.top_questions)),
        commercial: merge::commercial(commercial),
    };

    info!(
        elapsed_ms = t0.elapsed().as_millis() as u64,
        analyzed = report.meta.comments_analyzed,
        successful_batches,
        partial = report.meta.partial,
        "Analysis complete"
    );
    Ok(report)
}
