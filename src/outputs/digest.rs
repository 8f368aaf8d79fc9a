//! Plain-text console digest of analysis reports and of article listings.

use crate::models::ArticleRef;
use crate::report::{AggregateReport, AnalysisReport, Commercial};
use crate::utils::{truncate_for_display, upcase};
use std::fmt::{self, Write};

const WIDTH: usize = 70;
const MAX_QUOTE_CHARS: usize = 100;
const SHOWN_THEMES: usize = 5;

fn heading(out: &mut String, title: &str) -> fmt::Result {
    writeln!(out, "\n{}", "-".repeat(WIDTH))?;
    writeln!(out, "{title}")?;
    writeln!(out, "{}", "-".repeat(WIDTH))
}

fn write_report(out: &mut String, report: &AnalysisReport) -> fmt::Result {
    let meta = &report.meta;
    writeln!(out, "\n{}", "=".repeat(WIDTH))?;
    writeln!(out, "COMMENT ANALYSIS REPORT")?;
    writeln!(out, "{}", "=".repeat(WIDTH))?;
    writeln!(out, "\nArticle: {}", meta.article_title)?;
    writeln!(
        out,
        "Comments analyzed: {} of {}",
        meta.comments_analyzed, meta.total_comments
    )?;
    writeln!(out, "Unique commenters: {}", meta.unique_commenters)?;
    if meta.partial {
        writeln!(
            out,
            "Partial: {} of {} batches succeeded, {} facet results dropped",
            meta.successful_batches,
            meta.batches,
            meta.failed_facets.len()
        )?;
    }

    if let Some(sentiment) = &report.sentiment {
        heading(out, "SENTIMENT")?;
        let o = &sentiment.overall;
        writeln!(
            out,
            "Positive: {}% | Neutral: {}% | Negative: {}%",
            o.positive, o.neutral, o.negative
        )?;
        writeln!(out, "Summary: {}", o.summary)?;
        if !sentiment.by_topic.is_empty() {
            writeln!(out, "\nBy Topic:")?;
            for topic in &sentiment.by_topic {
                writeln!(
                    out,
                    "  - {}: {} ({}% of comments)",
                    topic.topic, topic.sentiment, topic.percentage
                )?;
            }
        }
    }

    if !report.themes.is_empty() {
        heading(out, "KEY THEMES")?;
        for (i, theme) in report.themes.iter().take(SHOWN_THEMES).enumerate() {
            writeln!(
                out,
                "\n{}. {} [{} frequency, {}]",
                i + 1,
                theme.name,
                theme.frequency,
                theme.sentiment
            )?;
            writeln!(out, "   {}", theme.description)?;
            if let Some(quote) = theme.representative_quotes.first() {
                writeln!(out, "   Quote: \"{}\"", truncate_for_display(quote, MAX_QUOTE_CHARS))?;
            }
        }
    }

    if let Some(summary) = &report.summary {
        heading(out, "EXECUTIVE SUMMARY")?;
        writeln!(out, "{}", summary.executive_summary)?;
        if !summary.consensus.is_empty() {
            writeln!(out, "\nPoints of Consensus:")?;
            for point in &summary.consensus {
                writeln!(out, "  + {point}")?;
            }
        }
        if !summary.contention.is_empty() {
            writeln!(out, "\nPoints of Contention:")?;
            for point in &summary.contention {
                writeln!(out, "  ? {point}")?;
            }
        }
        if !summary.notable_comments.is_empty() {
            writeln!(out, "\nNotable Comments:")?;
            for notable in &summary.notable_comments {
                writeln!(
                    out,
                    "  \"{}\" ({}, {} recommends)",
                    truncate_for_display(&notable.excerpt, MAX_QUOTE_CHARS),
                    notable.author.as_deref().unwrap_or("unknown"),
                    notable.num_recommends
                )?;
            }
        }
    }

    if !report.follow_up_ideas.is_empty() {
        heading(out, "FOLLOW-UP STORY IDEAS")?;
        for (i, idea) in report.follow_up_ideas.iter().enumerate() {
            writeln!(out, "\n{}. {}", i + 1, idea.headline)?;
            writeln!(out, "   Interest: {}", idea.interest_level.to_uppercase())?;
            writeln!(out, "   Angle: {}", idea.angle)?;
            if !idea.suggested_sources.is_empty() {
                writeln!(out, "   Sources: {}", idea.suggested_sources.join(", "))?;
            }
        }
    }

    if let Some(questions) = &report.discussion_questions {
        heading(out, "DISCUSSION QUESTIONS")?;
        for (i, q) in questions.iter().enumerate() {
            writeln!(out, "{}. {}", i + 1, q.question)?;
        }
    }

    if let Some(commercial) = &report.commercial {
        heading(out, "COMMERCIAL")?;
        write_commercial(out, commercial)?;
    }

    writeln!(out, "\n{}", "=".repeat(WIDTH))
}

fn write_commercial(out: &mut String, commercial: &Commercial) -> fmt::Result {
    for brand in &commercial.brands {
        writeln!(
            out,
            "  {} ({}): {}, {} mentions",
            brand.name,
            brand.category,
            upcase(&brand.sentiment),
            brand.mentions
        )?;
    }
    for rec in &commercial.recommendations {
        writeln!(out, "  Recommended: {} x{}", rec.item, rec.endorsements)?;
    }
    for opp in &commercial.opportunities {
        writeln!(out, "  Opportunity [{}] {}: {}", opp.kind, opp.target, opp.rationale)?;
    }
    Ok(())
}

fn write_aggregate(out: &mut String, report: &AggregateReport) -> fmt::Result {
    let meta = &report.meta;
    writeln!(out, "\n{}", "=".repeat(WIDTH))?;
    writeln!(out, "COMMERCIAL ANALYSIS: {}", meta.query)?;
    writeln!(out, "{}", "=".repeat(WIDTH))?;
    writeln!(
        out,
        "\nArticles with comments: {} of {}",
        meta.articles_with_comments, meta.articles_searched
    )?;
    for article in &meta.articles {
        writeln!(out, "  - {} ({} comments)", article.title, article.comment_count)?;
    }
    writeln!(
        out,
        "Comments analyzed: {} of {}",
        meta.comments_analyzed, meta.total_comments
    )?;
    if meta.partial {
        writeln!(
            out,
            "Partial: {} of {} batches succeeded",
            meta.successful_batches, meta.batches
        )?;
    }

    heading(out, "COMMERCIAL")?;
    let commercial = &report.commercial;
    if commercial.brands.is_empty()
        && commercial.recommendations.is_empty()
        && commercial.opportunities.is_empty()
    {
        writeln!(out, "  No brands, recommendations or opportunities found.")?;
    }
    write_commercial(out, commercial)?;
    writeln!(out, "\n{}", "=".repeat(WIDTH))
}

/// Human-readable rendering of `report` for the terminal.
pub fn render(report: &AnalysisReport) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_report(&mut out, report);
    out
}

/// Human-readable rendering of a cross-article commercial report.
pub fn render_aggregate(report: &AggregateReport) -> String {
    let mut out = String::new();
    let _ = write_aggregate(&mut out, report);
    out
}

/// One numbered line per article, with its discussion key when known.
pub fn render_articles(articles: &[ArticleRef]) -> String {
    if articles.is_empty() {
        return "No articles with comments found.\n".to_string();
    }
    let mut out = String::new();
    for (i, article) in articles.iter().enumerate() {
        let _ = writeln!(out, "{:>2}. {}", i + 1, article.title);
        let _ = writeln!(
            out,
            "    {} [{}]{}",
            article.url,
            article.section,
            article
                .discussion_key
                .as_deref()
                .map(|k| format!(" comments: {k}"))
                .unwrap_or_default()
        );
    }
    out
}
