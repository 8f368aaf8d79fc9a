//! Combining per-batch facet results into one report section each.
//!
//! Every merge takes its inputs in batch order and is deterministic, so the
//! same batch results always yield the same report regardless of the order in
//! which the requests completed.

use super::select::Selected;
use crate::report::{
    Brand, BatchSentiment, Commercial, DiscussionQuestion, FollowUpIdea, NotableComment,
    Opportunity, OverallSentiment, Recommendation, Sentiment, Summary, Theme, TopicSentiment,
};
use crate::utils::normalize_name;
use itertools::Itertools;
use std::collections::{HashMap, HashSet};

const MAX_TOPICS: usize = 5;
const MAX_POINTS: usize = 4;
const MAX_QUOTES: usize = 3;
const MAX_RECOMMENDATIONS: usize = 8;
const MAX_OPPORTUNITIES: usize = 5;

/// Split `total` into integer parts proportional to `weights`.
///
/// Uses the largest-remainder method, so the parts always sum to `total`
/// (unless every weight is zero, in which case all parts are zero). Ties on
/// the remainder go to the earlier index.
pub fn largest_remainder<const N: usize>(weights: [f64; N], total: u64) -> [u64; N] {
    let sum: f64 = weights.iter().map(|w| w.max(0.0)).sum();
    let mut parts = [0u64; N];
    if sum <= 0.0 {
        return parts;
    }

    let mut remainders = [(0usize, 0.0f64); N];
    for (i, w) in weights.iter().enumerate() {
        let quota = w.max(0.0) / sum * total as f64;
        parts[i] = quota.floor() as u64;
        remainders[i] = (i, quota - quota.floor());
    }

    let assigned: u64 = parts.iter().sum();
    let mut leftover = total.saturating_sub(assigned);
    remainders.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    for (i, _) in remainders.iter().cycle() {
        if leftover == 0 {
            break;
        }
        parts[*i] += 1;
        leftover -= 1;
    }
    parts
}

/// [positive, neutral, negative] counts for one batch, summing to its size.
///
/// The model's own counts are preferred, rescaled to `batch_size` when they
/// do not add up to it, so one batch can never claim more comments than it
/// holds. Without usable counts they are derived from its percentages.
fn batch_counts(sentiment: &BatchSentiment, batch_size: usize) -> [u64; 3] {
    let o = &sentiment.overall;
    match o.counts() {
        Some(counts) if counts.iter().sum::<u64>() == batch_size as u64 => counts,
        Some(counts) => largest_remainder(counts.map(|c| c as f64), batch_size as u64),
        None => largest_remainder(o.percentages(), batch_size as u64),
    }
}

/// Merge per-batch sentiment: `(batch size, result)` pairs in batch order.
///
/// Overall percentages are recomputed from the summed counts, never averaged
/// across batches, so a small batch cannot outweigh a large one.
pub fn sentiment(batches: &[(usize, BatchSentiment)]) -> Option<Sentiment> {
    if batches.is_empty() {
        return None;
    }

    let mut totals = [0u64; 3];
    for (size, s) in batches {
        let counts = batch_counts(s, *size);
        for (total, count) in totals.iter_mut().zip(counts) {
            *total += count;
        }
    }
    if totals.iter().sum::<u64>() == 0 {
        return None;
    }
    let [positive, neutral, negative] =
        largest_remainder(totals.map(|c| c as f64), 100).map(|p| p as u32);

    // First of the largest batches wins.
    let summary = batches
        .iter()
        .rev()
        .max_by_key(|(size, _)| *size)
        .map(|(_, s)| s.overall.summary.clone())
        .unwrap_or_default();

    let analyzed: usize = batches.iter().map(|(size, _)| size).sum();
    let mut topics: Vec<TopicSentiment> = Vec::new();
    let mut weights: Vec<f64> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    for (size, s) in batches {
        for topic in &s.by_topic {
            let weighted = topic.percentage * *size as f64;
            match seen.get(&normalize_name(&topic.topic)) {
                Some(&i) => weights[i] += weighted,
                None => {
                    seen.insert(normalize_name(&topic.topic), topics.len());
                    topics.push(topic.clone());
                    weights.push(weighted);
                }
            }
        }
    }
    for (topic, weight) in topics.iter_mut().zip(&weights) {
        topic.percentage = (weight / analyzed.max(1) as f64 * 10.0).round() / 10.0;
    }
    topics.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));
    topics.truncate(MAX_TOPICS);

    Some(Sentiment {
        overall: OverallSentiment {
            positive,
            neutral,
            negative,
            positive_count: totals[0],
            neutral_count: totals[1],
            negative_count: totals[2],
            summary,
        },
        by_topic: topics,
    })
}

/// Rank for `high` / `medium` / `low` labels; unknown labels sort last.
fn prominence(label: &str) -> u8 {
    match label.trim().to_ascii_lowercase().as_str() {
        "high" => 0,
        "medium" => 1,
        "low" => 2,
        _ => 3,
    }
}

/// Concatenate per-batch themes, fold near-duplicates together, keep the top `k`.
///
/// A duplicate contributes its quotes and keywords to the first occurrence and
/// upgrades its frequency if it was more prominent.
pub fn themes(batches: Vec<Vec<Theme>>, k: usize) -> Vec<Theme> {
    let mut merged: Vec<Theme> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for theme in batches.into_iter().flatten() {
        let key = normalize_name(&theme.name);
        match seen.get(&key) {
            Some(&i) => {
                let existing = &mut merged[i];
                if prominence(&theme.frequency) < prominence(&existing.frequency) {
                    existing.frequency = theme.frequency;
                }
                existing.representative_quotes.extend(theme.representative_quotes);
                existing.keywords.extend(theme.keywords);
            }
            None => {
                seen.insert(key, merged.len());
                merged.push(theme);
            }
        }
    }

    for theme in &mut merged {
        theme.representative_quotes = std::mem::take(&mut theme.representative_quotes)
            .into_iter()
            .unique()
            .take(MAX_QUOTES)
            .collect();
        theme.keywords = std::mem::take(&mut theme.keywords)
            .into_iter()
            .unique_by(|k| k.to_lowercase())
            .collect();
    }

    merged.sort_by_key(|t| prominence(&t.frequency));
    merged.truncate(k);
    merged
}

pub fn follow_up_ideas(batches: Vec<Vec<FollowUpIdea>>, k: usize) -> Vec<FollowUpIdea> {
    let mut ideas: Vec<FollowUpIdea> = batches
        .into_iter()
        .flatten()
        .unique_by(|idea| normalize_name(&idea.headline))
        .collect();
    ideas.sort_by_key(|idea| prominence(&idea.interest_level));
    ideas.truncate(k);
    ideas
}

pub fn discussion_questions(
    batches: Vec<Vec<DiscussionQuestion>>,
    k: usize,
) -> Vec<DiscussionQuestion> {
    batches
        .into_iter()
        .flatten()
        .unique_by(|q| normalize_name(&q.question))
        .take(k)
        .collect()
}

/// Find the selected comment a notable-comment pick refers to.
///
/// The model's `commentIndex` is trusted only if it points into the selection
/// and the comment's text contains the excerpt's opening words; failing that,
/// the excerpt is searched for across the selection.
fn resolve_notable<'a>(
    pick: &NotableComment,
    selected: &[Selected<'a>],
) -> Option<Selected<'a>> {
    let needle = pick
        .excerpt
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '.' || c == '…' || c.is_whitespace())
        .chars()
        .take(40)
        .collect::<String>()
        .to_lowercase();
    let matches = |s: &Selected<'_>| needle.is_empty() || s.comment.text.to_lowercase().contains(&needle);

    pick.comment_index
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| selected.get(i))
        .filter(|s| matches(*s))
        .or_else(|| selected.iter().find(|s| !needle.is_empty() && matches(*s)))
        .copied()
}

/// Merge per-batch summaries.
///
/// The executive summary comes from the first (highest-engagement) batch.
/// Consensus and contention points are pooled and deduplicated. Notable
/// comments from every batch are resolved to their source comment and
/// re-ranked by its recommendation count.
pub fn summary(batches: Vec<Summary>, selected: &[Selected<'_>], top_notable: usize) -> Option<Summary> {
    let executive_summary = batches.first()?.executive_summary.clone();

    let pool = |points: Vec<String>| -> Vec<String> {
        points
            .into_iter()
            .unique_by(|p| normalize_name(p))
            .take(MAX_POINTS)
            .collect()
    };
    let consensus = pool(batches.iter().flat_map(|s| s.consensus.clone()).collect());
    let contention = pool(batches.iter().flat_map(|s| s.contention.clone()).collect());

    let mut notable: Vec<NotableComment> = batches
        .into_iter()
        .flat_map(|s| s.notable_comments)
        .map(|mut pick| {
            if let Some(found) = resolve_notable(&pick, selected) {
                pick.comment_index = Some(found.position);
                pick.comment_id = Some(found.comment.id.clone());
                pick.author = Some(found.comment.author().to_string());
                pick.num_recommends = found.comment.num_recommends;
            } else {
                pick.comment_index = None;
                pick.comment_id = None;
                pick.num_recommends = 0;
            }
            pick
        })
        .unique_by(|pick| match &pick.comment_id {
            Some(id) => id.0.clone(),
            None => normalize_name(&pick.excerpt),
        })
        .collect();
    notable.sort_by(|a, b| b.num_recommends.cmp(&a.num_recommends));
    notable.truncate(top_notable);

    Some(Summary {
        executive_summary,
        consensus,
        contention,
        notable_comments: notable,
    })
}

/// Merge per-batch commercial findings.
///
/// Brands combine by case-insensitive name with mentions summed; a positive
/// or negative reading replaces a neutral or mixed one. Recommendations
/// combine by item with endorsements summed. Opportunities are deduplicated
/// by (target, type).
pub fn commercial(batches: Vec<Commercial>) -> Option<Commercial> {
    if batches.is_empty() {
        return None;
    }

    let mut brands: Vec<Brand> = Vec::new();
    let mut brand_index: HashMap<String, usize> = HashMap::new();
    let mut recommendations: Vec<Recommendation> = Vec::new();
    let mut rec_index: HashMap<String, usize> = HashMap::new();
    let mut opportunities: Vec<Opportunity> = Vec::new();
    let mut opp_seen: HashSet<(String, String)> = HashSet::new();

    for batch in batches {
        for brand in batch.brands {
            let key = brand.name.trim().to_lowercase();
            match brand_index.get(&key) {
                Some(&i) => {
                    let existing = &mut brands[i];
                    existing.mentions += brand.mentions;
                    if matches!(brand.sentiment.as_str(), "positive" | "negative") {
                        existing.sentiment = brand.sentiment;
                    }
                }
                None => {
                    brand_index.insert(key, brands.len());
                    brands.push(brand);
                }
            }
        }

        for rec in batch.recommendations {
            let key = rec.item.trim().to_lowercase();
            match rec_index.get(&key) {
                Some(&i) => recommendations[i].endorsements += rec.endorsements,
                None => {
                    rec_index.insert(key, recommendations.len());
                    recommendations.push(rec);
                }
            }
        }

        for opp in batch.opportunities {
            let key = (opp.target.trim().to_lowercase(), opp.kind.trim().to_lowercase());
            if !key.0.is_empty() && opp_seen.insert(key) {
                opportunities.push(opp);
            }
        }
    }

    brands.sort_by(|a, b| b.mentions.cmp(&a.mentions));
    recommendations.sort_by(|a, b| b.endorsements.cmp(&a.endorsements));
    recommendations.truncate(MAX_RECOMMENDATIONS);
    opportunities.truncate(MAX_OPPORTUNITIES);

    Some(Commercial {
        brands,
        recommendations,
        opportunities,
    })
}
