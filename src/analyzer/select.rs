//! Choosing which comments to analyze and grouping them into batches.

use crate::models::{Comment, CommentId};
use std::collections::HashMap;
use std::fmt::Write;

/// A comment chosen for analysis, with its 1-based position in the selection.
///
/// The position is the `N` in the `[Comment N]` label the model sees, and is
/// how the model's notable-comment picks are mapped back to real comments.
#[derive(Debug, Clone, Copy)]
pub struct Selected<'a> {
    pub position: usize,
    pub comment: &'a Comment,
}

/// A fixed-size group of selected comments sent together in one prompt.
#[derive(Debug, Clone)]
pub struct Batch<'a> {
    /// 1-based batch number.
    pub number: usize,
    pub comments: Vec<Selected<'a>>,
}

impl Batch<'_> {
    pub fn len(&self) -> usize {
        self.comments.len()
    }
}

/// Keep at most `cap` comments, favouring the most recommended.
///
/// Below the cap this is the identity (original order). Above it, comments
/// are ranked by recommendation count descending; the sort is stable, so ties
/// keep their chronological order. Comments with few or no recommendations
/// are the ones left out.
pub fn select_comments(comments: &[Comment], cap: usize) -> Vec<Selected<'_>> {
    select_from(comments, cap)
}

/// [`select_comments`] over comments pooled from several discussions.
pub fn select_from<'a>(
    comments: impl IntoIterator<Item = &'a Comment>,
    cap: usize,
) -> Vec<Selected<'a>> {
    let mut chosen: Vec<&Comment> = comments.into_iter().collect();
    if chosen.len() > cap {
        chosen.sort_by(|a, b| b.num_recommends.cmp(&a.num_recommends));
        chosen.truncate(cap);
    }
    chosen
        .into_iter()
        .enumerate()
        .map(|(i, comment)| Selected {
            position: i + 1,
            comment,
        })
        .collect()
}

/// Partition the selection into batches of `size`, preserving order.
pub fn into_batches<'a>(selected: &[Selected<'a>], size: usize) -> Vec<Batch<'a>> {
    selected
        .chunks(size.max(1))
        .enumerate()
        .map(|(i, chunk)| Batch {
            number: i + 1,
            comments: chunk.to_vec(),
        })
        .collect()
}

/// Render a batch as prompt text, one labelled comment per paragraph.
///
/// Replies name the author they answer, looked up through `index` (the
/// owning discussion's id map). A parent outside the discussion is ignored.
pub fn format_batch(batch: &Batch<'_>, index: &HashMap<&CommentId, &Comment>) -> String {
    let mut out = String::new();
    for (i, s) in batch.comments.iter().enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        let c = s.comment;
        let reply = c
            .parent_id
            .as_ref()
            .and_then(|id| index.get(id))
            .map(|parent| format!(" replying to @{}", parent.author()))
            .unwrap_or_default();
        // Writing into a String cannot fail.
        let _ = write!(
            out,
            "[Comment {}] ({} recommends) @{}{}: {}",
            s.position,
            c.num_recommends,
            c.author(),
            reply,
            c.text
        );
    }
    out
}

/// Render a batch pooled from several articles, naming each comment's
/// article instead of the author it replies to.
///
/// `articles` maps comment ids to article titles; an unmapped comment is
/// rendered without a tag.
pub fn format_tagged(batch: &Batch<'_>, articles: &HashMap<&CommentId, &str>) -> String {
    let mut out = String::new();
    for (i, s) in batch.comments.iter().enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        let c = s.comment;
        let tag = articles
            .get(&c.id)
            .map(|title| format!(" on \"{title}\""))
            .unwrap_or_default();
        let _ = write!(
            out,
            "[Comment {}] ({} recommends) @{}{}: {}",
            s.position,
            c.num_recommends,
            c.author(),
            tag,
            c.text
        );
    }
    out
}
