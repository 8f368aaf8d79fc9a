//! Data models for scraped discussions.
//!
//! This module defines the persisted shape written by `fetch` and read back by
//! `analyze`:
//! - [`Discussion`]: one article's comment thread plus scrape metadata
//! - [`Comment`]: a single normalized reader comment
//! - [`Facet`]: the categories of analysis the LLM can be asked for
//! - [`ArticleRef`]: a candidate article returned by `search` / `section`
//!
//! Field names are camelCase on the wire to stay close to the Guardian
//! discussion API the data originates from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Opaque comment identifier.
///
/// The discussion API hands out numbers; they are stored as strings so the
/// persisted format does not depend on that.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CommentId(pub String);

impl<'de> Deserialize<'de> for CommentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        string_or_number(deserializer).map(CommentId)
    }
}

/// Accept either a JSON string or a JSON integer, yielding a string.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Number(n) => n.to_string(),
        Raw::Text(s) => s,
    })
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommentId {
    fn from(s: &str) -> Self {
        CommentId(s.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    #[serde(deserialize_with = "string_or_number")]
    pub user_id: String,
    pub display_name: String,
}

/// A reader comment after normalization.
///
/// `body` keeps the markup exactly as served; `text` is the plain-text form
/// handed to the LLM and is never truncated.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub body: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub iso_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_profile: UserProfile,
    #[serde(default)]
    pub num_recommends: u64,
    #[serde(default)]
    pub num_responses: u64,
    /// The comment this one replies to, resolved through the owning [`Discussion`].
    #[serde(default)]
    pub parent_id: Option<CommentId>,
}

impl Comment {
    pub fn author(&self) -> &str {
        if self.user_profile.display_name.is_empty() {
            "Anonymous"
        } else {
            &self.user_profile.display_name
        }
    }
}

/// Discussion-level metadata as reported by the first API page.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscussionMeta {
    pub discussion_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
    /// Display hint only; may be stale relative to what was fetched.
    #[serde(default)]
    pub comment_count: Option<u64>,
    #[serde(default)]
    pub is_closed_for_comments: bool,
    #[serde(default)]
    pub is_closed_for_recommendation: bool,
}

/// One article's comment thread. Sole owner of its comments.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Discussion {
    pub discussion: DiscussionMeta,
    pub comments: Vec<Comment>,
    pub total_fetched: usize,
    pub scraped_at: DateTime<Utc>,
    pub source_url: String,
}

impl Discussion {
    /// Assemble a discussion, deriving `total_fetched` from the comments actually held.
    pub fn new(discussion: DiscussionMeta, comments: Vec<Comment>, source_url: &str) -> Self {
        Self {
            discussion,
            total_fetched: comments.len(),
            comments,
            scraped_at: Utc::now(),
            source_url: source_url.to_string(),
        }
    }

    pub fn title(&self) -> &str {
        self.discussion.title.as_deref().unwrap_or("Unknown Article")
    }

    /// The article URL as given on the command line, falling back to the API's `webUrl`.
    pub fn article_url(&self) -> &str {
        if !self.source_url.is_empty() {
            return &self.source_url;
        }
        self.discussion.web_url.as_deref().unwrap_or_default()
    }

    /// Id → comment lookup over this discussion's comments.
    pub fn index(&self) -> HashMap<&CommentId, &Comment> {
        self.comments.iter().map(|c| (&c.id, c)).collect()
    }

    pub fn unique_commenters(&self) -> usize {
        self.comments
            .iter()
            .map(|c| c.user_profile.user_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// `true` when `total_fetched` matches the list and no id repeats.
    pub fn is_consistent(&self) -> bool {
        let unique = self.comments.iter().map(|c| &c.id).collect::<HashSet<_>>();
        self.total_fetched == self.comments.len() && unique.len() == self.comments.len()
    }
}

/// One category of analysis output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum Facet {
    Sentiment,
    Themes,
    Summary,
    FollowUpIdeas,
    DiscussionQuestions,
    Commercial,
}

impl Facet {
    pub const DEFAULT: [Facet; 4] = [
        Facet::Sentiment,
        Facet::Themes,
        Facet::Summary,
        Facet::FollowUpIdeas,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Facet::Sentiment => "sentiment",
            Facet::Themes => "themes",
            Facet::Summary => "summary",
            Facet::FollowUpIdeas => "followUpIdeas",
            Facet::DiscussionQuestions => "discussionQuestions",
            Facet::Commercial => "commercial",
        }
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A candidate article found by `search` or `section`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRef {
    pub title: String,
    pub url: String,
    pub discussion_key: Option<String>,
    pub section: String,
}
