//! Sources of discussion data.
//!
//! Pagination logic in [`crate::fetcher`] talks to a [`DiscussionSource`]
//! rather than to HTTP directly, so it can be driven by a scripted stub in
//! tests.
//!
//! | Module | What it reaches | Notes |
//! |--------|-----------------|-------|
//! | [`guardian`] | article pages, discussion API | key resolution, paged comments |
//! | [`discovery`] | Content API, section RSS feeds | `search` / `section` listings |

use crate::error::Result;
use crate::models::{Comment, DiscussionMeta};

pub mod discovery;
pub mod guardian;

/// One page of a discussion as returned by the source.
#[derive(Debug, Clone)]
pub struct CommentPage {
    pub meta: DiscussionMeta,
    pub comments: Vec<Comment>,
    /// Whether the source claims further pages exist.
    pub has_more: bool,
}

/// Anything that can map an article to its discussion and serve it page by page.
pub trait DiscussionSource {
    /// Resolve the discussion key (`/p/<id>`) for an article URL.
    async fn resolve_key(&self, article_url: &str) -> Result<String>;

    /// Fetch 1-based page `page` of the discussion identified by `key`.
    async fn fetch_page(&self, key: &str, page: u32) -> Result<CommentPage>;
}
