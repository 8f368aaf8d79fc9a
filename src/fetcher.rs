//! Collect every comment of one article's discussion, or of a list of
//! articles.
//!
//! Pagination ends on the first empty page or when the source reports no
//! further pages. The discussion's `commentCount` is never used to decide
//! when to stop: it is a hint that may already be stale.

use crate::error::Result;
use crate::models::{ArticleRef, Discussion, DiscussionMeta};
use crate::scrapers::DiscussionSource;
use itertools::Itertools;
use std::collections::HashSet;
use tracing::{info, instrument, warn};

/// Resolve `article_url` to its discussion and fetch all pages.
///
/// Comments whose id was already collected on an earlier page are skipped, so
/// the result never holds duplicates and `total_fetched` always equals the
/// number of comments kept. A page that brings nothing new also stops the
/// walk, which keeps a misbehaving server from looping us forever.
#[instrument(level = "info", skip(source))]
pub async fn fetch_discussion<S: DiscussionSource>(
    source: &S,
    article_url: &str,
) -> Result<Discussion> {
    let key = source.resolve_key(article_url).await?;

    let mut meta: Option<DiscussionMeta> = None;
    let mut comments = Vec::new();
    let mut seen = HashSet::new();
    let mut duplicates = 0usize;
    let mut page = 1u32;

    loop {
        let batch = source.fetch_page(&key, page).await?;
        if meta.is_none() {
            info!(
                key = %key,
                comment_count = ?batch.meta.comment_count,
                closed = batch.meta.is_closed_for_comments,
                "Discussion found"
            );
            meta = Some(batch.meta.clone());
        }

        let received = batch.comments.len();
        if received == 0 {
            info!(page, "Empty page; pagination complete");
            break;
        }

        let before = comments.len();
        for comment in batch.comments {
            if seen.insert(comment.id.clone()) {
                comments.push(comment);
            } else {
                duplicates += 1;
            }
        }
        let fresh = comments.len() - before;
        info!(page, received, fresh, total = comments.len(), "Fetched page");

        if fresh == 0 {
            warn!(page, "Page contained only already-seen comments; stopping");
            break;
        }
        if !batch.has_more {
            break;
        }
        page += 1;
    }

    if duplicates > 0 {
        warn!(duplicates, "Skipped comments repeated across page boundaries");
    }

    let meta = meta.unwrap_or_else(|| DiscussionMeta {
        discussion_id: key.clone(),
        ..DiscussionMeta::default()
    });
    let discussion = Discussion::new(meta, comments, article_url);
    info!(
        total_fetched = discussion.total_fetched,
        hint = ?discussion.discussion.comment_count,
        "Fetched discussion"
    );
    Ok(discussion)
}

/// Fetch the discussion of every article in `articles`, one after another.
///
/// An article listed twice is fetched once. An article whose discussion
/// cannot be fetched is logged and skipped; the rest still count. The known
/// discussion key is used when the listing has one, which saves a page load.
#[instrument(level = "info", skip_all, fields(articles = articles.len()))]
pub async fn fetch_articles<S: DiscussionSource>(
    source: &S,
    articles: &[ArticleRef],
) -> Vec<(ArticleRef, Discussion)> {
    let mut fetched = Vec::new();
    for (i, article) in articles.iter().unique_by(|a| a.url.clone()).enumerate() {
        let target = article.discussion_key.as_deref().unwrap_or(&article.url);
        match fetch_discussion(source, target).await {
            Ok(mut discussion) => {
                discussion.source_url = article.url.clone();
                fetched.push((article.clone(), discussion));
            }
            Err(e) => warn!(
                article = i + 1,
                title = %article.title,
                error = %e,
                "Could not fetch comments; skipping article"
            ),
        }
    }
    info!(
        fetched = fetched.len(),
        comments = fetched.iter().map(|(_, d)| d.total_fetched).sum::<usize>(),
        "Fetched article discussions"
    );
    fetched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::tests::comment;
    use crate::scrapers::CommentPage;
    use std::cell::RefCell;

    /// Serves scripted pages and records which pages were requested.
    struct ScriptedSource {
        key: Option<&'static str>,
        pages: Vec<std::result::Result<CommentPage, &'static str>>,
        requested: RefCell<Vec<u32>>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<CommentPage>) -> Self {
            Self {
                key: Some("/p/abc12"),
                pages: pages.into_iter().map(Ok).collect(),
                requested: RefCell::new(Vec::new()),
            }
        }
    }

    impl DiscussionSource for ScriptedSource {
        async fn resolve_key(&self, article_url: &str) -> Result<String> {
            self.key
                .map(str::to_string)
                .ok_or_else(|| Error::not_found(article_url, "comments disabled"))
        }

        async fn fetch_page(&self, _key: &str, page: u32) -> Result<CommentPage> {
            self.requested.borrow_mut().push(page);
            match self.pages.get(page as usize - 1) {
                Some(Ok(p)) => Ok(p.clone()),
                Some(Err(reason)) => Err(Error::transient("https://discussion", *reason)),
                None => Ok(page_of(&[], false)),
            }
        }
    }

    fn page_of(ids: &[&str], has_more: bool) -> CommentPage {
        CommentPage {
            meta: DiscussionMeta {
                discussion_id: "/p/abc12".into(),
                title: Some("Test".into()),
                comment_count: Some(999),
                ..DiscussionMeta::default()
            },
            comments: ids.iter().map(|id| comment(id, 1, "text")).collect(),
            has_more,
        }
    }

    #[tokio::test]
    async fn test_collects_all_pages_in_order() {
        let source = ScriptedSource::new(vec![
            page_of(&["1", "2", "3"], true),
            page_of(&["4", "5", "6"], true),
            page_of(&["7"], false),
        ]);
        let d = fetch_discussion(&source, "https://www.theguardian.com/a").await.unwrap();

        let ids: Vec<&str> = d.comments.iter().map(|c| c.id.0.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5", "6", "7"]);
        assert_eq!(d.total_fetched, 7);
        assert!(d.is_consistent());
        assert_eq!(*source.requested.borrow(), vec![1, 2, 3]);
        assert_eq!(d.source_url, "https://www.theguardian.com/a");
    }

    #[tokio::test]
    async fn test_stale_count_hint_does_not_stop_or_extend_paging() {
        // Hint says 999 comments; only has_more / empty pages decide.
        let source = ScriptedSource::new(vec![page_of(&["1", "2"], true), page_of(&[], true)]);
        let d = fetch_discussion(&source, "u").await.unwrap();
        assert_eq!(d.total_fetched, 2);
        assert_eq!(d.discussion.comment_count, Some(999));
        assert_eq!(*source.requested.borrow(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_duplicates_across_boundaries_are_dropped() {
        let source = ScriptedSource::new(vec![
            page_of(&["1", "2", "3"], true),
            page_of(&["3", "4", "5"], true),
            page_of(&["5", "6"], false),
        ]);
        let d = fetch_discussion(&source, "u").await.unwrap();
        let ids: Vec<&str> = d.comments.iter().map(|c| c.id.0.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5", "6"]);
        assert_eq!(d.total_fetched, d.comments.len());
        assert!(d.is_consistent());
    }

    #[tokio::test]
    async fn test_page_of_only_repeats_stops_walk() {
        let source = ScriptedSource::new(vec![
            page_of(&["1", "2"], true),
            page_of(&["1", "2"], true),
            page_of(&["9"], false),
        ]);
        let d = fetch_discussion(&source, "u").await.unwrap();
        assert_eq!(d.total_fetched, 2);
        assert_eq!(*source.requested.borrow(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_sum_of_fresh_page_counts_equals_total() {
        let pages = vec![
            page_of(&["a", "b", "c", "d"], true),
            page_of(&["e"], true),
            page_of(&["f", "g"], false),
        ];
        let expected: usize = pages.iter().map(|p| p.comments.len()).sum();
        let d = fetch_discussion(&ScriptedSource::new(pages), "u").await.unwrap();
        assert_eq!(d.total_fetched, expected);
    }

    #[tokio::test]
    async fn test_unresolvable_key_is_not_found() {
        let mut source = ScriptedSource::new(vec![]);
        source.key = None;
        let err = fetch_discussion(&source, "https://www.theguardian.com/a").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert!(source.requested.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_failing_page_aborts_fetch() {
        let mut source = ScriptedSource::new(vec![page_of(&["1"], true)]);
        source.pages.push(Err("connection reset"));
        let err = fetch_discussion(&source, "u").await.unwrap_err();
        assert!(matches!(err, Error::TransientFetch { .. }));
    }

    #[tokio::test]
    async fn test_discussion_without_comments() {
        let source = ScriptedSource::new(vec![page_of(&[], false)]);
        let d = fetch_discussion(&source, "u").await.unwrap();
        assert_eq!(d.total_fetched, 0);
        assert_eq!(d.discussion.discussion_id, "/p/abc12");
    }

    /// Serves one single-page discussion per known key; other keys fail.
    struct ShelfSource {
        shelf: Vec<(&'static str, Vec<&'static str>)>,
        resolved: RefCell<Vec<String>>,
    }

    impl DiscussionSource for ShelfSource {
        async fn resolve_key(&self, article_url: &str) -> Result<String> {
            self.resolved.borrow_mut().push(article_url.to_string());
            Ok(article_url.to_string())
        }

        async fn fetch_page(&self, key: &str, _page: u32) -> Result<CommentPage> {
            let (_, ids) = self
                .shelf
                .iter()
                .find(|(k, _)| *k == key)
                .ok_or_else(|| Error::transient(key, "503 Service Unavailable"))?;
            let mut page = page_of(ids, false);
            page.meta.discussion_id = key.to_string();
            Ok(page)
        }
    }

    fn article(title: &str, url: &str, key: Option<&str>) -> ArticleRef {
        ArticleRef {
            title: title.into(),
            url: url.into(),
            discussion_key: key.map(str::to_string),
            section: "travel".into(),
        }
    }

    #[tokio::test]
    async fn test_fetch_articles_skips_failures_and_repeats() {
        let source = ShelfSource {
            shelf: vec![("/p/aaaaa", vec!["1", "2"]), ("/p/ccccc", vec!["3"])],
            resolved: RefCell::new(Vec::new()),
        };
        let articles = [
            article("Beaches", "https://www.theguardian.com/travel/beaches", Some("/p/aaaaa")),
            article("Broken", "https://www.theguardian.com/travel/broken", Some("/p/bbbbb")),
            article("Beaches", "https://www.theguardian.com/travel/beaches", Some("/p/aaaaa")),
            article("Trains", "https://www.theguardian.com/travel/trains", Some("/p/ccccc")),
        ];

        let fetched = fetch_articles(&source, &articles).await;

        let titles: Vec<&str> = fetched.iter().map(|(a, _)| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Beaches", "Trains"]);
        assert_eq!(fetched[0].1.total_fetched, 2);
        assert_eq!(fetched[0].1.source_url, "https://www.theguardian.com/travel/beaches");
        assert_eq!(*source.resolved.borrow(), vec!["/p/aaaaa", "/p/bbbbb", "/p/ccccc"]);
    }

    #[tokio::test]
    async fn test_fetch_articles_without_key_resolves_url() {
        let source = ShelfSource {
            shelf: vec![],
            resolved: RefCell::new(Vec::new()),
        };
        let fetched =
            fetch_articles(&source, &[article("A", "https://www.theguardian.com/a", None)]).await;
        assert!(fetched.is_empty());
        assert_eq!(*source.resolved.borrow(), vec!["https://www.theguardian.com/a"]);
    }
}
