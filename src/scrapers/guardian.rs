//! Guardian article pages and discussion API.
//!
//! Discussion keys look like `/p/abc12`. They appear in the article page's
//! embedded JSON (as `shortUrl` or `discussionId`) or in a `data-short-url`
//! attribute; an article without one has comments disabled.
//!
//! Comment pages come from
//! `https://discussion.theguardian.com/discussion-api/discussion/p/abc12`,
//! requested oldest-first and unthreaded so page boundaries stay stable while
//! new comments arrive.

use super::{CommentPage, DiscussionSource};
use crate::config::{GuardianConfig, HttpConfig};
use crate::error::{Error, Result};
use crate::models::{Comment, CommentId, DiscussionMeta, UserProfile};
use crate::utils::strip_markup;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

static SHORT_URL_JSON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""shortUrl"\s*:\s*"https?://(?:www\.)?theguardian\.com(/p/[a-z0-9]+)""#)
        .expect("valid regex")
});
static SHORT_URL_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"data-short-url="(/p/[a-z0-9]+)""#).expect("valid regex"));
static DISCUSSION_ID_JSON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""discussionId"\s*:\s*"(/p/[a-z0-9]+)""#).expect("valid regex")
});
static KEY_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/p/[a-z0-9]+$").expect("valid regex"));

/// HTTP client for theguardian.com and its discussion API.
#[derive(Debug, Clone)]
pub struct GuardianClient {
    pub(super) client: reqwest::Client,
    pub(super) guardian: GuardianConfig,
    page_size: u32,
}

impl GuardianClient {
    pub fn new(http: &HttpConfig, guardian: &GuardianConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(http.user_agent.as_str())
            .timeout(http.timeout())
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            guardian: guardian.clone(),
            page_size: http.page_size,
        })
    }

    /// GET `url` and return the body, mapping 404 to [`Error::NotFound`].
    pub(super) async fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::transient(url, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::not_found(url, "server returned 404"));
        }
        if !status.is_success() {
            return Err(Error::transient(url, format!("HTTP {status}")));
        }
        response.text().await.map_err(|e| Error::transient(url, e))
    }
}

impl DiscussionSource for GuardianClient {
    #[instrument(level = "info", skip(self))]
    async fn resolve_key(&self, article_url: &str) -> Result<String> {
        if let Some(key) = key_from_url(article_url) {
            debug!(%key, "URL is already a short URL");
            return Ok(key);
        }

        let html = self.get_text(article_url, &[]).await?;
        match extract_discussion_key(&html) {
            Some(key) => {
                info!(%key, "Found discussion key");
                Ok(key)
            }
            None => Err(Error::not_found(
                article_url,
                "no discussion key on the page (comments may be disabled)",
            )),
        }
    }

    #[instrument(level = "info", skip(self))]
    async fn fetch_page(&self, key: &str, page: u32) -> Result<CommentPage> {
        let url = format!(
            "{}{}",
            self.guardian.discussion_api_url.trim_end_matches('/'),
            key
        );
        let query = [
            ("page", page.to_string()),
            ("pageSize", self.page_size.to_string()),
            ("orderBy", "oldest".to_string()),
            ("displayThreaded", "false".to_string()),
        ];
        let body = self.get_text(&url, &query).await?;
        parse_page(&url, &body)
    }
}

/// Accept `https://www.theguardian.com/p/abc12` or a bare `/p/abc12`.
fn key_from_url(article_url: &str) -> Option<String> {
    let path = match Url::parse(article_url) {
        Ok(url) if url.host_str().is_some_and(|h| h.ends_with("theguardian.com")) => {
            url.path().to_string()
        }
        Ok(_) => return None,
        Err(_) => article_url.to_string(),
    };
    KEY_PATH.is_match(&path).then_some(path)
}

/// Find the discussion key in an article page.
pub fn extract_discussion_key(html: &str) -> Option<String> {
    [&*SHORT_URL_JSON, &*SHORT_URL_ATTR, &*DISCUSSION_ID_JSON]
        .iter()
        .find_map(|re| re.captures(html))
        .map(|caps| caps[1].to_string())
}

// ---------------------------------------------------------------------------
// Discussion API wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPage {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    current_page: Option<u32>,
    #[serde(default)]
    pages: Option<u32>,
    #[serde(default)]
    discussion: Option<RawDiscussion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDiscussion {
    key: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    web_url: Option<String>,
    #[serde(default)]
    comment_count: Option<u64>,
    #[serde(default)]
    is_closed_for_comments: bool,
    #[serde(default)]
    is_closed_for_recommendation: bool,
    #[serde(default)]
    comments: Vec<RawComment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawComment {
    id: CommentId,
    #[serde(default)]
    body: String,
    #[serde(default)]
    iso_date_time: Option<String>,
    #[serde(default)]
    user_profile: UserProfile,
    #[serde(default)]
    num_recommends: u64,
    #[serde(default)]
    num_responses: u64,
    #[serde(default)]
    response_to: Option<RawResponseTo>,
    /// Only populated in threaded mode; flattened so nothing is lost.
    #[serde(default)]
    responses: Vec<RawComment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResponseTo {
    #[serde(default)]
    comment_id: Option<CommentId>,
}

impl RawComment {
    /// Normalize this record (and any nested replies) into `out`.
    fn flatten_into(self, parent: Option<&CommentId>, out: &mut Vec<Comment>) {
        let iso_date_time = self.iso_date_time.as_deref().and_then(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| warn!(id = %self.id, raw, error = %e, "Unparseable comment timestamp"))
                .ok()
        });
        let parent_id = self
            .response_to
            .and_then(|r| r.comment_id)
            .or_else(|| parent.cloned());

        let comment = Comment {
            text: strip_markup(&self.body),
            id: self.id,
            body: self.body,
            iso_date_time,
            user_profile: self.user_profile,
            num_recommends: self.num_recommends,
            num_responses: self.num_responses,
            parent_id,
        };
        let id = comment.id.clone();
        out.push(comment);
        for reply in self.responses {
            reply.flatten_into(Some(&id), out);
        }
    }
}

/// Parse one discussion API response body.
pub fn parse_page(url: &str, body: &str) -> Result<CommentPage> {
    let raw: RawPage = serde_json::from_str(body)
        .map_err(|e| Error::transient(url, format!("malformed discussion response: {e}")))?;

    if raw.status.as_deref() == Some("error") {
        let code = raw.error_code.unwrap_or_default();
        let message = raw.message.unwrap_or_default();
        return Err(if code.contains("NOT_FOUND") {
            Error::not_found(url, format!("{code}: {message}"))
        } else {
            Error::transient(url, format!("{code}: {message}"))
        });
    }

    let Some(discussion) = raw.discussion else {
        return Err(Error::not_found(url, "response carries no discussion"));
    };

    let mut comments = Vec::with_capacity(discussion.comments.len());
    for comment in discussion.comments {
        comment.flatten_into(None, &mut comments);
    }

    let has_more = match (raw.current_page, raw.pages) {
        (Some(current), Some(pages)) => current < pages,
        // Without paging info, keep going until an empty page.
        _ => !comments.is_empty(),
    };

    Ok(CommentPage {
        meta: DiscussionMeta {
            discussion_id: discussion.key,
            title: discussion.title,
            web_url: discussion.web_url,
            comment_count: discussion.comment_count,
            is_closed_for_comments: discussion.is_closed_for_comments,
            is_closed_for_recommendation: discussion.is_closed_for_recommendation,
        },
        comments,
        has_more,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"{
      "status": "ok",
      "currentPage": 1,
      "pages": 3,
      "pageSize": 2,
      "discussion": {
        "key": "/p/abc12",
        "webUrl": "https://www.theguardian.com/world/2024/mar/04/test",
        "title": "Test article",
        "commentCount": 5,
        "isClosedForComments": true,
        "isClosedForRecommendation": false,
        "comments": [
          {
            "id": 167000001,
            "body": "<p>Great piece &amp; well argued.</p>",
            "isoDateTime": "2024-03-04T11:23:45Z",
            "numResponses": 1,
            "numRecommends": 42,
            "userProfile": {"userId": "1001", "displayName": "alice"}
          },
          {
            "id": 167000002,
            "body": "<p>Not <b>convinced</b>.</p>",
            "isoDateTime": "not a date",
            "numRecommends": 3,
            "userProfile": {"userId": 1002, "displayName": "bob"},
            "responseTo": {"displayName": "alice", "commentId": "167000001"}
          }
        ]
      }
    }"#;

    #[test]
    fn test_parse_page_normalizes_comments() {
        let page = parse_page("u", PAGE).unwrap();
        assert!(page.has_more);
        assert_eq!(page.meta.discussion_id, "/p/abc12");
        assert_eq!(page.meta.comment_count, Some(5));
        assert!(page.meta.is_closed_for_comments);
        assert_eq!(page.comments.len(), 2);

        let first = &page.comments[0];
        assert_eq!(first.id.0, "167000001");
        assert_eq!(first.text, "Great piece & well argued.");
        assert_eq!(first.body, "<p>Great piece &amp; well argued.</p>");
        assert_eq!(first.num_recommends, 42);
        assert!(first.iso_date_time.is_some());

        let second = &page.comments[1];
        assert_eq!(second.text, "Not convinced.");
        assert_eq!(second.user_profile.user_id, "1002");
        assert_eq!(second.parent_id, Some(CommentId::from("167000001")));
        assert!(second.iso_date_time.is_none());
    }

    #[test]
    fn test_parse_last_page_has_no_more() {
        let body = r#"{"status":"ok","currentPage":3,"pages":3,
            "discussion":{"key":"/p/abc12","comments":[{"id":1,"body":"x"}]}}"#;
        assert!(!parse_page("u", body).unwrap().has_more);
    }

    #[test]
    fn test_parse_threaded_replies_are_flattened() {
        let body = r#"{"status":"ok","currentPage":1,"pages":1,
            "discussion":{"key":"/p/abc12","comments":[
              {"id":1,"body":"root","responses":[{"id":2,"body":"reply"}]}
            ]}}"#;
        let page = parse_page("u", body).unwrap();
        assert_eq!(page.comments.len(), 2);
        assert_eq!(page.comments[1].parent_id, Some(CommentId::from("1")));
    }

    #[test]
    fn test_parse_error_status() {
        let missing = r#"{"status":"error","errorCode":"DISCUSSION_NOT_FOUND","message":"nope"}"#;
        assert!(matches!(parse_page("u", missing), Err(Error::NotFound { .. })));

        let other = r#"{"status":"error","errorCode":"INTERNAL","message":"boom"}"#;
        assert!(matches!(parse_page("u", other), Err(Error::TransientFetch { .. })));

        assert!(matches!(parse_page("u", "<html>"), Err(Error::TransientFetch { .. })));
    }

    #[test]
    fn test_extract_discussion_key_patterns() {
        let json = r#"..."shortUrl":"https://www.theguardian.com/p/x7yq2","other":1"#;
        assert_eq!(extract_discussion_key(json).as_deref(), Some("/p/x7yq2"));

        let attr = r#"<div data-short-url="/p/ab12c" class="x"></div>"#;
        assert_eq!(extract_discussion_key(attr).as_deref(), Some("/p/ab12c"));

        let id = r#"{"discussionId": "/p/zz9"}"#;
        assert_eq!(extract_discussion_key(id).as_deref(), Some("/p/zz9"));

        assert_eq!(extract_discussion_key("<html>no comments</html>"), None);
    }

    #[test]
    fn test_key_from_url() {
        assert_eq!(
            key_from_url("https://www.theguardian.com/p/abc12").as_deref(),
            Some("/p/abc12")
        );
        assert_eq!(key_from_url("/p/abc12").as_deref(), Some("/p/abc12"));
        assert_eq!(
            key_from_url("https://www.theguardian.com/world/2024/mar/04/test"),
            None
        );
        assert_eq!(key_from_url("https://example.com/p/abc12"), None);
    }
}
