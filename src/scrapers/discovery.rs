//! Finding articles worth fetching.
//!
//! Two listings are supported:
//! - keyword search through the Guardian Content API (needs an API key), which
//!   returns each article's short URL directly;
//! - a section's RSS feed, where each article page has to be visited to find
//!   its discussion key. Articles without one are skipped.

use super::DiscussionSource;
use super::guardian::GuardianClient;
use crate::error::{Error, Result};
use crate::models::ArticleRef;
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

static SHORT_URL_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(/p/[a-z0-9]+)").expect("valid regex"));

/// Upper bound the Content API accepts for `page-size` in this tool.
pub const MAX_SEARCH_RESULTS: usize = 20;

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    response: SearchResponse,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    #[serde(default)]
    web_title: String,
    #[serde(default)]
    web_url: String,
    #[serde(default)]
    section_name: String,
    #[serde(default)]
    fields: SearchFields,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchFields {
    #[serde(default)]
    short_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(default)]
    title: String,
    link: String,
}

/// Search the Content API for recent articles matching `keyword`.
///
/// `limit` is clamped to `1..=20`. Results without a short URL (and therefore
/// without a discussion) are dropped.
#[instrument(level = "info", skip(client, api_key))]
pub async fn search(
    client: &GuardianClient,
    keyword: &str,
    limit: usize,
    api_key: &str,
) -> Result<Vec<ArticleRef>> {
    let limit = limit.clamp(1, MAX_SEARCH_RESULTS);
    let url = format!(
        "{}?q={}&page-size={}&show-fields=shortUrl,headline&order-by=newest&api-key={}",
        client.guardian.content_api_url,
        urlencoding::encode(keyword),
        limit,
        urlencoding::encode(api_key),
    );

    let response = client
        .client
        .get(&url)
        .send()
        .await
        .map_err(|e| Error::transient(&client.guardian.content_api_url, e))?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::transient(
            &client.guardian.content_api_url,
            format!("HTTP {status}"),
        ));
    }
    let body = response
        .text()
        .await
        .map_err(|e| Error::transient(&client.guardian.content_api_url, e))?;

    let articles = parse_search_results(&body)
        .map_err(|e| Error::transient(&client.guardian.content_api_url, e))?;
    info!(count = articles.len(), "Content API search complete");
    Ok(articles)
}

fn parse_search_results(body: &str) -> std::result::Result<Vec<ArticleRef>, serde_json::Error> {
    let envelope: SearchEnvelope = serde_json::from_str(body)?;
    Ok(envelope
        .response
        .results
        .into_iter()
        .filter_map(|r| {
            let key = r
                .fields
                .short_url
                .as_deref()
                .and_then(|s| SHORT_URL_PATH.captures(s))
                .map(|caps| caps[1].to_string())?;
            Some(ArticleRef {
                title: r.web_title,
                url: r.web_url,
                discussion_key: Some(key),
                section: r.section_name,
            })
        })
        .collect())
}

/// List up to `limit` commentable articles from a section front.
#[instrument(level = "info", skip(client))]
pub async fn section(client: &GuardianClient, section_url: &str, limit: usize) -> Result<Vec<ArticleRef>> {
    let feed_url = format!("{}/rss", section_url.trim_end_matches('/'));
    let xml = client.get_text(&feed_url, &[]).await?;
    let candidates = parse_section_feed(&xml)
        .map_err(|e| Error::transient(&feed_url, format!("malformed RSS feed: {e}")))?;
    info!(count = candidates.len(), "Indexed section feed");

    let section_name = section_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();

    let articles: Vec<ArticleRef> = stream::iter(candidates)
        .then(|(title, url)| async move {
            match client.resolve_key(&url).await {
                Ok(key) => Some((title, url, key)),
                Err(e) => {
                    debug!(%url, error = %e, "Skipping article without discussion");
                    None
                }
            }
        })
        .filter_map(std::future::ready)
        .take(limit)
        .map(|(title, url, key)| ArticleRef {
            title,
            url,
            discussion_key: Some(key),
            section: section_name.clone(),
        })
        .collect()
        .await;

    if articles.is_empty() {
        warn!(%section_url, "No commentable articles found in section");
    }
    Ok(articles)
}

fn parse_section_feed(xml: &str) -> std::result::Result<Vec<(String, String)>, quick_xml::DeError> {
    let rss: Rss = quick_xml::de::from_str(xml)?;
    Ok(rss
        .channel
        .items
        .into_iter()
        .map(|item| (item.title.trim().to_string(), item.link.trim().to_string()))
        .filter(|(_, link)| !link.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_results_keeps_commentable() {
        let body = r#"{"response":{"status":"ok","results":[
            {"webTitle":"Heatwave hits Europe","webUrl":"https://www.theguardian.com/world/2024/jul/01/heat",
             "sectionName":"World news","fields":{"shortUrl":"https://www.theguardian.com/p/q1w2e","headline":"h"}},
            {"webTitle":"No comments here","webUrl":"https://www.theguardian.com/x","sectionName":"Travel","fields":{}}
        ]}}"#;
        let articles = parse_search_results(body).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Heatwave hits Europe");
        assert_eq!(articles[0].discussion_key.as_deref(), Some("/p/q1w2e"));
        assert_eq!(articles[0].section, "World news");
    }

    #[test]
    fn test_parse_section_feed() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>Travel | The Guardian</title>
    <link>https://www.theguardian.com/travel</link>
    <item>
      <title>Ten quiet beaches</title>
      <link>https://www.theguardian.com/travel/2024/jul/01/beaches</link>
      <category domain="https://www.theguardian.com/travel">Travel</category>
    </item>
    <item>
      <title>Trains &amp; boats</title>
      <link>https://www.theguardian.com/travel/2024/jul/02/trains</link>
    </item>
  </channel>
</rss>"#;
        let items = parse_section_feed(xml).unwrap();
        assert_eq!(
            items,
            vec![
                (
                    "Ten quiet beaches".to_string(),
                    "https://www.theguardian.com/travel/2024/jul/01/beaches".to_string()
                ),
                (
                    "Trains & boats".to_string(),
                    "https://www.theguardian.com/travel/2024/jul/02/trains".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_parse_section_feed_rejects_garbage() {
        assert!(parse_section_feed("<html><body>not a feed</body></html>").is_err());
    }
}
