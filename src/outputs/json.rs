//! JSON output for the persisted artifacts.
//!
//! ```text
//! comments_world_2024_mar_04_some-story.json           # written by `fetch`
//! comments_world_2024_mar_04_some-story_analysis.json  # written by `analyze`
//! commercial_italy-holidays.json                       # `search --analyze`
//! commercial_travel.json                               # `section --analyze`
//! ```
//!
//! When no output path is given, `fetch` derives one from the article URL and
//! `analyze` derives one from its input file.

use crate::error::{Error, Result};
use crate::models::Discussion;
use crate::utils::path_slug;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};
use url::Url;

/// Longest URL-path slug kept in a derived file name.
const MAX_SLUG_CHARS: usize = 50;

/// Default output path for a fetched discussion: `comments_<url path slug>.json`.
pub fn discussion_path_for(article_url: &str) -> PathBuf {
    let path = Url::parse(article_url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| article_url.to_string());
    let slug = path_slug(&path, MAX_SLUG_CHARS);
    let slug = if slug.is_empty() { "article".to_string() } else { slug };
    PathBuf::from(format!("comments_{slug}.json"))
}

/// Default output path for a report: `<input stem>_analysis.json` beside the input.
pub fn analysis_path_for(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "comments".to_string());
    input.with_file_name(format!("{stem}_analysis.json"))
}

/// Default output path for a cross-article report: `commercial_<slug>.json`.
///
/// A section URL contributes its path; a keyword is used as is.
pub fn aggregate_path_for(query: &str) -> PathBuf {
    let source = Url::parse(query)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| query.trim().to_lowercase());
    let slug = path_slug(&source, MAX_SLUG_CHARS);
    let slug = if slug.is_empty() { "articles".to_string() } else { slug };
    PathBuf::from(format!("commercial_{slug}.json"))
}

/// Serialize `value` as pretty JSON to `path`, creating parent directories.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_pretty<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|source| Error::Json {
        path: path.display().to_string(),
        source,
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(|source| Error::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }

    if let Err(source) = fs::write(path, json).await {
        error!(error = %source, "Failed to write JSON");
        return Err(Error::Io {
            path: path.display().to_string(),
            source,
        });
    }
    info!("Wrote JSON file");
    Ok(())
}

/// Read and deserialize a JSON file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn read<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).await.map_err(|source| Error::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| Error::Json {
        path: path.display().to_string(),
        source,
    })
}

/// Load a discussion written by `fetch`.
pub async fn read_discussion(path: &Path) -> Result<Discussion> {
    let discussion: Discussion = read(path).await?;
    if !discussion.is_consistent() {
        tracing::warn!(
            total_fetched = discussion.total_fetched,
            comments = discussion.comments.len(),
            "Discussion file is inconsistent (count mismatch or repeated ids)"
        );
    }
    Ok(discussion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tests::{comment, discussion};

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("guardian_comments_test_{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn test_discussion_path_from_article_url() {
        let p = discussion_path_for(
            "https://www.theguardian.com/world/2024/mar/04/a-very-long-headline-slug-that-keeps-going-on",
        );
        let name = p.to_string_lossy().into_owned();
        assert!(name.starts_with("comments_world_2024_mar_04_a-very-long"));
        assert!(name.ends_with(".json"));
        assert_eq!(name.len(), "comments_".len() + MAX_SLUG_CHARS + ".json".len());
    }

    #[test]
    fn test_discussion_path_is_deterministic() {
        let url = "https://www.theguardian.com/travel/2024/jul/01/beaches";
        assert_eq!(discussion_path_for(url), discussion_path_for(url));
        assert_eq!(
            discussion_path_for("https://www.theguardian.com/"),
            PathBuf::from("comments_article.json")
        );
    }

    #[test]
    fn test_analysis_path_for_input() {
        assert_eq!(
            analysis_path_for(Path::new("out/comments_x.json")),
            PathBuf::from("out/comments_x_analysis.json")
        );
        assert_eq!(
            analysis_path_for(Path::new("data")),
            PathBuf::from("data_analysis.json")
        );
    }

    #[tokio::test]
    async fn test_write_then_read_discussion() {
        let path = scratch_path("round_trip/discussion.json");
        let original = discussion(vec![comment("1", 5, "one"), comment("2", 0, "two")]);

        write_pretty(&original, &path).await.unwrap();
        let restored = read_discussion(&path).await.unwrap();
        assert_eq!(restored, original);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_read_malformed_file() {
        let path = scratch_path("malformed.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        let err = read_discussion(&path).await.unwrap_err();
        assert!(matches!(err, Error::Json { .. }));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let err = read_discussion(&scratch_path("does_not_exist.json")).await.unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_aggregate_path_for_keyword_and_section() {
        assert_eq!(
            aggregate_path_for("Italy Holidays"),
            PathBuf::from("commercial_italy-holidays.json")
        );
        assert_eq!(
            aggregate_path_for("https://www.theguardian.com/travel"),
            PathBuf::from("commercial_travel.json")
        );
        assert_eq!(
            aggregate_path_for("https://www.theguardian.com/"),
            PathBuf::from("commercial_articles.json")
        );
    }
}
