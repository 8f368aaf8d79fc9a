//! Error taxonomy shared by the fetcher and the analyzer.
//!
//! Each variant maps to a distinct process exit code so callers scripting the
//! CLI can tell "this article has no discussion" apart from "the network
//! hiccuped" without parsing stderr.

use thiserror::Error;

/// Everything that can abort a `fetch`, `analyze`, `search` or `section` run.
///
/// A partial analysis is deliberately absent: it is reported through the
/// report's metadata, not as a failure.
#[derive(Debug, Error)]
pub enum Error {
    /// The article has comments disabled or no discussion could be resolved.
    #[error("no discussion found for {url}: {reason}")]
    NotFound { url: String, reason: String },

    /// Network or HTTP failure; safe to retry the whole command.
    #[error("request to {url} failed: {reason}")]
    TransientFetch { url: String, reason: String },

    /// The provider failed or every batch came back unusable.
    #[error("analysis failed: {0}")]
    AnalysisFailure(String),

    /// A required API key was not supplied.
    #[error("missing credential: set {0}")]
    MissingCredential(&'static str),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap a `reqwest` failure for `url` as a transient fetch error.
    pub fn transient(url: &str, err: impl std::fmt::Display) -> Self {
        Error::TransientFetch {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }

    pub fn not_found(url: &str, reason: impl Into<String>) -> Self {
        Error::NotFound {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::NotFound { .. } => 2,
            Error::TransientFetch { .. } => 3,
            Error::AnalysisFailure(_) => 4,
            Error::MissingCredential(_) => 5,
            Error::Config(_) | Error::Io { .. } | Error::Json { .. } => 1,
        }
    }
}
