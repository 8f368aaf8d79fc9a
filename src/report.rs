//! The analysis report and the per-facet schemas the LLM is asked to fill.
//!
//! Facet types double as the validation schema for model responses: a
//! response is accepted only if it deserializes into the facet's type and
//! passes [`Validate`]. Field names mirror the JSON shapes in the prompt
//! templates, hence camelCase on the wire.

use crate::models::{CommentId, Facet};
use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Schema checks that serde alone cannot express.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

fn require_non_blank(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{field} is blank"))
    } else {
        Ok(())
    }
}

fn require_percentage(field: &str, value: f64) -> Result<(), String> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(format!("{field} = {value} is not a percentage"))
    }
}

/// Accept a count written as an integer, a whole float (`12.0`) or a numeric
/// string (`"12"`). Negative or fractional values are rejected.
fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Float(f64),
        Text(String),
    }

    let whole = |f: f64| -> Result<u64, D::Error> {
        if f.is_finite() && f >= 0.0 && f.fract() == 0.0 {
            Ok(f as u64)
        } else {
            Err(D::Error::custom(format!("{f} is not a non-negative whole number")))
        }
    };

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Int(n)) => Ok(Some(n)),
        Some(Raw::Float(f)) => whole(f).map(Some),
        Some(Raw::Text(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<f64>()
                .map_err(|_| D::Error::custom(format!("{s:?} is not a number")))
                .and_then(whole)
                .map(Some)
        }
    }
}

fn lenient_index<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<usize>, D::Error> {
    lenient_count(deserializer).map(|n| n.map(|n| n as usize))
}

// ---------------------------------------------------------------------------
// Sentiment
// ---------------------------------------------------------------------------

/// Sentiment as returned by the model for a single batch.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSentiment {
    pub overall: BatchOverall,
    #[serde(default)]
    pub by_topic: Vec<TopicSentiment>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOverall {
    #[serde(default)]
    pub positive: f64,
    #[serde(default)]
    pub neutral: f64,
    #[serde(default)]
    pub negative: f64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub positive_count: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub neutral_count: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub negative_count: Option<u64>,
    #[serde(default)]
    pub summary: String,
}

impl BatchOverall {
    /// The model's [positive, neutral, negative] counts, if it gave any that
    /// add up to more than zero.
    pub fn counts(&self) -> Option<[u64; 3]> {
        let counts = [
            self.positive_count.unwrap_or(0),
            self.neutral_count.unwrap_or(0),
            self.negative_count.unwrap_or(0),
        ];
        (counts.iter().sum::<u64>() > 0).then_some(counts)
    }

    pub fn percentages(&self) -> [f64; 3] {
        [self.positive, self.neutral, self.negative]
    }
}

impl Validate for BatchSentiment {
    fn validate(&self) -> Result<(), String> {
        let o = &self.overall;
        require_percentage("overall.positive", o.positive)?;
        require_percentage("overall.neutral", o.neutral)?;
        require_percentage("overall.negative", o.negative)?;
        if o.counts().is_none() && o.percentages().iter().sum::<f64>() <= 0.0 {
            return Err("overall carries neither counts nor percentages".into());
        }
        for topic in &self.by_topic {
            require_non_blank("byTopic.topic", &topic.topic)?;
            require_percentage("byTopic.percentage", topic.percentage)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSentiment {
    pub topic: String,
    #[serde(default)]
    pub sentiment: String,
    #[serde(default)]
    pub percentage: f64,
    #[serde(default)]
    pub explanation: String,
}

/// Merged sentiment in the final report.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sentiment {
    pub overall: OverallSentiment,
    pub by_topic: Vec<TopicSentiment>,
}

/// Percentages always sum to 100 and are derived from the counts beside them.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallSentiment {
    pub positive: u32,
    pub neutral: u32,
    pub negative: u32,
    pub positive_count: u64,
    pub neutral_count: u64,
    pub negative_count: u64,
    pub summary: String,
}

// ---------------------------------------------------------------------------
// Themes, follow-up ideas, discussion questions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemesResponse {
    pub themes: Vec<Theme>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub frequency: String,
    #[serde(default)]
    pub sentiment: String,
    #[serde(default)]
    pub representative_quotes: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Validate for ThemesResponse {
    fn validate(&self) -> Result<(), String> {
        self.themes
            .iter()
            .try_for_each(|t| require_non_blank("themes.name", &t.name))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpResponse {
    pub follow_up_ideas: Vec<FollowUpIdea>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpIdea {
    pub headline: String,
    #[serde(default)]
    pub angle: String,
    #[serde(default)]
    pub interest_level: String,
    #[serde(default)]
    pub evidence: String,
    #[serde(default)]
    pub suggested_sources: Vec<String>,
}

impl Validate for FollowUpResponse {
    fn validate(&self) -> Result<(), String> {
        self.follow_up_ideas
            .iter()
            .try_for_each(|i| require_non_blank("followUpIdeas.headline", &i.headline))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct QuestionsResponse {
    pub questions: Vec<DiscussionQuestion>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DiscussionQuestion {
    pub question: String,
    #[serde(default)]
    pub intent: String,
}

impl Validate for QuestionsResponse {
    fn validate(&self) -> Result<(), String> {
        self.questions
            .iter()
            .try_for_each(|q| require_non_blank("questions.question", &q.question))
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub executive_summary: String,
    #[serde(default)]
    pub consensus: Vec<String>,
    #[serde(default)]
    pub contention: Vec<String>,
    #[serde(default)]
    pub notable_comments: Vec<NotableComment>,
}

impl Validate for Summary {
    fn validate(&self) -> Result<(), String> {
        require_non_blank("executiveSummary", &self.executive_summary)?;
        self.notable_comments
            .iter()
            .try_for_each(|n| require_non_blank("notableComments.excerpt", &n.excerpt))
    }
}

/// A comment singled out by the model.
///
/// The model only supplies `excerpt`, `why` and (hopefully) `commentIndex`;
/// the remaining fields are filled in from the source comment during merge.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotableComment {
    pub excerpt: String,
    #[serde(default)]
    pub why: String,
    /// 1-based position in the analyzed selection, as labelled in the prompt.
    #[serde(default, skip_serializing, deserialize_with = "lenient_index")]
    pub comment_index: Option<usize>,
    #[serde(default)]
    pub comment_id: Option<CommentId>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub num_recommends: u64,
}

// ---------------------------------------------------------------------------
// Commercial
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Commercial {
    pub brands: Vec<Brand>,
    pub recommendations: Vec<Recommendation>,
    pub opportunities: Vec<Opportunity>,
}

impl Validate for Commercial {
    fn validate(&self) -> Result<(), String> {
        self.brands
            .iter()
            .try_for_each(|b| require_non_blank("brands.name", &b.name))?;
        self.recommendations
            .iter()
            .try_for_each(|r| require_non_blank("recommendations.item", &r.item))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Brand {
    pub name: String,
    pub category: String,
    pub sentiment: String,
    pub mentions: u64,
}

impl Default for Brand {
    fn default() -> Self {
        Self {
            name: String::new(),
            category: String::new(),
            sentiment: "neutral".to_string(),
            mentions: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Recommendation {
    pub item: String,
    pub category: String,
    pub quote: String,
    pub endorsements: u64,
}

impl Default for Recommendation {
    fn default() -> Self {
        Self {
            item: String::new(),
            category: String::new(),
            quote: String::new(),
            endorsements: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Opportunity {
    #[serde(rename = "type")]
    pub kind: String,
    pub target: String,
    pub rationale: String,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMeta {
    pub article_title: String,
    pub article_url: String,
    pub discussion_id: String,
    pub total_comments: usize,
    pub unique_commenters: usize,
    pub comments_selected: usize,
    /// Comments in batches that produced at least one usable facet.
    pub comments_analyzed: usize,
    pub batches: usize,
    pub successful_batches: usize,
    pub partial: bool,
    pub failed_facets: Vec<FacetFailure>,
    pub model: String,
    pub analyzed_at: DateTime<Utc>,
}

/// One (batch, facet) request whose response was dropped.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetFailure {
    /// 1-based batch number.
    pub batch: usize,
    pub facet: Facet,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub meta: ReportMeta,
    pub sentiment: Option<Sentiment>,
    pub themes: Vec<Theme>,
    pub summary: Option<Summary>,
    pub follow_up_ideas: Vec<FollowUpIdea>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discussion_questions: Option<Vec<DiscussionQuestion>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commercial: Option<Commercial>,
}

// ---------------------------------------------------------------------------
// Cross-article commercial report
// ---------------------------------------------------------------------------

/// An article that contributed comments to a cross-article report.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleSummary {
    pub title: String,
    pub url: String,
    pub comment_count: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateMeta {
    /// Search keyword or section URL the articles came from.
    pub query: String,
    pub articles_searched: usize,
    pub articles_with_comments: usize,
    pub articles: Vec<ArticleSummary>,
    pub total_comments: usize,
    pub comments_selected: usize,
    pub comments_analyzed: usize,
    pub batches: usize,
    pub successful_batches: usize,
    pub partial: bool,
    pub failed_facets: Vec<FacetFailure>,
    pub model: String,
    pub analyzed_at: DateTime<Utc>,
}

/// Commercial signals pooled from the comments of several articles.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateReport {
    pub meta: AggregateMeta,
    pub commercial: Commercial,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentiment_validation_rejects_out_of_range() {
        let raw = r#"{"overall":{"positive":140,"neutral":0,"negative":0,"summary":"x"}}"#;
        let parsed: BatchSentiment = serde_json::from_str(raw).unwrap();
        assert!(parsed.validate().is_err());
    }

    #[test]
    fn test_sentiment_validation_requires_some_signal() {
        let raw = r#"{"overall":{"summary":"nothing"}}"#;
        let parsed: BatchSentiment = serde_json::from_str(raw).unwrap();
        assert!(parsed.validate().is_err());

        let with_counts = r#"{"overall":{"positiveCount":0,"neutralCount":4,"negativeCount":0}}"#;
        let parsed: BatchSentiment = serde_json::from_str(with_counts).unwrap();
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_all_zero_counts_are_no_signal() {
        let zero = r#"{"overall":{"positiveCount":0,"neutralCount":0,"negativeCount":0}}"#;
        let parsed: BatchSentiment = serde_json::from_str(zero).unwrap();
        assert_eq!(parsed.overall.counts(), None);
        assert!(parsed.validate().is_err());

        let zero_with_pcts = r#"{"overall":{"positiveCount":0,"neutralCount":0,"negativeCount":0,"positive":40,"neutral":60}}"#;
        let parsed: BatchSentiment = serde_json::from_str(zero_with_pcts).unwrap();
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_counts_accept_floats_and_strings() {
        let raw = r#"{"overall":{"positiveCount":12.0,"neutralCount":"3","negativeCount":null}}"#;
        let parsed: BatchSentiment = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.overall.counts(), Some([12, 3, 0]));

        for bad in [r#"-2"#, r#"2.5"#, r#""lots""#] {
            let raw = format!(r#"{{"overall":{{"positiveCount":{bad}}}}}"#);
            assert!(serde_json::from_str::<BatchSentiment>(&raw).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_comment_index_accepts_string() {
        let n: NotableComment =
            serde_json::from_str(r#"{"excerpt":"e","commentIndex":"3"}"#).unwrap();
        assert_eq!(n.comment_index, Some(3));
        let n: NotableComment = serde_json::from_str(r#"{"excerpt":"e","commentIndex":4.0}"#).unwrap();
        assert_eq!(n.comment_index, Some(4));
        let n: NotableComment = serde_json::from_str(r#"{"excerpt":"e"}"#).unwrap();
        assert_eq!(n.comment_index, None);
    }

    #[test]
    fn test_blank_theme_name_rejected() {
        let parsed: ThemesResponse =
            serde_json::from_str(r#"{"themes":[{"name":"  ","description":"d"}]}"#).unwrap();
        assert!(parsed.validate().is_err());
    }

    #[test]
    fn test_commercial_defaults() {
        let parsed: Commercial =
            serde_json::from_str(r#"{"brands":[{"name":"Eurostar"}],"opportunities":[{"type":"affiliate","target":"rail"}]}"#)
                .unwrap();
        assert_eq!(parsed.brands[0].mentions, 1);
        assert_eq!(parsed.brands[0].sentiment, "neutral");
        assert_eq!(parsed.opportunities[0].kind, "affiliate");
        assert!(parsed.recommendations.is_empty());
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_notable_comment_index_not_serialized() {
        let n = NotableComment {
            excerpt: "e".into(),
            why: "w".into(),
            comment_index: Some(3),
            comment_id: Some(CommentId::from("42")),
            author: Some("reader".into()),
            num_recommends: 7,
        };
        let json = serde_json::to_string(&n).unwrap();
        assert!(!json.contains("commentIndex"));
        assert!(json.contains("\"commentId\":\"42\""));
    }
}
