//! Turning untrusted model text into validated facet results.

use crate::models::Facet;
use crate::report::{
    BatchSentiment, Commercial, DiscussionQuestion, FollowUpIdea, FollowUpResponse,
    QuestionsResponse, Summary, Theme, ThemesResponse, Validate,
};
use crate::utils::{extract_json_object, looks_truncated};
use serde::de::DeserializeOwned;

/// A validated response for one facet of one batch.
#[derive(Debug, Clone)]
pub enum FacetResult {
    Sentiment(BatchSentiment),
    Themes(Vec<Theme>),
    Summary(Summary),
    FollowUpIdeas(Vec<FollowUpIdea>),
    DiscussionQuestions(Vec<DiscussionQuestion>),
    Commercial(Commercial),
}

impl FacetResult {
    pub fn facet(&self) -> Facet {
        match self {
            FacetResult::Sentiment(_) => Facet::Sentiment,
            FacetResult::Themes(_) => Facet::Themes,
            FacetResult::Summary(_) => Facet::Summary,
            FacetResult::FollowUpIdeas(_) => Facet::FollowUpIdeas,
            FacetResult::DiscussionQuestions(_) => Facet::DiscussionQuestions,
            FacetResult::Commercial(_) => Facet::Commercial,
        }
    }
}

fn decode<T: DeserializeOwned + Validate>(response: &str) -> Result<T, String> {
    let json = extract_json_object(response).ok_or("response contains no JSON object")?;
    let value: T = serde_json::from_str(json).map_err(|e| {
        if looks_truncated(&e) {
            format!("truncated JSON: {e}")
        } else {
            format!("does not match schema: {e}")
        }
    })?;
    value.validate()?;
    Ok(value)
}

/// Parse and validate the model's reply for `facet`.
///
/// The error string explains why the reply was rejected; it ends up in the
/// report's `failedFacets`.
pub fn parse(facet: Facet, response: &str) -> Result<FacetResult, String> {
    Ok(match facet {
        Facet::Sentiment => FacetResult::Sentiment(decode(response)?),
        Facet::Themes => FacetResult::Themes(decode::<ThemesResponse>(response)?.themes),
        Facet::Summary => FacetResult::Summary(decode(response)?),
        Facet::FollowUpIdeas => {
            FacetResult::FollowUpIdeas(decode::<FollowUpResponse>(response)?.follow_up_ideas)
        }
        Facet::DiscussionQuestions => {
            FacetResult::DiscussionQuestions(decode::<QuestionsResponse>(response)?.questions)
        }
        Facet::Commercial => FacetResult::Commercial(decode(response)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sentiment_with_prose_around() {
        let reply = "Sure! Here is the analysis:\n```json\n{\"overall\":{\"positiveCount\":3,\"neutralCount\":1,\"negativeCount\":1,\"positive\":60,\"neutral\":20,\"negative\":20,\"summary\":\"Upbeat\"},\"byTopic\":[]}\n```";
        let FacetResult::Sentiment(s) = parse(Facet::Sentiment, reply).unwrap() else {
            panic!("expected sentiment");
        };
        assert_eq!(s.overall.positive_count, Some(3));
        assert_eq!(s.overall.summary, "Upbeat");
    }

    #[test]
    fn test_parse_themes_and_facet_tag() {
        let reply = r#"{"themes":[{"name":"Fares","frequency":"high"},{"name":"Strikes"}]}"#;
        let result = parse(Facet::Themes, reply).unwrap();
        assert_eq!(result.facet(), Facet::Themes);
        let FacetResult::Themes(themes) = result else { unreachable!() };
        assert_eq!(themes.len(), 2);
        assert_eq!(themes[1].frequency, "");
    }

    #[test]
    fn test_rejections_carry_reasons() {
        assert_eq!(
            parse(Facet::Summary, "I cannot help with that.").unwrap_err(),
            "response contains no JSON object"
        );

        let truncated = r#"{"executiveSummary": "Readers were split", "consensus": ["a"}"#;
        assert!(parse(Facet::Summary, truncated).unwrap_err().contains("schema"));

        let wrong_shape = r#"{"ideas": []}"#;
        assert!(parse(Facet::FollowUpIdeas, wrong_shape).unwrap_err().contains("schema"));

        let blank = r#"{"executiveSummary": "   "}"#;
        assert!(parse(Facet::Summary, blank).unwrap_err().contains("blank"));
    }

    #[test]
    fn test_truncated_json_is_labelled() {
        let cut = r#"{"questions": [{"question": "Would you"#;
        // No closing brace at all, so there is no object to extract.
        assert!(parse(Facet::DiscussionQuestions, cut).is_err());

        let cut_inside = r#"{"questions": [{"question": "Would you", "intent": "x"}"#;
        let err = parse(Facet::DiscussionQuestions, cut_inside).unwrap_err();
        assert!(err.starts_with("truncated JSON"), "{err}");
    }
}
