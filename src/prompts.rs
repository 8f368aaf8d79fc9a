//! Instruction templates, one per facet.
//!
//! Placeholders: `{article_title}`, `{article_context}`, `{comment_count}`,
//! `{batch_note}` and `{comments_text}`. Every template demands bare JSON in
//! the shape the matching type in [`crate::report`] deserializes.
//!
//! The cross-article commercial template takes `{topic}` and
//! `{article_count}` in place of the article fields.

use crate::models::Facet;

const SENTIMENT: &str = r#"Analyze the sentiment of these reader comments on the article "{article_title}".
{article_context}{batch_note}
COMMENTS:
{comments_text}

Classify every comment above as positive, neutral or negative, then respond with JSON in exactly this format (no other text):
{
  "overall": {
    "positiveCount": <number of positive comments>,
    "neutralCount": <number of neutral comments>,
    "negativeCount": <number of negative comments>,
    "positive": <percentage 0-100>,
    "neutral": <percentage 0-100>,
    "negative": <percentage 0-100>,
    "summary": "<one sentence describing the overall mood>"
  },
  "byTopic": [
    {
      "topic": "<specific topic discussed>",
      "sentiment": "positive|negative|mixed|neutral",
      "percentage": <% of comments touching this topic>,
      "explanation": "<brief explanation>"
    }
  ]
}

The three counts must add up to the number of comments shown. Include 3-5 topics in byTopic."#;

const THEMES: &str = r#"Identify the main themes readers are discussing in these comments on "{article_title}".
{article_context}{batch_note}
COMMENTS:
{comments_text}

Respond with JSON in exactly this format (no other text):
{
  "themes": [
    {
      "name": "<theme name>",
      "description": "<brief description of this theme>",
      "frequency": "high|medium|low",
      "sentiment": "positive|negative|mixed|neutral",
      "representativeQuotes": ["<exact quote from a comment>", "<another quote>"],
      "keywords": ["keyword1", "keyword2"]
    }
  ]
}

Identify 5-7 themes ordered by prominence. Quote the comments verbatim."#;

const SUMMARY: &str = r#"Summarize the reader discussion on "{article_title}" ({comment_count} comments in total).
{article_context}{batch_note}
COMMENTS (sample):
{comments_text}

Respond with JSON in exactly this format (no other text):
{
  "executiveSummary": "<2-3 paragraphs: key points of agreement and disagreement, overall reader reception>",
  "consensus": ["<point most readers agree on>", "<another point>"],
  "contention": ["<point readers disagree about>", "<another contentious point>"],
  "notableComments": [
    {
      "commentIndex": <the N from the [Comment N] label>,
      "excerpt": "<shortened quote from a particularly insightful or representative comment>",
      "why": "<why this comment is notable>"
    }
  ]
}

Include 2-4 consensus points, 2-4 contention points and 3-5 notable comments."#;

const FOLLOW_UP_IDEAS: &str = r#"Based on these reader comments on "{article_title}", identify follow-up stories a journalist could pursue.

Look for:
- questions readers ask that the article left unanswered
- personal experiences worth exploring
- related topics readers want covered
- debates that deserve deeper investigation
- expert perspectives readers are asking for
{article_context}{batch_note}
COMMENTS:
{comments_text}

Respond with JSON in exactly this format (no other text):
{
  "followUpIdeas": [
    {
      "headline": "<potential headline for the follow-up piece>",
      "angle": "<the story angle>",
      "interestLevel": "high|medium|low",
      "evidence": "<what in the comments suggests this>",
      "suggestedSources": ["<type of source to interview>", "<data to gather>"]
    }
  ]
}

Provide 3-5 actionable ideas ordered by likely reader interest."#;

const DISCUSSION_QUESTIONS: &str = r#"A journalist wants to publish discussion questions alongside the article "{article_title}" to invite reader comments. Use the comments below to understand the article's subject and its key issues, then write 3 questions to publish with it.

Each question must be:
- one sentence, under 20 words
- conversational and free of jargon
- about the article's specific subject, not generic
{article_context}{batch_note}
COMMENTS:
{comments_text}

Respond with JSON in exactly this format (no other text):
{
  "questions": [
    {
      "question": "<short, specific question about the article's subject>",
      "intent": "<one line: what it aims to surface>"
    }
  ]
}"#;

const COMMERCIAL: &str = r#"Analyze these reader comments on "{article_title}" for commercial and advertising opportunities.

Extract:
1. Brands and products readers name: companies, services, destinations, hotels, airlines, restaurants and the like.
2. Reader recommendations: specific things readers recommend to each other, with a direct quote.
3. Opportunities: advertising or partnership angles a commercial team could pursue.
{article_context}{batch_note}
COMMENTS:
{comments_text}

Respond with JSON in exactly this format (no other text):
{
  "brands": [
    {
      "name": "<brand/product/destination name>",
      "category": "<e.g. airline, hotel, destination, restaurant, product>",
      "sentiment": "positive|negative|mixed|neutral",
      "mentions": <number of mentions>
    }
  ],
  "recommendations": [
    {
      "item": "<what is being recommended>",
      "category": "<category>",
      "quote": "<direct quote from a reader recommending it>",
      "endorsements": <number of readers recommending this or similar>
    }
  ],
  "opportunities": [
    {
      "type": "sponsored content|affiliate|display advertising|partnership|event",
      "target": "<brand, sector or product category to approach>",
      "rationale": "<why, based on the comments>"
    }
  ]
}

Include every brand mentioned, 3-8 recommendations and 3-5 opportunities ordered by value. If the comments contain no brands or recommendations, return empty arrays."#;

const COMMERCIAL_AGGREGATED: &str = r#"Analyze reader comments from {article_count} Guardian articles about "{topic}" to identify commercial and advertising opportunities.

This is an aggregated analysis across several articles. Each comment is labelled with the article it was posted on. Focus on brands and patterns that recur across the discussions.

Extract:
1. Brands and products readers name: companies, services, destinations, hotels, airlines, restaurants and the like.
2. Reader recommendations: specific things readers recommend to each other, with a direct quote.
3. Opportunities: advertising or partnership angles a commercial team could pursue, based on reader interest and engagement.
{batch_note}
COMMENTS FROM {article_count} ARTICLES:
{comments_text}

Respond with JSON in exactly this format (no other text):
{
  "brands": [
    {
      "name": "<brand/product/destination name>",
      "category": "<e.g. airline, hotel, destination, restaurant, product>",
      "sentiment": "positive|negative|mixed|neutral",
      "mentions": <approximate number of mentions across all articles>
    }
  ],
  "recommendations": [
    {
      "item": "<what is being recommended>",
      "category": "<category>",
      "quote": "<direct quote from a reader recommending it>",
      "endorsements": <number of readers recommending this or similar>
    }
  ],
  "opportunities": [
    {
      "type": "sponsored content|affiliate|display advertising|partnership|event",
      "target": "<brand, sector or product category to approach>",
      "rationale": "<why, based on the comments>"
    }
  ]
}

Include every brand mentioned (even once), 3-8 recommendations and 3-5 opportunities ordered by value. If the comments contain no brands or recommendations, return empty arrays."#;

/// Longest article excerpt included as context, in characters.
const MAX_ARTICLE_CHARS: usize = 6000;

/// Values substituted into a template.
#[derive(Debug, Clone)]
pub struct PromptContext<'a> {
    pub article_title: &'a str,
    pub article_text: Option<&'a str>,
    pub total_comments: usize,
    /// 1-based batch number and batch count.
    pub batch: (usize, usize),
    pub comments_text: &'a str,
}

pub fn template(facet: Facet) -> &'static str {
    match facet {
        Facet::Sentiment => SENTIMENT,
        Facet::Themes => THEMES,
        Facet::Summary => SUMMARY,
        Facet::FollowUpIdeas => FOLLOW_UP_IDEAS,
        Facet::DiscussionQuestions => DISCUSSION_QUESTIONS,
        Facet::Commercial => COMMERCIAL,
    }
}

fn batch_note(batch: (usize, usize)) -> String {
    match batch {
        (_, 0 | 1) => String::new(),
        (n, of) => format!(
            "\nThese comments are batch {n} of {of}; analyze only the comments shown here.\n"
        ),
    }
}

/// Render the prompt for `facet`.
pub fn render(facet: Facet, ctx: &PromptContext<'_>) -> String {
    let article_context = match ctx.article_text.map(str::trim).filter(|t| !t.is_empty()) {
        Some(text) => {
            let excerpt: String = text.chars().take(MAX_ARTICLE_CHARS).collect();
            format!("\nARTICLE TEXT (for context):\n{excerpt}\n")
        }
        None => String::new(),
    };
    let note = batch_note(ctx.batch);

    // Comments go in last so text inside them is never mistaken for a placeholder.
    template(facet)
        .replace("{article_title}", ctx.article_title)
        .replace("{article_context}", &article_context)
        .replace("{batch_note}", &note)
        .replace("{comment_count}", &ctx.total_comments.to_string())
        .replace("{comments_text}", ctx.comments_text)
}

/// Render the commercial prompt for comments pooled from `article_count`
/// articles found for `topic` (a search keyword or a section).
pub fn render_commercial_aggregated(
    topic: &str,
    article_count: usize,
    batch: (usize, usize),
    comments_text: &str,
) -> String {
    COMMERCIAL_AGGREGATED
        .replace("{topic}", topic)
        .replace("{article_count}", &article_count.to_string())
        .replace("{batch_note}", &batch_note(batch))
        .replace("{comments_text}", comments_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(comments_text: &'a str, article_text: Option<&'a str>, batch: (usize, usize)) -> PromptContext<'a> {
        PromptContext {
            article_title: "Rail fares rise again",
            article_text,
            total_comments: 812,
            batch,
            comments_text,
        }
    }

    #[test]
    fn test_all_placeholders_filled() {
        let all = [
            Facet::Sentiment,
            Facet::Themes,
            Facet::Summary,
            Facet::FollowUpIdeas,
            Facet::DiscussionQuestions,
            Facet::Commercial,
        ];
        for facet in all {
            let prompt = render(facet, &ctx("[Comment 1] (3 recommends) @a: hi", Some("Body"), (2, 3)));
            for placeholder in ["{article_title}", "{article_context}", "{batch_note}", "{comment_count}", "{comments_text}"] {
                assert!(!prompt.contains(placeholder), "{facet} left {placeholder}");
            }
            assert!(prompt.contains("Rail fares rise again"));
            assert!(prompt.contains("[Comment 1]"));
            assert!(prompt.contains("batch 2 of 3"));
            assert!(prompt.contains("ARTICLE TEXT"));
        }
    }

    #[test]
    fn test_single_batch_has_no_batch_note() {
        let prompt = render(Facet::Summary, &ctx("c", None, (1, 1)));
        assert!(!prompt.contains("batch 1 of 1"));
        assert!(!prompt.contains("ARTICLE TEXT"));
        assert!(prompt.contains("812 comments in total"));
    }

    #[test]
    fn test_placeholder_text_inside_comments_survives() {
        let prompt = render(Facet::Themes, &ctx("someone typed {article_title} here", None, (1, 1)));
        assert!(prompt.contains("someone typed {article_title} here"));
    }

    #[test]
    fn test_aggregated_commercial_prompt() {
        let prompt = render_commercial_aggregated(
            "italy holidays",
            3,
            (1, 2),
            "[Comment 1] (4 recommends) @a on \"Lakes\": try Como",
        );
        for placeholder in ["{topic}", "{article_count}", "{batch_note}", "{comments_text}"] {
            assert!(!prompt.contains(placeholder), "left {placeholder}");
        }
        assert!(prompt.contains("3 Guardian articles about \"italy holidays\""));
        assert!(prompt.contains("COMMENTS FROM 3 ARTICLES"));
        assert!(prompt.contains("batch 1 of 2"));
        assert!(prompt.contains("\"recommendations\""));
    }
}
