//! crates/tutor_core/src/content.rs
//!
//! The validation-and-default boundary for content-provider output.
//!
//! The provider is asked for JSON conforming to a strict schema, but its
//! output is never trusted: every field is coerced to a safe default here,
//! in one place, so that a malformed-but-present response is degraded
//! rather than surfaced as a parse error. The designated failure fallbacks
//! for each request kind also live here.

use serde::Deserialize;

use crate::domain::Question;

/// The fixed reply appended to the chat log when the provider call fails.
pub const CHAT_FALLBACK_REPLY: &str = "Network error. Please try again.";

/// The reply used when the provider answers a chat request with no text.
pub const CHAT_EMPTY_REPLY: &str = "I didn't quite get that. Could you rephrase?";

/// A question as the provider actually returned it: every field optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuestion {
    pub id: Option<String>,
    pub text: Option<String>,
    pub options: Option<Vec<String>>,
    pub correct_option_index: Option<i64>,
    pub explanation: Option<String>,
}

/// Generated study content for one action, already validated.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionContent {
    pub title: String,
    pub description: String,
    pub content: String,
}

/// Action content as returned by the provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawActionContent {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
}

/// Coerces one raw question into a well-formed `Question`.
///
/// Missing text becomes a placeholder, an absent or empty option list
/// becomes a two-option placeholder, and the correct-answer index is
/// clamped into range so `0 <= correct_option_index < options.len()`
/// always holds downstream.
pub fn coerce_question(raw: RawQuestion, fallback_id: String) -> Question {
    let options = match raw.options {
        Some(options) if !options.is_empty() => options,
        _ => vec!["Yes".to_string(), "No".to_string()],
    };
    let correct_option_index = raw
        .correct_option_index
        .and_then(|i| usize::try_from(i).ok())
        .unwrap_or(0)
        .min(options.len() - 1);
    Question {
        id: raw.id.filter(|id| !id.is_empty()).unwrap_or(fallback_id),
        text: raw
            .text
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Question unavailable".to_string()),
        options,
        correct_option_index,
        explanation: raw.explanation.filter(|e| !e.is_empty()),
    }
}

/// Parses a provider response into a batch of coerced questions.
///
/// `id_prefix` seeds the fallback ids (`"q-0"`, `"q-1"`, ...) for items the
/// provider returned without one. An unparseable or empty response is an
/// error; the caller decides which degraded value stands in for it.
pub fn parse_question_batch(
    response_text: &str,
    id_prefix: &str,
) -> Result<Vec<Question>, serde_json::Error> {
    let cleaned = strip_code_fences(response_text);
    let raw: Vec<RawQuestion> = serde_json::from_str(&cleaned)?;
    Ok(raw
        .into_iter()
        .enumerate()
        .map(|(i, q)| coerce_question(q, format!("{id_prefix}-{i}")))
        .collect())
}

/// Parses a provider response into action content.
///
/// Title and description fall back to fixed defaults, but a response with
/// no `content` field is treated as a failed generation and yields `None`.
pub fn parse_action_content(response_text: &str) -> Option<ActionContent> {
    let cleaned = strip_code_fences(response_text);
    let raw: RawActionContent = serde_json::from_str(&cleaned).ok()?;
    let content = raw.content.filter(|c| !c.is_empty())?;
    Some(ActionContent {
        title: raw
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Learning Task".to_string()),
        description: raw
            .description
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| "Review this topic.".to_string()),
        content,
    })
}

/// The single-item quiz the provider's error path yields. Its sole option
/// acknowledges the failure; scoring against it degenerates to 0% or 100%,
/// which is preserved deliberately instead of introducing an aborted-quiz
/// state.
pub fn fallback_quiz() -> Vec<Question> {
    vec![Question {
        id: "err-1".to_string(),
        text: "We couldn't load the questions right now. Please try reloading.".to_string(),
        options: vec!["Retry".to_string()],
        correct_option_index: 0,
        explanation: Some("Network or parsing error.".to_string()),
    }]
}

/// Removes markdown code fences some models wrap their JSON in.
fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_batch_passes_through() {
        let json = r#"[
            {"id": "q1", "text": "What is 2 + 2?",
             "options": ["3", "4", "5", "6"],
             "correctOptionIndex": 1,
             "explanation": "Basic addition."}
        ]"#;
        let questions = parse_question_batch(json, "q").unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].id, "q1");
        assert_eq!(questions[0].correct_option_index, 1);
        assert_eq!(questions[0].explanation.as_deref(), Some("Basic addition."));
    }

    #[test]
    fn fenced_json_is_accepted() {
        let json = "```json\n[{\"text\": \"Q?\", \"options\": [\"a\", \"b\"]}]\n```";
        let questions = parse_question_batch(json, "q").unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].options, vec!["a", "b"]);
    }

    #[test]
    fn missing_fields_are_defaulted() {
        let questions = parse_question_batch("[{}]", "d").unwrap();
        let q = &questions[0];
        assert_eq!(q.id, "d-0");
        assert_eq!(q.text, "Question unavailable");
        assert_eq!(q.options, vec!["Yes", "No"]);
        assert_eq!(q.correct_option_index, 0);
        assert_eq!(q.explanation, None);
    }

    #[test]
    fn out_of_range_answer_index_is_clamped() {
        let json = r#"[{"text": "Q?", "options": ["a", "b"], "correctOptionIndex": 7}]"#;
        let questions = parse_question_batch(json, "q").unwrap();
        assert_eq!(questions[0].correct_option_index, 1);

        let json = r#"[{"text": "Q?", "options": ["a", "b"], "correctOptionIndex": -3}]"#;
        let questions = parse_question_batch(json, "q").unwrap();
        assert_eq!(questions[0].correct_option_index, 0);
    }

    #[test]
    fn non_array_response_is_an_error() {
        assert!(parse_question_batch("not json at all", "q").is_err());
        assert!(parse_question_batch(r#"{"text": "single object"}"#, "q").is_err());
    }

    #[test]
    fn action_content_requires_the_content_field() {
        let parsed = parse_action_content(
            r#"{"title": "Fractions Refresher", "description": "Revise halves.", "content": "Practice with rotis."}"#,
        )
        .unwrap();
        assert_eq!(parsed.title, "Fractions Refresher");
        assert_eq!(parsed.content, "Practice with rotis.");

        assert!(parse_action_content(r#"{"title": "No body"}"#).is_none());
        assert!(parse_action_content("garbage").is_none());
    }

    #[test]
    fn action_content_defaults_title_and_description() {
        let parsed = parse_action_content(r#"{"content": "Just the content."}"#).unwrap();
        assert_eq!(parsed.title, "Learning Task");
        assert_eq!(parsed.description, "Review this topic.");
    }

    #[test]
    fn fallback_quiz_is_a_single_acknowledgement() {
        let quiz = fallback_quiz();
        assert_eq!(quiz.len(), 1);
        assert_eq!(quiz[0].options.len(), 1);
        assert_eq!(quiz[0].correct_option_index, 0);
    }
}
