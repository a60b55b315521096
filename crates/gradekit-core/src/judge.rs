//! Generative-AI judgment of an answer pair.
//!
//! The prompt asks for labelled `SCORE:` / `EXPLANATION:` / `MISSING CONCEPTS:`
//! output. Parsing falls back through the older bold-label format and never
//! fails: anything unparseable degrades to a zero score with the reason kept.

use std::sync::Arc;

use crate::error::ProviderError;
use crate::results::Judgment;
use crate::traits::{GenerateRequest, LlmProvider, DEFAULT_MAX_TOKENS};

const NO_EXPLANATION: &str = "No explanation provided.";
const NO_MISSING_CONCEPTS: &str = "None identified.";

/// Build the rubric prompt for one answer pair.
pub fn build_prompt(reference: &str, candidate: &str) -> String {
    format!(
        "I need you to evaluate the similarity between these two sentences:\n\n\
         CORRECT ANSWER: \"{reference}\"\n\n\
         STUDENT ANSWER: \"{candidate}\"\n\n\
         Please provide:\n\n\
         A semantic similarity score as a percentage from 0 to 100.\n\n\
         The score should reflect how much of the correct answer's meaning is captured \
         in the student's answer.\n\n\
         The score must increase gradually as the student includes more concepts or \
         ideas from the correct answer, this is partial scoring, not all-or-nothing.\n\n\
         Do not give high marks just because keywords are similar. Only increase marks \
         when the student expresses the correct ideas, even in different words.\n\n\
         If the student partially explains the correct answer, give a medium score \
         (e.g., 30-70%) depending on how much is covered.\n\n\
         If the meaning is mostly accurate, give a high score (e.g., 80-100%).\n\n\
         If the meaning is completely wrong or missing, then give a low score \
         (e.g., 0-20%).\n\n\
         A brief explanation focusing on what parts were correct and what concepts were \
         missing. Explain why the score was given, as if you're providing helpful, \
         constructive feedback to a student.\n\n\
         A list of the key missing concepts from the correct answer that the student did \
         not include or misunderstood.\n\n\
         Respond in exactly this format:\n\
         SCORE: <number from 0 to 100>\n\
         EXPLANATION: <your explanation>\n\
         MISSING CONCEPTS: <comma-separated concepts, or None>\n"
    )
}

/// Parse a judgment response. Never fails.
pub fn parse_judgment(text: &str) -> Judgment {
    let raw_score = extract_score(text);
    let (score, error) = match parse_score(&raw_score) {
        Ok(score) => (score, None),
        Err(e) => (0.0, Some(e)),
    };

    Judgment {
        score,
        explanation: extract_explanation(text),
        missing_concepts: extract_missing_concepts(text),
        full_response: text.to_string(),
        error,
    }
}

/// Text after `label`, up to `terminator` (or the end).
fn between<'a>(text: &'a str, label: &str, terminator: Option<&str>) -> Option<&'a str> {
    let start = text.find(label)? + label.len();
    let rest = &text[start..];
    let end = terminator.and_then(|t| rest.find(t)).unwrap_or(rest.len());
    Some(&rest[..end])
}

fn extract_score(text: &str) -> String {
    between(text, "SCORE:", Some("\n"))
        .or_else(|| between(text, "**Semantic Similarity Score:**", Some("%")))
        .or_else(|| between(text, "Semantic Similarity Score:", Some("%")))
        .unwrap_or("0")
        .to_string()
}

fn parse_score(raw: &str) -> Result<f64, String> {
    let cleaned = raw.trim().trim_matches('*').trim().trim_end_matches('%').trim();
    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value.clamp(0.0, 100.0)),
        _ => Err(format!("failed to parse score: {:?}", raw.trim())),
    }
}

fn extract_explanation(text: &str) -> String {
    let found = between(text, "EXPLANATION:", Some("MISSING CONCEPTS:"))
        .or_else(|| between(text, "**Explanation:**", Some("**Missing Concepts:**")));
    found.map_or_else(|| NO_EXPLANATION.to_string(), |e| e.trim().to_string())
}

fn extract_missing_concepts(text: &str) -> String {
    let found = between(text, "MISSING CONCEPTS:", None)
        .or_else(|| between(text, "**Missing Concepts:**", None));
    found.map_or_else(|| NO_MISSING_CONCEPTS.to_string(), |m| m.trim().to_string())
}

/// Asks a hosted model to judge answer pairs.
#[derive(Clone)]
pub struct Judge {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

impl Judge {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: 0.0,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Judge one pair. Provider failures become a zero-score judgment.
    pub async fn evaluate(&self, reference: &str, candidate: &str) -> Judgment {
        let request = GenerateRequest {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            ..GenerateRequest::text(&self.model, build_prompt(reference, candidate))
        };

        match self.provider.generate(&request).await {
            Ok(response) => {
                let judgment = parse_judgment(&response.content);
                if let Some(err) = &judgment.error {
                    tracing::warn!(model = %self.model, "{err}");
                }
                judgment
            }
            Err(e) => {
                match e.downcast_ref::<ProviderError>() {
                    Some(pe) if pe.is_configuration() => {
                        tracing::error!(provider = self.provider.name(), "judgment failed: {e:#}")
                    }
                    _ => tracing::warn!(provider = self.provider.name(), "judgment failed: {e:#}"),
                }
                Judgment::failed(format!("{e:#}"))
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedProvider;
    use super::*;

    #[test]
    fn prompt_contains_both_answers() {
        let prompt = build_prompt("plants make food", "plants eat soil");
        assert!(prompt.contains("CORRECT ANSWER: \"plants make food\""));
        assert!(prompt.contains("STUDENT ANSWER: \"plants eat soil\""));
        assert!(prompt.contains("SCORE:"));
        assert!(prompt.contains("MISSING CONCEPTS:"));
        assert!(prompt.contains("Do not give high marks just because keywords are similar."));
        assert!(prompt.contains("give a medium score (e.g., 30-70%)"));
        assert!(prompt.contains("give a high score (e.g., 80-100%)"));
        assert!(prompt.contains("give a low score (e.g., 0-20%)"));
        assert!(prompt.contains("helpful, constructive feedback to a student"));
    }

    #[test]
    fn parses_labelled_format() {
        let text = "SCORE: 72\nEXPLANATION: Mostly right but vague.\nMISSING CONCEPTS: hyperplane, margin";
        let j = parse_judgment(text);
        assert_eq!(j.score, 72.0);
        assert_eq!(j.explanation, "Mostly right but vague.");
        assert_eq!(j.missing_concepts, "hyperplane, margin");
        assert_eq!(j.full_response, text);
        assert!(j.error.is_none());
    }

    #[test]
    fn parses_bold_format() {
        let text = "**Semantic Similarity Score:** 45%\n\n**Explanation:** Half of it.\n\n**Missing Concepts:** labels";
        let j = parse_judgment(text);
        assert_eq!(j.score, 45.0);
        assert_eq!(j.explanation, "Half of it.");
        assert_eq!(j.missing_concepts, "labels");
    }

    #[test]
    fn parses_plain_similarity_label() {
        let j = parse_judgment("Semantic Similarity Score: 80% overall");
        assert_eq!(j.score, 80.0);
    }

    #[test]
    fn unlabelled_text_falls_back() {
        let j = parse_judgment("I think these are similar.");
        assert_eq!(j.score, 0.0);
        assert_eq!(j.explanation, NO_EXPLANATION);
        assert_eq!(j.missing_concepts, NO_MISSING_CONCEPTS);
        assert!(j.error.is_none());
    }

    #[test]
    fn empty_labels_stay_empty() {
        let j = parse_judgment("SCORE: 40\nEXPLANATION:\nMISSING CONCEPTS:");
        assert_eq!(j.score, 40.0);
        assert_eq!(j.explanation, "");
        assert_eq!(j.missing_concepts, "");
    }

    #[test]
    fn score_with_percent_and_asterisks() {
        assert_eq!(parse_judgment("SCORE: **85%**\n").score, 85.0);
    }

    #[test]
    fn non_numeric_score_is_zero_with_error() {
        let j = parse_judgment("SCORE: high\nEXPLANATION: good");
        assert_eq!(j.score, 0.0);
        assert!(j.error.as_deref().unwrap().contains("failed to parse score"));
        assert_eq!(j.explanation, "good");
    }

    #[test]
    fn score_is_clamped() {
        assert_eq!(parse_judgment("SCORE: 140").score, 100.0);
        assert_eq!(parse_judgment("SCORE: -5").score, 0.0);
    }

    #[tokio::test]
    async fn evaluate_parses_provider_reply() {
        let provider = ScriptedProvider::replying("SCORE: 90\nEXPLANATION: ok\nMISSING CONCEPTS: None");
        let judge = Judge::new(provider.clone(), "test-model");
        let j = judge.evaluate("a", "b").await;
        assert_eq!(j.score, 90.0);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn evaluate_absorbs_provider_errors() {
        let judge = Judge::new(ScriptedProvider::failing(), "test-model");
        let j = judge.evaluate("a", "b").await;
        assert_eq!(j.score, 0.0);
        assert!(j.explanation.starts_with("Error: "));
        assert!(j.explanation.contains("connection refused"));
        assert_eq!(j.missing_concepts, "Evaluation failed");
        assert_eq!(j.full_response, "Error occurred");
    }
}
