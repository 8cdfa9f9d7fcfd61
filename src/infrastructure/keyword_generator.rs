use std::{collections::HashSet, sync::Arc};

use anyhow::Context;
use log::info;
use serde::Deserialize;

use crate::{ChatMessage, ChatModel, KeywordError, StdResult};

/// The instructions sent with every keyword prompt.
pub const KEYWORDS_SYSTEM_PROMPT: &str = "I'm working on a project where I need keywords that refer to digital twins. You give each keyword separately in a json format. Like this:\n ```json\n{ \n\"keywords\": [\n    \"digital twin\",\n    \"digital model\"\n  ]}\n```\n Give the maximum keywords possible. Give solely the json text code.";

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";
const FENCE: &str = "```";

#[derive(Deserialize, Debug)]
struct KeywordsDocument {
    keywords: Vec<String>,
}

/// Removes every complete reasoning block from a chat answer.
fn strip_reasoning(text: &str) -> String {
    let mut remaining = text;
    let mut stripped = String::with_capacity(text.len());
    while let Some(start) = remaining.find(THINK_OPEN) {
        let Some(length) = remaining[start..].find(THINK_CLOSE) else {
            break;
        };
        stripped.push_str(&remaining[..start]);
        remaining = &remaining[start + length + THINK_CLOSE.len()..];
    }
    stripped.push_str(remaining);

    stripped
}

/// Returns the body of the first fenced block, or the whole text when there is none.
fn fenced_body(text: &str) -> Result<&str, KeywordError> {
    let Some(start) = text.find(FENCE) else {
        return Ok(text.trim());
    };
    let after_fence = &text[start + FENCE.len()..];
    // The rest of the opening line is the info string, e.g. `json`.
    let body_start = after_fence.find('\n').ok_or(KeywordError::Empty)? + 1;
    let body = &after_fence[body_start..];
    let end = body.find(FENCE).ok_or(KeywordError::Empty)?;

    Ok(body[..end].trim())
}

/// Extracts the keyword list of a chat answer.
///
/// The answer must hold a `{"keywords": [...]}` document, optionally inside a fenced
/// block and after reasoning blocks. Anything else is an error.
pub fn parse_keywords(answer: &str) -> Result<Vec<String>, KeywordError> {
    let answer = strip_reasoning(answer);
    let body = fenced_body(&answer)?;
    if body.is_empty() {
        return Err(KeywordError::Empty);
    }
    let document: KeywordsDocument = serde_json::from_str(body)?;

    Ok(document.keywords)
}

/// Lower-cases, trims and deduplicates keywords, keeping the first occurrence order.
pub fn normalize_keywords(existing: &[String], generated: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();

    existing
        .iter()
        .chain(generated)
        .map(|keyword| keyword.trim().to_lowercase())
        .filter(|keyword| !keyword.is_empty())
        .filter(|keyword| seen.insert(keyword.clone()))
        .collect()
}

/// Creates the prompt asking for keywords related to a seed.
pub fn keyword_prompt(seed: &str) -> String {
    format!("Give keywords relative to the word:\n{seed}")
}

/// Asks a chat model for keywords related to seed keywords.
pub struct KeywordGenerator {
    model: Arc<dyn ChatModel>,
    system_prompt: String,
}

impl KeywordGenerator {
    /// Creates a new `KeywordGenerator` with the default system prompt.
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            system_prompt: KEYWORDS_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Generates the keywords of every seed, in seed order.
    pub async fn generate(&self, seeds: &[String]) -> StdResult<Vec<String>> {
        let mut keywords = vec![];
        for seed in seeds {
            let messages = [
                ChatMessage::system(&self.system_prompt),
                ChatMessage::user(&keyword_prompt(seed)),
            ];
            let answer = self
                .model
                .chat(&messages)
                .await
                .with_context(|| format!("Chat request failed for '{seed}'"))?;
            let generated = parse_keywords(&answer)
                .with_context(|| format!("Unusable keywords answer for '{seed}'"))?;
            info!("Generated {} keywords for '{seed}'", generated.len());
            keywords.extend(generated);
        }

        Ok(keywords)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use crate::MockChatModel;

    use super::*;

    #[test]
    fn parse_keywords_from_fenced_answer_with_reasoning() {
        let answer = "<think>\nThe user wants ```json``` keywords.\n</think>\n\n```json\n{\n  \"keywords\": [\"digital twin\", \"Digital Model\"]\n}\n```";

        let keywords = parse_keywords(answer).unwrap();

        assert_eq!(vec!["digital twin", "Digital Model"], keywords);
    }

    #[test]
    fn parse_keywords_from_bare_json() {
        let keywords = parse_keywords("{\"keywords\": [\"simulation model\"]}").unwrap();

        assert_eq!(vec!["simulation model"], keywords);
    }

    #[test]
    fn parse_keywords_from_answer_starting_with_fence() {
        let keywords = parse_keywords("```\n{\"keywords\": [\"iot\"]}\n```").unwrap();

        assert_eq!(vec!["iot"], keywords);
    }

    #[test]
    fn parse_keywords_fails_without_keywords_array() {
        let error = parse_keywords("```json\n{\"terms\": [\"iot\"]}\n```")
            .expect_err("Missing keywords should fail");

        assert!(matches!(error, KeywordError::Schema(_)));
    }

    #[test]
    fn parse_keywords_fails_on_free_text() {
        parse_keywords("Here are some keywords: digital twin, simulation")
            .expect_err("Free text should fail");
        assert!(matches!(
            parse_keywords("<think>only reasoning</think>"),
            Err(KeywordError::Empty)
        ));
        assert!(matches!(
            parse_keywords("```json\n{\"keywords\": []}"),
            Err(KeywordError::Empty)
        ));
    }

    #[test]
    fn normalize_keywords_deduplicates_case_insensitively() {
        let existing = vec!["Digital Twin".to_string()];
        let generated = vec![
            "digital twin".to_string(),
            " IoT ".to_string(),
            "".to_string(),
            "iot".to_string(),
        ];

        assert_eq!(
            vec!["digital twin", "iot"],
            normalize_keywords(&existing, &generated)
        );
    }

    #[tokio::test]
    async fn generate_collects_keywords_of_every_seed() {
        let model = {
            let mut model = MockChatModel::new();
            model
                .expect_chat()
                .withf(|messages| {
                    messages.len() == 2
                        && messages[0].role == "system"
                        && messages[1].content == "Give keywords relative to the word:\ndigital twins"
                })
                .returning(|_| Ok("```json\n{\"keywords\": [\"twin\"]}\n```".to_string()))
                .times(1);
            model
                .expect_chat()
                .returning(|_| Ok("{\"keywords\": [\"iot\", \"sensor\"]}".to_string()))
                .times(1);

            model
        };
        let generator = KeywordGenerator::new(Arc::new(model));

        let keywords = generator
            .generate(&["digital twins".to_string(), "Internet of Things".to_string()])
            .await
            .unwrap();

        assert_eq!(vec!["twin", "iot", "sensor"], keywords);
    }

    #[tokio::test]
    async fn generate_fails_closed_on_unusable_answer() {
        let model = {
            let mut model = MockChatModel::new();
            model
                .expect_chat()
                .returning(|_| Ok("I cannot help with that".to_string()))
                .times(1);

            model
        };
        let generator = KeywordGenerator::new(Arc::new(model));

        generator
            .generate(&["digital twins".to_string()])
            .await
            .expect_err("Unusable answer should fail");
    }

    #[tokio::test]
    async fn generate_propagates_chat_failures() {
        let model = {
            let mut model = MockChatModel::new();
            model
                .expect_chat()
                .returning(|_| Err(anyhow!("connection refused")))
                .times(1);

            model
        };
        let generator = KeywordGenerator::new(Arc::new(model));

        generator
            .generate(&["digital twins".to_string()])
            .await
            .expect_err("Chat failure should propagate");
    }
}
