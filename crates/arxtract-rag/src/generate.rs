use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use arxtract_fetch::RateLimitedClient;

use crate::error::{RagError, Result};

/// Context window sizes for the models this pipeline has been run against.
/// A catalog of tested models, not of everything the backend can serve.
const CONTEXT_WINDOWS: &[(&str, usize)] = &[
    ("deepseek-r1", 131_072),
    ("llama3.1", 131_072),
    ("llama3.1:70b", 131_072),
    ("qwen3:32b", 40_960),
];

static THINK_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>\n*").unwrap());
static ANSWER_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\n\nAnswer: *").unwrap());

/// Produces a completion for a prompt. Backends decide transport; budget
/// enforcement and answer cleanup live in [`Generator`].
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;

    fn model(&self) -> &str;
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

/// Completion backend over the Ollama `/api/generate` endpoint.
pub struct OllamaGenerator {
    client: RateLimitedClient,
    base_url: String,
    model: String,
}

impl OllamaGenerator {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: RateLimitedClient::new(std::time::Duration::from_millis(0), 2, "arxtract/0.1"),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl GenerationService for OllamaGenerator {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
        };
        let url = format!("{}/api/generate", self.base_url);
        let response: OllamaResponse = self
            .client
            .post_json(&url, &request)
            .await
            .map_err(|e| RagError::Generation(e.to_string()))?;
        Ok(response.response)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Wraps a [`GenerationService`] with prompt budget enforcement and answer
/// cleanup. An over-budget or empty prompt yields an empty answer, never a
/// request to the backend.
pub struct Generator<'a> {
    backend: &'a dyn GenerationService,
}

impl<'a> Generator<'a> {
    pub fn new(backend: &'a dyn GenerationService) -> Self {
        Self { backend }
    }

    pub fn model(&self) -> &str {
        self.backend.model()
    }

    pub async fn generate(&self, prompt: &str) -> Result<String> {
        if prompt.is_empty() || !self.within_token_budget(prompt) {
            return Ok(String::new());
        }
        let raw = self.backend.complete(prompt).await?;
        Ok(clean_answer(&raw))
    }

    /// Whole-word token estimate against the model's context window. An
    /// unknown model cannot be budgeted, so prompting proceeds anyway.
    fn within_token_budget(&self, prompt: &str) -> bool {
        let model = self.backend.model();
        let Some(&(_, limit)) = CONTEXT_WINDOWS.iter().find(|(m, _)| *m == model) else {
            error!(%model, "no context window known for model, continuing with prompting anyways");
            return true;
        };
        let estimated = estimate_tokens(prompt);
        if estimated > limit {
            error!(
                estimated,
                limit, "prompt is too long for the context window"
            );
            return false;
        }
        true
    }
}

/// Rough token count: characters over four, the usual English-text ratio.
fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Strip any chain-of-thought block, then cut everything before an
/// "Answer:" marker and drop the marker itself. Answers without the marker
/// pass through unchanged.
fn clean_answer(raw: &str) -> String {
    let without_thinking = THINK_BLOCK.replace_all(raw, "");
    match ANSWER_MARKER.find(&without_thinking) {
        Some(m) => {
            let tail = &without_thinking[m.start()..];
            ANSWER_MARKER.replace_all(tail, "").to_string()
        }
        None => without_thinking.to_string(),
    }
}

/// Decode a structured answer into JSON values. A malformed answer is
/// logged and yields no values, matching the skip-and-continue policy for
/// per-document failures.
pub fn answer_to_values(answer: &str) -> Vec<serde_json::Value> {
    match serde_json::from_str(answer) {
        Ok(values) => values,
        Err(_) => {
            error!(%answer, "answer is not valid JSON, check the answer format");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedBackend {
        model: String,
        reply: String,
    }

    #[async_trait]
    impl GenerationService for FixedBackend {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.reply.clone())
        }

        fn model(&self) -> &str {
            &self.model
        }
    }

    fn backend(model: &str, reply: &str) -> FixedBackend {
        FixedBackend {
            model: model.to_string(),
            reply: reply.to_string(),
        }
    }

    #[test]
    fn thinking_blocks_are_stripped() {
        let raw = "<think>let me reason\nabout this</think>\n\nLaNiO2";
        assert_eq!(clean_answer(raw), "LaNiO2");
    }

    #[test]
    fn answer_marker_cuts_the_preamble() {
        let raw = "Some preamble text.\n\nAnswer: LaNiO2";
        assert_eq!(clean_answer(raw), "LaNiO2");
    }

    #[test]
    fn answers_without_marker_pass_through() {
        assert_eq!(clean_answer("just the formula"), "just the formula");
    }

    #[tokio::test]
    async fn over_budget_prompt_yields_an_empty_answer() {
        let backend = backend("qwen3:32b", "should never be returned");
        let generator = Generator::new(&backend);
        let huge_prompt = "x".repeat(40_961 * 4);
        let answer = generator.generate(&huge_prompt).await.unwrap();
        assert!(answer.is_empty());
    }

    #[tokio::test]
    async fn unknown_model_still_prompts() {
        let backend = backend("some-unknown-model", "the answer");
        let generator = Generator::new(&backend);
        let answer = generator.generate("a prompt").await.unwrap();
        assert_eq!(answer, "the answer");
    }

    #[tokio::test]
    async fn empty_prompt_is_not_sent() {
        let backend = backend("llama3.1", "should never be returned");
        let generator = Generator::new(&backend);
        let answer = generator.generate("").await.unwrap();
        assert!(answer.is_empty());
    }

    #[tokio::test]
    async fn within_budget_prompt_is_generated_and_cleaned() {
        let backend = backend("llama3.1", "<think>hmm</think>\n\nAnswer: SrTiO3");
        let generator = Generator::new(&backend);
        let answer = generator.generate("what is the formula?").await.unwrap();
        assert_eq!(answer, "SrTiO3");
    }

    #[test]
    fn valid_json_answers_decode_to_values() {
        let values = answer_to_values(r#"[{"method": "DFT"}]"#);
        assert_eq!(values.len(), 1);
        assert_eq!(values[0]["method"], "DFT");
    }

    #[test]
    fn invalid_json_answers_decode_to_nothing() {
        assert!(answer_to_values("LaNiO2").is_empty());
    }

    #[tokio::test]
    async fn ollama_backend_posts_and_decodes() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/api/generate")
            .with_status(200)
            .with_body(r#"{"response": "LaNiO2"}"#)
            .create_async()
            .await;

        let backend = OllamaGenerator::new(&server.url(), "llama3.1");
        let answer = backend.complete("what is the formula?").await.unwrap();
        assert_eq!(answer, "LaNiO2");
    }
}
