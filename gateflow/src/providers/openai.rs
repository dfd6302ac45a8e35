//! OpenAI-compatible chat completion backends over direct HTTP.

use crate::config::ModelConfig;
use crate::core::{Decision, FlagValue, QUALITY_FLAG};
use crate::errors::{GenerationError, ValidationError};
use crate::stages::{Generator, Validator};
use crate::utils::{extract_json_object, remove_thinking_process};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::{transport_error, upstream_error};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// A system-prompted chat client shared by the generator and validator.
#[derive(Debug, Clone)]
struct ChatClient {
    client: Client,
    config: ModelConfig,
    instructions: String,
}

impl ChatClient {
    fn new(config: ModelConfig, instructions: String) -> Self {
        Self {
            client: Client::new(),
            config,
            instructions,
        }
    }

    async fn complete(&self, input: &str) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: &self.config.model_name,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &self.instructions,
                },
                ChatMessage {
                    role: "user",
                    content: input,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut builder = self
            .client
            .post(self.config.chat_completions_url())
            .json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        if let Some(timeout) = self.config.timeout {
            builder = builder.timeout(timeout);
        }

        debug!(model = %self.config.model_name, input_chars = input.chars().count(), "Sending chat completion");
        let response = builder.send().await.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Chat completion rejected");
            return Err(upstream_error(status.as_u16(), &body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::Malformed("response has no message content".into()))
    }
}

/// A [`Generator`] backed by a chat completions endpoint.
///
/// The stage input is sent as the user message under fixed system
/// instructions. Reasoning blocks are removed from the reply.
#[derive(Debug, Clone)]
pub struct ChatCompletionGenerator {
    chat: ChatClient,
}

impl ChatCompletionGenerator {
    /// Creates a generator for `config` with the given system instructions.
    #[must_use]
    pub fn new(config: ModelConfig, instructions: impl Into<String>) -> Self {
        Self {
            chat: ChatClient::new(config, instructions.into()),
        }
    }
}

#[async_trait]
impl Generator for ChatCompletionGenerator {
    async fn generate(&self, input: &str) -> Result<String, GenerationError> {
        let reply = self.chat.complete(input).await?;
        Ok(remove_thinking_process(&reply))
    }
}

/// A [`Validator`] that asks a chat model for a JSON decision.
#[derive(Debug, Clone)]
pub struct ChatDecisionValidator {
    chat: ChatClient,
    instructions: String,
    flags: Vec<String>,
    categories: Vec<(String, Vec<String>)>,
}

impl ChatDecisionValidator {
    /// Creates a validator that asks for `quality_acceptable` plus `flags`.
    #[must_use]
    pub fn new(
        config: ModelConfig,
        instructions: impl Into<String>,
        flags: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let mut validator = Self {
            chat: ChatClient::new(config, String::new()),
            instructions: instructions.into(),
            flags: flags.into_iter().map(Into::into).collect(),
            categories: Vec::new(),
        };
        validator.chat.instructions = validator.prompt();
        validator
    }

    /// Also asks for a categorical field restricted to `choices`.
    #[must_use]
    pub fn with_category(
        mut self,
        name: impl Into<String>,
        choices: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.categories
            .push((name.into(), choices.into_iter().map(Into::into).collect()));
        self.chat.instructions = self.prompt();
        self
    }

    /// Returns the boolean flags the model is asked to report.
    #[must_use]
    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    fn prompt(&self) -> String {
        format!(
            "{}\n\n{}",
            self.instructions,
            decision_format_hint(&self.flags, &self.categories)
        )
    }
}

#[async_trait]
impl Validator for ChatDecisionValidator {
    async fn validate(&self, output: &str) -> Result<Decision, ValidationError> {
        let reply = self
            .chat
            .complete(output)
            .await
            .map_err(|e| ValidationError::Backend(e.to_string()))?;
        parse_decision(&reply)
    }
}

fn decision_format_hint(flags: &[String], categories: &[(String, Vec<String>)]) -> String {
    let booleans = std::iter::once(QUALITY_FLAG)
        .chain(flags.iter().map(String::as_str))
        .map(|name| format!("\"{name}\": true|false"));
    let choices = categories.iter().map(|(name, choices)| {
        let options = choices
            .iter()
            .map(|c| format!("\"{c}\""))
            .collect::<Vec<_>>()
            .join("|");
        format!("\"{name}\": {options}")
    });
    let fields = booleans.chain(choices).collect::<Vec<_>>().join(", ");
    format!("Reply with only a JSON object of the form {{{fields}}}.")
}

/// Reads `true`/`false` from a JSON bool or a bool-like string.
fn as_bool(value: &serde_json::Value) -> Option<bool> {
    match value {
        serde_json::Value::Bool(b) => Some(*b),
        serde_json::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Parses a model reply into a [`Decision`].
///
/// The first JSON object in the reply is used. `quality_acceptable` (or
/// `good_quality`) must be boolean. Models often quote booleans, so the
/// strings `"true"`/`"false"` (and `"yes"`/`"no"`) are read as booleans
/// everywhere. Other string fields become categorical flags; anything else
/// is ignored.
///
/// # Errors
///
/// Returns [`ValidationError::Unparseable`] if there is no object or the
/// quality field is missing or not boolean.
pub fn parse_decision(reply: &str) -> Result<Decision, ValidationError> {
    let object = extract_json_object(reply)
        .ok_or_else(|| ValidationError::unparseable("reply contains no JSON object"))?;
    let value: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(&object).map_err(|e| ValidationError::unparseable(e.to_string()))?;

    let mut quality = None;
    let mut flags = BTreeMap::new();
    for (key, value) in value {
        if key == QUALITY_FLAG || key == "good_quality" {
            quality = as_bool(&value);
            continue;
        }
        if let Some(b) = as_bool(&value) {
            flags.insert(key, FlagValue::Bool(b));
        } else if let serde_json::Value::String(s) = value {
            flags.insert(key, FlagValue::Category(s));
        }
    }

    let quality_acceptable = quality.ok_or_else(|| {
        ValidationError::unparseable(format!("missing boolean '{QUALITY_FLAG}' in {object}"))
    })?;
    Ok(Decision {
        quality_acceptable,
        flags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> ModelConfig {
        ModelConfig::new(format!("{}/v1", server.uri()), "test-model")
            .with_api_key("sk-test")
            .with_temperature(0.5)
            .with_max_tokens(128)
    }

    fn reply(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
        }))
    }

    #[tokio::test]
    async fn test_generator_sends_system_and_user_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "test-model",
                "max_tokens": 128,
                "messages": [
                    { "role": "system", "content": "Write an outline." },
                    { "role": "user", "content": "robots" }
                ]
            })))
            .respond_with(reply("<think>hmm</think>\n\nAn outline."))
            .expect(1)
            .mount(&server)
            .await;

        let generator = ChatCompletionGenerator::new(config(&server), "Write an outline.");
        let output = generator.generate("robots").await.unwrap();

        assert_eq!(output, "An outline.");
    }

    #[tokio::test]
    async fn test_generator_maps_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let generator = ChatCompletionGenerator::new(config(&server), "x");
        let err = generator.generate("robots").await.unwrap_err();

        assert_eq!(
            err,
            GenerationError::Upstream {
                status: 503,
                body: "overloaded".into()
            }
        );
    }

    #[tokio::test]
    async fn test_generator_empty_choices_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let generator = ChatCompletionGenerator::new(config(&server), "x");
        let err = generator.generate("robots").await.unwrap_err();

        assert!(matches!(err, GenerationError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_generator_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply("late").set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let generator = ChatCompletionGenerator::new(
            config(&server).with_timeout(Duration::from_millis(50)),
            "x",
        );
        let err = generator.generate("robots").await.unwrap_err();

        assert!(matches!(err, GenerationError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_validator_parses_decision() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply(
                "```json\n{\"good_quality\": true, \"is_scifi\": false}\n```",
            ))
            .mount(&server)
            .await;

        let validator = ChatDecisionValidator::new(config(&server), "Judge it.", ["is_scifi"]);
        let decision = validator.validate("an outline").await.unwrap();

        assert!(decision.quality_acceptable);
        assert_eq!(decision.flag("is_scifi"), Some(false));
        assert_eq!(validator.flags(), ["is_scifi".to_string()]);
    }

    #[tokio::test]
    async fn test_validator_backend_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let validator = ChatDecisionValidator::new(config(&server), "Judge it.", ["is_scifi"]);
        let err = validator.validate("an outline").await.unwrap_err();

        assert!(matches!(err, ValidationError::Backend(_)));
    }

    #[test]
    fn test_parse_decision_flags() {
        let decision = parse_decision(
            r#"{"quality_acceptable": true, "is_scifi": true, "genre": "space opera", "score": 9}"#,
        )
        .unwrap();

        assert_eq!(decision.flag("is_scifi"), Some(true));
        assert_eq!(decision.category("genre"), Some("space opera"));
        assert_eq!(decision.flags.len(), 2);
    }

    #[test]
    fn test_parse_decision_rejects_prose() {
        assert!(matches!(
            parse_decision("Looks good to me!"),
            Err(ValidationError::Unparseable(_))
        ));
        assert!(matches!(
            parse_decision(r#"{"is_scifi": true}"#),
            Err(ValidationError::Unparseable(_))
        ));
    }

    #[test]
    fn test_format_hint_lists_flags() {
        let hint = decision_format_hint(&["is_scifi".to_string()], &[]);
        assert_eq!(
            hint,
            "Reply with only a JSON object of the form {\"quality_acceptable\": true|false, \"is_scifi\": true|false}."
        );
    }

    #[test]
    fn test_format_hint_lists_categories() {
        let categories = vec![(
            "language".to_string(),
            vec!["french".to_string(), "english".to_string()],
        )];
        let hint = decision_format_hint(&[], &categories);
        assert_eq!(
            hint,
            "Reply with only a JSON object of the form {\"quality_acceptable\": true|false, \"language\": \"french\"|\"english\"}."
        );
    }

    #[test]
    fn test_parse_decision_reads_quoted_booleans() {
        let decision =
            parse_decision(r#"{"quality_acceptable": "true", "is_scifi": "True", "dark": "no"}"#)
                .unwrap();

        assert!(decision.quality_acceptable);
        assert_eq!(decision.flag("is_scifi"), Some(true));
        assert_eq!(decision.flag("dark"), Some(false));
        assert!(decision.passes(&["is_scifi".to_string()]));
    }

    #[test]
    fn test_parse_decision_rejects_non_boolean_quality() {
        assert!(matches!(
            parse_decision(r#"{"quality_acceptable": "fine", "is_scifi": true}"#),
            Err(ValidationError::Unparseable(_))
        ));
    }

    #[tokio::test]
    async fn test_validator_asks_for_category() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "messages": [{
                    "role": "system",
                    "content": "Route it.\n\nReply with only a JSON object of the form {\"quality_acceptable\": true|false, \"language\": \"french\"|\"chinese\"}."
                }]
            })))
            .respond_with(reply(r#"{"quality_acceptable": true, "language": "chinese"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let validator = ChatDecisionValidator::new(config(&server), "Route it.", Vec::<String>::new())
            .with_category("language", ["french", "chinese"]);
        let decision = validator.validate("你好").await.unwrap();

        assert_eq!(decision.category("language"), Some("chinese"));
        assert!(validator.flags().is_empty());
    }
}
