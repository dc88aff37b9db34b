//! OpenAiGenerationService - `GenerationService` over the Chat Completions API.
//!
//! Works against api.openai.com or any server exposing the same
//! `/chat/completions` route. Configuration priority: secret.json >
//! environment variables.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use sentimental_core::config::{DEFAULT_OPENAI_MODEL, GenerationSettings, SecretConfig};
use sentimental_core::generation::{
    DerivedFormat, DerivedStory, GenerationService, Requester, with_system_prompt,
};
use sentimental_core::session::ConversationMessage;
use sentimental_core::story::{
    FormatPayload, SONG, Story, extract_song_title, recover_story_draft_with_tier,
};
use sentimental_core::{Result, SentimentalError};

use crate::prompts::{STORY_SYSTEM_PROMPT, format_system_prompt, render_transcript};

/// `GenerationService` backed by an OpenAI-compatible HTTP API.
#[derive(Clone)]
pub struct OpenAiGenerationService {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    system_prompt: String,
}

impl OpenAiGenerationService {
    /// Creates a service with the provided API key and model against the
    /// default base url.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let defaults = GenerationSettings::default();
        Self {
            client: Client::new(),
            base_url: defaults.base_url,
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: Some(defaults.max_tokens),
            temperature: Some(defaults.temperature),
            system_prompt: defaults.system_prompt,
        }
    }

    /// Builds the service from `[generation]` settings and loaded secrets.
    ///
    /// Model priority: `[generation] model` > `secret.json` model_name >
    /// `gpt-3.5-turbo`.
    pub fn from_config(settings: &GenerationSettings, secrets: &SecretConfig) -> Result<Self> {
        let openai = secrets
            .openai
            .as_ref()
            .filter(|openai| !openai.api_key.trim().is_empty())
            .ok_or_else(|| {
                SentimentalError::config(
                    "OpenAI API key not found in secret.json or OPENAI_API_KEY",
                )
            })?;

        let model = settings
            .model
            .clone()
            .or_else(|| openai.model_name.clone())
            .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());

        Ok(Self::new(openai.api_key.clone(), model)
            .with_base_url(settings.base_url.clone())
            .with_max_tokens(settings.max_tokens)
            .with_temperature(settings.temperature)
            .with_system_prompt(settings.system_prompt.clone()))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Persona used by `chat` when the transcript has no system turn.
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                SentimentalError::network(format!("OpenAI API request failed: {err}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read OpenAI error body".to_string());
            return Err(map_http_error(status, &body_text));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|err| {
            SentimentalError::generation(format!("Failed to parse OpenAI response: {err}"))
        })?;

        extract_text_response(parsed)
    }
}

#[async_trait]
impl GenerationService for OpenAiGenerationService {
    async fn chat(
        &self,
        messages: &[ConversationMessage],
        _requester: Requester<'_>,
    ) -> Result<String> {
        let messages = with_system_prompt(messages, &self.system_prompt)
            .iter()
            .map(ChatMessage::from)
            .collect();
        self.complete(messages).await
    }

    async fn derive_story(
        &self,
        conversation: &[ConversationMessage],
        _requester: Requester<'_>,
    ) -> Result<DerivedStory> {
        let transcript = render_transcript(conversation);
        if transcript.trim().is_empty() {
            return Err(SentimentalError::validation(
                "Cannot create a story from an empty conversation",
            ));
        }

        let raw = self
            .complete(vec![
                ChatMessage::new("system", STORY_SYSTEM_PROMPT),
                ChatMessage::new("user", transcript),
            ])
            .await?;

        let (draft, tier) = recover_story_draft_with_tier(&raw);
        tracing::debug!("Recovered story draft via {:?}", tier);
        if draft.text.trim().is_empty() {
            return Err(SentimentalError::generation("The model returned an empty story"));
        }
        Ok(DerivedStory::Draft(draft))
    }

    async fn derive_format(
        &self,
        story: &Story,
        format_type: &str,
        _requester: Requester<'_>,
    ) -> Result<DerivedFormat> {
        let raw = self
            .complete(vec![
                ChatMessage::new("system", format_system_prompt(format_type)),
                ChatMessage::new("user", story.content.as_str()),
            ])
            .await?;

        let content = raw.trim().to_string();
        let payload = if format_type == SONG {
            let title = extract_song_title(&content);
            FormatPayload::titled(content, title)
        } else {
            FormatPayload::text(content)
        };
        Ok(DerivedFormat::unsaved(payload))
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

impl From<&ConversationMessage> for ChatMessage {
    fn from(message: &ConversationMessage) -> Self {
        Self::new(message.role.as_str(), message.content.clone())
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn extract_text_response(response: ChatCompletionResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| SentimentalError::generation("OpenAI API returned no content in the response"))
}

fn map_http_error(status: StatusCode, body: &str) -> SentimentalError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or_else(|_| body.to_string());

    let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
    if retryable {
        SentimentalError::network(format!("OpenAI API {}: {}", status.as_u16(), message))
    } else {
        SentimentalError::generation(format!("OpenAI API {}: {}", status.as_u16(), message))
    }
}
