//! Backend abstraction for chat completions.
//!
//! The [`Backend`] trait decouples the conversation client from the actual
//! text-generation service. Tests use scripted backends that return
//! predetermined replies without touching the network.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::core::types::Message;
use crate::error::PipelineError;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Bodies longer than this are cut when quoted in transport errors.
const ERROR_BODY_LIMIT: usize = 512;

/// One chat-completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub temperature: f64,
    pub top_p: f64,
}

/// Candidate completions for one request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ChoiceMessage>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatResponse {
    /// Response with a single candidate whose content is `content`.
    pub fn single(content: impl Into<String>) -> Self {
        Self {
            choices: vec![Choice {
                message: Some(ChoiceMessage {
                    content: Some(content.into()),
                }),
            }],
        }
    }

    /// Content of the first candidate; `""` when there is none.
    pub fn first_content(&self) -> &str {
        self.choices
            .first()
            .and_then(|choice| choice.message.as_ref())
            .and_then(|message| message.content.as_deref())
            .unwrap_or("")
    }
}

/// A text-generation service: messages in, candidate completions out.
pub trait Backend {
    fn chat(&self, request: &ChatRequest<'_>) -> Result<ChatResponse>;
}

/// Backend that POSTs to an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiBackend {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl OpenAiBackend {
    /// `api_key` is sent as a bearer token when present.
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(None::<Duration>)
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Backend for OpenAiBackend {
    #[instrument(skip_all, fields(model = request.model, messages = request.messages.len()))]
    fn chat(&self, request: &ChatRequest<'_>) -> Result<ChatResponse> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .map_err(|err| PipelineError::Transport(format!("POST {}: {err}", self.endpoint)))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|err| PipelineError::Transport(format!("read response body: {err}")))?;

        if !status.is_success() {
            warn!(%status, "chat completion rejected");
            return Err(PipelineError::Transport(format!(
                "{status} from {}: {}",
                self.endpoint,
                clip(&body, ERROR_BODY_LIMIT)
            ))
            .into());
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|err| PipelineError::MalformedResponse(err.to_string()))?;
        debug!(choices = parsed.choices.len(), "chat completion received");
        Ok(parsed)
    }
}

fn clip(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
