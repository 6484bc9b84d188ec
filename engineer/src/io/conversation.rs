//! Conversation client: threads a transcript through one backend.

use std::rc::Rc;

use anyhow::Result;
use tracing::{debug, instrument, trace};

use crate::core::types::{Message, Transcript};
use crate::io::backend::{Backend, ChatRequest};
use crate::io::console::Console;

/// Nucleus sampling mass sent with every request.
pub const TOP_P: f64 = 1.0;

/// A model, a sampling temperature and the backend that serves them.
///
/// Every reply is echoed to the operator console as it arrives.
pub struct Ai {
    backend: Box<dyn Backend>,
    model: String,
    temperature: f64,
    console: Rc<dyn Console>,
}

impl Ai {
    pub fn new(
        backend: Box<dyn Backend>,
        model: impl Into<String>,
        temperature: f64,
        console: Rc<dyn Console>,
    ) -> Self {
        Self {
            backend,
            model: model.into(),
            temperature,
            console,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Open a conversation with one system and one user message.
    pub fn start(&self, system: &str, user: &str) -> Result<Transcript> {
        let transcript = Transcript::from(vec![Message::system(system), Message::user(user)]);
        self.next(transcript, None)
    }

    /// Append `prompt` (when non-empty) as a user message, send the whole
    /// transcript, and append the first candidate's reply.
    #[instrument(skip_all, fields(model = %self.model, messages = transcript.len()))]
    pub fn next(&self, mut transcript: Transcript, prompt: Option<&str>) -> Result<Transcript> {
        if let Some(text) = prompt.filter(|text| !text.is_empty()) {
            transcript.push(Message::user(text));
        }

        debug!(
            temperature = self.temperature,
            messages = transcript.len(),
            "creating chat completion"
        );
        trace!(transcript = ?transcript, "request transcript");

        let request = ChatRequest {
            model: &self.model,
            messages: transcript.messages(),
            temperature: self.temperature,
            top_p: TOP_P,
        };
        let response = self.backend.chat(&request)?;
        let content = response.first_content().to_string();

        self.console.say("");
        self.console.say(&content);

        transcript.push(Message::assistant(content));
        trace!(transcript = ?transcript, "chat completion finished");
        Ok(transcript)
    }
}
