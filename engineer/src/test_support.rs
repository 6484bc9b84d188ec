//! Test-only fakes: a scripted backend, a scripted operator, and a scratch project.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use anyhow::{Result, anyhow};
use tempfile::TempDir;

use crate::core::types::Message;
use crate::error::PipelineError;
use crate::io::backend::{Backend, ChatRequest, ChatResponse};
use crate::io::cancel::CancelToken;
use crate::io::console::Console;
use crate::io::conversation::Ai;
use crate::io::preprompts::BUILTIN;
use crate::io::project::ProjectPaths;
use crate::io::store::Stores;
use crate::steps::StepContext;

/// A request as the backend saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub messages: Vec<Message>,
}

enum Scripted {
    Reply(ChatResponse),
    Fail(String),
}

#[derive(Default)]
struct BackendState {
    script: VecDeque<Scripted>,
    requests: Vec<RecordedRequest>,
}

/// Backend that replays queued responses and records every request.
///
/// Clones share the same queue and log, so a test can keep one handle while
/// the client owns another.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    state: Rc<RefCell<BackendState>>,
}

impl ScriptedBackend {
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backend = Self::default();
        for reply in replies {
            backend.push_reply(reply);
        }
        backend
    }

    pub fn push_reply(&self, content: impl Into<String>) {
        self.push_response(ChatResponse::single(content));
    }

    pub fn push_response(&self, response: ChatResponse) {
        self.state
            .borrow_mut()
            .script
            .push_back(Scripted::Reply(response));
    }

    /// Queue a transport failure carrying `message`.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.state
            .borrow_mut()
            .script
            .push_back(Scripted::Fail(message.into()));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.borrow().requests.clone()
    }

    pub fn calls(&self) -> usize {
        self.state.borrow().requests.len()
    }

    /// Replies still queued.
    pub fn remaining(&self) -> usize {
        self.state.borrow().script.len()
    }
}

impl Backend for ScriptedBackend {
    fn chat(&self, request: &ChatRequest<'_>) -> Result<ChatResponse> {
        let mut state = self.state.borrow_mut();
        state.requests.push(RecordedRequest {
            model: request.model.to_string(),
            temperature: request.temperature,
            top_p: request.top_p,
            messages: request.messages.to_vec(),
        });
        match state.script.pop_front() {
            Some(Scripted::Reply(response)) => Ok(response),
            Some(Scripted::Fail(message)) => Err(PipelineError::Transport(message).into()),
            None => Err(anyhow!("scripted backend has no reply left")),
        }
    }
}

#[derive(Default)]
struct ConsoleState {
    answers: VecDeque<String>,
    output: Vec<String>,
    prompts: Vec<String>,
}

/// Operator that answers from a queue and records everything printed.
///
/// Once the queue is empty every question reads as end of input.
#[derive(Clone, Default)]
pub struct ScriptedConsole {
    state: Rc<RefCell<ConsoleState>>,
}

impl ScriptedConsole {
    pub fn with_answers<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let console = Self::default();
        console
            .state
            .borrow_mut()
            .answers
            .extend(answers.into_iter().map(Into::into));
        console
    }

    /// Every `say` line, in order.
    pub fn output(&self) -> Vec<String> {
        self.state.borrow().output.clone()
    }

    /// Every `ask` prompt, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.state.borrow().prompts.clone()
    }

    pub fn printed(&self, needle: &str) -> bool {
        self.state
            .borrow()
            .output
            .iter()
            .any(|line| line.contains(needle))
    }
}

impl Console for ScriptedConsole {
    fn say(&self, text: &str) {
        self.state.borrow_mut().output.push(text.to_string());
    }

    fn ask(&self, prompt: &str) -> Result<Option<String>> {
        let mut state = self.state.borrow_mut();
        state.prompts.push(prompt.to_string());
        Ok(state.answers.pop_front())
    }
}

/// Scratch project directory wired to scripted collaborators.
///
/// Preprompts are stubbed with their upper-cased name (`qa` reads `QA`) so
/// tests can spot them in recorded requests.
pub struct TestProject {
    _temp: TempDir,
    pub paths: ProjectPaths,
    pub stores: Stores,
    pub backend: ScriptedBackend,
    pub console: ScriptedConsole,
    pub ai: Ai,
    pub cancel: CancelToken,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        Self::with_console(ScriptedConsole::default())
    }

    pub fn with_console(console: ScriptedConsole) -> Result<Self> {
        let temp = tempfile::tempdir()?;
        let paths = ProjectPaths::new(temp.path().join("project"), "");
        let stores = paths.stores();
        for (name, _) in BUILTIN {
            stores.preprompts.set(name, &name.to_uppercase())?;
        }
        let backend = ScriptedBackend::default();
        let ai = Ai::new(
            Box::new(backend.clone()),
            "gpt-test",
            0.1,
            Rc::new(console.clone()),
        );
        Ok(Self {
            _temp: temp,
            paths,
            stores,
            backend,
            console,
            ai,
            cancel: CancelToken::manual(),
        })
    }

    /// Write the operator's `prompt` file.
    pub fn with_prompt(self, prompt: &str) -> Result<Self> {
        self.stores.input.set("prompt", prompt)?;
        Ok(self)
    }

    pub fn context(&self) -> StepContext<'_> {
        StepContext {
            ai: &self.ai,
            stores: &self.stores,
            console: &self.console,
            cancel: &self.cancel,
        }
    }

    /// System prompt the code-generating steps build from the stubbed preprompts.
    pub fn setup_prompt() -> &'static str {
        "GENERATE\nUseful to know:\nPHILOSOPHY"
    }
}
