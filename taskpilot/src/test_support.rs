//! Scripted fakes for the three I/O seams, used across unit and
//! integration tests. Single-threaded (RefCell, not Mutex): the engine is
//! strictly sequential.

use std::cell::RefCell;
use std::collections::VecDeque;

use anyhow::{Result, anyhow};

use crate::io::completion::{CompletionClient, CompletionRequest};
use crate::io::console::Console;
use crate::io::process::{CommandOutput, CommandRunner, RunRequest};

/// One scripted completion reply.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    /// Simulates an HTTP/transport failure.
    TransportError(String),
}

/// Completion client that replays a fixed reply sequence and records every
/// request it saw.
pub struct ScriptedCompletion {
    replies: RefCell<VecDeque<ScriptedReply>>,
    calls: RefCell<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn with_replies(replies: Vec<String>) -> Self {
        Self::new(replies.into_iter().map(ScriptedReply::Text).collect())
    }

    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.borrow().clone()
    }
}

impl CompletionClient for ScriptedCompletion {
    fn generate(&self, request: &CompletionRequest) -> Result<String> {
        self.calls.borrow_mut().push(request.clone());
        match self.replies.borrow_mut().pop_front() {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::TransportError(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("scripted completion exhausted")),
        }
    }
}

/// Command runner that replays fixed outputs and records every request.
pub struct ScriptedRunner {
    outputs: RefCell<VecDeque<CommandOutput>>,
    requests: RefCell<Vec<RunRequest>>,
    spawn_error: Option<String>,
}

impl ScriptedRunner {
    pub fn new(outputs: Vec<CommandOutput>) -> Self {
        Self {
            outputs: RefCell::new(outputs.into()),
            requests: RefCell::new(Vec::new()),
            spawn_error: None,
        }
    }

    /// Runner whose every invocation fails to spawn.
    pub fn failing(message: &str) -> Self {
        Self {
            outputs: RefCell::new(VecDeque::new()),
            requests: RefCell::new(Vec::new()),
            spawn_error: Some(message.to_string()),
        }
    }

    pub fn requests(&self) -> Vec<RunRequest> {
        self.requests.borrow().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, request: &RunRequest) -> Result<CommandOutput> {
        self.requests.borrow_mut().push(request.clone());
        if let Some(message) = &self.spawn_error {
            return Err(anyhow!(message.clone()));
        }
        self.outputs
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted runner exhausted"))
    }
}

/// Console that replays scripted confirm/input answers and records
/// everything shown to the user.
pub struct ScriptedConsole {
    confirms: RefCell<VecDeque<bool>>,
    inputs: RefCell<VecDeque<String>>,
    prompts: RefCell<Vec<String>>,
    said: RefCell<Vec<String>>,
}

impl Default for ScriptedConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedConsole {
    pub fn new() -> Self {
        Self {
            confirms: RefCell::new(VecDeque::new()),
            inputs: RefCell::new(VecDeque::new()),
            prompts: RefCell::new(Vec::new()),
            said: RefCell::new(Vec::new()),
        }
    }

    pub fn with_confirms(self, confirms: Vec<bool>) -> Self {
        *self.confirms.borrow_mut() = confirms.into();
        self
    }

    pub fn with_inputs(self, inputs: Vec<String>) -> Self {
        *self.inputs.borrow_mut() = inputs.into();
        self
    }

    /// Every confirm/input prompt shown, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    /// Every `say` line, in order.
    pub fn said(&self) -> Vec<String> {
        self.said.borrow().clone()
    }
}

impl Console for ScriptedConsole {
    fn confirm(&self, prompt: &str, _default_yes: bool) -> Result<bool> {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.confirms
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted confirm exhausted: {prompt}"))
    }

    fn input(&self, prompt: &str) -> Result<String> {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.inputs
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted input exhausted: {prompt}"))
    }

    fn say(&self, text: &str) {
        self.said.borrow_mut().push(text.to_string());
    }
}
