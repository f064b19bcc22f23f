//! Scripted model capability for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::inference::capability::ModelCapability;
use crate::inference::errors::InferenceError;
use crate::inference::types::ChatMessage;

/// Replays canned responses in order and records every prompt it receives.
///
/// Once the script runs out every further call fails with a stream error, so
/// an unexpected extra call shows up as a failing assertion rather than a hang.
pub(crate) struct ScriptedModel {
    name: String,
    script: Mutex<VecDeque<Result<String, InferenceError>>>,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub(crate) fn new<'a, I>(script: I) -> Self
    where
        I: IntoIterator<Item = Result<&'a str, InferenceError>>,
    {
        Self {
            name: "scripted".to_string(),
            script: Mutex::new(script.into_iter().map(|r| r.map(str::to_string)).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A model that must never be called.
    pub(crate) fn silent() -> Self {
        Self::new(none())
    }

    pub(crate) fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub(crate) fn prompts(&self) -> Vec<Vec<ChatMessage>> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelCapability for ScriptedModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, InferenceError> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(InferenceError::StreamError {
                    reason: format!("{}: script exhausted", self.name),
                })
            })
    }
}

/// An empty script.
pub(crate) fn none() -> Vec<Result<&'static str, InferenceError>> {
    Vec::new()
}

/// Shorthand for a transport failure in scripts.
pub(crate) fn offline() -> InferenceError {
    InferenceError::ConnectionFailed {
        endpoint: "http://scripted".to_string(),
        reason: "offline".to_string(),
    }
}
