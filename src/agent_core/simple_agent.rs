//! Simple responder: one persona-constrained model call, free-text output.
//!
//! This is the path of last resort, so `run` never fails. Callers that need
//! to know whether the model actually answered use `respond`.

use std::sync::Arc;

use crate::inference::capability::ModelCapability;
use crate::inference::errors::InferenceError;
use crate::inference::types::ChatMessage;

use super::prompts::{simple_prompt, simple_prompt_with_context};
use super::text::preview;

/// Returned when the model call fails or comes back blank.
pub const SIMPLE_FALLBACK_REPLY: &str = "Hello! How can I help you today?";

pub struct SimpleAgent {
    model: Arc<dyn ModelCapability>,
    persona: String,
}

impl SimpleAgent {
    pub fn new(model: Arc<dyn ModelCapability>, persona: impl Into<String>) -> Self {
        Self {
            model,
            persona: persona.into(),
        }
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    /// Exactly one model call. Errors and blank replies are surfaced.
    pub async fn respond(
        &self,
        utterance: &str,
        context: Option<&[ChatMessage]>,
    ) -> Result<String, InferenceError> {
        let messages = match context {
            Some(history) => simple_prompt_with_context(&self.persona, utterance, history),
            None => simple_prompt(&self.persona, utterance),
        };
        let reply = self.model.generate(&messages).await?;
        if reply.trim().is_empty() {
            return Err(InferenceError::EmptyCompletion {
                model: self.model.name().to_string(),
            });
        }
        tracing::info!(preview = %preview(&reply), "simple agent: replied");
        Ok(reply)
    }

    /// Like `respond`, but any failure becomes the canned greeting.
    pub async fn run(&self, utterance: &str, context: Option<&[ChatMessage]>) -> String {
        match self.respond(utterance, context).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "simple agent: falling back to canned reply");
                SIMPLE_FALLBACK_REPLY.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_core::test_support::{offline, ScriptedModel};
    use crate::inference::types::Role;

    #[tokio::test]
    async fn test_single_call_with_persona() {
        let model = Arc::new(ScriptedModel::new([Ok("Hi there!")]));
        let agent = SimpleAgent::new(model.clone(), "Relay");
        assert_eq!(agent.run("hi", None).await, "Hi there!");
        assert_eq!(model.calls(), 1);
        let prompt = &model.prompts()[0];
        assert_eq!(prompt[0].role, Role::System);
        assert!(prompt[0].content.contains("Relay"));
        assert_eq!(prompt[1].content, "hi");
    }

    #[tokio::test]
    async fn test_error_becomes_canned_reply() {
        let model = Arc::new(ScriptedModel::new([Err(offline())]));
        let agent = SimpleAgent::new(model, "Relay");
        assert_eq!(agent.run("hi", None).await, SIMPLE_FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_blank_reply_is_an_error() {
        let model = Arc::new(ScriptedModel::new([Ok("  ")]).named("chat"));
        let agent = SimpleAgent::new(model, "Relay");
        let err = agent.respond("hi", None).await.unwrap_err();
        assert!(matches!(err, InferenceError::EmptyCompletion { ref model } if model == "chat"));
    }

    #[tokio::test]
    async fn test_context_is_extended_with_utterance() {
        let model = Arc::new(ScriptedModel::new([Ok("Sure")]));
        let agent = SimpleAgent::new(model.clone(), "Relay");
        let history = vec![
            ChatMessage::system("You remember things."),
            ChatMessage::user("my name is Sam"),
            ChatMessage::assistant("Nice to meet you, Sam."),
        ];
        agent.run("what's my name?", Some(&history)).await;
        let prompt = &model.prompts()[0];
        assert_eq!(prompt.len(), 4);
        assert_eq!(prompt[0].content, "You remember things.");
        assert_eq!(prompt[3].content, "what's my name?");
    }
}
