//! Session context: the seam to an external memory/history store.
//!
//! The pipeline never manages sessions itself. A `ContextAssembler` turns a
//! session reference and a new utterance into a ready-made message list;
//! the orchestrator hands that list to whichever agent handles the turn.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::inference::types::ChatMessage;

use super::errors::ContextError;

pub const DEFAULT_USER_ID: &str = "default_user";

/// Identifies whose history to load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionRef {
    pub session_id: String,
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

fn default_user_id() -> String {
    DEFAULT_USER_ID.to_string()
}

impl SessionRef {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: default_user_id(),
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }
}

#[async_trait]
pub trait ContextAssembler: Send + Sync {
    /// Prior turns plus the new utterance, led by `system_prompt`.
    async fn assemble(
        &self,
        system_prompt: &str,
        session: &SessionRef,
        utterance: &str,
    ) -> Result<Vec<ChatMessage>, ContextError>;

    /// Store a completed turn. Stores that are fed elsewhere can ignore this.
    async fn record_turn(
        &self,
        _session: &SessionRef,
        _utterance: &str,
        _reply: &str,
    ) -> Result<(), ContextError> {
        Ok(())
    }
}

// ─── In-Memory History ──────────────────────────────────────────────────────

/// Process-local rolling history, capped per session.
pub struct InMemoryHistory {
    max_messages: usize,
    sessions: Mutex<HashMap<SessionRef, Vec<ChatMessage>>>,
}

impl InMemoryHistory {
    pub fn new(max_messages: usize) -> Self {
        Self {
            max_messages,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self, session: &SessionRef) -> usize {
        self.sessions
            .lock()
            .map(|s| s.get(session).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

impl Default for InMemoryHistory {
    fn default() -> Self {
        Self::new(20)
    }
}

#[async_trait]
impl ContextAssembler for InMemoryHistory {
    async fn assemble(
        &self,
        system_prompt: &str,
        session: &SessionRef,
        utterance: &str,
    ) -> Result<Vec<ChatMessage>, ContextError> {
        let sessions = self.sessions.lock().map_err(|_| ContextError::Unavailable {
            reason: "history lock poisoned".to_string(),
        })?;

        let mut messages = vec![ChatMessage::system(system_prompt)];
        if let Some(turns) = sessions.get(session) {
            messages.extend(turns.iter().cloned());
        }
        messages.push(ChatMessage::user(utterance));
        Ok(messages)
    }

    async fn record_turn(
        &self,
        session: &SessionRef,
        utterance: &str,
        reply: &str,
    ) -> Result<(), ContextError> {
        let mut sessions = self.sessions.lock().map_err(|_| ContextError::Unavailable {
            reason: "history lock poisoned".to_string(),
        })?;

        let turns = sessions.entry(session.clone()).or_default();
        turns.push(ChatMessage::user(utterance));
        turns.push(ChatMessage::assistant(reply));
        if turns.len() > self.max_messages {
            let excess = turns.len() - self.max_messages;
            turns.drain(..excess);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::types::Role;

    #[test]
    fn test_session_ref_default_user() {
        let s = SessionRef::new("abc");
        assert_eq!(s.user_id, "default_user");
        let parsed: SessionRef = serde_json::from_str(r#"{"session_id":"abc"}"#).unwrap();
        assert_eq!(parsed, s);
        assert_eq!(s.with_user("u1").user_id, "u1");
    }

    #[tokio::test]
    async fn test_in_memory_history_roundtrip() {
        let history = InMemoryHistory::default();
        let session = SessionRef::new("s1");

        let first = history.assemble("sys", &session, "hello").await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].role, Role::System);

        history.record_turn(&session, "hello", "hi!").await.unwrap();
        let second = history.assemble("sys", &session, "again").await.unwrap();
        let contents: Vec<&str> = second.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["sys", "hello", "hi!", "again"]);
    }

    #[tokio::test]
    async fn test_in_memory_history_is_capped_and_isolated() {
        let history = InMemoryHistory::new(4);
        let a = SessionRef::new("a");
        let b = SessionRef::new("b");
        for i in 0..3 {
            history
                .record_turn(&a, &format!("q{i}"), &format!("r{i}"))
                .await
                .unwrap();
        }
        assert_eq!(history.len(&a), 4);
        assert_eq!(history.len(&b), 0);
        let msgs = history.assemble("sys", &a, "next").await.unwrap();
        assert_eq!(msgs[1].content, "q1");
    }
}
