//! Chat service: request validation and the response envelope around one
//! orchestrator turn.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::context::SessionRef;
use super::errors::ServiceError;
use super::orchestrator::Orchestrator;
use super::text::char_len;
use super::types::{Reply, Route};

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub response: String,
    /// Agent that produced `response`; `None` for the apology.
    pub route: Option<Route>,
    /// True when a fallback tier answered.
    pub degraded: bool,
    pub session_id: Option<String>,
    pub request_id: String,
    pub execution_time_secs: f64,
    pub completed_at: DateTime<Utc>,
}

pub struct ChatService {
    orchestrator: Arc<Orchestrator>,
    max_message_length: usize,
}

impl ChatService {
    pub fn new(orchestrator: Arc<Orchestrator>, max_message_length: usize) -> Self {
        Self {
            orchestrator,
            max_message_length,
        }
    }

    /// Trimmed message, or why it was rejected.
    pub fn validate_message<'m>(&self, message: &'m str) -> Result<&'m str, ServiceError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ServiceError::EmptyMessage);
        }
        if char_len(message) > self.max_message_length {
            return Err(ServiceError::MessageTooLong {
                max: self.max_message_length,
            });
        }
        Ok(message)
    }

    /// Validate, run one turn, and wrap the reply.
    pub async fn process(&self, request: ChatRequest) -> Result<ChatResponse, ServiceError> {
        let message = self.validate_message(&request.message)?;
        let request_id = Uuid::new_v4().to_string();
        let start = Instant::now();

        tracing::info!(
            request_id = %request_id,
            session_id = ?request.session_id,
            message_len = char_len(message),
            "chat service: request accepted"
        );

        let reply = match request.session_id.as_deref() {
            Some(id) => {
                self.orchestrator
                    .run_in_session(message, &SessionRef::new(id))
                    .await
            }
            None => self.orchestrator.handle(message).await,
        };

        let route = reply.route();
        let degraded = !matches!(reply, Reply::Answered { .. });
        let response = ChatResponse {
            response: reply.into_text(),
            route,
            degraded,
            session_id: request.session_id,
            request_id,
            execution_time_secs: start.elapsed().as_secs_f64(),
            completed_at: Utc::now(),
        };

        tracing::info!(
            request_id = %response.request_id,
            degraded = response.degraded,
            execution_time_secs = response.execution_time_secs,
            "chat service: request complete"
        );
        Ok(response)
    }
}
