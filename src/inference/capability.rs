//! The model capability consumed by the pipeline.

use async_trait::async_trait;

use super::errors::InferenceError;
use super::types::ChatMessage;

/// Anything that can turn role-tagged messages into a text completion.
///
/// Implementations hold no per-call mutable state, so a single instance is
/// shared (behind an `Arc`) by every concurrent run.
#[async_trait]
pub trait ModelCapability: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Produce a completion for `messages`. May retry internally.
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, InferenceError>;
}
