//! JSON repair: ask a model to correct output that failed parsing or validation.
//!
//! Schema-agnostic. The caller supplies the schema description; no retries
//! happen here and model failures propagate unchanged.

use crate::inference::capability::ModelCapability;
use crate::inference::errors::InferenceError;
use crate::inference::types::ChatMessage;

const REPAIR_SYSTEM_PROMPT: &str =
    "You correct malformed model output. Reply with valid JSON only: no prose, no code fences.";

/// Fixed two-message repair prompt.
pub fn repair_prompt(bad_output: &str, error: &str, schema_description: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(REPAIR_SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Invalid output:\n{bad_output}\n\nError:\n{error}\n\nRequired schema:\n{schema_description}"
        )),
    ]
}

/// One repair call. Returns the model's raw candidate text.
pub async fn repair(
    model: &dyn ModelCapability,
    bad_output: &str,
    error: &str,
    schema_description: &str,
) -> Result<String, InferenceError> {
    tracing::debug!(model = model.name(), error, "requesting JSON repair");
    model
        .generate(&repair_prompt(bad_output, error, schema_description))
        .await
}
