//! Agent Core error types.
//!
//! `ParseError` and `ValidationError` describe one bad model output. They are
//! wrapped in `StageFailure` and never escape the stage executor; the only
//! error a pipeline run surfaces is `PipelineError`.

use thiserror::Error;

use crate::inference::errors::InferenceError;

/// Raw model text could not be decoded as JSON.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("empty or non-text JSON output")]
    Empty,

    #[error("invalid JSON: {reason}")]
    InvalidJson { reason: String },
}

/// Planner output decoded, but not into a usable step list.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanParseError {
    #[error(transparent)]
    Json(#[from] ParseError),

    #[error("planner output must contain a 'plan' list")]
    MissingPlan,

    #[error("plan step {index} must be a string or an object with a title")]
    InvalidStep { index: usize },

    #[error("plan cannot be empty")]
    Empty,
}

/// Which schema a validation error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    Intent,
    Plan,
    Classification,
    Feedback,
}

impl std::fmt::Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Schema::Intent => "intent",
            Schema::Plan => "plan",
            Schema::Classification => "classification",
            Schema::Feedback => "verifier feedback",
        })
    }
}

/// Syntactically valid output that violates a stage's shape contract.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{schema} must be a JSON object")]
    NotAnObject { schema: Schema },

    #[error("{schema}: missing key '{field}'")]
    MissingField { schema: Schema, field: &'static str },

    #[error("{schema}: invalid type for '{field}': expected {expected}")]
    WrongType {
        schema: Schema,
        field: &'static str,
        expected: &'static str,
    },

    #[error("classification: invalid intent_type '{value}', must be 'simple' or 'complex'")]
    UnknownIntentType { value: String },

    #[error("classification: confidence {value} must be between 0.0 and 1.0")]
    ConfidenceOutOfRange { value: f64 },

    #[error("plan cannot be empty")]
    EmptyPlan,

    #[error("plan step {index} is too short or vague")]
    StepTooShort { index: usize },
}

/// Validation failure raised by the classifier.
pub type ClassificationError = ValidationError;

/// Why a single stage attempt did not produce a value.
#[derive(Debug, Error)]
pub enum StageFailure {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    PlanParse(#[from] PlanParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("model returned an empty response")]
    EmptyResponse,

    #[error("model call failed: {0}")]
    Inference(#[from] InferenceError),
}

impl StageFailure {
    /// Failures a repair prompt can act on: there is bad output to fix.
    pub fn is_repairable(&self) -> bool {
        matches!(
            self,
            StageFailure::Parse(_) | StageFailure::PlanParse(_) | StageFailure::Validation(_)
        )
    }
}

/// Run-terminating failure of the task pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{stage} failed after {attempts} attempt(s): {last_error}")]
    StageExhausted {
        stage: &'static str,
        attempts: u32,
        last_error: StageFailure,
    },
}

/// The session history store could not produce or store context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("session context unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Request rejected before it reaches the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("message field is required and cannot be empty")]
    EmptyMessage,

    #[error("message exceeds maximum length of {max} characters")]
    MessageTooLong { max: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_names_schema() {
        let err = ValidationError::MissingField {
            schema: Schema::Intent,
            field: "goal",
        };
        assert_eq!(err.to_string(), "intent: missing key 'goal'");
        let err = ValidationError::NotAnObject {
            schema: Schema::Feedback,
        };
        assert_eq!(err.to_string(), "verifier feedback must be a JSON object");
    }

    #[test]
    fn test_repairable_failures() {
        assert!(StageFailure::from(ParseError::Empty).is_repairable());
        assert!(StageFailure::from(PlanParseError::MissingPlan).is_repairable());
        assert!(!StageFailure::EmptyResponse.is_repairable());
        assert!(!StageFailure::from(InferenceError::Timeout { duration_secs: 1 }).is_repairable());
    }

    #[test]
    fn test_plan_parse_wraps_json_error_transparently() {
        let err = PlanParseError::from(ParseError::InvalidJson {
            reason: "eof".into(),
        });
        assert_eq!(err.to_string(), "invalid JSON: eof");
    }
}
