//! Shape contracts for every structured stage output.
//!
//! Validators are pure and total: every malformed input is rejected with a
//! `ValidationError` naming the offending field. The only accepted
//! polymorphism is `Intent.constraints` (string or list of strings).

use serde_json::{Map, Value};

use super::errors::{Schema, ValidationError};
use super::types::{Classification, ClassificationSource, Constraints, Intent, IntentType, Plan, VerifierFeedback};

/// Steps whose trimmed length is below this are rejected as vague.
pub const MIN_STEP_CHARS: usize = 5;

/// Confidence assumed when the classifier omits it.
const DEFAULT_CONFIDENCE: f64 = 0.5;

// ─── Intent ─────────────────────────────────────────────────────────────────

pub fn validate_intent(value: &Value) -> Result<Intent, ValidationError> {
    let obj = as_object(value, Schema::Intent)?;

    let goal = required_str(obj, "goal", Schema::Intent)?;

    let constraints = match obj.get("constraints") {
        None => {
            return Err(ValidationError::MissingField {
                schema: Schema::Intent,
                field: "constraints",
            })
        }
        Some(Value::String(s)) => Constraints::Single(s.clone()),
        Some(Value::Array(items)) => Constraints::List(
            items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .ok_or(ValidationError::WrongType {
                    schema: Schema::Intent,
                    field: "constraints",
                    expected: "string or list of strings",
                })?,
        ),
        Some(_) => {
            return Err(ValidationError::WrongType {
                schema: Schema::Intent,
                field: "constraints",
                expected: "string or list of strings",
            })
        }
    };

    let expected_output = required_str(obj, "expected_output", Schema::Intent)?;

    Ok(Intent {
        goal,
        constraints,
        expected_output,
    })
}

// ─── Plan ───────────────────────────────────────────────────────────────────

/// Stricter check on top of plan parsing: non-empty, no vague steps.
pub fn validate_plan(steps: Vec<String>) -> Result<Plan, ValidationError> {
    if steps.is_empty() {
        return Err(ValidationError::EmptyPlan);
    }

    if let Some(index) = steps
        .iter()
        .position(|step| step.trim().chars().count() < MIN_STEP_CHARS)
    {
        return Err(ValidationError::StepTooShort { index });
    }

    Ok(Plan::new(steps))
}

// ─── Classification ─────────────────────────────────────────────────────────

pub fn validate_classification(value: &Value) -> Result<Classification, ValidationError> {
    let obj = as_object(value, Schema::Classification)?;

    let intent_type = match required_str(obj, "intent_type", Schema::Classification)?.as_str() {
        "simple" => IntentType::Simple,
        "complex" => IntentType::Complex,
        other => {
            return Err(ValidationError::UnknownIntentType {
                value: other.to_string(),
            })
        }
    };

    let confidence = match obj.get("confidence") {
        None => DEFAULT_CONFIDENCE,
        Some(v) => {
            let c = v.as_f64().ok_or(ValidationError::WrongType {
                schema: Schema::Classification,
                field: "confidence",
                expected: "number",
            })?;
            if !(0.0..=1.0).contains(&c) {
                return Err(ValidationError::ConfidenceOutOfRange { value: c });
            }
            c
        }
    };

    let reasoning = match obj.get("reasoning") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => {
            return Err(ValidationError::WrongType {
                schema: Schema::Classification,
                field: "reasoning",
                expected: "string",
            })
        }
    };

    Ok(Classification {
        intent_type,
        confidence,
        reasoning,
        source: ClassificationSource::Model,
    })
}

// ─── Verifier Feedback ──────────────────────────────────────────────────────

/// Both keys are mandatory, even when empty.
pub fn validate_feedback(value: &Value) -> Result<VerifierFeedback, ValidationError> {
    let obj = as_object(value, Schema::Feedback)?;
    Ok(VerifierFeedback {
        issues: required_str_list(obj, "issues", Schema::Feedback)?,
        suggested_fixes: required_str_list(obj, "suggested_fixes", Schema::Feedback)?,
    })
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn as_object(value: &Value, schema: Schema) -> Result<&Map<String, Value>, ValidationError> {
    value
        .as_object()
        .ok_or(ValidationError::NotAnObject { schema })
}

fn required_str(
    obj: &Map<String, Value>,
    field: &'static str,
    schema: Schema,
) -> Result<String, ValidationError> {
    match obj.get(field) {
        None => Err(ValidationError::MissingField { schema, field }),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ValidationError::WrongType {
            schema,
            field,
            expected: "string",
        }),
    }
}

fn required_str_list(
    obj: &Map<String, Value>,
    field: &'static str,
    schema: Schema,
) -> Result<Vec<String>, ValidationError> {
    let wrong_type = ValidationError::WrongType {
        schema,
        field,
        expected: "list of strings",
    };
    let items = obj
        .get(field)
        .ok_or(ValidationError::MissingField { schema, field })?
        .as_array()
        .ok_or_else(|| wrong_type.clone())?;

    items
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()
        .ok_or(wrong_type)
}

// ─── Tests ──────────────────────────────────────────────────────────────────
