//! Output parsers for structured stages.
//!
//! - `parse_json`: syntactic decoding only. Strips an optional markdown code
//!   fence (with or without a language hint) and decodes the JSON payload.
//! - `parse_plan`: builds on `parse_json`, extracting the `plan` list and
//!   flattening `{title, description}` step objects into plain strings.
//!
//! Neither parser performs semantic checks; that is the validators' job.

use serde_json::Value;

use super::errors::{ParseError, PlanParseError};

// ─── JSON ───────────────────────────────────────────────────────────────────

/// Decode raw model text into a JSON value.
pub fn parse_json(raw: &str) -> Result<Value, ParseError> {
    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return Err(ParseError::Empty);
    }

    let payload = strip_code_fence(cleaned);
    if payload.is_empty() {
        return Err(ParseError::Empty);
    }

    serde_json::from_str(payload).map_err(|e| ParseError::InvalidJson {
        reason: e.to_string(),
    })
}

/// Remove a surrounding ```` ``` ```` fence and its optional language hint.
///
/// Text without a leading fence is returned unchanged.
fn strip_code_fence(text: &str) -> &str {
    let Some(body) = text.strip_prefix("```") else {
        return text;
    };

    let hint_len = body
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
        .unwrap_or(body.len());
    let body = body[hint_len..].trim_end();
    let body = body.strip_suffix("```").unwrap_or(body);
    body.trim()
}

// ─── Plan ───────────────────────────────────────────────────────────────────

/// Parse planner output into an ordered list of step descriptions.
///
/// Accepts steps as plain strings or as objects with a `title` and optional
/// `description`, flattened to `"title: description"` (or just `title`).
pub fn parse_plan(raw: &str) -> Result<Vec<String>, PlanParseError> {
    let data = parse_json(raw)?;

    let items = data
        .get("plan")
        .and_then(Value::as_array)
        .ok_or(PlanParseError::MissingPlan)?;

    let mut steps = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match item {
            Value::String(step) => steps.push(step.clone()),
            Value::Object(fields) => {
                let title = non_empty_str(fields.get("title"));
                let description = non_empty_str(fields.get("description"));
                match (title, description) {
                    (Some(title), Some(description)) => {
                        steps.push(format!("{title}: {description}"))
                    }
                    (Some(title), None) => steps.push(title.to_string()),
                    _ => return Err(PlanParseError::InvalidStep { index }),
                }
            }
            _ => return Err(PlanParseError::InvalidStep { index }),
        }
    }

    if steps.is_empty() {
        return Err(PlanParseError::Empty);
    }

    Ok(steps)
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ─── parse_json ──────────────────────────────────────────────────────

    #[test]
    fn parse_bare_object() {
        let value = parse_json(r#"{"goal":"g"}"#).unwrap();
        assert_eq!(value, json!({"goal": "g"}));
    }

    #[test]
    fn parse_fenced_with_language_hint() {
        let raw = "```json\n{\"issues\": [], \"suggested_fixes\": []}\n```";
        let value = parse_json(raw).unwrap();
        assert_eq!(value["issues"], json!([]));
    }

    #[test]
    fn parse_fenced_without_hint() {
        let raw = "  ```\n[1, 2]\n```  ";
        assert_eq!(parse_json(raw).unwrap(), json!([1, 2]));
    }

    #[test]
    fn parse_fenced_single_line() {
        assert_eq!(parse_json("```{\"a\":1}```").unwrap(), json!({"a": 1}));
    }

    #[test]
    fn parse_empty_is_error() {
        assert_eq!(parse_json(""), Err(ParseError::Empty));
        assert_eq!(parse_json("   \n"), Err(ParseError::Empty));
        assert_eq!(parse_json("```json\n```"), Err(ParseError::Empty));
    }

    #[test]
    fn parse_prose_is_invalid_json() {
        let err = parse_json("Sure! Here is the JSON you asked for").unwrap_err();
        assert!(matches!(err, ParseError::InvalidJson { .. }));
    }

    #[test]
    fn parse_does_not_check_semantics() {
        // Any valid JSON is accepted, even if no stage wants it.
        assert_eq!(parse_json("42").unwrap(), json!(42));
    }

    // ─── parse_plan ──────────────────────────────────────────────────────

    #[test]
    fn plan_string_steps() {
        let steps = parse_plan(r#"{"plan": ["Step 1", "Step 2"]}"#).unwrap();
        assert_eq!(steps, vec!["Step 1", "Step 2"]);
    }

    #[test]
    fn plan_empty_list_is_error() {
        assert_eq!(parse_plan(r#"{"plan": []}"#), Err(PlanParseError::Empty));
    }

    #[test]
    fn plan_object_steps_flattened() {
        let steps = parse_plan(r#"{"plan": [{"title":"A","description":"B"}]}"#).unwrap();
        assert_eq!(steps, vec!["A: B"]);
    }

    #[test]
    fn plan_title_only_object() {
        let steps = parse_plan(r#"{"plan": [{"title":"Write tests"}, "Ship"]}"#).unwrap();
        assert_eq!(steps, vec!["Write tests", "Ship"]);
    }

    #[test]
    fn plan_missing_key_is_error() {
        assert_eq!(
            parse_plan(r#"{"steps": ["a"]}"#),
            Err(PlanParseError::MissingPlan)
        );
    }

    #[test]
    fn plan_not_a_list_is_error() {
        assert_eq!(
            parse_plan(r#"{"plan": "do everything"}"#),
            Err(PlanParseError::MissingPlan)
        );
    }

    #[test]
    fn plan_object_without_title_is_error() {
        assert_eq!(
            parse_plan(r#"{"plan": ["ok step", {"description":"B"}]}"#),
            Err(PlanParseError::InvalidStep { index: 1 })
        );
    }

    #[test]
    fn plan_numeric_step_is_error() {
        assert_eq!(
            parse_plan(r#"{"plan": [7]}"#),
            Err(PlanParseError::InvalidStep { index: 0 })
        );
    }

    #[test]
    fn plan_invalid_json_is_wrapped() {
        assert!(matches!(
            parse_plan("plan: step one"),
            Err(PlanParseError::Json(ParseError::InvalidJson { .. }))
        ));
    }
}
