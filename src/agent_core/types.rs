//! Shared types for the agent core.
//!
//! Stage artifacts (classification, intent, plan, verifier feedback) and the
//! typed outcomes returned to callers.

use std::fmt;

use serde::{Deserialize, Serialize};

// ─── Classification ─────────────────────────────────────────────────────────

/// Which path a message takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentType {
    Simple,
    Complex,
}

impl IntentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentType::Simple => "simple",
            IntentType::Complex => "complex",
        }
    }
}

/// How a classification was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    /// Keyword tier matched; no model call.
    Heuristic,
    /// Validated model output.
    Model,
    /// Model output never validated; defaulted to complex.
    Fallback,
}

/// Classifier verdict. `confidence` and `reasoning` are advisory only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub intent_type: IntentType,
    pub confidence: f64,
    pub reasoning: String,
    pub source: ClassificationSource,
}

// ─── Intent ─────────────────────────────────────────────────────────────────

/// `constraints` as the model may emit it: one string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Constraints {
    Single(String),
    List(Vec<String>),
}

/// Display form embedded in later prompts: list items joined by `", "`.
impl fmt::Display for Constraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraints::Single(s) => f.write_str(s),
            Constraints::List(items) => f.write_str(&items.join(", ")),
        }
    }
}

/// Structured intent extracted from a complex request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub goal: String,
    pub constraints: Constraints,
    pub expected_output: String,
}

impl Intent {
    /// The context block handed to the reasoning stage.
    pub fn summary(&self) -> String {
        format!(
            "Goal: {}\nConstraints: {}\nExpected Output: {}",
            self.goal, self.constraints, self.expected_output
        )
    }
}

// ─── Plan ───────────────────────────────────────────────────────────────────

/// Ordered, non-empty list of step descriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Plan(Vec<String>);

impl Plan {
    /// Wrap steps without validation. Use `validators::validate_plan` for
    /// model output.
    pub fn new(steps: Vec<String>) -> Self {
        Self(steps)
    }

    pub fn steps(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ─── Verifier Feedback ──────────────────────────────────────────────────────

/// Issue recorded when the verifier never produced valid JSON.
pub const VERIFIER_FAILED_ISSUE: &str = "Verifier failed to return valid JSON";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VerifierFeedback {
    pub issues: Vec<String>,
    pub suggested_fixes: Vec<String>,
}

impl VerifierFeedback {
    /// Synthetic feedback used when verification exhausts its budget.
    pub fn verifier_failed() -> Self {
        Self {
            issues: vec![VERIFIER_FAILED_ISSUE.to_string()],
            suggested_fixes: Vec::new(),
        }
    }

    /// True when there is at least one real issue to refine against.
    pub fn has_actionable_issues(&self) -> bool {
        match self.issues.as_slice() {
            [] => false,
            [only] => only != VERIFIER_FAILED_ISSUE,
            _ => true,
        }
    }
}

// ─── Outcomes ───────────────────────────────────────────────────────────────

/// Which agent produced a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Simple,
    Task,
}

/// Fixed text returned when every tier has failed.
pub const APOLOGY_MESSAGE: &str = "I apologize, but I encountered an error. Please try again.";

/// What the orchestrator handed back, and through which fallback tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tier", rename_all = "lowercase")]
pub enum Reply {
    /// The routed agent answered.
    Answered { text: String, route: Route },
    /// Routing or the routed agent failed; the simple responder answered.
    Degraded { text: String },
    /// Everything failed.
    Apology,
}

impl Reply {
    pub fn text(&self) -> &str {
        match self {
            Reply::Answered { text, .. } | Reply::Degraded { text } => text,
            Reply::Apology => APOLOGY_MESSAGE,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Reply::Answered { text, .. } | Reply::Degraded { text } => text,
            Reply::Apology => APOLOGY_MESSAGE.to_string(),
        }
    }

    /// The agent that produced the text, if any did.
    pub fn route(&self) -> Option<Route> {
        match self {
            Reply::Answered { route, .. } => Some(*route),
            Reply::Degraded { .. } => Some(Route::Simple),
            Reply::Apology => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraints_display_joins_list() {
        let list = Constraints::List(vec!["Rust".into(), "no unsafe".into()]);
        assert_eq!(list.to_string(), "Rust, no unsafe");
        assert_eq!(Constraints::Single("fast".into()).to_string(), "fast");
    }

    #[test]
    fn test_constraints_untagged_roundtrip_shape() {
        let intent: Intent = serde_json::from_str(
            r#"{"goal":"g","constraints":["a","b"],"expected_output":"e"}"#,
        )
        .unwrap();
        assert_eq!(intent.constraints, Constraints::List(vec!["a".into(), "b".into()]));
        let json = serde_json::to_value(&intent).unwrap();
        assert!(json["constraints"].is_array());
    }

    #[test]
    fn test_intent_summary() {
        let intent = Intent {
            goal: "Ship it".into(),
            constraints: Constraints::List(vec!["tested".into(), "documented".into()]),
            expected_output: "A release".into(),
        };
        assert_eq!(
            intent.summary(),
            "Goal: Ship it\nConstraints: tested, documented\nExpected Output: A release"
        );
    }

    #[test]
    fn test_actionable_issues() {
        assert!(!VerifierFeedback::default().has_actionable_issues());
        assert!(!VerifierFeedback::verifier_failed().has_actionable_issues());
        let feedback = VerifierFeedback {
            issues: vec!["Missing error handling".into()],
            suggested_fixes: vec![],
        };
        assert!(feedback.has_actionable_issues());
        let mixed = VerifierFeedback {
            issues: vec![VERIFIER_FAILED_ISSUE.into(), "Another".into()],
            suggested_fixes: vec![],
        };
        assert!(mixed.has_actionable_issues());
    }

    #[test]
    fn test_reply_text_and_route() {
        assert_eq!(Reply::Apology.text(), APOLOGY_MESSAGE);
        assert_eq!(Reply::Apology.route(), None);
        let degraded = Reply::Degraded { text: "hi".into() };
        assert_eq!(degraded.route(), Some(Route::Simple));
        assert_eq!(degraded.into_text(), "hi");
    }
}
