//! Intent classifier: simple vs complex.
//!
//! Two tiers. Keyword heuristics resolve obvious cases without a model call;
//! everything else goes through the stage executor with the classification
//! schema. If the model never produces a valid verdict the classifier
//! defaults to `complex`, since the task pipeline can handle anything the
//! simple responder can.

use std::sync::Arc;

use serde_json::Value;

use crate::inference::capability::ModelCapability;

use super::errors::StageFailure;
use super::parsers::parse_json;
use super::prompts::{classification_prompt, CLASSIFICATION_SCHEMA};
use super::stage::{ExhaustionPolicy, StageExecutor};
use super::text::char_len;
use super::types::{Classification, ClassificationSource, IntentType};
use super::validators::validate_classification;

// ─── Heuristic Tables ───────────────────────────────────────────────────────

const GREETING_TOKENS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
    "thanks",
    "thank you",
    "bye",
    "goodbye",
];

const TASK_VERBS: &[&str] = &[
    "build",
    "create",
    "implement",
    "design",
    "develop",
    "make",
    "write",
    "generate",
    "plan",
    "solve",
];

/// Greetings must be shorter than this (chars) to skip the model.
const GREETING_MAX_CHARS: usize = 20;

/// Task requests must be longer than this (chars) to skip the model.
const TASK_MIN_CHARS: usize = 15;

const HEURISTIC_CONFIDENCE: f64 = 0.95;
const FALLBACK_CONFIDENCE: f64 = 0.5;

// ─── Classifier ─────────────────────────────────────────────────────────────

pub struct Classifier {
    /// Classifies and repairs its own output.
    model: Arc<dyn ModelCapability>,
    budget: u32,
}

impl Classifier {
    pub fn new(model: Arc<dyn ModelCapability>, budget: u32) -> Self {
        Self { model, budget }
    }

    /// Classify an utterance. Never fails.
    pub async fn classify(&self, utterance: &str) -> Classification {
        if let Some(verdict) = heuristic(utterance) {
            tracing::info!(
                intent_type = verdict.intent_type.as_str(),
                confidence = verdict.confidence,
                "classifier: heuristic match"
            );
            return verdict;
        }

        let stage = StageExecutor::structured(
            "classification",
            self.model.as_ref(),
            self.model.as_ref(),
            CLASSIFICATION_SCHEMA,
            self.budget,
            parse_stage,
            validate_stage,
        );

        let verdict = match stage
            .run(
                &classification_prompt(utterance),
                ExhaustionPolicy::Fallback(fallback()),
            )
            .await
        {
            Ok(outcome) => outcome.value,
            Err(e) => {
                tracing::warn!(error = %e, "classifier: stage error");
                fallback()
            }
        };

        tracing::info!(
            intent_type = verdict.intent_type.as_str(),
            confidence = verdict.confidence,
            source = ?verdict.source,
            reasoning = %verdict.reasoning,
            "classifier: verdict"
        );
        verdict
    }
}

/// Keyword tier. Greetings are checked before task verbs, so an utterance
/// matching both resolves to `simple`.
pub fn heuristic(utterance: &str) -> Option<Classification> {
    let text = utterance.trim().to_lowercase();
    let len = char_len(&text);

    if len < GREETING_MAX_CHARS && GREETING_TOKENS.iter().any(|t| text.contains(t)) {
        return Some(Classification {
            intent_type: IntentType::Simple,
            confidence: HEURISTIC_CONFIDENCE,
            reasoning: "Short greeting or closing".to_string(),
            source: ClassificationSource::Heuristic,
        });
    }

    if len > TASK_MIN_CHARS && TASK_VERBS.iter().any(|t| text.contains(t)) {
        return Some(Classification {
            intent_type: IntentType::Complex,
            confidence: HEURISTIC_CONFIDENCE,
            reasoning: "Request names a task to carry out".to_string(),
            source: ClassificationSource::Heuristic,
        });
    }

    None
}

fn fallback() -> Classification {
    Classification {
        intent_type: IntentType::Complex,
        confidence: FALLBACK_CONFIDENCE,
        reasoning: "Classification failed; defaulting to complex".to_string(),
        source: ClassificationSource::Fallback,
    }
}

fn parse_stage(raw: &str) -> Result<Value, StageFailure> {
    Ok(parse_json(raw)?)
}

fn validate_stage(value: Value) -> Result<Classification, StageFailure> {
    Ok(validate_classification(&value)?)
}

// ─── Tests ──────────────────────────────────────────────────────────────────
