//! Task pipeline: the six-stage path for complex requests.
//!
//! 1. **Intent extraction** (structured, fatal on exhaustion)
//! 2. **Planning** (structured, fatal on exhaustion)
//! 3. **Reasoning**: one free-text call producing the draft
//! 4. **Verification** (structured, falls back to a "verifier failed" marker)
//! 5. **Refactor**: skipped unless verification found real issues; falls back
//!    to the unrefined draft
//! 6. **Final writing**: falls back to the refined draft
//!
//! Structured stages repair through the verification model. Stages run
//! strictly in order; each consumes the previous stage's validated output.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::inference::capability::ModelCapability;
use crate::inference::config::ModelRole;
use crate::inference::errors::InferenceError;
use crate::inference::registry::ModelRegistry;
use crate::inference::types::ChatMessage;

use super::errors::{PipelineError, StageFailure};
use super::parsers::{parse_json, parse_plan};
use super::prompts::{
    intent_prompt, planning_prompt, reasoning_prompt, refactor_prompt, verification_prompt,
    writer_prompt, FEEDBACK_SCHEMA, INTENT_SCHEMA, PLAN_SCHEMA,
};
use super::stage::{ExhaustionPolicy, StageExecutor};
use super::text::preview;
use super::types::{Intent, Plan, VerifierFeedback};
use super::validators::{validate_feedback, validate_intent, validate_plan};

/// Final response when there is no draft to polish.
pub const EMPTY_DRAFT_REPLY: &str = "Error: No content was generated. Please try again.";

pub const STAGE_INTENT: &str = "intent_extraction";
pub const STAGE_PLANNING: &str = "planning";
pub const STAGE_REASONING: &str = "reasoning";
pub const STAGE_VERIFICATION: &str = "verification";
pub const STAGE_REFACTOR: &str = "refactor";
pub const STAGE_FINAL_WRITING: &str = "final_writing";

// ─── Types ──────────────────────────────────────────────────────────────────

/// The model bound to each pipeline role.
#[derive(Clone)]
pub struct TaskModels {
    pub intent: Arc<dyn ModelCapability>,
    pub planning: Arc<dyn ModelCapability>,
    /// Draft generation and refactor.
    pub reasoning: Arc<dyn ModelCapability>,
    /// Verification and every structured repair.
    pub verification: Arc<dyn ModelCapability>,
    pub writing: Arc<dyn ModelCapability>,
}

impl TaskModels {
    pub fn from_registry(registry: &ModelRegistry) -> Result<Self, InferenceError> {
        Ok(Self {
            intent: registry.get(ModelRole::Intent)?,
            planning: registry.get(ModelRole::Planning)?,
            reasoning: registry.get(ModelRole::Reasoning)?,
            verification: registry.get(ModelRole::Verification)?,
            writing: registry.get(ModelRole::Writing)?,
        })
    }
}

/// Every artifact of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub intent: Intent,
    pub plan: Plan,
    pub draft: String,
    pub feedback: VerifierFeedback,
    pub refined_draft: String,
    pub final_response: String,
    /// Stages that ended on their exhaustion fallback.
    pub recovered_stages: Vec<&'static str>,
}

pub struct TaskAgent {
    models: TaskModels,
    budget: u32,
}

// ─── Pipeline ───────────────────────────────────────────────────────────────

impl TaskAgent {
    /// `budget` is the total model calls each structured stage may make.
    pub fn new(models: TaskModels, budget: u32) -> Self {
        Self { models, budget }
    }

    /// Run the pipeline and return the final response.
    ///
    /// Fails only when intent extraction or planning exhaust their budget,
    /// or the reasoning call itself fails.
    pub async fn run(&self, utterance: &str) -> Result<String, PipelineError> {
        Ok(self.execute(utterance, None).await?.final_response)
    }

    /// As `run`, with prior session turns made available to reasoning.
    pub async fn run_with_context(
        &self,
        utterance: &str,
        context: &[ChatMessage],
    ) -> Result<String, PipelineError> {
        Ok(self.execute(utterance, Some(context)).await?.final_response)
    }

    /// Run all six stages, keeping every intermediate artifact.
    pub async fn execute(
        &self,
        utterance: &str,
        history: Option<&[ChatMessage]>,
    ) -> Result<TaskReport, PipelineError> {
        let mut recovered_stages = Vec::new();

        let intent = self.extract_intent(utterance).await?;
        tracing::info!(goal = %intent.goal, "task agent: intent extracted");

        let plan = self.plan(&intent).await?;
        tracing::info!(step_count = plan.len(), "task agent: plan created");

        let draft = self.reason(&intent, &plan, history).await?;
        tracing::info!(draft_len = draft.len(), "task agent: draft produced");

        let (feedback, recovered) = self.verify(&draft).await;
        if recovered {
            recovered_stages.push(STAGE_VERIFICATION);
        }
        tracing::info!(
            issues = feedback.issues.len(),
            fixes = feedback.suggested_fixes.len(),
            "task agent: draft verified"
        );

        let (refined_draft, recovered) = self.refactor(&draft, &feedback).await;
        if recovered {
            recovered_stages.push(STAGE_REFACTOR);
        }

        let (final_response, recovered) = self.write_final(&refined_draft).await;
        if recovered {
            recovered_stages.push(STAGE_FINAL_WRITING);
        }
        tracing::info!(
            recovered = ?recovered_stages,
            preview = %preview(&final_response),
            "task agent: complete"
        );

        Ok(TaskReport {
            intent,
            plan,
            draft,
            feedback,
            refined_draft,
            final_response,
            recovered_stages,
        })
    }

    async fn extract_intent(&self, utterance: &str) -> Result<Intent, PipelineError> {
        let stage = StageExecutor::structured(
            STAGE_INTENT,
            self.models.intent.as_ref(),
            self.models.verification.as_ref(),
            INTENT_SCHEMA,
            self.budget,
            parse_json_stage,
            validate_intent_stage,
        );
        let outcome = stage
            .run(&intent_prompt(utterance), ExhaustionPolicy::Fatal)
            .await?;
        Ok(outcome.value)
    }

    async fn plan(&self, intent: &Intent) -> Result<Plan, PipelineError> {
        let stage = StageExecutor::structured(
            STAGE_PLANNING,
            self.models.planning.as_ref(),
            self.models.verification.as_ref(),
            PLAN_SCHEMA,
            self.budget,
            parse_plan_stage,
            validate_plan_stage,
        );
        let outcome = stage
            .run(&planning_prompt(intent), ExhaustionPolicy::Fatal)
            .await?;
        Ok(outcome.value)
    }

    /// Single free-text call; the draft is taken as-is.
    async fn reason(
        &self,
        intent: &Intent,
        plan: &Plan,
        history: Option<&[ChatMessage]>,
    ) -> Result<String, PipelineError> {
        self.models
            .reasoning
            .generate(&reasoning_prompt(intent, plan, history))
            .await
            .map_err(|e| PipelineError::StageExhausted {
                stage: STAGE_REASONING,
                attempts: 1,
                last_error: StageFailure::Inference(e),
            })
    }

    async fn verify(&self, draft: &str) -> (VerifierFeedback, bool) {
        let stage = StageExecutor::structured(
            STAGE_VERIFICATION,
            self.models.verification.as_ref(),
            self.models.verification.as_ref(),
            FEEDBACK_SCHEMA,
            self.budget,
            parse_json_stage,
            validate_feedback_stage,
        )
        .reprompt_on_empty();
        let policy = ExhaustionPolicy::Fallback(VerifierFeedback::verifier_failed());
        match stage.run(&verification_prompt(draft), policy).await {
            Ok(outcome) => (outcome.value, outcome.fell_back),
            Err(_) => (VerifierFeedback::verifier_failed(), true),
        }
    }

    async fn refactor(&self, draft: &str, feedback: &VerifierFeedback) -> (String, bool) {
        if !feedback.has_actionable_issues() {
            tracing::info!("task agent: no actionable issues, refactor skipped");
            return (draft.to_string(), false);
        }

        let stage = StageExecutor::free_text(STAGE_REFACTOR, self.models.reasoning.as_ref(), self.budget);
        let policy = ExhaustionPolicy::Fallback(draft.to_string());
        match stage.run(&refactor_prompt(draft, feedback), policy).await {
            Ok(outcome) => (outcome.value, outcome.fell_back),
            Err(_) => (draft.to_string(), true),
        }
    }

    async fn write_final(&self, draft: &str) -> (String, bool) {
        if draft.trim().is_empty() {
            tracing::warn!("task agent: empty draft, skipping final writing");
            return (EMPTY_DRAFT_REPLY.to_string(), false);
        }

        let stage =
            StageExecutor::free_text(STAGE_FINAL_WRITING, self.models.writing.as_ref(), self.budget);
        let policy = ExhaustionPolicy::Fallback(draft.to_string());
        match stage.run(&writer_prompt(draft), policy).await {
            Ok(outcome) => (outcome.value, outcome.fell_back),
            Err(_) => (draft.to_string(), true),
        }
    }
}

// ─── Stage Functions ────────────────────────────────────────────────────────

fn parse_json_stage(raw: &str) -> Result<Value, StageFailure> {
    Ok(parse_json(raw)?)
}

fn parse_plan_stage(raw: &str) -> Result<Vec<String>, StageFailure> {
    Ok(parse_plan(raw)?)
}

fn validate_intent_stage(value: Value) -> Result<Intent, StageFailure> {
    Ok(validate_intent(&value)?)
}

fn validate_plan_stage(steps: Vec<String>) -> Result<Plan, StageFailure> {
    Ok(validate_plan(steps)?)
}

fn validate_feedback_stage(value: Value) -> Result<VerifierFeedback, StageFailure> {
    Ok(validate_feedback(&value)?)
}

// ─── Tests ──────────────────────────────────────────────────────────────────
