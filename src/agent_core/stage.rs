//! Stage executor: the bounded retry/repair protocol shared by every stage.
//!
//! A stage is composed from a model, a parser, a validator, an optional
//! repair schema and an exhaustion policy. Execution is an explicit state
//! machine:
//!
//! ```text
//! Attempting(k) ──model──▶ Checking(k) ──ok──▶ Succeeded
//!       ▲                      │ ▲
//!       │ inference / opted-in │ │ repaired text
//!       │ empty / no schema    ▼ │
//!       └──────────────── failure ──repairable──▶ Repairing(k+1)
//!                              │
//!                              └── k == budget ──▶ Exhausted (fallback or fatal)
//! ```
//!
//! The budget counts every model call the stage makes, so a budget of `N`
//! allows at most `N - 1` repair cycles. Repaired text is re-parsed and
//! re-validated directly; the original prompt is re-issued after a failed
//! model call, where there is nothing to repair. Blank output is a parse
//! failure and goes to repair, unless the stage opts into re-prompting with
//! `reprompt_on_empty`.

use std::time::Instant;

use crate::inference::capability::ModelCapability;
use crate::inference::types::ChatMessage;

use super::errors::{PipelineError, StageFailure};
use super::repair::repair;
use super::text::preview;

// ─── Types ──────────────────────────────────────────────────────────────────

/// What a stage does once its budget is spent.
#[derive(Debug)]
pub enum ExhaustionPolicy<T> {
    /// Abort the run with `PipelineError::StageExhausted`.
    Fatal,
    /// Recover locally with this value.
    Fallback(T),
}

/// A stage's result and how it was reached.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome<T> {
    pub value: T,
    /// Model calls made, repairs included.
    pub attempts: u32,
    /// True when `value` came from the exhaustion fallback.
    pub fell_back: bool,
}

/// One pipeline stage, parameterised by its parse and validate steps.
pub struct StageExecutor<'a, P, T> {
    pub name: &'static str,
    pub model: &'a dyn ModelCapability,
    /// Model used for repair cycles.
    pub repair_model: &'a dyn ModelCapability,
    /// Schema description for repair prompts. `None` disables repair.
    pub repair_schema: Option<&'static str>,
    /// Total model calls allowed, at least 1.
    pub budget: u32,
    /// Treat blank output as `EmptyResponse` and re-issue the prompt
    /// instead of handing it to the parser.
    pub reprompt_on_empty: bool,
    pub parse: fn(&str) -> Result<P, StageFailure>,
    pub validate: fn(P) -> Result<T, StageFailure>,
}

enum State<T> {
    Attempting(u32),
    Checking {
        attempt: u32,
        raw: String,
    },
    Repairing {
        attempt: u32,
        bad: String,
        error: String,
        schema: &'static str,
    },
    Succeeded {
        attempt: u32,
        value: T,
    },
    Exhausted {
        attempts: u32,
        failure: StageFailure,
    },
}

// ─── Constructors ───────────────────────────────────────────────────────────

impl<'a, P, T> StageExecutor<'a, P, T> {
    /// A JSON stage that repairs through `repair_model`.
    pub fn structured(
        name: &'static str,
        model: &'a dyn ModelCapability,
        repair_model: &'a dyn ModelCapability,
        repair_schema: &'static str,
        budget: u32,
        parse: fn(&str) -> Result<P, StageFailure>,
        validate: fn(P) -> Result<T, StageFailure>,
    ) -> Self {
        Self {
            name,
            model,
            repair_model,
            repair_schema: Some(repair_schema),
            budget,
            reprompt_on_empty: false,
            parse,
            validate,
        }
    }

    /// Re-issue the original prompt on blank output rather than repairing it.
    pub fn reprompt_on_empty(mut self) -> Self {
        self.reprompt_on_empty = true;
        self
    }
}

impl<'a> StageExecutor<'a, String, String> {
    /// A free-text stage: any non-blank response is accepted as-is.
    pub fn free_text(name: &'static str, model: &'a dyn ModelCapability, budget: u32) -> Self {
        Self {
            name,
            model,
            repair_model: model,
            repair_schema: None,
            budget,
            reprompt_on_empty: true,
            parse: |raw| Ok(raw.to_string()),
            validate: Ok,
        }
    }
}

// ─── Execution ──────────────────────────────────────────────────────────────

impl<P, T> StageExecutor<'_, P, T> {
    /// Drive the stage to success or exhaustion.
    ///
    /// Only `ExhaustionPolicy::Fatal` can produce an error.
    pub async fn run(
        &self,
        prompt: &[ChatMessage],
        on_exhaustion: ExhaustionPolicy<T>,
    ) -> Result<StageOutcome<T>, PipelineError> {
        let start = Instant::now();
        let mut state = State::Attempting(1);

        loop {
            state = match state {
                State::Attempting(attempt) => {
                    tracing::debug!(stage = self.name, attempt, model = self.model.name(), "stage attempt");
                    match self.model.generate(prompt).await {
                        Ok(raw) => State::Checking { attempt, raw },
                        Err(e) => self.after_failure(attempt, e.into(), None),
                    }
                }

                State::Checking { attempt, raw } => match self.check(&raw) {
                    Ok(value) => State::Succeeded { attempt, value },
                    Err(failure) => self.after_failure(attempt, failure, Some(raw)),
                },

                State::Repairing {
                    attempt,
                    bad,
                    error,
                    schema,
                } => {
                    tracing::info!(stage = self.name, attempt, model = self.repair_model.name(), "stage: repair cycle");
                    match repair(self.repair_model, &bad, &error, schema).await {
                        Ok(raw) => State::Checking { attempt, raw },
                        Err(e) => self.after_failure(attempt, e.into(), None),
                    }
                }

                State::Succeeded { attempt, value } => {
                    tracing::info!(
                        stage = self.name,
                        attempts = attempt,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "stage succeeded"
                    );
                    return Ok(StageOutcome {
                        value,
                        attempts: attempt,
                        fell_back: false,
                    });
                }

                State::Exhausted { attempts, failure } => {
                    let elapsed_ms = start.elapsed().as_millis() as u64;
                    return match on_exhaustion {
                        ExhaustionPolicy::Fallback(value) => {
                            tracing::warn!(
                                stage = self.name,
                                attempts,
                                elapsed_ms,
                                error = %failure,
                                "stage exhausted; using fallback"
                            );
                            Ok(StageOutcome {
                                value,
                                attempts,
                                fell_back: true,
                            })
                        }
                        ExhaustionPolicy::Fatal => {
                            tracing::error!(
                                stage = self.name,
                                attempts,
                                elapsed_ms,
                                error = %failure,
                                "stage exhausted"
                            );
                            Err(PipelineError::StageExhausted {
                                stage: self.name,
                                attempts,
                                last_error: failure,
                            })
                        }
                    };
                }
            };
        }
    }

    fn check(&self, raw: &str) -> Result<T, StageFailure> {
        if self.reprompt_on_empty && raw.trim().is_empty() {
            return Err(StageFailure::EmptyResponse);
        }
        let parsed = (self.parse)(raw)?;
        (self.validate)(parsed)
    }

    /// Pick the next state after a failed attempt.
    fn after_failure(&self, attempt: u32, failure: StageFailure, raw: Option<String>) -> State<T> {
        tracing::warn!(
            stage = self.name,
            attempt,
            budget = self.budget,
            error = %failure,
            preview = raw.as_deref().map(preview).unwrap_or_default(),
            "stage attempt failed"
        );

        if attempt >= self.budget.max(1) {
            return State::Exhausted {
                attempts: attempt,
                failure,
            };
        }

        match (self.repair_schema, raw) {
            (Some(schema), Some(bad)) if failure.is_repairable() => State::Repairing {
                attempt: attempt + 1,
                bad,
                error: failure.to_string(),
                schema,
            },
            _ => State::Attempting(attempt + 1),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
