//! Orchestrator: classify, route, and never fail.
//!
//! Flow for one run:
//! 1. **Classify** the utterance (heuristics, then model; defaults to complex)
//! 2. **Route** to the simple responder or the task pipeline
//! 3. **Fall back** when the routed path fails: a failed task pipeline hands
//!    over to the simple responder (`Reply::Degraded`), and if that fails too
//!    the caller gets the fixed apology (`Reply::Apology`). A failed simple
//!    route degrades to the canned greeting.
//!
//! Agents are constructed up front and owned by the orchestrator. The only
//! shared state between concurrent runs is the model handles they hold.

use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;
use uuid::Uuid;

use crate::inference::config::{ModelRole, ModelsConfig, PipelineConfig};
use crate::inference::errors::InferenceError;
use crate::inference::registry::ModelRegistry;
use crate::inference::types::ChatMessage;

use super::classifier::Classifier;
use super::context::{ContextAssembler, SessionRef};
use super::prompts::simple_system_prompt;
use super::simple_agent::{SimpleAgent, SIMPLE_FALLBACK_REPLY};
use super::task_agent::{TaskAgent, TaskModels};
use super::types::{IntentType, Reply, Route};

pub struct Orchestrator {
    classifier: Classifier,
    simple: SimpleAgent,
    task: TaskAgent,
    context: Option<Arc<dyn ContextAssembler>>,
}

// ─── Construction ───────────────────────────────────────────────────────────

impl Orchestrator {
    pub fn new(classifier: Classifier, simple: SimpleAgent, task: TaskAgent) -> Self {
        Self {
            classifier,
            simple,
            task,
            context: None,
        }
    }

    /// Attach a session history store used by `run_in_session`.
    pub fn with_context(mut self, assembler: Arc<dyn ContextAssembler>) -> Self {
        self.context = Some(assembler);
        self
    }

    /// Wire every agent from already-built model handles.
    pub fn from_registry(
        registry: &ModelRegistry,
        pipeline: &PipelineConfig,
    ) -> Result<Self, InferenceError> {
        let classifier = Classifier::new(registry.get(ModelRole::Intent)?, pipeline.classifier_retries);
        let simple = SimpleAgent::new(registry.get(ModelRole::Chatting)?, pipeline.persona.clone());
        let task = TaskAgent::new(TaskModels::from_registry(registry)?, pipeline.stage_retries);
        Ok(Self::new(classifier, simple, task))
    }

    /// Build HTTP clients for every role and wire the agents.
    pub fn from_config(config: &ModelsConfig) -> Result<Self, InferenceError> {
        config.validate()?;
        let registry = ModelRegistry::from_config(config)?;
        Self::from_registry(&registry, &config.pipeline)
    }
}

// ─── Entry Points ───────────────────────────────────────────────────────────

impl Orchestrator {
    /// Text-only entry point. Always returns something displayable.
    pub async fn run(&self, utterance: &str) -> String {
        self.handle(utterance).await.into_text()
    }

    /// One stateless turn, reporting which fallback tier answered.
    pub async fn handle(&self, utterance: &str) -> Reply {
        self.dispatch(utterance, None).await
    }

    /// One turn inside a session. Without an attached store, or when the
    /// store fails, the turn runs without history.
    pub async fn run_in_session(&self, utterance: &str, session: &SessionRef) -> Reply {
        let Some(store) = self.context.as_ref() else {
            tracing::debug!("orchestrator: no context store attached");
            return self.dispatch(utterance, None).await;
        };

        let system_prompt = simple_system_prompt(self.simple.persona());
        let history = match store.assemble(&system_prompt, session, utterance).await {
            Ok(messages) => Some(messages),
            Err(e) => {
                tracing::warn!(error = %e, session_id = %session.session_id, "orchestrator: context unavailable");
                None
            }
        };

        let reply = self.dispatch(utterance, history.as_deref()).await;

        if !matches!(reply, Reply::Apology) {
            if let Err(e) = store.record_turn(session, utterance, reply.text()).await {
                tracing::warn!(error = %e, session_id = %session.session_id, "orchestrator: turn not recorded");
            }
        }
        reply
    }

    async fn dispatch(&self, utterance: &str, context: Option<&[ChatMessage]>) -> Reply {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", %run_id);
        async move {
            let start = Instant::now();
            let reply = self.route(utterance, context).await;
            tracing::info!(
                route = ?reply.route(),
                tier = tier_name(&reply),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "orchestrator: run complete"
            );
            reply
        }
        .instrument(span)
        .await
    }

    async fn route(&self, utterance: &str, context: Option<&[ChatMessage]>) -> Reply {
        let classification = self.classifier.classify(utterance).await;

        match classification.intent_type {
            IntentType::Simple => match self.simple.respond(utterance, context).await {
                Ok(text) => Reply::Answered {
                    text,
                    route: Route::Simple,
                },
                // Same responder, so no second call.
                Err(e) => {
                    tracing::warn!(error = %e, "orchestrator: simple route failed; using canned reply");
                    Reply::Degraded {
                        text: SIMPLE_FALLBACK_REPLY.to_string(),
                    }
                }
            },
            IntentType::Complex => {
                let result = match context {
                    Some(history) => self.task.run_with_context(utterance, history).await,
                    None => self.task.run(utterance).await,
                };
                match result {
                    Ok(text) => Reply::Answered {
                        text,
                        route: Route::Task,
                    },
                    Err(e) => {
                        tracing::warn!(error = %e, "orchestrator: task pipeline failed; falling back to simple agent");
                        self.last_resort(utterance, context).await
                    }
                }
            }
        }
    }

    async fn last_resort(&self, utterance: &str, context: Option<&[ChatMessage]>) -> Reply {
        match self.simple.respond(utterance, context).await {
            Ok(text) => Reply::Degraded { text },
            Err(e) => {
                tracing::error!(error = %e, "orchestrator: simple fallback failed");
                Reply::Apology
            }
        }
    }
}

fn tier_name(reply: &Reply) -> &'static str {
    match reply {
        Reply::Answered { .. } => "answered",
        Reply::Degraded { .. } => "degraded",
        Reply::Apology => "apology",
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_core::context::InMemoryHistory;
    use crate::agent_core::test_support::{none, offline, ScriptedModel};
    use crate::agent_core::types::APOLOGY_MESSAGE;

    const INTENT_JSON: &str =
        r#"{"goal":"Build a rate limiter","constraints":"per client","expected_output":"Code"}"#;
    const PLAN_JSON: &str =
        r#"{"plan":["Pick the algorithm","Write the middleware","Test under load"]}"#;
    const CLEAN_JSON: &str = r#"{"issues":[],"suggested_fixes":[]}"#;

    struct Models {
        intent: Arc<ScriptedModel>,
        planning: Arc<ScriptedModel>,
        reasoning: Arc<ScriptedModel>,
        verification: Arc<ScriptedModel>,
        writing: Arc<ScriptedModel>,
        chatting: Arc<ScriptedModel>,
    }

    impl Models {
        fn orchestrator(&self) -> Orchestrator {
            let mut registry = ModelRegistry::new();
            registry.insert(ModelRole::Intent, self.intent.clone());
            registry.insert(ModelRole::Planning, self.planning.clone());
            registry.insert(ModelRole::Reasoning, self.reasoning.clone());
            registry.insert(ModelRole::Verification, self.verification.clone());
            registry.insert(ModelRole::Writing, self.writing.clone());
            registry.insert(ModelRole::Chatting, self.chatting.clone());
            Orchestrator::from_registry(&registry, &PipelineConfig::default()).unwrap()
        }
    }

    fn healthy_task(chatting: ScriptedModel) -> Models {
        Models {
            intent: Arc::new(ScriptedModel::new([Ok(INTENT_JSON)])),
            planning: Arc::new(ScriptedModel::new([Ok(PLAN_JSON)])),
            reasoning: Arc::new(ScriptedModel::new([Ok("draft")])),
            verification: Arc::new(ScriptedModel::new([Ok(CLEAN_JSON)])),
            writing: Arc::new(ScriptedModel::new([Ok("Here is your rate limiter.")])),
            chatting: Arc::new(chatting),
        }
    }

    fn broken_task(chatting: ScriptedModel) -> Models {
        Models {
            intent: Arc::new(ScriptedModel::new([Ok("garbage")])),
            planning: Arc::new(ScriptedModel::silent()),
            reasoning: Arc::new(ScriptedModel::silent()),
            verification: Arc::new(ScriptedModel::new([Ok("more garbage")])),
            writing: Arc::new(ScriptedModel::silent()),
            chatting: Arc::new(chatting),
        }
    }

    #[tokio::test]
    async fn test_complex_request_runs_task_pipeline() {
        let models = healthy_task(ScriptedModel::silent());
        let reply = models
            .orchestrator()
            .handle("implement a rate limiter for an API gateway")
            .await;
        assert_eq!(
            reply,
            Reply::Answered {
                text: "Here is your rate limiter.".into(),
                route: Route::Task,
            }
        );
        // Heuristic classification: the intent model only saw extraction.
        assert_eq!(models.intent.calls(), 1);
        assert_eq!(models.chatting.calls(), 0);
    }

    #[tokio::test]
    async fn test_greeting_goes_to_simple_agent() {
        let models = broken_task(ScriptedModel::new([Ok("Hello! I'm Relay.")]));
        let reply = models.orchestrator().handle("hello").await;
        assert_eq!(reply.route(), Some(Route::Simple));
        assert_eq!(reply.text(), "Hello! I'm Relay.");
        assert_eq!(models.intent.calls(), 0);
    }

    #[tokio::test]
    async fn test_pipeline_failure_degrades_to_simple_agent() {
        let models = broken_task(ScriptedModel::new([Ok("Sorry, here's a short answer.")]));
        let orchestrator = models.orchestrator();
        let reply = orchestrator
            .handle("implement a rate limiter for an API gateway")
            .await;
        assert_eq!(
            reply,
            Reply::Degraded {
                text: "Sorry, here's a short answer.".into()
            }
        );
        assert_eq!(models.chatting.calls(), 1);
        assert_eq!(
            models.chatting.prompts()[0][1].content,
            "implement a rate limiter for an API gateway"
        );
        assert_eq!(models.planning.calls(), 0);
    }

    #[tokio::test]
    async fn test_total_failure_returns_apology() {
        let models = broken_task(ScriptedModel::new([Err(offline())]));
        let orchestrator = models.orchestrator();
        let reply = orchestrator
            .handle("implement a rate limiter for an API gateway")
            .await;
        assert_eq!(reply, Reply::Apology);
        assert_eq!(
            orchestrator.run("implement a rate limiter for an API gateway").await,
            APOLOGY_MESSAGE
        );
    }

    #[tokio::test]
    async fn test_simple_route_failure_degrades_to_canned_greeting() {
        let models = broken_task(ScriptedModel::new([Err(offline())]));
        let reply = models.orchestrator().handle("hello").await;
        assert_eq!(
            reply,
            Reply::Degraded {
                text: SIMPLE_FALLBACK_REPLY.into()
            }
        );
        assert_eq!(models.chatting.calls(), 1);
    }

    #[tokio::test]
    async fn test_unclassifiable_request_defaults_to_task_pipeline() {
        let mut models = healthy_task(ScriptedModel::silent());
        models.intent = Arc::new(ScriptedModel::new([
            Err(offline()),
            Err(offline()),
            Ok(INTENT_JSON),
        ]));
        let reply = models.orchestrator().handle("what about the weird edge cases?").await;
        assert_eq!(reply.route(), Some(Route::Task));
        assert_eq!(models.intent.calls(), 3);
    }

    #[tokio::test]
    async fn test_run_in_session_records_turns() {
        let models = Models {
            chatting: Arc::new(ScriptedModel::new([Ok("Hi Sam!"), Ok("Bye Sam!")])),
            ..broken_task(ScriptedModel::new(none()))
        };
        let history = Arc::new(InMemoryHistory::default());
        let orchestrator = models.orchestrator().with_context(history.clone());
        let session = SessionRef::new("s1");

        orchestrator.run_in_session("hi", &session).await;
        let reply = orchestrator.run_in_session("bye", &session).await;
        assert_eq!(reply.text(), "Bye Sam!");
        assert_eq!(history.len(&session), 4);

        let second = &models.chatting.prompts()[1];
        let contents: Vec<&str> = second.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(&contents[1..], &["hi", "Hi Sam!", "bye"]);
    }

    #[tokio::test]
    async fn test_run_in_session_without_store_is_stateless() {
        let models = broken_task(ScriptedModel::new([Ok("Hey!")]));
        let reply = models
            .orchestrator()
            .run_in_session("hey", &SessionRef::new("s1"))
            .await;
        assert_eq!(reply.text(), "Hey!");
        assert_eq!(models.chatting.prompts()[0].len(), 2);
    }
}
