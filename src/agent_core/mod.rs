//! Agent Core: the orchestration and repair pipeline.
//!
//! Submodules:
//! - `parsers`: JSON decoding (code-fence tolerant) and plan extraction
//! - `validators`: Shape contracts for intent, plan, classification, feedback
//! - `repair`: Ask a model to fix output that failed parsing or validation
//! - `stage`: Bounded retry/repair state machine shared by every stage
//! - `classifier`: Heuristic + model-backed simple/complex routing
//! - `task_agent`: Six-stage pipeline for complex requests
//! - `simple_agent`: Single-call persona responder
//! - `orchestrator`: Classify, route, and fall back
//! - `context`: Session history seam
//! - `service`: Request validation and response envelope
//! - `prompts`: Prompt builders and schema descriptions
//! - `types`: Shared types across the agent core
//! - `errors`: Agent-level error types

pub mod classifier;
pub mod context;
pub mod errors;
pub mod orchestrator;
pub mod parsers;
pub mod prompts;
pub mod repair;
pub mod service;
pub mod simple_agent;
pub mod stage;
pub mod task_agent;
pub mod types;
pub mod validators;

pub(crate) mod text;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenience
pub use classifier::Classifier;
pub use context::{ContextAssembler, InMemoryHistory, SessionRef};
pub use errors::{
    ClassificationError, ContextError, ParseError, PipelineError, PlanParseError, ServiceError,
    StageFailure, ValidationError,
};
pub use orchestrator::Orchestrator;
pub use service::{ChatRequest, ChatResponse, ChatService};
pub use simple_agent::SimpleAgent;
pub use stage::{ExhaustionPolicy, StageExecutor, StageOutcome};
pub use task_agent::{TaskAgent, TaskModels, TaskReport};
pub use types::{
    Classification, ClassificationSource, Constraints, Intent, IntentType, Plan, Reply, Route,
    VerifierFeedback,
};
