//! Inference: the model capability the pipeline consumes.
//!
//! This module handles all communication with model endpoints:
//! - The `ModelCapability` trait (messages in, text out)
//! - An OpenAI-compatible HTTP client, streaming and non-streaming
//! - SSE stream decoding
//! - Transport-level retries for transient failures
//! - Configuration loading from `config/models.yaml`
//! - Role → model lookup
//!
//! Providers are interchangeable via config; switching the planner to a
//! different model is a config change, not a code change.

pub mod capability;
pub mod client;
pub mod config;
pub mod errors;
pub mod registry;
pub mod streaming;
pub mod types;

// Re-exports for convenience
pub use capability::ModelCapability;
pub use client::InferenceClient;
pub use config::{ModelConfig, ModelRole, ModelsConfig, PipelineConfig, ProviderConfig};
pub use errors::InferenceError;
pub use registry::ModelRegistry;
pub use types::{ChatMessage, Role};
