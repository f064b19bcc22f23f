//! Role → model capability lookup.
//!
//! Built once at startup and handed to the agents, which keep their own
//! `Arc` clones. There is no process-wide cache.

use std::collections::HashMap;
use std::sync::Arc;

use super::capability::ModelCapability;
use super::client::InferenceClient;
use super::config::{ModelRole, ModelsConfig};
use super::errors::InferenceError;

#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<ModelRole, Arc<dyn ModelCapability>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an HTTP client for every role present in the configuration.
    pub fn from_config(config: &ModelsConfig) -> Result<Self, InferenceError> {
        let mut registry = Self::new();
        for role in ModelRole::ALL {
            if config.models.contains_key(&role) {
                let client = InferenceClient::for_role(config, role)?;
                registry.insert(role, Arc::new(client));
            }
        }
        tracing::info!(
            roles = ?registry.models.keys().map(ModelRole::as_str).collect::<Vec<_>>(),
            "model registry built"
        );
        Ok(registry)
    }

    /// Bind (or replace) the capability for `role`.
    pub fn insert(&mut self, role: ModelRole, model: Arc<dyn ModelCapability>) {
        self.models.insert(role, model);
    }

    pub fn get(&self, role: ModelRole) -> Result<Arc<dyn ModelCapability>, InferenceError> {
        self.models
            .get(&role)
            .cloned()
            .ok_or(InferenceError::UnknownRole {
                role: role.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::config::parse_models_config;

    #[test]
    fn test_from_config_registers_configured_roles_only() {
        let yaml = r#"
            providers:
              local:
                base_url: "http://localhost:11434/v1"
            models:
              chatting:
                provider: local
                model: chat
                temperature: 0.9
                max_tokens: 128
        "#;
        let config = parse_models_config(yaml).unwrap();
        let registry = ModelRegistry::from_config(&config).unwrap();

        assert_eq!(registry.get(ModelRole::Chatting).unwrap().name(), "chatting:chat");
        assert!(matches!(
            registry.get(ModelRole::Writing),
            Err(InferenceError::UnknownRole { .. })
        ));
    }
}
