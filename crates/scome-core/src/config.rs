use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::{CollectionPath, PathError};

pub const DEFAULT_APP_NAMESPACE: &str = "default-app-id";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid service config json: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("service config field {0} is empty")]
    EmptyField(&'static str),
}

/// Connection settings for the hosted identity and document services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    pub api_key: String,
    #[serde(default)]
    pub auth_domain: Option<String>,
    pub project_id: String,
}

impl ServiceConfig {
    /// Placeholder used when the hosting environment supplies no config.
    pub fn mock() -> Self {
        Self {
            api_key: "mock-key".to_string(),
            auth_domain: Some("mock.firebaseapp.com".to_string()),
            project_id: "mock-project".to_string(),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        if config.api_key.trim().is_empty() {
            return Err(ConfigError::EmptyField("apiKey"));
        }
        if config.project_id.trim().is_empty() {
            return Err(ConfigError::EmptyField("projectId"));
        }
        Ok(config)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::mock()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    pub service: ServiceConfig,
    pub app_namespace: String,
    pub delegated_token: Option<String>,
    /// Figure shown on the dashboard when a read fails and nothing was read before.
    pub fallback_visit_total: Option<u64>,
}

impl HubConfig {
    pub fn new(service: ServiceConfig, app_namespace: impl Into<String>) -> Self {
        Self {
            service,
            app_namespace: app_namespace.into(),
            delegated_token: None,
            fallback_visit_total: None,
        }
    }

    /// Blank tokens are treated as absent.
    pub fn with_delegated_token(mut self, token: Option<String>) -> Self {
        self.delegated_token = token
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        self
    }

    pub fn with_fallback_visit_total(mut self, total: Option<u64>) -> Self {
        self.fallback_visit_total = total;
        self
    }

    pub fn visits_collection(&self) -> Result<CollectionPath, PathError> {
        CollectionPath::visits(&self.app_namespace)
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self::new(ServiceConfig::mock(), DEFAULT_APP_NAMESPACE)
    }
}
