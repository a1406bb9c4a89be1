use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const ONBOARDING_SEEN_KEY: &str = "onboarding_seen";
pub const VISIT_LOGGED_KEY: &str = "visit_logged";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagScope {
    /// Survives restarts; scoped to the device profile.
    Device,
    /// Cleared when the session ends.
    Session,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    OnboardingSeen,
    VisitLogged,
}

impl Flag {
    pub fn key(&self) -> &'static str {
        match self {
            Flag::OnboardingSeen => ONBOARDING_SEEN_KEY,
            Flag::VisitLogged => VISIT_LOGGED_KEY,
        }
    }

    pub fn scope(&self) -> FlagScope {
        match self {
            Flag::OnboardingSeen => FlagScope::Device,
            Flag::VisitLogged => FlagScope::Session,
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlagError {
    #[error("flag storage unavailable: {0}")]
    Unavailable(String),
    #[error("flag storage write failed for {key}: {reason}")]
    Write { key: String, reason: String },
}

/// Boolean key/value storage. Missing keys read as `None`.
pub trait FlagStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<bool>, FlagError>;

    fn set(&self, key: &str, value: bool) -> Result<(), FlagError>;

    fn clear(&self, key: &str) -> Result<(), FlagError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFlags {
    pub onboarding_seen: bool,
    pub visit_logged: bool,
}
