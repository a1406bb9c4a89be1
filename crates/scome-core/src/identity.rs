use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::sync::watch;

use crate::sha256_hex;

/// Separates the subject from its signature in a delegated token.
const TOKEN_SEPARATOR: char = '.';

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub is_anonymous: bool,
}

impl Identity {
    pub fn anonymous(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_anonymous: true,
        }
    }

    pub fn delegated(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_anonymous: false,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_anonymous {
            write!(f, "anonymous:{}", self.id)
        } else {
            write!(f, "delegated:{}", self.id)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("identity service unavailable: {0}")]
    Unavailable(String),
    #[error("delegated token rejected: {0}")]
    TokenRejected(String),
}

/// Boundary to the external identity provider.
///
/// `on_auth_state_changed` hands out a watch receiver whose current value is
/// the signed-in identity (or `None`); every sign-in or sign-out replaces it.
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn acquire_delegated(&self, token: &str) -> Result<Identity, IdentityError>;

    async fn acquire_anonymous(&self) -> Result<Identity, IdentityError>;

    fn on_auth_state_changed(&self) -> watch::Receiver<Option<Identity>>;
}

/// Mints a delegated token for `subject`, signed with `signing_key`.
pub fn issue_delegated_token(signing_key: &str, subject: &str) -> String {
    format!(
        "{subject}{TOKEN_SEPARATOR}{}",
        token_signature(signing_key, subject)
    )
}

/// Returns the subject of a delegated token when its signature matches.
pub fn verify_delegated_token(signing_key: &str, token: &str) -> Result<String, IdentityError> {
    let token = token.trim();
    let (subject, signature) = token
        .rsplit_once(TOKEN_SEPARATOR)
        .ok_or_else(|| IdentityError::TokenRejected("malformed token".to_string()))?;
    if subject.is_empty() {
        return Err(IdentityError::TokenRejected("empty subject".to_string()));
    }
    if signature != token_signature(signing_key, subject) {
        return Err(IdentityError::TokenRejected(format!(
            "signature mismatch for subject {subject}"
        )));
    }
    Ok(subject.to_string())
}

fn token_signature(signing_key: &str, subject: &str) -> String {
    sha256_hex(format!("{signing_key}:{subject}").as_bytes())
}
