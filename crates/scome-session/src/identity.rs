use async_trait::async_trait;
use scome_core::{
    issue_delegated_token, verify_delegated_token, Identity, IdentityError, IdentityService,
};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

/// Picks the sign-in path from configuration and exposes auth-state changes.
pub struct IdentityAdapter {
    service: Arc<dyn IdentityService>,
    delegated_token: Option<String>,
}

impl IdentityAdapter {
    pub fn new(service: Arc<dyn IdentityService>, delegated_token: Option<String>) -> Self {
        Self {
            service,
            delegated_token,
        }
    }

    /// Single attempt; the caller decides what a failure means.
    pub async fn acquire(&self) -> Result<Identity, IdentityError> {
        match self.delegated_token.as_deref() {
            Some(token) => {
                debug!(event = "identity_acquire", mode = "delegated");
                self.service.acquire_delegated(token).await
            }
            None => {
                debug!(event = "identity_acquire", mode = "anonymous");
                self.service.acquire_anonymous().await
            }
        }
    }

    pub fn current(&self) -> Option<Identity> {
        self.service.on_auth_state_changed().borrow().clone()
    }

    /// Calls `on_change` with the current identity right away, then once per
    /// auth-state change. Changes that land while a call is still running are
    /// coalesced into the latest value.
    pub fn subscribe<F, Fut>(&self, mut on_change: F) -> Subscription
    where
        F: FnMut(Option<Identity>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut changes = self.service.on_auth_state_changed();
        let task = tokio::spawn(async move {
            loop {
                let current = changes.borrow_and_update().clone();
                on_change(current).await;
                if changes.changed().await.is_err() {
                    break;
                }
            }
        });
        Subscription { task }
    }
}

/// Live auth-state subscription; dropping it stops delivery.
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// In-process identity provider.
///
/// Anonymous sign-in mints a random subject and keeps it for the life of the
/// service. Delegated sign-in accepts tokens produced by [`issue_delegated_token`]
/// with the same signing key.
pub struct LocalIdentityService {
    signing_key: String,
    state: watch::Sender<Option<Identity>>,
}

impl LocalIdentityService {
    pub fn new(signing_key: impl Into<String>) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            signing_key: signing_key.into(),
            state,
        }
    }

    pub fn issue_token(&self, subject: &str) -> String {
        issue_delegated_token(&self.signing_key, subject)
    }

    pub fn sign_out(&self) {
        self.state.send_replace(None);
    }

    fn publish(&self, identity: Identity) -> Identity {
        self.state.send_replace(Some(identity.clone()));
        identity
    }
}

#[async_trait]
impl IdentityService for LocalIdentityService {
    async fn acquire_delegated(&self, token: &str) -> Result<Identity, IdentityError> {
        let subject = verify_delegated_token(&self.signing_key, token)?;
        Ok(self.publish(Identity::delegated(subject)))
    }

    async fn acquire_anonymous(&self) -> Result<Identity, IdentityError> {
        let existing = self.state.borrow().clone();
        if let Some(identity) = existing.filter(|identity| identity.is_anonymous) {
            return Ok(identity);
        }
        let subject = Uuid::new_v4().simple().to_string();
        Ok(self.publish(Identity::anonymous(subject)))
    }

    fn on_auth_state_changed(&self) -> watch::Receiver<Option<Identity>> {
        self.state.subscribe()
    }
}
