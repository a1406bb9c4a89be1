use scome_core::{Flag, FlagError, FlagScope, FlagStore, SessionFlags};
use std::sync::Arc;
use tracing::warn;

/// Routes each [`Flag`] to the store matching its scope.
#[derive(Clone)]
pub struct LocalFlags {
    device: Arc<dyn FlagStore>,
    session: Arc<dyn FlagStore>,
}

impl LocalFlags {
    pub fn new(device: Arc<dyn FlagStore>, session: Arc<dyn FlagStore>) -> Self {
        Self { device, session }
    }

    fn store(&self, flag: Flag) -> &dyn FlagStore {
        match flag.scope() {
            FlagScope::Device => self.device.as_ref(),
            FlagScope::Session => self.session.as_ref(),
        }
    }

    /// Unreadable flags read as unset.
    pub fn get_flag(&self, flag: Flag) -> bool {
        match self.store(flag).get(flag.key()) {
            Ok(value) => value.unwrap_or(false),
            Err(err) => {
                warn!(event = "flag_read_failed", flag = %flag, error = %err);
                false
            }
        }
    }

    pub fn set_flag(&self, flag: Flag, value: bool) -> Result<(), FlagError> {
        self.store(flag).set(flag.key(), value)
    }

    pub fn clear_flag(&self, flag: Flag) -> Result<(), FlagError> {
        self.store(flag).clear(flag.key())
    }

    pub fn snapshot(&self) -> SessionFlags {
        SessionFlags {
            onboarding_seen: self.get_flag(Flag::OnboardingSeen),
            visit_logged: self.get_flag(Flag::VisitLogged),
        }
    }
}
