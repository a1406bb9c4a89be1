use scome_core::{GateDenied, GateState};

/// Core-team passphrase, fixed at compile time. Override by building with
/// `SCOME_ADMIN_PASSPHRASE` set.
pub const SHARED_SECRET: &str = match option_env!("SCOME_ADMIN_PASSPHRASE") {
    Some(passphrase) => passphrase,
    None => "SCOME_coreteam_analysis",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateTransition {
    Unlocked,
    AlreadyUnlocked,
}

/// Local plaintext comparison; keeps casual visitors out of the dashboard and
/// nothing more.
#[derive(Debug, Clone)]
pub struct AccessGate {
    secret: String,
    state: GateState,
}

impl AccessGate {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            state: GateState::Locked,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Submissions while unlocked are ignored.
    pub fn submit(&mut self, passphrase: &str) -> Result<GateTransition, GateDenied> {
        if self.state.is_unlocked() {
            return Ok(GateTransition::AlreadyUnlocked);
        }
        if passphrase != self.secret {
            return Err(GateDenied);
        }
        self.state = GateState::Unlocked;
        Ok(GateTransition::Unlocked)
    }

    pub fn close(&mut self) {
        self.state = GateState::Locked;
    }
}

impl Default for AccessGate {
    fn default() -> Self {
        Self::new(SHARED_SECRET)
    }
}
