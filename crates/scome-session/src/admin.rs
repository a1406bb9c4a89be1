use chrono::Utc;
use scome_core::{GateDenied, GateState};
use std::sync::Arc;
use tracing::info;

use crate::aggregator::{VisitAggregator, VisitTotal};
use crate::gate::{AccessGate, GateTransition};

/// Core-team dashboard: an access gate in front of the visit aggregator.
pub struct AdminView {
    gate: AccessGate,
    aggregator: Arc<VisitAggregator>,
    dashboard: Option<VisitTotal>,
    message: Option<String>,
}

impl AdminView {
    pub fn new(gate: AccessGate, aggregator: Arc<VisitAggregator>) -> Self {
        Self {
            gate,
            aggregator,
            dashboard: None,
            message: None,
        }
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    /// Unlocking reads the collection exactly once; a failed read still
    /// opens the dashboard with a fallback figure.
    pub async fn submit_passphrase(&mut self, passphrase: &str) -> Result<VisitTotal, GateDenied> {
        match self.gate.submit(passphrase) {
            Ok(GateTransition::Unlocked) => {
                info!(event = "admin_unlocked");
                self.message = None;
                let total = self.aggregator.aggregate_or_fallback(Utc::now()).await;
                self.dashboard = Some(total);
                Ok(total)
            }
            Ok(GateTransition::AlreadyUnlocked) => {
                Ok(self.dashboard.unwrap_or_else(VisitTotal::unavailable))
            }
            Err(denied) => {
                info!(event = "admin_access_denied");
                self.message = Some(denied.to_string());
                Err(denied)
            }
        }
    }

    pub fn close(&mut self) {
        self.gate.close();
        self.dashboard = None;
        self.message = None;
    }

    pub fn dashboard(&self) -> Option<&VisitTotal> {
        self.dashboard.as_ref()
    }

    pub fn visit_total(&self) -> Option<u64> {
        self.dashboard.and_then(|total| total.value)
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}
