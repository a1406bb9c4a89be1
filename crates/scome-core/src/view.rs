use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateState {
    #[default]
    Locked,
    Unlocked,
}

impl GateState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateState::Locked => "locked",
            GateState::Unlocked => "unlocked",
        }
    }

    pub fn is_unlocked(&self) -> bool {
        matches!(self, GateState::Unlocked)
    }
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wrong passphrase. The only failure shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Access Denied")]
pub struct GateDenied;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    #[default]
    Home,
    Team,
    Events,
    Resources,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Home, Tab::Team, Tab::Events, Tab::Resources];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tab::Home => "home",
            Tab::Team => "team",
            Tab::Events => "events",
            Tab::Resources => "resources",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tab::Home => "Home",
            Tab::Team => "Team",
            Tab::Events => "Timeline",
            Tab::Resources => "Docs",
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tab {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "home" => Ok(Tab::Home),
            "team" => Ok(Tab::Team),
            "events" | "timeline" => Ok(Tab::Events),
            "resources" | "docs" => Ok(Tab::Resources),
            other => Err(format!("Unknown tab: {other}")),
        }
    }
}

/// Everything the presentation layer reads from the session core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationState {
    pub show_onboarding: bool,
    pub active_tab: Tab,
    pub admin_open: bool,
    pub gate_state: GateState,
    pub visit_total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate_message: Option<String>,
}
