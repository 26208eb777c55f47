use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::flow::FlowStep;

/// A conversation participant, keyed by phone number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    /// Unique, stable key. One contact per phone.
    pub phone: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    /// Operator override: while set, the scripted flow never runs.
    pub is_bot_paused: bool,
    /// Current state of the qualification dialogue, as stored.
    /// May hold an unrecognized value (corrupted state) — the FSM recovers
    /// by resetting, so this stays a raw string until validated.
    pub flow_step: String,
    pub last_interaction: DateTime<Utc>,
}

impl Contact {
    /// Parse the stored flow step, or `None` for corrupted state.
    pub fn step(&self) -> Option<FlowStep> {
        FlowStep::parse(&self.flow_step)
    }
}

/// Best-effort identity hints carried by an inbound event.
#[derive(Debug, Clone, Default)]
pub struct ContactHints {
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

impl ContactHints {
    /// Whether the name hint carries real information. The platform fills
    /// in "Unknown" placeholders; merging those would erase a known name.
    pub fn has_real_name(&self) -> bool {
        matches!(&self.name, Some(n) if !n.trim().is_empty() && n != "Unknown")
    }
}

/// One inbound or outbound chat line. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub contact_id: String,
    /// true = sent by the bot, false = received from the contact.
    pub from_me: bool,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

/// Structured qualification answers, one row per contact.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LeadProfile {
    pub contact_id: String,
    pub interest: Option<String>,
    pub has_site: Option<String>,
    pub sells_online: Option<String>,
    pub product_count: Option<String>,
    pub main_goal: Option<String>,
    /// Normalized to "1" (presentation) or "2" (meeting).
    pub offer_choice: Option<String>,
    pub score: i64,
}

/// A partial profile update captured by one FSM transition.
/// `None` fields are left untouched on merge; `score_delta` accumulates.
#[derive(Debug, Clone, Default)]
pub struct ProfileFields {
    pub interest: Option<String>,
    pub has_site: Option<String>,
    pub sells_online: Option<String>,
    pub product_count: Option<String>,
    pub main_goal: Option<String>,
    pub offer_choice: Option<String>,
    pub score_delta: i64,
}
