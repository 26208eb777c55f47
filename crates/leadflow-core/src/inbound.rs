use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::contact::ContactHints;

/// A classified inbound chat message, normalized from the raw webhook payload.
///
/// Button-click replies and free text arrive in different payload shapes but
/// are normalized into the same `body` — the flow validates both identically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: Uuid,
    /// Sender phone number (the contact key).
    pub phone: String,
    /// Message text, from whichever payload shape was populated.
    pub body: String,
    /// True when the message originated from the bot account itself.
    pub from_me: bool,
    /// Display-name hint, if the platform provided one.
    pub sender_name: Option<String>,
    /// Avatar URL hint.
    pub avatar_url: Option<String>,
    /// Whether the body came from a button-list reply rather than free text.
    pub is_button_reply: bool,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn hints(&self) -> ContactHints {
        ContactHints {
            name: self.sender_name.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}
