use crate::error::LeadflowError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One tappable choice in a button-list message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ButtonOption {
    pub id: String,
    pub label: String,
}

impl ButtonOption {
    pub fn new(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
        }
    }
}

/// Platform profile data returned by the contact-info lookup.
#[derive(Debug, Clone, Default)]
pub struct PlatformProfile {
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Outbound chat-platform gateway — the send side.
///
/// Sends are fire-and-throw: a failed send propagates to the caller, since
/// a message that never left must not be recorded as delivered. The lookup
/// methods are failure-tolerant and return `None` on any error.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Human-readable adapter name.
    fn name(&self) -> &str;

    /// Send a plain text message.
    async fn send_text(&self, phone: &str, body: &str) -> Result<(), LeadflowError>;

    /// Send a button-list message (ordered tappable choices).
    async fn send_button_list(
        &self,
        phone: &str,
        body: &str,
        options: &[ButtonOption],
    ) -> Result<(), LeadflowError>;

    /// Look up the contact's profile picture URL. Best-effort.
    async fn profile_picture(&self, phone: &str) -> Option<String>;

    /// Look up the contact's platform profile. Best-effort.
    async fn contact_info(&self, phone: &str) -> Option<PlatformProfile>;
}

/// One line of conversation history fed to the AI responder.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// true = bot-authored turn.
    pub from_me: bool,
    pub body: String,
}

/// Generative fallback responder.
///
/// `Ok(None)` means "no reply" — every configured model was exhausted.
/// The caller sends nothing in that case; `None` is not an error.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Human-readable responder name.
    fn name(&self) -> &str;

    /// Produce a reply to `new_message` given chronological history
    /// (oldest first).
    async fn generate(
        &self,
        history: &[HistoryEntry],
        new_message: &str,
    ) -> Result<Option<String>, LeadflowError>;
}
