//! Event processing pipeline — the main handle_event flow.
//!
//! Stage order follows the webhook contract: resolve → persist → emit →
//! gates (echo, pause) → reset → scripted flow or AI fallback. The HTTP
//! acknowledgement happened long before any of this runs, so nothing here
//! can cause a platform-side redelivery.

use super::flow::{self, Reply};
use super::Gateway;
use leadflow_core::{
    bus::BusEvent,
    contact::{Contact, ContactHints},
    error::LeadflowError,
    flow::FlowStep,
    inbound::InboundMessage,
};
use tracing::{info, warn};

impl Gateway {
    /// Process a single classified inbound event through the full pipeline.
    pub(super) async fn handle_event(&self, incoming: InboundMessage) -> Result<(), LeadflowError> {
        let preview = if incoming.body.chars().count() > 60 {
            let truncated: String = incoming.body.chars().take(60).collect();
            format!("{truncated}...")
        } else {
            incoming.body.clone()
        };
        info!(
            "[{}] {} says: {preview}",
            incoming.phone,
            incoming.sender_name.as_deref().unwrap_or("unknown"),
        );

        // --- 1. RESOLVE CONTACT (with best-effort enrichment) ---
        let hints = self.enrich_hints(&incoming).await;
        let contact = self
            .store
            .resolve_contact(&incoming.phone, &hints, incoming.from_me)
            .await?;

        // --- 2. PERSIST INBOUND LINE ---
        let message = self
            .store
            .append_message(&contact.id, &incoming.body, incoming.from_me)
            .await?;
        self.bus.emit(BusEvent::MessageReceived {
            contact: contact.clone(),
            message,
        });

        // --- 3. ECHO GATE ---
        // The bot account's own messages are history, never prompts.
        if incoming.from_me {
            return Ok(());
        }

        // --- 4. PAUSE GATE ---
        // Human takeover: persist and surface, but keep the flow out of it.
        if contact.is_bot_paused {
            info!("bot paused for {}, ignoring message", contact.phone);
            return Ok(());
        }

        // --- 5. OPERATOR RESET ---
        if flow::is_reset(&incoming.body) {
            return self.handle_reset(&contact).await;
        }

        // --- 6. FLOW OR FALLBACK ---
        match contact.step() {
            Some(FlowStep::AiChat) => self.ai_reply(&contact, &incoming.body).await,
            Some(step) => self.run_scripted_step(&contact, step, &incoming.body).await,
            None => self.recover_corrupted(&contact).await,
        }
    }

    /// Upgrade the payload's identity hints via the platform lookups.
    /// Lookup failures are swallowed — the merge proceeds with whatever
    /// the payload itself carried.
    async fn enrich_hints(&self, incoming: &InboundMessage) -> ContactHints {
        let mut hints = incoming.hints();
        if incoming.from_me {
            return hints;
        }

        if !hints.has_real_name() {
            if let Some(profile) = self.messenger.contact_info(&incoming.phone).await {
                hints.name = profile.name.or(hints.name);
                if hints.avatar_url.is_none() {
                    hints.avatar_url = profile.avatar_url;
                }
            }
        }
        if hints.avatar_url.is_none() {
            hints.avatar_url = self.messenger.profile_picture(&incoming.phone).await;
        }

        hints
    }

    /// Unconditional flow reset: back to the start, profile cleared, one
    /// acknowledgement sent. Bypasses validation entirely.
    async fn handle_reset(&self, contact: &Contact) -> Result<(), LeadflowError> {
        info!("reset command from {}", contact.phone);

        let reply = Reply::Text(flow::RESET_ACK.to_string());
        self.deliver(contact, &reply).await?;
        self.store.reset_flow(&contact.id).await?;
        self.record_outbound(contact, reply.body()).await?;
        Ok(())
    }

    /// Unknown stored step: recover by resetting instead of failing.
    async fn recover_corrupted(&self, contact: &Contact) -> Result<(), LeadflowError> {
        warn!(
            "corrupted flow step {:?} for {}, resetting",
            contact.flow_step, contact.phone
        );

        let reply = Reply::Text(flow::CORRUPTED_RESET.to_string());
        self.deliver(contact, &reply).await?;
        self.store.set_flow_step(&contact.id, FlowStep::New).await?;
        self.record_outbound(contact, reply.body()).await?;
        Ok(())
    }

    /// Generative fallback for contacts past (or outside) the script.
    async fn ai_reply(&self, contact: &Contact, body: &str) -> Result<(), LeadflowError> {
        let mut history = self
            .store
            .recent_history(&contact.id, self.history_limit)
            .await?;

        // The line just appended is the prompt itself, not history.
        if history.last().is_some_and(|last| !last.from_me && last.body == body) {
            history.pop();
        }

        let response = self.responder.generate(&history, body).await?;

        match response {
            Some(text) => {
                let reply = Reply::Text(text);
                self.deliver(contact, &reply).await?;
                self.record_outbound(contact, reply.body()).await?;
            }
            None => {
                // Every model exhausted — "no reply" is the contract, not an error.
                info!("responder produced no reply for {}", contact.phone);
            }
        }
        Ok(())
    }
}
