//! Gateway — the processing side of the webhook pipeline.
//!
//! The HTTP layer acknowledges and enqueues; everything after that happens
//! here: contact resolution, persistence, the scripted flow or the AI
//! fallback, and outbound delivery. Work for different phone numbers runs
//! fully in parallel; events for the same phone are serialized.

mod flow;
mod pipeline;


use flow::Reply;
use leadflow_core::{
    bus::{BusEvent, EventBus},
    contact::{Contact, StoredMessage},
    error::LeadflowError,
    inbound::InboundMessage,
    traits::{Messenger, Responder},
};
use leadflow_memory::Store;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info};

/// The central gateway wiring store, messenger, responder, and event bus.
pub struct Gateway {
    pub(crate) store: Store,
    pub(crate) messenger: Arc<dyn Messenger>,
    pub(crate) responder: Arc<dyn Responder>,
    pub(crate) bus: EventBus,
    pub(crate) history_limit: usize,
    pub(crate) admin_phone: String,
    /// Phones with an event being processed. New events for an active phone
    /// are buffered here and drained in arrival order — the flow's
    /// read-validate-transition-write must never interleave per contact.
    active_contacts: Mutex<HashMap<String, Vec<InboundMessage>>>,
}

impl Gateway {
    pub fn new(
        store: Store,
        messenger: Arc<dyn Messenger>,
        responder: Arc<dyn Responder>,
        bus: EventBus,
        history_limit: usize,
        admin_phone: String,
    ) -> Self {
        Self {
            store,
            messenger,
            responder,
            bus,
            history_limit,
            admin_phone,
            active_contacts: Mutex::new(HashMap::new()),
        }
    }

    /// Run the main event loop until the sender side closes or ctrl-c.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<InboundMessage>) -> anyhow::Result<()> {
        info!(
            "leadflow gateway running | messenger: {} | responder: {}",
            self.messenger.name(),
            self.responder.name(),
        );

        loop {
            tokio::select! {
                maybe = rx.recv() => match maybe {
                    Some(incoming) => {
                        let gw = self.clone();
                        tokio::spawn(async move {
                            gw.dispatch(incoming).await;
                        });
                    }
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("received shutdown signal");
                    break;
                }
            }
        }

        info!("gateway stopped");
        Ok(())
    }

    /// Dispatch one event: buffer if the phone is busy, otherwise process
    /// and then drain whatever queued up meanwhile.
    pub(crate) async fn dispatch(self: Arc<Self>, incoming: InboundMessage) {
        let phone = incoming.phone.clone();

        {
            let mut active = self.active_contacts.lock().await;
            if let Some(buffer) = active.get_mut(&phone) {
                buffer.push(incoming);
                info!("buffered event from {phone} (processing in progress)");
                return;
            }
            active.insert(phone.clone(), Vec::new());
        }

        self.process(incoming).await;

        loop {
            let next = {
                let mut active = self.active_contacts.lock().await;
                match active.get_mut(&phone) {
                    Some(buffer) if !buffer.is_empty() => Some(buffer.remove(0)),
                    _ => {
                        active.remove(&phone);
                        None
                    }
                }
            };

            match next {
                Some(buffered) => {
                    info!("processing buffered event from {phone}");
                    self.process(buffered).await;
                }
                None => break,
            }
        }
    }

    /// The single point that converts pipeline errors into a log line.
    /// The platform already got its acknowledgement at the HTTP layer.
    async fn process(&self, incoming: InboundMessage) {
        let phone = incoming.phone.clone();
        if let Err(e) = self.handle_event(incoming).await {
            error!("event processing for {phone} failed: {e}");
        }
    }

    /// Push a reply over the wire. Nothing is persisted here — callers
    /// commit state and record the message only after this succeeds.
    pub(crate) async fn deliver(
        &self,
        contact: &Contact,
        reply: &Reply,
    ) -> Result<(), LeadflowError> {
        match reply {
            Reply::Text(body) => self.messenger.send_text(&contact.phone, body).await,
            Reply::Buttons { body, options } => {
                self.messenger
                    .send_button_list(&contact.phone, body, options)
                    .await
            }
        }
    }

    /// Append a delivered outbound line and publish it to observers.
    pub(crate) async fn record_outbound(
        &self,
        contact: &Contact,
        body: &str,
    ) -> Result<StoredMessage, LeadflowError> {
        let message = self.store.append_message(&contact.id, body, true).await?;
        self.bus.emit(BusEvent::MessageSent {
            contact: contact.clone(),
            message: message.clone(),
        });
        Ok(message)
    }
}
