//! Inbound webhook payload handling — filtering, unwrapping, and normalization.
//!
//! Pure classification: no persistence, no I/O. The pipeline acts only on
//! [`Classification::Message`]; everything else is dropped with a reason.

use chrono::Utc;
use leadflow_core::inbound::InboundMessage;
use serde::Deserialize;
use uuid::Uuid;

/// Event types that carry no conversational content — presence, typing,
/// delivery receipts, status updates. Always dropped.
const NOISE_TYPES: [&str; 4] = [
    "PresenceChatCallback",
    "MessageStatusCallback",
    "DeliveryCallback",
    "ConnectedCallback",
];

/// Raw Z-API webhook payload. Every field is optional so that unexpected
/// event shapes still deserialize and can be classified (then dropped)
/// instead of failing the request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub from_me: bool,
    /// Free-text message shape.
    pub text: Option<TextPayload>,
    /// Button-click reply shape.
    pub buttons_response_message: Option<ButtonsResponse>,
    pub sender_name: Option<String>,
    pub chat_name: Option<String>,
    /// Avatar URL. Z-API has used both field names across versions.
    #[serde(alias = "profilePicUrl")]
    pub photo: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextPayload {
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonsResponse {
    pub button_id: Option<String>,
    pub message: Option<String>,
}

/// Why a payload was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Presence/typing/delivery/status notification.
    Noise,
    /// No sender phone.
    MissingPhone,
    /// Neither a text body nor a button-reply body.
    NoContent,
    /// Sender is this bot or a sibling bot — never answer our own traffic.
    ServiceNumber,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Noise => "noise event",
            Self::MissingPhone => "missing phone",
            Self::NoContent => "no message content",
            Self::ServiceNumber => "service number",
        }
    }
}

/// Classifier outcome.
#[derive(Debug)]
pub enum Classification {
    Drop(DropReason),
    Message(InboundMessage),
}

/// Classify a raw webhook payload.
///
/// `service_numbers` are the registered bot numbers whose traffic must be
/// ignored entirely (distinct from `fromMe`, which marks the bot account's
/// own outbound echoes — those ARE persisted, just never answered).
pub fn classify(event: &WebhookEvent, service_numbers: &[String]) -> Classification {
    if let Some(ref t) = event.event_type {
        if NOISE_TYPES.contains(&t.as_str()) {
            return Classification::Drop(DropReason::Noise);
        }
    }

    let phone = match event.phone.as_deref() {
        Some(p) if !p.is_empty() => p,
        _ => return Classification::Drop(DropReason::MissingPhone),
    };

    // Free text and button replies arrive in different shapes; either one
    // counts as content and both feed the same validation downstream.
    let (body, is_button_reply) = match extract_body(event) {
        Some(found) => found,
        None => return Classification::Drop(DropReason::NoContent),
    };

    if service_numbers.iter().any(|n| n == phone) {
        return Classification::Drop(DropReason::ServiceNumber);
    }

    Classification::Message(InboundMessage {
        id: Uuid::new_v4(),
        phone: phone.to_string(),
        body,
        from_me: event.from_me,
        sender_name: event
            .sender_name
            .clone()
            .or_else(|| event.chat_name.clone()),
        avatar_url: event.photo.clone(),
        is_button_reply,
        received_at: Utc::now(),
    })
}

fn extract_body(event: &WebhookEvent) -> Option<(String, bool)> {
    if let Some(msg) = event.text.as_ref().and_then(|t| t.message.as_deref()) {
        if !msg.is_empty() {
            return Some((msg.to_string(), false));
        }
    }
    if let Some(ref reply) = event.buttons_response_message {
        // Prefer the button id — it is the stable token the flow validates.
        let body = reply
            .button_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .or(reply.message.as_deref().filter(|m| !m.is_empty()))?;
        return Some((body.to_string(), true));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_event(phone: &str, message: &str) -> WebhookEvent {
        WebhookEvent {
            event_type: Some("ReceivedCallback".into()),
            phone: Some(phone.into()),
            text: Some(TextPayload {
                message: Some(message.into()),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_noise_types_dropped() {
        for t in ["PresenceChatCallback", "MessageStatusCallback", "DeliveryCallback"] {
            let event = WebhookEvent {
                event_type: Some(t.into()),
                phone: Some("5511999990000".into()),
                text: Some(TextPayload {
                    message: Some("oi".into()),
                }),
                ..Default::default()
            };
            match classify(&event, &[]) {
                Classification::Drop(DropReason::Noise) => {}
                other => panic!("{t} should drop as noise, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_missing_phone_dropped() {
        let event = WebhookEvent {
            event_type: Some("ReceivedCallback".into()),
            text: Some(TextPayload {
                message: Some("oi".into()),
            }),
            ..Default::default()
        };
        assert!(matches!(
            classify(&event, &[]),
            Classification::Drop(DropReason::MissingPhone)
        ));
    }

    #[test]
    fn test_no_content_dropped() {
        let event = WebhookEvent {
            event_type: Some("ReceivedCallback".into()),
            phone: Some("5511999990000".into()),
            ..Default::default()
        };
        assert!(matches!(
            classify(&event, &[]),
            Classification::Drop(DropReason::NoContent)
        ));
    }

    #[test]
    fn test_service_number_dropped() {
        let event = text_event("5511999990000", "oi");
        let service = vec!["5511999990000".to_string()];
        assert!(matches!(
            classify(&event, &service),
            Classification::Drop(DropReason::ServiceNumber)
        ));
    }

    #[test]
    fn test_text_message_classified() {
        let mut event = text_event("5511999990000", "quero um site");
        event.sender_name = Some("Ana".into());
        event.photo = Some("https://pps.example/ana.jpg".into());
        match classify(&event, &[]) {
            Classification::Message(msg) => {
                assert_eq!(msg.phone, "5511999990000");
                assert_eq!(msg.body, "quero um site");
                assert!(!msg.from_me);
                assert!(!msg.is_button_reply);
                assert_eq!(msg.sender_name.as_deref(), Some("Ana"));
            }
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[test]
    fn test_button_reply_uses_button_id() {
        let event = WebhookEvent {
            event_type: Some("ReceivedCallback".into()),
            phone: Some("5511999990000".into()),
            buttons_response_message: Some(ButtonsResponse {
                button_id: Some("2".into()),
                message: Some("Loja virtual".into()),
            }),
            ..Default::default()
        };
        match classify(&event, &[]) {
            Classification::Message(msg) => {
                assert_eq!(msg.body, "2");
                assert!(msg.is_button_reply);
            }
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[test]
    fn test_chat_name_fallback_hint() {
        let mut event = text_event("5511999990000", "oi");
        event.chat_name = Some("Ana Souza".into());
        match classify(&event, &[]) {
            Classification::Message(msg) => {
                assert_eq!(msg.sender_name.as_deref(), Some("Ana Souza"));
            }
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[test]
    fn test_from_me_flag_preserved() {
        let json = r#"{
            "type": "ReceivedCallback",
            "phone": "5511999990000",
            "fromMe": true,
            "text": { "message": "resposta do bot" }
        }"#;
        let event: WebhookEvent = serde_json::from_str(json).unwrap();
        match classify(&event, &[]) {
            Classification::Message(msg) => assert!(msg.from_me),
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_payload_shape_still_deserializes() {
        let json = r#"{"type": "SomeFutureCallback", "whatever": {"nested": 1}}"#;
        let event: WebhookEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(
            classify(&event, &[]),
            Classification::Drop(DropReason::MissingPhone)
        ));
    }

    #[test]
    fn test_profile_pic_url_alias() {
        let json = r#"{
            "type": "ReceivedCallback",
            "phone": "5511999990000",
            "profilePicUrl": "https://pps.example/a.jpg",
            "text": { "message": "oi" }
        }"#;
        let event: WebhookEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.photo.as_deref(), Some("https://pps.example/a.jpg"));
    }
}
