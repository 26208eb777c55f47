//! HTTP server: the always-ack webhook endpoint, the operator API, and the
//! real-time event stream.
//!
//! The webhook route answers 200 before any downstream work happens — the
//! event is classified, enqueued for the gateway, and the platform never
//! sees a processing failure (which would trigger redelivery storms).

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use leadflow_core::{
    bus::{BusEvent, EventBus},
    config::ApiConfig,
    inbound::InboundMessage,
    traits::Messenger,
};
use leadflow_memory::Store;
use leadflow_zapi::webhook::{classify, Classification, WebhookEvent};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub tx: mpsc::Sender<InboundMessage>,
    pub store: Store,
    pub messenger: Arc<dyn Messenger>,
    pub bus: EventBus,
    pub api_key: Option<String>,
    pub service_numbers: Arc<Vec<String>>,
    pub uptime: Instant,
}

/// Constant-time string comparison to prevent timing attacks on token checks.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Check bearer token auth. Returns `None` if authorized, `Some(response)` if rejected.
fn check_auth(headers: &HeaderMap, api_key: &Option<String>) -> Option<(StatusCode, Json<Value>)> {
    let key = match api_key {
        Some(k) => k,
        None => return None, // No auth configured — allow all.
    };

    let header = match headers.get("authorization") {
        Some(h) => h,
        None => {
            return Some((
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "missing Authorization header"})),
            ));
        }
    };

    let value = match header.to_str() {
        Ok(v) => v,
        Err(_) => {
            return Some((
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "invalid Authorization header"})),
            ));
        }
    };

    match value.strip_prefix("Bearer ") {
        Some(token) if constant_time_eq(token, key) => None, // Authorized.
        _ => Some((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid token"})),
        )),
    }
}

/// `POST /webhooks/zapi` — platform event intake. Always acknowledges:
/// the body is taken as raw bytes so even a malformed payload gets a 200,
/// never a platform-visible failure.
async fn webhook(State(state): State<ApiState>, body: axum::body::Bytes) -> Json<Value> {
    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!("unparseable webhook payload: {e}");
            return Json(json!({"status": "received"}));
        }
    };

    match classify(&event, &state.service_numbers) {
        Classification::Drop(reason) => {
            debug!("dropping webhook event: {}", reason.as_str());
        }
        Classification::Message(message) => {
            if state.tx.send(message).await.is_err() {
                warn!("gateway receiver closed, webhook event lost");
            }
        }
    }

    Json(json!({"status": "received"}))
}

/// `GET /api/health` — uptime and database reachability.
async fn health(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    Ok(Json(json!({
        "status": "ok",
        "uptime_secs": state.uptime.elapsed().as_secs(),
        "db": if state.store.ping().await { "ok" } else { "unreachable" },
    })))
}

/// `GET /api/contacts` — all contacts, most recently active first.
async fn list_contacts(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let contacts = state.store.list_contacts().await.map_err(internal)?;
    Ok(Json(json!({"contacts": contacts})))
}

/// `GET /api/contacts/{phone}/messages` — full conversation, oldest first.
async fn contact_messages(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(phone): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let contact = state
        .store
        .get_contact(&phone)
        .await
        .map_err(internal)?
        .ok_or_else(not_found)?;
    let messages = state
        .store
        .messages_for(&contact.id)
        .await
        .map_err(internal)?;
    Ok(Json(json!({"messages": messages})))
}

#[derive(Deserialize)]
struct PauseRequest {
    paused: bool,
}

/// `POST /api/contacts/{phone}/pause` — operator takeover toggle.
async fn pause_contact(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(phone): Path<String>,
    Json(req): Json<PauseRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let contact = state
        .store
        .set_paused(&phone, req.paused)
        .await
        .map_err(internal)?
        .ok_or_else(not_found)?;
    info!(
        "bot {} for {phone}",
        if req.paused { "paused" } else { "resumed" }
    );
    Ok(Json(json!({"contact": contact})))
}

#[derive(Deserialize)]
struct SendRequest {
    message: String,
}

/// `POST /api/contacts/{phone}/send` — manual operator send.
async fn send_to_contact(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(phone): Path<String>,
    Json(req): Json<SendRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let contact = state
        .store
        .get_contact(&phone)
        .await
        .map_err(internal)?
        .ok_or_else(not_found)?;

    // Fire-and-throw: a failed send must not be recorded as delivered.
    state
        .messenger
        .send_text(&phone, &req.message)
        .await
        .map_err(|e| {
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({"error": e.to_string()})),
            )
        })?;

    let message = state
        .store
        .append_message(&contact.id, &req.message, true)
        .await
        .map_err(internal)?;
    state.bus.emit(BusEvent::MessageSent {
        contact,
        message: message.clone(),
    });

    Ok(Json(json!({"message": message})))
}

/// `GET /api/settings/{key}` — key-value configuration read.
async fn get_setting(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(key): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let value = state
        .store
        .get_setting(&key)
        .await
        .map_err(internal)?
        .ok_or_else(not_found)?;
    Ok(Json(json!({"key": key, "value": value})))
}

#[derive(Deserialize)]
struct SettingRequest {
    value: String,
}

/// `PUT /api/settings/{key}` — key-value configuration write.
async fn put_setting(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(key): Path<String>,
    Json(req): Json<SettingRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    state
        .store
        .set_setting(&key, &req.value)
        .await
        .map_err(internal)?;
    Ok(Json(json!({"key": key, "value": req.value})))
}

/// `GET /ws` — real-time event stream. Each bus event is one JSON frame.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ApiState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: ApiState) {
    let mut rx = state.bus.subscribe();
    let (mut sender, mut receiver) = socket.split();

    info!("realtime observer connected");

    let forward = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            let payload = match serde_json::to_string(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("event serialization failed: {e}");
                    continue;
                }
            };
            if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    // Drain (and ignore) client frames until the peer goes away.
    while let Some(Ok(frame)) = receiver.next().await {
        if matches!(frame, WsMessage::Close(_)) {
            break;
        }
    }

    forward.abort();
    info!("realtime observer disconnected");
}

fn internal(e: leadflow_core::error::LeadflowError) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": e.to_string()})),
    )
}

fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": "contact not found"})),
    )
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/webhooks/zapi", post(webhook))
        .route("/api/health", get(health))
        .route("/api/contacts", get(list_contacts))
        .route("/api/contacts/{phone}/messages", get(contact_messages))
        .route("/api/contacts/{phone}/pause", post(pause_contact))
        .route("/api/contacts/{phone}/send", post(send_to_contact))
        .route("/api/settings/{key}", get(get_setting).put(put_setting))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(state: ApiState, config: &ApiConfig) {
    let addr = format!("{}:{}", config.host, config.port);
    let app = router(state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("failed to bind {addr}: {e}");
            return;
        }
    };

    info!("api listening on {addr}");
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("api server stopped: {e}");
    }
}
