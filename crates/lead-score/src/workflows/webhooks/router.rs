use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::inbox::WebhookInbox;

pub type SharedInbox = Arc<WebhookInbox>;

pub fn webhook_router(inbox: SharedInbox) -> Router {
    Router::new()
        .route(
            "/api/webhook/active",
            get(list_handler).post(receive_handler).delete(clear_handler),
        )
        .with_state(inbox)
}

/// Reads the raw body so malformed JSON gets the inbox's own error shape.
pub(crate) async fn receive_handler(State(inbox): State<SharedInbox>, body: Bytes) -> Response {
    let data: Value = match serde_json::from_slice(&body) {
        Ok(data) => data,
        Err(error) => {
            warn!(error = %error, "rejected malformed webhook payload");
            let payload = json!({ "ok": false, "error": "invalid JSON" });
            return (StatusCode::BAD_REQUEST, Json(payload)).into_response();
        }
    };

    let payload = match tokio::task::spawn_blocking(move || inbox.record(data)).await {
        Ok(payload) => payload,
        Err(err) => return inbox_failure(err),
    };
    info!(id = %payload.id, "webhook received");
    let body = json!({ "ok": true, "id": payload.id, "receivedAt": payload.received_at });
    (StatusCode::OK, Json(body)).into_response()
}

pub(crate) async fn list_handler(State(inbox): State<SharedInbox>) -> Response {
    (StatusCode::OK, Json(inbox.list())).into_response()
}

pub(crate) async fn clear_handler(State(inbox): State<SharedInbox>) -> Response {
    match tokio::task::spawn_blocking(move || inbox.clear()).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "ok": true }))).into_response(),
        Err(err) => inbox_failure(err),
    }
}

fn inbox_failure(err: tokio::task::JoinError) -> Response {
    error!(error = %err, "webhook inbox update did not complete");
    let payload = json!({ "ok": false, "error": "inbox update failed" });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
}
