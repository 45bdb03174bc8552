use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use lead_score::workflows::crm::{crm_router, CrmConnector, CrmSyncService};
use lead_score::workflows::scoring::{scoring_router, SharedRuleStore};
use lead_score::workflows::webhooks::{webhook_router, SharedInbox};
use serde_json::json;

/// Every workflow router plus the operational endpoints.
pub(crate) fn with_api_routes<C>(
    store: SharedRuleStore,
    inbox: SharedInbox,
    crm: CrmSyncService<C>,
) -> axum::Router
where
    C: CrmConnector,
{
    scoring_router(store.clone())
        .merge(crm_router(crm, store))
        .merge(webhook_router(inbox))
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
