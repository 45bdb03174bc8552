use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::gateway::{CrmConnector, CrmError};
use super::sync::CrmSyncService;
use crate::workflows::scoring::router::mutate_store;
use crate::workflows::scoring::{CrmSettings, SharedRuleStore};

/// Connection values travel with the request or fall back to the stored settings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTestRequest {
    #[serde(default)]
    pub config: Option<CrmSettings>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveFieldRequest {
    #[serde(default)]
    pub field_name: Option<String>,
    #[serde(default)]
    pub config: Option<CrmSettings>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushScoreRequest {
    pub deal_id: String,
    pub score: f64,
    #[serde(default)]
    pub config: Option<CrmSettings>,
}

pub struct CrmState<C> {
    service: CrmSyncService<C>,
    store: SharedRuleStore,
}

impl<C> Clone for CrmState<C> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            store: self.store.clone(),
        }
    }
}

pub fn crm_router<C>(service: CrmSyncService<C>, store: SharedRuleStore) -> Router
where
    C: CrmConnector,
{
    Router::new()
        .route("/api/v1/crm/test", post(test_connection_handler::<C>))
        .route("/api/v1/crm/resolve-field", post(resolve_field_handler::<C>))
        .route("/api/v1/crm/push", post(push_score_handler::<C>))
        .with_state(CrmState { service, store })
}

async fn effective_settings(store: &SharedRuleStore, supplied: Option<CrmSettings>) -> CrmSettings {
    match supplied {
        Some(settings) => settings,
        None => store.read().await.settings().crm.clone(),
    }
}

pub(crate) async fn test_connection_handler<C>(
    State(state): State<CrmState<C>>,
    Json(request): Json<ConnectionTestRequest>,
) -> Response
where
    C: CrmConnector,
{
    let settings = effective_settings(&state.store, request.config).await;
    match state.service.test_connection(&settings).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "ok": true }))).into_response(),
        Err(error) => crm_error(error),
    }
}

pub(crate) async fn resolve_field_handler<C>(
    State(state): State<CrmState<C>>,
    Json(request): Json<ResolveFieldRequest>,
) -> Response
where
    C: CrmConnector,
{
    let mut settings = effective_settings(&state.store, request.config).await;
    let label = request
        .field_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| settings.deal_field.clone());

    let resolved = match state.service.resolve_field(&settings, &label).await {
        Ok(resolved) => resolved,
        Err(error) => return crm_error(error),
    };

    settings.deal_field = label;
    settings.custom_field_id = resolved.id.clone();
    if let Err(response) =
        mutate_store(&state.store, move |rules| rules.update_crm_settings(settings)).await
    {
        return response;
    }
    info!(field_id = %resolved.id, "custom field resolved and saved");

    let payload = json!({
        "ok": true,
        "id": resolved.id,
        "fieldType": resolved.field_type,
        "dateWarning": resolved.date_warning,
        "debug": resolved.debug,
    });
    (StatusCode::OK, Json(payload)).into_response()
}

pub(crate) async fn push_score_handler<C>(
    State(state): State<CrmState<C>>,
    Json(request): Json<PushScoreRequest>,
) -> Response
where
    C: CrmConnector,
{
    let settings = effective_settings(&state.store, request.config).await;
    match state
        .service
        .push_score(&request.deal_id, request.score, &settings)
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(error) => crm_error(error),
    }
}

fn crm_error(error: CrmError) -> Response {
    let status = error.http_status();
    warn!(%status, error = %error, "CRM request failed");
    let payload = json!({ "ok": false, "error": error.to_string() });
    (status, Json(payload)).into_response()
}
