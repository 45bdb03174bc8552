use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::error;

use super::currency::parse_brl;
use super::domain::{CrmSettings, RuleId};
use super::engine::ScoreInput;
use super::store::{RuleChangeError, RuleStore};

/// Rule store shared by every HTTP handler.
pub type SharedRuleStore = Arc<RwLock<RuleStore>>;

/// Form values arrive either as JSON numbers or as the text the user typed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FormValue {
    Number(f64),
    Text(String),
}

impl FormValue {
    /// Currency reading: text goes through the BRL parser.
    pub fn amount(&self) -> f64 {
        match self {
            FormValue::Number(value) => *value,
            FormValue::Text(text) => parse_brl(text),
        }
    }

    pub fn text(&self) -> String {
        match self {
            FormValue::Number(value) => value.to_string(),
            FormValue::Text(text) => text.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NewRegionRequest {
    pub name: String,
    pub weight: f64,
}

#[derive(Debug, Deserialize)]
pub struct NewThresholdRequest {
    pub value: FormValue,
    pub weight: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CutoffRequest {
    pub cutoff_score: f64,
}

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub region: String,
    pub guests: FormValue,
    pub investment: FormValue,
}

/// Router builder exposing the admin tables and the calculator.
pub fn scoring_router(store: SharedRuleStore) -> Router {
    Router::new()
        .route("/api/v1/rules", get(rules_handler))
        .route("/api/v1/rules/regions", post(add_region_handler))
        .route("/api/v1/rules/regions/:id", delete(remove_region_handler))
        .route("/api/v1/rules/thresholds", post(add_threshold_handler))
        .route(
            "/api/v1/rules/thresholds/:id",
            delete(remove_threshold_handler),
        )
        .route("/api/v1/rules/cutoff", put(cutoff_handler))
        .route("/api/v1/rules/crm", put(crm_settings_handler))
        .route("/api/v1/rules/reset", post(reset_handler))
        .route("/api/v1/score", post(score_handler))
        .with_state(store)
}

/// Apply a store mutation on the blocking pool; mutations write their slice to storage.
pub(crate) async fn mutate_store<T, F>(store: &SharedRuleStore, change: F) -> Result<T, Response>
where
    F: FnOnce(&mut RuleStore) -> T + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || change(&mut store.blocking_write()))
        .await
        .map_err(|err| {
            error!(error = %err, "rule store update did not complete");
            let payload = json!({ "error": "rule store update failed" });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        })
}

pub(crate) async fn rules_handler(State(store): State<SharedRuleStore>) -> Response {
    let snapshot = store.read().await.snapshot();
    (StatusCode::OK, Json(snapshot)).into_response()
}

pub(crate) async fn add_region_handler(
    State(store): State<SharedRuleStore>,
    Json(request): Json<NewRegionRequest>,
) -> Response {
    let result = match mutate_store(&store, move |rules| {
        rules.add_region(&request.name, request.weight)
    })
    .await
    {
        Ok(result) => result,
        Err(response) => return response,
    };
    match result {
        Ok(region) => (StatusCode::CREATED, Json(region)).into_response(),
        Err(error) => rule_change_error(error),
    }
}

pub(crate) async fn remove_region_handler(
    State(store): State<SharedRuleStore>,
    Path(id): Path<String>,
) -> Response {
    let id = RuleId(id);
    let target = id.clone();
    let removed = match mutate_store(&store, move |rules| rules.remove_region(&target)).await {
        Ok(removed) => removed,
        Err(response) => return response,
    };
    (StatusCode::OK, Json(json!({ "id": id, "removed": removed }))).into_response()
}

pub(crate) async fn add_threshold_handler(
    State(store): State<SharedRuleStore>,
    Json(request): Json<NewThresholdRequest>,
) -> Response {
    let value = request.value.amount();
    let weight = request.weight;
    let result = match mutate_store(&store, move |rules| rules.add_threshold(value, weight)).await {
        Ok(result) => result,
        Err(response) => return response,
    };
    match result {
        Ok(threshold) => (StatusCode::CREATED, Json(threshold)).into_response(),
        Err(error) => rule_change_error(error),
    }
}

pub(crate) async fn remove_threshold_handler(
    State(store): State<SharedRuleStore>,
    Path(id): Path<String>,
) -> Response {
    let id = RuleId(id);
    let target = id.clone();
    let removed = match mutate_store(&store, move |rules| rules.remove_threshold(&target)).await {
        Ok(removed) => removed,
        Err(response) => return response,
    };
    (StatusCode::OK, Json(json!({ "id": id, "removed": removed }))).into_response()
}

pub(crate) async fn cutoff_handler(
    State(store): State<SharedRuleStore>,
    Json(request): Json<CutoffRequest>,
) -> Response {
    let cutoff = request.cutoff_score;
    let result = mutate_store(&store, move |rules| {
        rules.set_cutoff(cutoff).map(|()| rules.settings().clone())
    })
    .await;
    match result {
        Ok(Ok(settings)) => (StatusCode::OK, Json(settings)).into_response(),
        Ok(Err(error)) => rule_change_error(error),
        Err(response) => response,
    }
}

pub(crate) async fn crm_settings_handler(
    State(store): State<SharedRuleStore>,
    Json(settings): Json<CrmSettings>,
) -> Response {
    let result = mutate_store(&store, move |rules| {
        rules.update_crm_settings(settings);
        rules.settings().clone()
    })
    .await;
    match result {
        Ok(settings) => (StatusCode::OK, Json(settings)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn reset_handler(State(store): State<SharedRuleStore>) -> Response {
    let result = mutate_store(&store, |rules| {
        rules.reset_to_defaults();
        rules.snapshot()
    })
    .await;
    match result {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn score_handler(
    State(store): State<SharedRuleStore>,
    Json(request): Json<ScoreRequest>,
) -> Response {
    let ScoreRequest {
        region,
        guests,
        investment,
    } = request;

    let input = match ScoreInput::from_parts(&region, &guests.text(), investment.amount()) {
        Ok(input) => input,
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
        }
    };

    let guard = store.read().await;
    let result = input.evaluate(
        guard.regions(),
        guard.thresholds(),
        guard.settings().cutoff_score,
    );
    (StatusCode::OK, Json(result)).into_response()
}

fn rule_change_error(error: RuleChangeError) -> Response {
    let status = match error {
        RuleChangeError::DuplicateThreshold(_) => StatusCode::CONFLICT,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    };
    let payload = json!({ "error": error.to_string() });
    (status, Json(payload)).into_response()
}
