use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, put};
use axum::{Json, Router};
use lead_score::workflows::crm::{
    ActiveCampaignConnector, CrmError, CrmSyncService, SyncMethod,
};
use lead_score::workflows::scoring::CrmSettings;
use serde_json::{json, Value};

const TOKEN: &str = "mock-token";

/// Scripted stand-in for the ActiveCampaign v3 API.
#[derive(Default)]
struct MockCrm {
    existing_entry: Option<u64>,
    update_status: u16,
    requests: Vec<String>,
    created_values: Vec<Value>,
}

type SharedMock = Arc<Mutex<MockCrm>>;

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("Api-Token")
        .and_then(|value| value.to_str().ok())
        == Some(TOKEN)
}

async fn users_me(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if authorized(&headers) {
        (StatusCode::OK, Json(json!({ "user": { "id": "1" } })))
    } else {
        (StatusCode::FORBIDDEN, Json(json!({ "message": "No Result found" })))
    }
}

async fn field_meta(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    assert_eq!(query.get("limit").map(String::as_str), Some("100"));
    Json(json!({
        "dealCustomFieldMeta": [
            { "id": 4, "fieldLabel": "Lead Score 2", "fieldType": "date" },
            { "id": "11", "fieldLabel": "Lead Score 2", "fieldType": "text" },
            { "id": 8, "fieldLabel": "lead score 2", "fieldType": "number" }
        ]
    }))
}

async fn find_data(
    State(mock): State<SharedMock>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let mut guard = mock.lock().expect("mock state");
    guard.requests.push(format!(
        "GET deal={} field={}",
        query.get("filters[dealId]").cloned().unwrap_or_default(),
        query.get("filters[customFieldId]").cloned().unwrap_or_default()
    ));
    let entries: Vec<Value> = guard
        .existing_entry
        .map(|id| json!({ "id": id.to_string(), "fieldValue": "12" }))
        .into_iter()
        .collect();
    Json(json!({ "dealCustomFieldData": entries }))
}

async fn update_data(
    State(mock): State<SharedMock>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut guard = mock.lock().expect("mock state");
    guard.requests.push(format!(
        "PUT {id} {}",
        body["dealCustomFieldDatum"]["fieldValue"].as_str().unwrap_or_default()
    ));
    let status = StatusCode::from_u16(guard.update_status).unwrap_or(StatusCode::OK);
    (status, Json(json!({ "errors": [{ "title": "rejected" }] })))
}

async fn delete_data(State(mock): State<SharedMock>, Path(id): Path<String>) -> StatusCode {
    let mut guard = mock.lock().expect("mock state");
    guard.requests.push(format!("DELETE {id}"));
    guard.existing_entry = None;
    StatusCode::OK
}

async fn create_data(
    State(mock): State<SharedMock>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut guard = mock.lock().expect("mock state");
    guard.requests.push("POST".to_string());
    guard.created_values.push(body["dealCustomFieldDatum"].clone());
    (
        StatusCode::CREATED,
        Json(json!({ "dealCustomFieldDatum": { "id": 901, "fieldValue": "30" } })),
    )
}

async fn spawn_mock(mock: SharedMock) -> SocketAddr {
    let app = Router::new()
        .route("/api/3/users/me", get(users_me))
        .route("/api/3/dealCustomFieldMeta", get(field_meta))
        .route(
            "/api/3/dealCustomFieldData",
            get(find_data).post(create_data),
        )
        .route(
            "/api/3/dealCustomFieldData/:id",
            put(update_data).delete(delete_data),
        )
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock CRM");
    let addr = listener.local_addr().expect("mock address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock CRM serves");
    });
    addr
}

fn settings(addr: SocketAddr, token: &str) -> CrmSettings {
    CrmSettings {
        base_url: format!("http://{addr}/"),
        api_token: token.to_string(),
        deal_field: "Lead Score 2".to_string(),
        custom_field_id: "11".to_string(),
    }
}

fn service() -> CrmSyncService<ActiveCampaignConnector> {
    CrmSyncService::new(Arc::new(
        ActiveCampaignConnector::new().expect("http client builds"),
    ))
}

#[tokio::test]
async fn unprocessable_update_is_replaced_by_a_new_entry() {
    let mock = Arc::new(Mutex::new(MockCrm {
        existing_entry: Some(55),
        update_status: 422,
        ..MockCrm::default()
    }));
    let addr = spawn_mock(mock.clone()).await;

    let outcome = service()
        .push_score("10", 30.0, &settings(addr, TOKEN))
        .await
        .expect("push recovers");

    assert!(outcome.ok);
    assert_eq!(outcome.method, SyncMethod::Create);
    assert_eq!(outcome.id.as_deref(), Some("901"));

    let guard = mock.lock().expect("mock state");
    assert_eq!(
        guard.requests,
        vec!["GET deal=10 field=11", "PUT 55 30", "DELETE 55", "POST"]
    );
    assert_eq!(
        guard.created_values[0],
        json!({ "dealId": "10", "customFieldId": "11", "fieldValue": "30" })
    );
}

#[tokio::test]
async fn successful_update_keeps_the_entry() {
    let mock = Arc::new(Mutex::new(MockCrm {
        existing_entry: Some(55),
        update_status: 200,
        ..MockCrm::default()
    }));
    let addr = spawn_mock(mock.clone()).await;

    let outcome = service()
        .push_score("10", 32.5, &settings(addr, TOKEN))
        .await
        .expect("update succeeds");

    assert_eq!(outcome.method, SyncMethod::Update);
    assert_eq!(outcome.id.as_deref(), Some("55"));
    assert_eq!(
        mock.lock().expect("mock state").requests,
        vec!["GET deal=10 field=11", "PUT 55 32.5"]
    );
}

#[tokio::test]
async fn server_errors_on_update_are_not_retried() {
    let mock = Arc::new(Mutex::new(MockCrm {
        existing_entry: Some(55),
        update_status: 500,
        ..MockCrm::default()
    }));
    let addr = spawn_mock(mock.clone()).await;

    let error = service()
        .push_score("10", 30.0, &settings(addr, TOKEN))
        .await
        .expect_err("update fails");

    assert!(matches!(error, CrmError::UpdateFailed { status: 500, .. }));
    assert_eq!(mock.lock().expect("mock state").requests.len(), 2);
}

#[tokio::test]
async fn field_resolution_prefers_text_types_with_the_newest_id() {
    let mock = Arc::new(Mutex::new(MockCrm::default()));
    let addr = spawn_mock(mock).await;

    let resolved = service()
        .resolve_field(&settings(addr, TOKEN), "LEAD SCORE 2")
        .await
        .expect("field resolves");

    assert_eq!(resolved.id, "11");
    assert_eq!(resolved.field_type, "text");
    assert!(!resolved.date_warning);
    assert!(resolved.debug.contains("[id 4, type date]"));
}

#[tokio::test]
async fn connection_test_reports_rejected_tokens() {
    let mock = Arc::new(Mutex::new(MockCrm::default()));
    let addr = spawn_mock(mock).await;
    let service = service();

    service
        .test_connection(&settings(addr, TOKEN))
        .await
        .expect("valid token");

    let error = service
        .test_connection(&settings(addr, "wrong"))
        .await
        .expect_err("token rejected");
    assert_eq!(error.upstream_status(), Some(403));
}
