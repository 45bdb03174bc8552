use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tower::ServiceExt;

use crate::workflows::crm::gateway::{
    CrmConnection, CrmConnector, CrmError, CrmGateway, FieldMeta, FieldValueEntry,
};
use crate::workflows::crm::{crm_router, CrmSyncService};
use crate::workflows::scoring::{CrmSettings, MemoryStorage, RuleStore, SharedRuleStore};

/// CRM double that remembers which base URL each gateway was built for.
#[derive(Default)]
struct RecordingConnector {
    connected_to: Mutex<Vec<String>>,
    stored_entry: Option<&'static str>,
}

struct RecordingGateway {
    stored_entry: Option<&'static str>,
}

#[async_trait]
impl CrmGateway for RecordingGateway {
    async fn verify_credentials(&self) -> Result<(), CrmError> {
        Ok(())
    }

    async fn list_field_meta(&self) -> Result<Vec<FieldMeta>, CrmError> {
        Ok(vec![
            FieldMeta {
                id: "31".to_string(),
                field_label: "Lead Score 2".to_string(),
                field_type: "text".to_string(),
            },
            FieldMeta {
                id: "40".to_string(),
                field_label: "Wedding date".to_string(),
                field_type: "date".to_string(),
            },
        ])
    }

    async fn find_field_value(
        &self,
        _deal_id: &str,
        _field_id: &str,
    ) -> Result<Option<FieldValueEntry>, CrmError> {
        Ok(self.stored_entry.map(|id| FieldValueEntry {
            id: id.to_string(),
            field_value: Some(json!("12")),
        }))
    }

    async fn update_field_value(&self, _entry_id: &str, _value: &str) -> Result<(), CrmError> {
        Ok(())
    }

    async fn delete_field_value(&self, _entry_id: &str) -> Result<(), CrmError> {
        Ok(())
    }

    async fn create_field_value(
        &self,
        _deal_id: &str,
        _field_id: &str,
        _value: &str,
    ) -> Result<Option<String>, CrmError> {
        Ok(Some("900".to_string()))
    }
}

impl CrmConnector for RecordingConnector {
    type Gateway = RecordingGateway;

    fn connect(&self, connection: &CrmConnection) -> Result<Self::Gateway, CrmError> {
        self.connected_to
            .lock()
            .expect("connection log")
            .push(connection.base_url.clone());
        Ok(RecordingGateway {
            stored_entry: self.stored_entry,
        })
    }
}

fn stored_settings() -> CrmSettings {
    CrmSettings {
        base_url: "https://stored.api-us1.com".to_string(),
        api_token: "stored-token".to_string(),
        deal_field: "Lead Score 2".to_string(),
        custom_field_id: String::new(),
    }
}

fn fixture(connector: RecordingConnector) -> (axum::Router, Arc<RecordingConnector>, SharedRuleStore) {
    let connector = Arc::new(connector);
    let store = Arc::new(RwLock::new(RuleStore::load(
        Arc::new(MemoryStorage::default()),
        stored_settings(),
    )));
    let router = crm_router(CrmSyncService::new(connector.clone()), store.clone());
    (router, connector, store)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json payload")
}

#[tokio::test]
async fn connection_test_uses_stored_settings_by_default() {
    let (router, connector, _store) = fixture(RecordingConnector::default());

    let response = router
        .oneshot(post_json("/api/v1/crm/test", json!({})))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "ok": true }));
    assert_eq!(
        *connector.connected_to.lock().expect("connection log"),
        vec!["https://stored.api-us1.com".to_string()]
    );
}

#[tokio::test]
async fn supplied_config_overrides_stored_settings() {
    let (router, connector, _store) = fixture(RecordingConnector::default());

    let response = router
        .oneshot(post_json(
            "/api/v1/crm/test",
            json!({ "config": { "baseUrl": "https://draft.api-us1.com/", "apiToken": "draft" } }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        *connector.connected_to.lock().expect("connection log"),
        vec!["https://draft.api-us1.com".to_string()]
    );
}

#[tokio::test]
async fn resolving_a_field_saves_its_id() {
    let (router, _connector, store) = fixture(RecordingConnector::default());

    let response = router
        .oneshot(post_json("/api/v1/crm/resolve-field", json!({})))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = json_body(response).await;
    assert_eq!(payload["id"], "31");
    assert_eq!(payload["dateWarning"], false);
    assert_eq!(store.read().await.settings().crm.custom_field_id, "31");
}

#[tokio::test]
async fn resolving_a_date_field_carries_the_warning() {
    let (router, _connector, store) = fixture(RecordingConnector::default());

    let response = router
        .oneshot(post_json(
            "/api/v1/crm/resolve-field",
            json!({ "fieldName": "wedding date" }),
        ))
        .await
        .expect("route executes");

    let payload = json_body(response).await;
    assert_eq!(payload["dateWarning"], true);
    let guard = store.read().await;
    assert_eq!(guard.settings().crm.custom_field_id, "40");
    assert_eq!(guard.settings().crm.deal_field, "wedding date");
}

#[tokio::test]
async fn unknown_field_is_not_found() {
    let (router, _connector, store) = fixture(RecordingConnector::default());

    let response = router
        .oneshot(post_json(
            "/api/v1/crm/resolve-field",
            json!({ "fieldName": "Budget" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["ok"], false);
    assert!(store.read().await.settings().crm.custom_field_id.is_empty());
}

#[tokio::test]
async fn push_without_resolved_field_is_a_bad_request() {
    let (router, connector, _store) = fixture(RecordingConnector::default());

    let response = router
        .oneshot(post_json(
            "/api/v1/crm/push",
            json!({ "dealId": "10", "score": 30 }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = json_body(response).await;
    assert!(payload["error"]
        .as_str()
        .unwrap_or_default()
        .contains("custom field id"));
    assert_eq!(connector.connected_to.lock().expect("connection log").len(), 1);
}

#[tokio::test]
async fn push_reports_method_and_entry_id() {
    let (router, _connector, store) = fixture(RecordingConnector {
        stored_entry: Some("77"),
        ..RecordingConnector::default()
    });
    let mut settings = stored_settings();
    settings.custom_field_id = "31".to_string();
    store.write().await.update_crm_settings(settings);

    let response = router
        .oneshot(post_json(
            "/api/v1/crm/push",
            json!({ "dealId": "10", "score": 32.5 }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "ok": true, "id": "77", "method": "update" })
    );
}
