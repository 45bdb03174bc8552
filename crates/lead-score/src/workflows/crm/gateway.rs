use async_trait::async_trait;
use axum::http::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};

use crate::workflows::scoring::CrmSettings;

/// Custom field definition as listed by the CRM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMeta {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub field_label: String,
    #[serde(default)]
    pub field_type: String,
}

/// Stored value of a custom field on one deal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldValueEntry {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub field_value: Option<serde_json::Value>,
}

/// Validated connection values: base URL without trailing slash plus token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrmConnection {
    pub base_url: String,
    pub api_token: String,
}

impl CrmConnection {
    pub fn from_settings(settings: &CrmSettings) -> Result<Self, CrmError> {
        let base_url = settings.base_url.trim().trim_end_matches('/');
        let api_token = settings.api_token.trim();
        if base_url.is_empty() || api_token.is_empty() {
            return Err(CrmError::Configuration(
                "base URL and API token are required".to_string(),
            ));
        }

        Ok(Self {
            base_url: base_url.to_string(),
            api_token: api_token.to_string(),
        })
    }
}

/// One method per CRM REST call used by the sync workflow.
#[async_trait]
pub trait CrmGateway: Send + Sync {
    async fn verify_credentials(&self) -> Result<(), CrmError>;
    async fn list_field_meta(&self) -> Result<Vec<FieldMeta>, CrmError>;
    async fn find_field_value(
        &self,
        deal_id: &str,
        field_id: &str,
    ) -> Result<Option<FieldValueEntry>, CrmError>;
    async fn update_field_value(&self, entry_id: &str, value: &str) -> Result<(), CrmError>;
    async fn delete_field_value(&self, entry_id: &str) -> Result<(), CrmError>;
    async fn create_field_value(
        &self,
        deal_id: &str,
        field_id: &str,
        value: &str,
    ) -> Result<Option<String>, CrmError>;
}

/// Builds a gateway for a validated connection.
pub trait CrmConnector: Send + Sync + 'static {
    type Gateway: CrmGateway;

    fn connect(&self, connection: &CrmConnection) -> Result<Self::Gateway, CrmError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CrmError {
    #[error("incomplete CRM configuration: {0}")]
    Configuration(String),
    #[error("custom field '{0}' not found")]
    FieldNotFound(String),
    #[error("CRM returned HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("update failed (field id {field_id}, entry id {entry_id}): {body}")]
    UpdateFailed {
        field_id: String,
        entry_id: String,
        status: u16,
        body: String,
    },
    #[error("create failed (field id {field_id}): {body}")]
    CreateFailed {
        field_id: String,
        status: u16,
        body: String,
    },
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl CrmError {
    /// CRM status carried by the error, when the CRM answered at all.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            CrmError::Api { status, .. }
            | CrmError::UpdateFailed { status, .. }
            | CrmError::CreateFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The CRM rejected the stored value's shape (HTTP 422).
    pub fn is_unprocessable(&self) -> bool {
        matches!(self, CrmError::Api { status, .. } if *status == StatusCode::UNPROCESSABLE_ENTITY.as_u16())
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            CrmError::Configuration(_) => StatusCode::BAD_REQUEST,
            CrmError::FieldNotFound(_) => StatusCode::NOT_FOUND,
            CrmError::Request(_) => StatusCode::BAD_GATEWAY,
            other => other
                .upstream_status()
                .and_then(|status| StatusCode::from_u16(status).ok())
                .filter(|status| status.is_client_error() || status.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
        }
    }
}

/// CRM ids arrive as JSON strings or numbers depending on the endpoint.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    })
}
