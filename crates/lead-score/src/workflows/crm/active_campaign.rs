//! ActiveCampaign v3 REST client for deal custom fields.
//!
//! Every request carries the account's static `Api-Token` header. Non-2xx
//! answers become [`CrmError::Api`] with the raw body so callers can surface
//! the CRM's own message.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::gateway::{
    CrmConnection, CrmConnector, CrmError, CrmGateway, FieldMeta, FieldValueEntry,
};

const TOKEN_HEADER: &str = "Api-Token";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const FIELD_META_LIMIT: &str = "100";

/// HTTP client bound to one ActiveCampaign account.
#[derive(Debug, Clone)]
pub struct ActiveCampaignClient {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldMetaPage {
    #[serde(default)]
    deal_custom_field_meta: Vec<FieldMeta>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldDataPage {
    #[serde(default)]
    deal_custom_field_data: Vec<FieldValueEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldDatumEnvelope {
    #[serde(default)]
    deal_custom_field_datum: Option<FieldValueEntry>,
}

impl ActiveCampaignClient {
    pub fn new(client: reqwest::Client, connection: &CrmConnection) -> Self {
        Self {
            client,
            base_url: connection.base_url.clone(),
            api_token: connection.api_token.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/3/{}", self.base_url, path)
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, CrmError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(CrmError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, CrmError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl CrmGateway for ActiveCampaignClient {
    async fn verify_credentials(&self) -> Result<(), CrmError> {
        let response = self
            .client
            .get(self.url("users/me"))
            .header(TOKEN_HEADER, &self.api_token)
            .send()
            .await?;

        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn list_field_meta(&self) -> Result<Vec<FieldMeta>, CrmError> {
        let response = self
            .client
            .get(self.url("dealCustomFieldMeta"))
            .query(&[("limit", FIELD_META_LIMIT)])
            .header(TOKEN_HEADER, &self.api_token)
            .send()
            .await?;

        let page: FieldMetaPage = Self::parse_response(response).await?;
        Ok(page.deal_custom_field_meta)
    }

    async fn find_field_value(
        &self,
        deal_id: &str,
        field_id: &str,
    ) -> Result<Option<FieldValueEntry>, CrmError> {
        let response = self
            .client
            .get(self.url("dealCustomFieldData"))
            .query(&[
                ("filters[dealId]", deal_id),
                ("filters[customFieldId]", field_id),
            ])
            .header(TOKEN_HEADER, &self.api_token)
            .send()
            .await?;

        let page: FieldDataPage = Self::parse_response(response).await?;
        debug!(deal_id, field_id, matches = page.deal_custom_field_data.len(), "field value lookup");
        Ok(page.deal_custom_field_data.into_iter().next())
    }

    async fn update_field_value(&self, entry_id: &str, value: &str) -> Result<(), CrmError> {
        let body = json!({
            "dealCustomFieldDatum": { "fieldValue": value },
        });

        let response = self
            .client
            .put(self.url(&format!("dealCustomFieldData/{entry_id}")))
            .header(TOKEN_HEADER, &self.api_token)
            .json(&body)
            .send()
            .await?;

        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn delete_field_value(&self, entry_id: &str) -> Result<(), CrmError> {
        let response = self
            .client
            .delete(self.url(&format!("dealCustomFieldData/{entry_id}")))
            .header(TOKEN_HEADER, &self.api_token)
            .send()
            .await?;

        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn create_field_value(
        &self,
        deal_id: &str,
        field_id: &str,
        value: &str,
    ) -> Result<Option<String>, CrmError> {
        let body = json!({
            "dealCustomFieldDatum": {
                "dealId": deal_id,
                "customFieldId": field_id,
                "fieldValue": value,
            },
        });

        let response = self
            .client
            .post(self.url("dealCustomFieldData"))
            .header(TOKEN_HEADER, &self.api_token)
            .json(&body)
            .send()
            .await?;

        let envelope: FieldDatumEnvelope = Self::parse_response(response).await?;
        Ok(envelope.deal_custom_field_datum.map(|datum| datum.id))
    }
}

/// Produces [`ActiveCampaignClient`]s sharing one connection pool.
#[derive(Debug, Clone)]
pub struct ActiveCampaignConnector {
    client: reqwest::Client,
}

impl ActiveCampaignConnector {
    pub fn new() -> Result<Self, CrmError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

impl CrmConnector for ActiveCampaignConnector {
    type Gateway = ActiveCampaignClient;

    fn connect(&self, connection: &CrmConnection) -> Result<Self::Gateway, CrmError> {
        Ok(ActiveCampaignClient::new(self.client.clone(), connection))
    }
}
