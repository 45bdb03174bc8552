use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::gateway::{CrmConnection, CrmConnector, CrmError, CrmGateway, FieldMeta};
use crate::workflows::scoring::CrmSettings;

/// Field types able to hold a numeric score as text.
const PREFERRED_FIELD_TYPES: [&str; 4] = ["text", "textarea", "currency", "number"];
const DATE_FIELD_TYPES: [&str; 2] = ["date", "datetime"];

/// How the score reached the CRM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMethod {
    Update,
    Create,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushOutcome {
    pub ok: bool,
    pub id: Option<String>,
    pub method: SyncMethod,
}

/// Custom field picked for a label, plus every candidate that matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedField {
    pub id: String,
    pub field_type: String,
    /// Date fields reject numeric scores.
    pub date_warning: bool,
    pub debug: String,
}

/// Pick the best field among those whose label matches `label`.
///
/// Score-compatible types win over the rest; ties go to the newest (highest) id.
pub fn select_field(fields: &[FieldMeta], label: &str) -> Option<ResolvedField> {
    let wanted = label.to_lowercase();
    let mut matches: Vec<&FieldMeta> = fields
        .iter()
        .filter(|field| field.field_label.to_lowercase() == wanted)
        .collect();

    matches.sort_by(|a, b| match (is_preferred(a), is_preferred(b)) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => numeric_id(b).cmp(&numeric_id(a)),
    });

    let target = matches.first()?;
    let debug = matches
        .iter()
        .map(|field| format!("[id {}, type {}]", field.id, field.field_type))
        .collect::<Vec<_>>()
        .join("; ");

    Some(ResolvedField {
        id: target.id.clone(),
        field_type: target.field_type.clone(),
        date_warning: DATE_FIELD_TYPES.contains(&target.field_type.as_str()),
        debug: format!("matches: {debug}"),
    })
}

fn is_preferred(field: &FieldMeta) -> bool {
    PREFERRED_FIELD_TYPES.contains(&field.field_type.as_str())
}

fn numeric_id(field: &FieldMeta) -> u64 {
    field.id.trim().parse().unwrap_or(0)
}

/// Score text as the CRM stores it: `30`, `32.5`.
pub fn score_text(score: f64) -> String {
    score.to_string()
}

/// Pushes scores into the CRM through a pluggable connector.
pub struct CrmSyncService<C> {
    connector: Arc<C>,
}

impl<C> Clone for CrmSyncService<C> {
    fn clone(&self) -> Self {
        Self {
            connector: Arc::clone(&self.connector),
        }
    }
}

impl<C> CrmSyncService<C>
where
    C: CrmConnector,
{
    pub fn new(connector: Arc<C>) -> Self {
        Self { connector }
    }

    fn gateway(&self, settings: &CrmSettings) -> Result<C::Gateway, CrmError> {
        let connection = CrmConnection::from_settings(settings)?;
        self.connector.connect(&connection)
    }

    /// Check the credentials against the CRM's current-user endpoint.
    pub async fn test_connection(&self, settings: &CrmSettings) -> Result<(), CrmError> {
        let gateway = self.gateway(settings)?;
        gateway.verify_credentials().await
    }

    /// Find the custom field id for a human-readable label.
    pub async fn resolve_field(
        &self,
        settings: &CrmSettings,
        label: &str,
    ) -> Result<ResolvedField, CrmError> {
        let gateway = self.gateway(settings)?;
        if label.trim().is_empty() {
            return Err(CrmError::Configuration("field name is required".to_string()));
        }

        let fields = gateway.list_field_meta().await?;
        let resolved =
            select_field(&fields, label).ok_or_else(|| CrmError::FieldNotFound(label.to_string()))?;

        if resolved.date_warning {
            warn!(field_id = %resolved.id, field_type = %resolved.field_type, "resolved field stores dates, not scores");
        }
        Ok(resolved)
    }

    /// Make the deal's custom field hold `score`, updating or creating the entry.
    pub async fn push_score(
        &self,
        deal_id: &str,
        score: f64,
        settings: &CrmSettings,
    ) -> Result<PushOutcome, CrmError> {
        let gateway = self.gateway(settings)?;

        let deal_id = deal_id.trim();
        if deal_id.is_empty() {
            return Err(CrmError::Configuration("deal id is required".to_string()));
        }
        let field_id = settings.custom_field_id.trim();
        if field_id.is_empty() {
            return Err(CrmError::Configuration(
                "custom field id is not configured".to_string(),
            ));
        }

        let value = score_text(score);
        let existing = gateway.find_field_value(deal_id, field_id).await?;

        if let Some(entry) = existing {
            match gateway.update_field_value(&entry.id, &value).await {
                Ok(()) => {
                    info!(deal_id, entry_id = %entry.id, score, "CRM field updated");
                    return Ok(PushOutcome {
                        ok: true,
                        id: Some(entry.id),
                        method: SyncMethod::Update,
                    });
                }
                Err(err) if err.is_unprocessable() => {
                    warn!(deal_id, entry_id = %entry.id, "CRM rejected update as unprocessable; recreating entry");
                    remove_stale_entry(&gateway, &entry.id).await?;
                }
                Err(CrmError::Api { status, body }) => {
                    return Err(CrmError::UpdateFailed {
                        field_id: field_id.to_string(),
                        entry_id: entry.id,
                        status,
                        body,
                    });
                }
                Err(other) => return Err(other),
            }
        }

        let id = gateway
            .create_field_value(deal_id, field_id, &value)
            .await
            .map_err(|err| match err {
                CrmError::Api { status, body } => CrmError::CreateFailed {
                    field_id: field_id.to_string(),
                    status,
                    body,
                },
                other => other,
            })?;

        info!(deal_id, entry_id = ?id, score, "CRM field created");
        Ok(PushOutcome {
            ok: true,
            id,
            method: SyncMethod::Create,
        })
    }
}

/// A CRM refusal to delete is logged and the create still runs; transport
/// failures abort the push.
async fn remove_stale_entry<G: CrmGateway>(gateway: &G, entry_id: &str) -> Result<(), CrmError> {
    match gateway.delete_field_value(entry_id).await {
        Ok(()) => Ok(()),
        Err(CrmError::Api { status, body }) => {
            warn!(entry_id, status, %body, "stale CRM entry was not deleted");
            Ok(())
        }
        Err(other) => Err(other),
    }
}
