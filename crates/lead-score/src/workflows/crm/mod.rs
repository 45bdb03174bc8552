//! CRM synchronisation: pushes computed scores into ActiveCampaign deal fields.

pub mod active_campaign;
pub mod gateway;
pub mod router;
pub mod sync;

#[cfg(test)]
mod tests;

pub use active_campaign::{ActiveCampaignClient, ActiveCampaignConnector};
pub use gateway::{CrmConnection, CrmConnector, CrmError, CrmGateway, FieldMeta, FieldValueEntry};
pub use router::crm_router;
pub use sync::{score_text, select_field, CrmSyncService, PushOutcome, ResolvedField, SyncMethod};
