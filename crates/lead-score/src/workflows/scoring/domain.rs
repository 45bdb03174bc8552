use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier shared by region and threshold rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub String);

impl RuleId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RuleId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Score contribution for the region a couple picked for the wedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRule {
    pub id: RuleId,
    pub name: String,
    pub weight: f64,
}

impl RegionRule {
    pub fn matches(&self, region_name: &str) -> bool {
        self.name.to_lowercase() == region_name.to_lowercase()
    }
}

/// Per-guest investment floor and the weight it unlocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub id: RuleId,
    pub value: f64,
    pub weight: f64,
}

/// ActiveCampaign connection values edited on the integration screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmSettings {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_token: String,
    #[serde(default)]
    pub deal_field: String,
    #[serde(default)]
    pub custom_field_id: String,
}

/// Admin-editable settings persisted next to the rule tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub cutoff_score: f64,
    #[serde(rename = "activeCampaign", default)]
    pub crm: CrmSettings,
}

pub const DEFAULT_CUTOFF_SCORE: f64 = 30.0;

pub fn default_regions() -> Vec<RegionRule> {
    [("1", "Europa", 5.0), ("2", "Nordeste", 20.0), ("3", "Caribe", 30.0), ("4", "Mendoza", 10.0)]
        .into_iter()
        .map(|(id, name, weight)| RegionRule {
            id: RuleId::from(id),
            name: name.to_string(),
            weight,
        })
        .collect()
}

pub fn default_thresholds() -> Vec<ThresholdRule> {
    [
        ("1", 1500.0, 5.0),
        ("2", 2000.0, 10.0),
        ("3", 2500.0, 15.0),
        ("4", 3000.0, 15.0),
        ("5", 3500.0, 25.0),
        ("6", 4000.0, 30.0),
    ]
    .into_iter()
    .map(|(id, value, weight)| ThresholdRule {
        id: RuleId::from(id),
        value,
        weight,
    })
    .collect()
}

pub fn default_settings(crm_seed: &CrmSettings) -> AppSettings {
    AppSettings {
        cutoff_score: DEFAULT_CUTOFF_SCORE,
        crm: crm_seed.clone(),
    }
}
