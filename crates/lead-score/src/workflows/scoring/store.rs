use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{
    default_regions, default_settings, default_thresholds, AppSettings, CrmSettings, RegionRule,
    RuleId, ThresholdRule,
};
use super::engine::{calculate_score, CalculationResult};
use super::storage::{KeyValueStorage, StorageError, StorageKey};

/// Persisted slices of the rule store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSlice {
    Regions,
    Thresholds,
    Settings,
}

impl RuleSlice {
    pub const ALL: [RuleSlice; 3] = [RuleSlice::Regions, RuleSlice::Thresholds, RuleSlice::Settings];

    fn key(self) -> StorageKey {
        match self {
            RuleSlice::Regions => StorageKey::Regions,
            RuleSlice::Thresholds => StorageKey::Thresholds,
            RuleSlice::Settings => StorageKey::Config,
        }
    }
}

/// Point-in-time copy of every table, shaped like the admin screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSnapshot {
    pub regions: Vec<RegionRule>,
    pub thresholds: Vec<ThresholdRule>,
    pub config: AppSettings,
}

/// Rejected admin edits. The store is left untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuleChangeError {
    #[error("region name must not be empty")]
    EmptyRegionName,
    #[error("weight must be zero or positive (got {0})")]
    NegativeWeight(f64),
    #[error("threshold value must be greater than zero (got {0})")]
    NonPositiveThreshold(f64),
    #[error("a threshold with value {0} already exists")]
    DuplicateThreshold(f64),
    #[error("cutoff score must be a number")]
    InvalidCutoff,
}

/// Single source of truth for regions, thresholds, and settings.
pub struct RuleStore {
    storage: Arc<dyn KeyValueStorage>,
    crm_seed: CrmSettings,
    regions: Vec<RegionRule>,
    thresholds: Vec<ThresholdRule>,
    settings: AppSettings,
}

impl std::fmt::Debug for RuleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleStore")
            .field("regions", &self.regions.len())
            .field("thresholds", &self.thresholds.len())
            .field("cutoff_score", &self.settings.cutoff_score)
            .finish_non_exhaustive()
    }
}

impl RuleStore {
    /// Load persisted tables, falling back to the seeds slice by slice.
    pub fn load(storage: Arc<dyn KeyValueStorage>, crm_seed: CrmSettings) -> Self {
        let regions = read_slice(storage.as_ref(), StorageKey::Regions).unwrap_or_else(default_regions);
        let thresholds =
            read_slice(storage.as_ref(), StorageKey::Thresholds).unwrap_or_else(default_thresholds);
        let settings = read_slice(storage.as_ref(), StorageKey::Config)
            .unwrap_or_else(|| default_settings(&crm_seed));

        Self {
            storage,
            crm_seed,
            regions,
            thresholds,
            settings,
        }
    }

    pub fn regions(&self) -> &[RegionRule] {
        &self.regions
    }

    pub fn thresholds(&self) -> &[ThresholdRule] {
        &self.thresholds
    }

    /// Thresholds ordered by value, as the admin table lists them.
    pub fn sorted_thresholds(&self) -> Vec<ThresholdRule> {
        let mut sorted = self.thresholds.clone();
        sorted.sort_by(|a, b| a.value.total_cmp(&b.value));
        sorted
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn snapshot(&self) -> RuleSnapshot {
        RuleSnapshot {
            regions: self.regions.clone(),
            thresholds: self.thresholds.clone(),
            config: self.settings.clone(),
        }
    }

    /// Score a lead against the current tables and cutoff.
    pub fn score(&self, region_name: &str, guests: u32, investment: f64) -> CalculationResult {
        calculate_score(
            region_name,
            guests,
            investment,
            &self.regions,
            &self.thresholds,
            self.settings.cutoff_score,
        )
    }

    pub fn add_region(&mut self, name: &str, weight: f64) -> Result<RegionRule, RuleChangeError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RuleChangeError::EmptyRegionName);
        }
        ensure_weight(weight)?;

        let rule = RegionRule {
            id: RuleId::generate(),
            name: name.to_string(),
            weight,
        };
        self.regions.push(rule.clone());
        info!(region = %rule.name, weight, "region rule added");
        self.persist(RuleSlice::Regions);
        Ok(rule)
    }

    pub fn remove_region(&mut self, id: &RuleId) -> bool {
        let before = self.regions.len();
        self.regions.retain(|region| &region.id != id);
        let removed = self.regions.len() != before;
        if removed {
            info!(%id, "region rule removed");
            self.persist(RuleSlice::Regions);
        }
        removed
    }

    pub fn add_threshold(&mut self, value: f64, weight: f64) -> Result<ThresholdRule, RuleChangeError> {
        if value.is_nan() || value <= 0.0 {
            return Err(RuleChangeError::NonPositiveThreshold(value));
        }
        ensure_weight(weight)?;
        // Exact comparison: values that differ only by float noise are distinct.
        if self.thresholds.iter().any(|existing| existing.value == value) {
            return Err(RuleChangeError::DuplicateThreshold(value));
        }

        let rule = ThresholdRule {
            id: RuleId::generate(),
            value,
            weight,
        };
        self.thresholds.push(rule.clone());
        info!(value, weight, "threshold rule added");
        self.persist(RuleSlice::Thresholds);
        Ok(rule)
    }

    pub fn remove_threshold(&mut self, id: &RuleId) -> bool {
        let before = self.thresholds.len();
        self.thresholds.retain(|threshold| &threshold.id != id);
        let removed = self.thresholds.len() != before;
        if removed {
            info!(%id, "threshold rule removed");
            self.persist(RuleSlice::Thresholds);
        }
        removed
    }

    pub fn set_cutoff(&mut self, cutoff: f64) -> Result<(), RuleChangeError> {
        if cutoff.is_nan() {
            return Err(RuleChangeError::InvalidCutoff);
        }
        self.settings.cutoff_score = cutoff;
        info!(cutoff, "cutoff score updated");
        self.persist(RuleSlice::Settings);
        Ok(())
    }

    pub fn update_crm_settings(&mut self, crm: CrmSettings) {
        self.settings.crm = crm;
        info!(field = %self.settings.crm.deal_field, "CRM settings updated");
        self.persist(RuleSlice::Settings);
    }

    /// Restore every table to the seed values.
    pub fn reset_to_defaults(&mut self) {
        self.regions = default_regions();
        self.thresholds = default_thresholds();
        self.settings = default_settings(&self.crm_seed);
        info!("rule store reset to defaults");
        for slice in RuleSlice::ALL {
            self.persist(slice);
        }
    }

    /// Write one slice to storage.
    pub fn save(&self, slice: RuleSlice) -> Result<(), StorageError> {
        let key = slice.key();
        let document = match slice {
            RuleSlice::Regions => serde_json::to_string(&self.regions),
            RuleSlice::Thresholds => serde_json::to_string(&self.thresholds),
            RuleSlice::Settings => serde_json::to_string(&self.settings),
        }
        .map_err(|source| StorageError::Encode { key, source })?;

        self.storage.write(key, &document)
    }

    fn persist(&self, slice: RuleSlice) {
        if let Err(err) = self.save(slice) {
            warn!(error = %err, ?slice, "failed to persist rule slice; keeping in-memory copy");
        }
    }
}

fn ensure_weight(weight: f64) -> Result<(), RuleChangeError> {
    if weight.is_nan() || weight < 0.0 {
        return Err(RuleChangeError::NegativeWeight(weight));
    }
    Ok(())
}

fn read_slice<T: DeserializeOwned>(storage: &dyn KeyValueStorage, key: StorageKey) -> Option<T> {
    let document = match storage.read(key) {
        Ok(Some(document)) => document,
        Ok(None) => return None,
        Err(err) => {
            warn!(error = %err, %key, "failed to read persisted slice; using defaults");
            return None;
        }
    };

    match serde_json::from_str(&document) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(error = %err, %key, "persisted slice is not valid JSON; using defaults");
            None
        }
    }
}
