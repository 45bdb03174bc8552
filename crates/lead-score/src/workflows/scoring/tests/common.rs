use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use axum::response::Response;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::workflows::scoring::domain::{CrmSettings, RegionRule, RuleId, ThresholdRule};
use crate::workflows::scoring::storage::{
    KeyValueStorage, MemoryStorage, StorageError, StorageKey,
};
use crate::workflows::scoring::store::RuleStore;
use crate::workflows::scoring::SharedRuleStore;

pub(super) fn region(id: &str, name: &str, weight: f64) -> RegionRule {
    RegionRule {
        id: RuleId::from(id),
        name: name.to_string(),
        weight,
    }
}

pub(super) fn threshold(id: &str, value: f64, weight: f64) -> ThresholdRule {
    ThresholdRule {
        id: RuleId::from(id),
        value,
        weight,
    }
}

pub(super) fn scenario_regions() -> Vec<RegionRule> {
    vec![region("r-1", "Nordeste", 20.0)]
}

pub(super) fn scenario_thresholds() -> Vec<ThresholdRule> {
    vec![
        threshold("t-1", 1500.0, 5.0),
        threshold("t-2", 2000.0, 10.0),
        threshold("t-3", 2500.0, 15.0),
    ]
}

pub(super) fn crm_seed() -> CrmSettings {
    CrmSettings {
        base_url: "https://wedding.api-us1.com".to_string(),
        api_token: "seed-token".to_string(),
        deal_field: "Lead Score 2".to_string(),
        custom_field_id: String::new(),
    }
}

pub(super) fn memory_store() -> (RuleStore, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::default());
    let store = RuleStore::load(storage.clone(), crm_seed());
    (store, storage)
}

pub(super) fn shared_store() -> (SharedRuleStore, Arc<MemoryStorage>) {
    let (store, storage) = memory_store();
    (Arc::new(RwLock::new(store)), storage)
}

/// Accepts reads but fails every write for the configured key.
pub(super) struct FailingWrites {
    pub(super) inner: MemoryStorage,
    pub(super) failing: StorageKey,
}

impl KeyValueStorage for FailingWrites {
    fn read(&self, key: StorageKey) -> Result<Option<String>, StorageError> {
        self.inner.read(key)
    }

    fn write(&self, key: StorageKey, document: &str) -> Result<(), StorageError> {
        if key == self.failing {
            return Err(StorageError::Unavailable(format!("{key} is read-only")));
        }
        self.inner.write(key, document)
    }
}

/// Remembers the thread behind every write.
#[derive(Default)]
pub(super) struct ThreadRecordingStorage {
    pub(super) inner: MemoryStorage,
    pub(super) writers: Mutex<Vec<ThreadId>>,
}

impl KeyValueStorage for ThreadRecordingStorage {
    fn read(&self, key: StorageKey) -> Result<Option<String>, StorageError> {
        self.inner.read(key)
    }

    fn write(&self, key: StorageKey, document: &str) -> Result<(), StorageError> {
        self.writers
            .lock()
            .expect("writer log")
            .push(thread::current().id());
        self.inner.write(key, document)
    }
}

pub(super) struct UnreadableStorage;

impl KeyValueStorage for UnreadableStorage {
    fn read(&self, _key: StorageKey) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("disk offline".to_string()))
    }

    fn write(&self, _key: StorageKey, _document: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("disk offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
