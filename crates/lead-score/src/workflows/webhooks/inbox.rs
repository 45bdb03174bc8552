use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::workflows::scoring::{KeyValueStorage, StorageError, StorageKey};

pub const INBOX_CAPACITY: usize = 20;

/// One webhook delivery as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub id: String,
    pub received_at: DateTime<Utc>,
    pub data: Value,
}

/// Newest-first ring of recent deliveries.
///
/// When a cache is attached every change is mirrored to the `payloads` key;
/// the inbox itself always starts empty.
pub struct WebhookInbox {
    entries: Mutex<VecDeque<WebhookPayload>>,
    capacity: usize,
    cache: Option<Arc<dyn KeyValueStorage>>,
}

impl std::fmt::Debug for WebhookInbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookInbox")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

impl Default for WebhookInbox {
    fn default() -> Self {
        Self::with_capacity(INBOX_CAPACITY)
    }
}

impl WebhookInbox {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn KeyValueStorage>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Store `data` at the front, evicting the oldest entry past capacity.
    pub fn record(&self, data: Value) -> WebhookPayload {
        let payload = WebhookPayload {
            id: Uuid::new_v4().to_string(),
            received_at: Utc::now(),
            data,
        };

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.push_front(payload.clone());
        entries.truncate(self.capacity);
        debug!(id = %payload.id, stored = entries.len(), "webhook payload recorded");
        // Cache writes stay under the guard so the cache follows the inbox order.
        self.mirror(&entries);
        payload
    }

    /// Newest first.
    pub fn list(&self) -> Vec<WebhookPayload> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
        self.mirror(&entries);
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn mirror(&self, entries: &VecDeque<WebhookPayload>) {
        let Some(cache) = &self.cache else {
            return;
        };
        let result = serde_json::to_string(entries)
            .map_err(|source| StorageError::Encode {
                key: StorageKey::Payloads,
                source,
            })
            .and_then(|document| cache.write(StorageKey::Payloads, &document));
        if let Err(error) = result {
            warn!(error = %error, "webhook cache not updated");
        }
    }
}

/// Payloads mirrored by a previous run; empty when nothing was cached.
pub fn read_cached(storage: &dyn KeyValueStorage) -> Result<Vec<WebhookPayload>, StorageError> {
    match storage.read(StorageKey::Payloads)? {
        Some(document) => serde_json::from_str(&document).map_err(|source| StorageError::Decode {
            key: StorageKey::Payloads,
            source,
        }),
        None => Ok(Vec::new()),
    }
}
