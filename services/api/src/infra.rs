use crate::cli::DataArgs;
use lead_score::config::AppConfig;
use lead_score::workflows::scoring::{JsonFileStorage, KeyValueStorage, RuleStore};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Configuration with the `--data-dir` override applied.
pub(crate) fn load_config(data: DataArgs) -> Result<AppConfig, lead_score::config::ConfigError> {
    let mut config = AppConfig::load()?;
    if let Some(data_dir) = data.data_dir {
        config.storage.data_dir = data_dir;
    }
    Ok(config)
}

pub(crate) fn open_storage(config: &AppConfig) -> Arc<dyn KeyValueStorage> {
    Arc::new(JsonFileStorage::new(config.storage.data_dir.clone()))
}

pub(crate) fn load_rule_store(config: &AppConfig, storage: Arc<dyn KeyValueStorage>) -> RuleStore {
    RuleStore::load(storage, config.crm_seed.clone())
}
