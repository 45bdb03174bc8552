use crate::cli::ServeArgs;
use crate::infra::{load_config, load_rule_store, open_storage, AppState};
use crate::routes::with_api_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use lead_score::error::AppError;
use lead_score::telemetry;
use lead_score::workflows::crm::{ActiveCampaignConnector, CrmSyncService};
use lead_score::workflows::webhooks::WebhookInbox;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = load_config(std::mem::take(&mut args.data))?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let storage = open_storage(&config);
    let store = Arc::new(RwLock::new(load_rule_store(&config, storage.clone())));
    let inbox = Arc::new(WebhookInbox::default().with_cache(storage));
    let crm = CrmSyncService::new(Arc::new(ActiveCampaignConnector::new()?));

    let app = with_api_routes(store, inbox, crm)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        data_dir = %config.storage.data_dir.display(),
        "lead scoring service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
