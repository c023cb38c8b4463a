use credit_engine::config::CreditPolicy;
use credit_engine::error::AppError;
use credit_engine::workflows::credits::{CreditEngine, MemoryCreditStore};
use credit_engine::workflows::identity::InMemoryIdentityDirectory;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

pub(crate) type ServiceEngine = CreditEngine<MemoryCreditStore, InMemoryIdentityDirectory>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// In-process wiring: one store, one directory, the standard catalog, and the
/// reconciliation observer subscribed to identity registrations.
pub(crate) fn build_engine(
    policy: CreditPolicy,
) -> Result<(Arc<ServiceEngine>, Arc<InMemoryIdentityDirectory>), AppError> {
    let store = Arc::new(MemoryCreditStore::new());
    let directory = Arc::new(InMemoryIdentityDirectory::new());
    let engine = Arc::new(CreditEngine::new(store, directory.clone(), policy));

    let seeded = engine.catalog().seed_standard()?;
    info!(activities = seeded.len(), "standard catalog installed");

    directory
        .subscribe(Arc::downgrade(&engine.reconciliation_observer()))
        .map_err(|err| AppError::Credit(err.into()))?;

    Ok((engine, directory))
}
