//! Application state management.
//!
//! This module provides the shared application state that is
//! accessible to all request handlers via Axum's State extractor.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::domain::{BlockchainClient, DatabaseClient};

use super::service::AppService;

/// Shared application state for the Axum web server.
///
/// Handlers reach every use case through `service`; the Prometheus handle is
/// present only when the metrics recorder was installed.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AppService>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Creates a state around a service with default business settings.
    #[must_use]
    pub fn new(
        db_client: Arc<dyn DatabaseClient>,
        blockchain_client: Arc<dyn BlockchainClient>,
    ) -> Self {
        Self::with_service(Arc::new(AppService::new(db_client, blockchain_client)))
    }

    /// Creates a state around a pre-configured service.
    #[must_use]
    pub fn with_service(service: Arc<AppService>) -> Self {
        Self {
            service,
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockBlockchainClient, MockDatabaseClient};
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn test_app_state_creation() {
        let db = Arc::new(MockDatabaseClient::new());
        let blockchain = Arc::new(MockBlockchainClient::new());

        let state = AppState::new(db, blockchain);

        assert!(Arc::strong_count(&state.service) >= 1);
        assert!(state.metrics.is_none());
    }

    #[test]
    fn test_app_state_is_clone() {
        let db = Arc::new(MockDatabaseClient::new());
        let blockchain = Arc::new(MockBlockchainClient::new());

        let state = AppState::new(db, blockchain);
        let cloned = state.clone();

        assert!(Arc::ptr_eq(&state.service, &cloned.service));
    }

    #[test]
    fn test_app_state_with_metrics() {
        let db = Arc::new(MockDatabaseClient::new());
        let blockchain = Arc::new(MockBlockchainClient::new());
        let handle = PrometheusBuilder::new().build_recorder().handle();

        let state = AppState::new(db, blockchain).with_metrics(handle);
        assert!(state.metrics.is_some());
    }
}
