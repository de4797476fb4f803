use dash_analytics::{Aggregator, MetricsCache};
use dash_core::config::AppConfig;
use dash_store::MessageStore;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Shared application state for the server.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<RwLock<MessageStore>>,
    pub aggregator: Arc<Aggregator>,
    pub metrics_cache: Arc<Mutex<MetricsCache>>,
}

impl AppState {
    /// Open the configured store directory.
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let store = MessageStore::open(config.store_dir())?;
        Self::with_store(config, store)
    }

    pub fn with_store(config: AppConfig, store: MessageStore) -> anyhow::Result<Self> {
        let aggregator = Aggregator::new(config.analytics.clone())?;
        Ok(Self {
            config,
            store: Arc::new(RwLock::new(store)),
            aggregator: Arc::new(aggregator),
            metrics_cache: Arc::new(Mutex::new(MetricsCache::new())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dash_core::types::Message;

    #[tokio::test]
    async fn test_new_opens_configured_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.store.data_dir = Some(dir.path().to_path_buf());

        let state = AppState::new(config.clone()).unwrap();
        state
            .store
            .write()
            .await
            .create(Message::inbound("c1", "hi", "2026-01-05 10:00"))
            .unwrap();

        let reopened = AppState::new(config).unwrap();
        assert_eq!(reopened.store.read().await.len(), 1);
    }

    #[test]
    fn test_bad_number_pattern_rejected() {
        let mut config = AppConfig::default();
        config.analytics.valid_number_pattern = "(".into();
        assert!(AppState::with_store(config, MessageStore::in_memory()).is_err());
    }
}
