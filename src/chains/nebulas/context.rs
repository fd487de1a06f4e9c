use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::{ChainConfig, ScannerConfig},
    core::chain::ChainApi,
    storage::manager::WatcherStorageManager,
    utils::metrics::WatcherMetrics,
    watch::{dispatcher::Notifier, state::WatchState},
};

/// Everything the Nebulas scanner needs, shared by clone
#[derive(Clone)]
pub struct NebulasScannerContext {
    pub config: Arc<ScannerConfig>,
    pub chain_config: Arc<ChainConfig>,
    pub chain: Arc<dyn ChainApi>,
    pub storage_manager: Arc<WatcherStorageManager>,
    pub state: Arc<WatchState>,
    pub notifier: Arc<Notifier>,
    pub metrics: Arc<dyn WatcherMetrics>,
    /// Upper bound for every chain call the scanner makes
    pub rpc_timeout: Duration,
}

impl NebulasScannerContext {
    pub fn chain_name(&self) -> &str {
        "nebulas"
    }
}
