/// Categorizes block fetch failures for metrics reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockFetchFailureReason {
    Rpc,
    Timeout,
}

/// What kind of event a notification was sent for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationKind {
    Transfer,
    Delegation,
    Undelegation,
    TokenTransfer,
    Stability,
    Governance,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Transfer => "transfer",
            NotificationKind::Delegation => "delegation",
            NotificationKind::Undelegation => "undelegation",
            NotificationKind::TokenTransfer => "token_transfer",
            NotificationKind::Stability => "stability",
            NotificationKind::Governance => "governance",
        }
    }
}

/// Abstraction over watcher runtime metrics, allowing a no-op implementation when disabled.
pub trait WatcherMetrics: Send + Sync {
    fn record_block_fetch_success(&self);
    fn record_block_fetch_failure(&self, reason: BlockFetchFailureReason);
    fn record_block_processed(&self, height: u64);
    fn record_sync_gap(&self, gap: u64);
    fn record_notification(&self, kind: NotificationKind);
    fn record_transaction_error(&self);
}

#[derive(Default)]
pub struct NoopWatcherMetrics;

impl NoopWatcherMetrics {
    pub fn new() -> Self {
        Self
    }
}

impl WatcherMetrics for NoopWatcherMetrics {
    fn record_block_fetch_success(&self) {}

    fn record_block_fetch_failure(&self, _reason: BlockFetchFailureReason) {}

    fn record_block_processed(&self, _height: u64) {}

    fn record_sync_gap(&self, _gap: u64) {}

    fn record_notification(&self, _kind: NotificationKind) {}

    fn record_transaction_error(&self) {}
}

pub struct PrometheusWatcherMetrics {
    chain: String,
}

impl PrometheusWatcherMetrics {
    pub fn new(chain: impl Into<String>) -> Self {
        Self {
            chain: chain.into(),
        }
    }
}

impl WatcherMetrics for PrometheusWatcherMetrics {
    fn record_block_fetch_success(&self) {
        let chain = self.chain.clone();
        metrics::counter!(
            "watcher_block_fetch_success_total",
            1,
            "chain" => chain
        );
    }

    fn record_block_fetch_failure(&self, reason: BlockFetchFailureReason) {
        let chain = self.chain.clone();
        let reason_label = match reason {
            BlockFetchFailureReason::Rpc => "rpc_error",
            BlockFetchFailureReason::Timeout => "timeout",
        };
        metrics::counter!(
            "watcher_block_fetch_failure_total",
            1,
            "chain" => chain,
            "reason" => reason_label
        );
    }

    fn record_block_processed(&self, height: u64) {
        let chain = self.chain.clone();
        metrics::counter!(
            "watcher_blocks_processed_total",
            1,
            "chain" => chain.clone()
        );
        metrics::gauge!(
            "watcher_current_height",
            height as f64,
            "chain" => chain
        );
    }

    fn record_sync_gap(&self, gap: u64) {
        let chain = self.chain.clone();
        metrics::gauge!(
            "watcher_sync_gap_blocks",
            gap as f64,
            "chain" => chain
        );
    }

    fn record_notification(&self, kind: NotificationKind) {
        let chain = self.chain.clone();
        metrics::counter!(
            "watcher_notifications_sent_total",
            1,
            "chain" => chain,
            "kind" => kind.as_str()
        );
    }

    fn record_transaction_error(&self) {
        let chain = self.chain.clone();
        metrics::counter!(
            "watcher_transaction_errors_total",
            1,
            "chain" => chain
        );
    }
}
