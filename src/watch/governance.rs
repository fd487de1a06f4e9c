use crate::config::ScannerConfig;
use crate::watch::dispatcher::Notifier;
use crate::watch::state::WatchState;
use tracing::{info, warn};

/// Whether the node list is due for a refresh at `height`
pub fn is_node_refresh_height(height: u64, cfg: &ScannerConfig) -> bool {
    cfg.node_refresh_interval_blocks > 0 && height % cfg.node_refresh_interval_blocks == 0
}

/// Whether `height` starts a governance period: at or after the anchor and a
/// whole number of periods past it.
pub fn is_governance_boundary(height: u64, cfg: &ScannerConfig) -> bool {
    let period = cfg.governance_period_blocks();
    if period == 0 || height < cfg.governance_anchor_height {
        return false;
    }
    (height - cfg.governance_anchor_height) % period == 0
}

/// Notify validator subscribers of every node whose stability index dropped,
/// then remember the current indexes. Returns the number of messages sent.
pub async fn run_stability_check(state: &WatchState, notifier: &Notifier) -> usize {
    // Comparison happens under the read lock; sending happens after it is released.
    let drops = state.stability_drops();
    state.commit_stability_snapshot();

    let mut sent = 0;
    for drop in &drops {
        info!(
            node = %drop.node.id,
            previous = drop.previous,
            current = drop.node.stability_index,
            "📉 Stability index dropped"
        );
        match notifier.notify_stability(drop).await {
            Ok(n) => sent += n,
            Err(e) => warn!(node = %drop.node.id, "⚠️ Stability notification failed: {:#}", e),
        }
    }
    sent
}

/// Notify validator subscribers of every consensus or candidate node that it
/// takes part in the upcoming governance period.
pub async fn notify_governance_candidates(state: &WatchState, notifier: &Notifier) -> usize {
    let candidates = state.governance_candidates();
    info!(nodes = candidates.len(), "🏛️ Governance period boundary");

    let mut sent = 0;
    for candidate in &candidates {
        match notifier.notify_governance(candidate).await {
            Ok(n) => sent += n,
            Err(e) => warn!(node = %candidate.node.id, "⚠️ Governance notification failed: {:#}", e),
        }
    }
    sent
}
