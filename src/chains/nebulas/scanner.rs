use std::future::Future;
use std::time::Duration;

use crate::{
    chains::nebulas::{
        context::NebulasScannerContext,
        payload::{StakingCall, decode_staking_payload},
    },
    core::{
        scanner::Scanner,
        types::{Block, Transaction},
    },
    utils::{
        format::{parse_amount, scale_amount},
        metrics::BlockFetchFailureReason,
        retry::{RetryConfig, retry_async},
    },
    watch::{
        dispatcher::DelegationKind,
        governance::{
            is_governance_boundary, is_node_refresh_height, notify_governance_candidates,
            run_stability_check,
        },
    },
};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// What one pass of the scan loop did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Nothing new at or below the irreversible height
    Idle { latest: u64, next: u64 },
    /// Heights `from..=to` were processed and the cursor now points at `to`
    Scanned { from: u64, to: u64 },
}

pub struct NebulasScanner {
    ctx: NebulasScannerContext,
}

impl NebulasScanner {
    pub fn new(ctx: NebulasScannerContext) -> Self {
        Self { ctx }
    }

    async fn bounded<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match timeout(self.ctx.rpc_timeout, fut).await {
            Ok(result) => result.with_context(|| format!("{} failed", what)),
            Err(_) => Err(anyhow!("{} timed out after {:?}", what, self.ctx.rpc_timeout)),
        }
    }

    fn cursor(&self) -> Result<u64> {
        self.ctx
            .storage_manager
            .cursor
            .get()?
            .ok_or_else(|| anyhow!("Scan cursor not initialized"))
    }

    /// Reload the validator node cache and compare stability indexes
    async fn refresh_nodes(&self) -> Result<usize> {
        let nodes = self
            .bounded("Fetch validator nodes", self.ctx.chain.validator_nodes())
            .await?;
        debug!(count = nodes.len(), "Refreshed validator nodes");
        self.ctx.state.merge_nodes(nodes);
        Ok(run_stability_check(&self.ctx.state, &self.ctx.notifier).await)
    }

    /// Process every irreversible height after the cursor. Any fetch error or
    /// timeout aborts the pass; heights already done keep their cursor.
    pub async fn scan_next_batch(&self) -> Result<ScanOutcome> {
        let cursor = self.cursor()?;
        let next = cursor + 1;

        let latest = self
            .bounded(
                "Fetch latest irreversible height",
                self.ctx.chain.latest_irreversible_height(),
            )
            .await?;
        self.ctx.metrics.record_sync_gap(latest.saturating_sub(cursor));

        if latest <= next {
            debug!(latest, next, "No new irreversible blocks");
            return Ok(ScanOutcome::Idle { latest, next });
        }

        for height in next..=latest {
            self.process_height(height).await?;
        }

        Ok(ScanOutcome::Scanned {
            from: next,
            to: latest,
        })
    }

    async fn process_height(&self, height: u64) -> Result<()> {
        if is_node_refresh_height(height, &self.ctx.config) {
            self.refresh_nodes().await?;
        }

        if is_governance_boundary(height, &self.ctx.config) {
            notify_governance_candidates(&self.ctx.state, &self.ctx.notifier).await;
        }

        let block = match timeout(self.ctx.rpc_timeout, self.fetch_block(height)).await {
            Ok(Ok(block)) => {
                self.ctx.metrics.record_block_fetch_success();
                block
            }
            Ok(Err(e)) => {
                self.ctx
                    .metrics
                    .record_block_fetch_failure(BlockFetchFailureReason::Rpc);
                return Err(e.context(format!("Fetch block {} failed", height)));
            }
            Err(_) => {
                self.ctx
                    .metrics
                    .record_block_fetch_failure(BlockFetchFailureReason::Timeout);
                return Err(anyhow!("Fetch block {} timed out", height));
            }
        };

        let sent = self.process_block(&block).await;

        if let Err(e) = self.ctx.storage_manager.cursor.advance(height) {
            error!(height, "❌ Failed to persist scan cursor: {:#}", e);
        }
        self.ctx.metrics.record_block_processed(height);

        info!(
            height,
            txs = block.transactions.len(),
            notifications = sent,
            "✅ Scanned block"
        );
        Ok(())
    }

    /// Route every transaction. A failing transaction is logged and skipped.
    pub async fn process_block(&self, block: &Block) -> usize {
        let mut sent = 0;
        for tx in &block.transactions {
            match self.process_transaction(tx).await {
                Ok(n) => sent += n,
                Err(e) => {
                    self.ctx.metrics.record_transaction_error();
                    error!(
                        tx = %tx.hash,
                        height = block.height,
                        "❌ Failed to process transaction: {:#}",
                        e
                    );
                }
            }
        }
        sent
    }

    async fn process_transaction(&self, tx: &Transaction) -> Result<usize> {
        if tx.to == self.ctx.chain_config.staking_contract {
            return self.process_staking(tx).await;
        }

        let state = &self.ctx.state;
        if !state.is_held(&tx.from) && !state.is_held(&tx.to) {
            return Ok(0);
        }

        let value = scale_amount(tx.value, self.ctx.chain_config.base_precision)?;
        let recipients = state.holders_of(&[tx.from.as_str(), tx.to.as_str()]);
        self.ctx
            .notifier
            .notify_transfer(&recipients, tx, value)
            .await
    }

    async fn process_staking(&self, tx: &Transaction) -> Result<usize> {
        if !tx.is_success() {
            return Ok(0);
        }

        let Some(call) = decode_staking_payload(&tx.data)? else {
            return Ok(0);
        };
        let precision = self.ctx.chain_config.token_precision;

        match call {
            StakingCall::Vote { node_id, amount } => {
                self.dispatch_delegation(tx, DelegationKind::Vote, &node_id, &amount, precision)
                    .await
            }
            StakingCall::CancelVote { node_id, amount } => {
                self.dispatch_delegation(
                    tx,
                    DelegationKind::CancelVote,
                    &node_id,
                    &amount,
                    precision,
                )
                .await
            }
            StakingCall::Transfer { recipient, amount } => {
                let amount = match parse_amount(&amount, precision) {
                    Ok(amount) => amount,
                    Err(e) => {
                        warn!(tx = %tx.hash, "⚠️ Skipping token transfer: {:#}", e);
                        return Ok(0);
                    }
                };
                let recipients = self
                    .ctx
                    .state
                    .holders_of(&[tx.from.as_str(), recipient.as_str()]);
                self.ctx
                    .notifier
                    .notify_token_transfer(&recipients, &tx.from, &recipient, amount)
                    .await
            }
        }
    }

    async fn dispatch_delegation(
        &self,
        tx: &Transaction,
        kind: DelegationKind,
        node_id: &str,
        amount: &str,
        precision: u32,
    ) -> Result<usize> {
        let amount = match parse_amount(amount, precision) {
            Ok(amount) => amount,
            Err(e) => {
                warn!(tx = %tx.hash, node = node_id, "⚠️ Skipping delegation: {:#}", e);
                return Ok(0);
            }
        };
        let Some(recipients) = self.ctx.state.delegation_recipients(node_id, &tx.from) else {
            warn!(tx = %tx.hash, node = node_id, "⚠️ Delegation to unknown validator node");
            return Ok(0);
        };
        self.ctx
            .notifier
            .notify_delegation(&recipients, kind, &tx.from, node_id, amount)
            .await
    }
}

#[async_trait]
impl Scanner for NebulasScanner {
    async fn init(&self) -> Result<()> {
        let cursors = &self.ctx.storage_manager.cursor;
        let cursor = match cursors.get()? {
            Some(cursor) => cursor,
            None => {
                let start = if self.ctx.config.start_height == 0 {
                    // The node may be unreachable at first start; keep asking
                    retry_async(
                        "Fetch latest irreversible height",
                        || {
                            self.bounded(
                                "Fetch latest irreversible height",
                                self.ctx.chain.latest_irreversible_height(),
                            )
                        },
                        RetryConfig::forever(Duration::from_secs(
                            self.ctx.config.poll_interval_secs,
                        )),
                    )
                    .await?
                } else {
                    self.ctx.config.start_height
                };
                let seeded = cursors.seed(start)?;
                info!(cursor = seeded, "✅ Initial scan cursor created");
                seeded
            }
        };
        info!(cursor, chain = self.ctx.chain_name(), "📍 Resuming scan");

        // Warm the node cache so delegations right after start resolve
        if let Err(e) = self.refresh_nodes().await {
            warn!("⚠️ Initial validator node refresh failed: {:#}", e);
        }
        Ok(())
    }

    async fn fetch_block(&self, height: u64) -> Result<Block> {
        self.ctx.chain.block_by_height(height).await
    }

    async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        info!("🔄 Scanner loop started");
        let poll = Duration::from_secs(self.ctx.config.poll_interval_secs);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("🛑 Shutdown signal received, stopping scanner gracefully...");
                    break;
                }
                result = self.scan_next_batch() => {
                    match result {
                        Ok(ScanOutcome::Scanned { from, to }) => {
                            debug!(from, to, "Batch complete");
                        }
                        Ok(ScanOutcome::Idle { .. }) => {}
                        Err(e) => error!("❌ Scan error: {:#}", e),
                    }
                    tokio::time::sleep(poll).await;
                }
            }
        }

        if let Ok(Some(cursor)) = self.ctx.storage_manager.cursor.get() {
            info!(cursor, "📊 Final scan cursor");
        }
        info!("👋 Scanner stopped gracefully");
        Ok(())
    }
}
