use crate::core::types::{AccountState, Block, ValidatorNode, Vote};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Read-only view of the chain node. Amounts are returned in raw base units;
/// scaling is the caller's concern.
///
/// The node's irreversible height is trusted as-is: nothing here re-checks
/// finality.
#[async_trait]
pub trait ChainApi: Send + Sync {
    async fn latest_irreversible_height(&self) -> Result<u64>;
    async fn block_by_height(&self, height: u64) -> Result<Block>;
    async fn account_state(&self, address: &str) -> Result<AccountState>;
    /// Staking-token balance of `address`
    async fn token_balance(&self, address: &str) -> Result<Decimal>;
    async fn validator_nodes(&self) -> Result<Vec<ValidatorNode>>;
    async fn node_votes(&self, node_id: &str) -> Result<Vec<Vote>>;
    /// Amount of staking token `address` currently has delegated
    async fn voted_amount(&self, address: &str) -> Result<Decimal>;
}
