use crate::core::types::Block;
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

#[async_trait]
pub trait Scanner: Send + Sync {
    /// Seed the persisted cursor if none exists yet
    async fn init(&self) -> Result<()>;
    async fn fetch_block(&self, height: u64) -> Result<Block>;

    /// Run scanner with graceful shutdown support
    async fn run(&self, shutdown: broadcast::Receiver<()>) -> Result<()>;
}
