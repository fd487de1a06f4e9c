#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use nebulas_watcher::{
    chains::nebulas::{context::NebulasScannerContext, scanner::NebulasScanner},
    config::{ChainConfig, ScannerConfig},
    core::{
        chain::ChainApi,
        chat::{ChatError, ChatTransport, OutgoingMessage, Update},
        dictionary::Dictionary,
        storage::KVStorage,
        types::{AccountState, Block, ValidatorNode, Vote},
    },
    storage::{manager::WatcherStorageManager, rocksdb::RocksDBStorage},
    utils::metrics::{NoopWatcherMetrics, WatcherMetrics},
    watch::{dispatcher::Notifier, state::WatchState},
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tempfile::TempDir;

pub const ADDR_A: &str = "n1AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
pub const ADDR_B: &str = "n1BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB";
pub const ADDR_C: &str = "n1CCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCC";
pub const GOV_V1: &str = "n1GGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGG";
pub const STAKING: &str = "n214bLrE3nREcpRewHXF7qRDWCcaxRSiUdw";

/// Scripted chain node
#[derive(Default)]
pub struct MockChain {
    pub latest: Mutex<u64>,
    pub blocks: Mutex<HashMap<u64, Block>>,
    pub nodes: Mutex<Vec<ValidatorNode>>,
    pub balances: Mutex<HashMap<String, Decimal>>,
    pub token_balances: Mutex<HashMap<String, Decimal>>,
    pub votes: Mutex<HashMap<String, Vec<Vote>>>,
    pub voted: Mutex<HashMap<String, Decimal>>,
    /// Addresses whose account lookup fails
    pub failing: Mutex<HashSet<String>>,
    /// Added to every account lookup
    pub delay: Mutex<Option<Duration>>,
    /// Number of upcoming latest-height calls that fail
    pub latest_failures: Mutex<u32>,
    /// Added to every latest-height call
    pub latest_delay: Mutex<Option<Duration>>,
    /// Heights whose block fetch fails
    pub failing_blocks: Mutex<HashSet<u64>>,
    /// Added to every block fetch
    pub block_delay: Mutex<Option<Duration>>,
    pub latest_calls: Mutex<u32>,
}

impl MockChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_latest(&self, height: u64) {
        *self.latest.lock() = height;
    }

    pub fn put_block(&self, block: Block) {
        self.blocks.lock().insert(block.height, block);
    }

    pub fn set_nodes(&self, nodes: Vec<ValidatorNode>) {
        *self.nodes.lock() = nodes;
    }
}

#[async_trait]
impl ChainApi for MockChain {
    async fn latest_irreversible_height(&self) -> Result<u64> {
        *self.latest_calls.lock() += 1;
        let delay = *self.latest_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        {
            let mut failures = self.latest_failures.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(anyhow!("node unavailable"));
            }
        }
        Ok(*self.latest.lock())
    }

    async fn block_by_height(&self, height: u64) -> Result<Block> {
        let delay = *self.block_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_blocks.lock().contains(&height) {
            return Err(anyhow!("block {} unavailable", height));
        }
        let block = self.blocks.lock().get(&height).cloned();
        Ok(block.unwrap_or(Block {
            height,
            ..Default::default()
        }))
    }

    async fn account_state(&self, address: &str) -> Result<AccountState> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().contains(address) {
            return Err(anyhow!("account lookup failed for {}", address));
        }
        Ok(AccountState {
            balance: self
                .balances
                .lock()
                .get(address)
                .copied()
                .unwrap_or_default(),
            ..Default::default()
        })
    }

    async fn token_balance(&self, address: &str) -> Result<Decimal> {
        Ok(self
            .token_balances
            .lock()
            .get(address)
            .copied()
            .unwrap_or_default())
    }

    async fn validator_nodes(&self) -> Result<Vec<ValidatorNode>> {
        Ok(self.nodes.lock().clone())
    }

    async fn node_votes(&self, node_id: &str) -> Result<Vec<Vote>> {
        Ok(self.votes.lock().get(node_id).cloned().unwrap_or_default())
    }

    async fn voted_amount(&self, address: &str) -> Result<Decimal> {
        Ok(self.voted.lock().get(address).copied().unwrap_or_default())
    }
}

/// Chat transport that records what it is asked to do
#[derive(Default)]
pub struct RecordingChat {
    pub sent: Mutex<Vec<OutgoingMessage>>,
    pub deleted: Mutex<Vec<(i64, i64)>>,
    /// Chats whose sends fail with a transport error
    pub broken: Mutex<HashSet<i64>>,
}

impl RecordingChat {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn texts_for(&self, chat_id: i64) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .map(|m| m.text.clone())
            .collect()
    }

    pub fn last_for(&self, chat_id: i64) -> Option<OutgoingMessage> {
        self.sent
            .lock()
            .iter()
            .rev()
            .find(|m| m.chat_id == chat_id)
            .cloned()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl ChatTransport for RecordingChat {
    async fn send_message(&self, message: OutgoingMessage) -> Result<(), ChatError> {
        if self.broken.lock().contains(&message.chat_id) {
            return Err(ChatError::Transport(format!(
                "chat {} unreachable",
                message.chat_id
            )));
        }
        self.sent.lock().push(message);
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), ChatError> {
        self.deleted.lock().push((chat_id, message_id));
        Ok(())
    }

    async fn poll_updates(&self, _offset: i64) -> Result<Vec<Update>, ChatError> {
        Ok(vec![])
    }
}

pub fn test_dictionary() -> Arc<Dictionary> {
    let raw = std::fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/dictionary.json"))
        .expect("dictionary.json is readable");
    Arc::new(Dictionary::from_json(&raw).expect("dictionary.json parses"))
}

pub fn test_storage() -> Result<(TempDir, Arc<RocksDBStorage>, Arc<WatcherStorageManager>)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("rocksdb");
    let db_path_str = db_path.to_string_lossy().to_string();
    let storage = Arc::new(RocksDBStorage::new(&db_path_str)?);
    storage.init()?;
    let manager = Arc::new(WatcherStorageManager::new(storage.clone()));
    Ok((temp_dir, storage, manager))
}

pub fn test_chain_config() -> ChainConfig {
    ChainConfig {
        staking_contract: STAKING.to_string(),
        base_precision: 9,
        token_precision: 9,
        ..ChainConfig::default()
    }
}

pub fn test_scanner_config() -> ScannerConfig {
    ScannerConfig {
        start_height: 99,
        poll_interval_secs: 1,
        node_refresh_interval_blocks: 10,
        governance_anchor_height: 1_000_000,
        polling_cycle_blocks: 210,
        blocks_in_governance_period: 820,
    }
}

pub struct Harness {
    pub _temp_dir: TempDir,
    pub manager: Arc<WatcherStorageManager>,
    pub chain: Arc<MockChain>,
    pub chat: Arc<RecordingChat>,
    pub state: Arc<WatchState>,
    pub scanner: NebulasScanner,
}

pub fn build_harness(config: ScannerConfig) -> Result<Harness> {
    build_harness_with_timeout(config, Duration::from_secs(5))
}

pub fn build_harness_with_timeout(config: ScannerConfig, rpc_timeout: Duration) -> Result<Harness> {
    let (temp_dir, _storage, manager) = test_storage()?;
    let chain = MockChain::new();
    let chat = RecordingChat::new();
    let state = Arc::new(WatchState::new());
    let metrics: Arc<dyn WatcherMetrics> = Arc::new(NoopWatcherMetrics::new());

    let notifier = Arc::new(Notifier::new(
        chat.clone(),
        test_dictionary(),
        "https://explorer.nebulas.io/#",
        metrics.clone(),
    ));

    let scanner = NebulasScanner::new(NebulasScannerContext {
        config: Arc::new(config),
        chain_config: Arc::new(test_chain_config()),
        chain: chain.clone(),
        storage_manager: manager.clone(),
        state: state.clone(),
        notifier,
        metrics,
        rpc_timeout,
    });

    Ok(Harness {
        _temp_dir: temp_dir,
        manager,
        chain,
        chat,
        state,
        scanner,
    })
}
