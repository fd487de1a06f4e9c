use crate::core::chain::ChainApi;
use crate::core::table::{Subscription, SubscriptionRole};
use crate::storage::manager::SubscriptionStorage;
use crate::utils::format::scale_amount;
use crate::watch::state::WatchState;
use anyhow::{Context, Result, anyhow};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Live holdings of one subscribed address, in whole units
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionState {
    pub address: String,
    pub alias: String,
    pub role: SubscriptionRole,
    pub balance: Decimal,
    pub token_balance: Decimal,
    /// Account role: the address's own delegated amount.
    /// Validator role: the sum of all votes for the owning node.
    pub votes: Decimal,
}

#[derive(Debug, Clone, Copy)]
pub struct AggregatorSettings {
    pub base_precision: u32,
    pub token_precision: u32,
    pub limit: usize,
    pub timeout: Duration,
}

pub struct Aggregator {
    chain: Arc<dyn ChainApi>,
    state: Arc<WatchState>,
    subscriptions: Arc<SubscriptionStorage>,
    settings: AggregatorSettings,
}

impl Aggregator {
    pub fn new(
        chain: Arc<dyn ChainApi>,
        state: Arc<WatchState>,
        subscriptions: Arc<SubscriptionStorage>,
        settings: AggregatorSettings,
    ) -> Self {
        Self {
            chain,
            state,
            subscriptions,
            settings,
        }
    }

    /// Current state of the user's most recent subscriptions, newest first
    pub async fn for_user(&self, user_id: u64) -> Result<Vec<SubscriptionState>> {
        let subs = self
            .subscriptions
            .recent_for_user(user_id, self.settings.limit)?;
        self.collect(subs).await
    }

    /// One lookup task per subscription. The first failure aborts the rest and
    /// no partial result is returned.
    pub async fn collect(&self, subs: Vec<Subscription>) -> Result<Vec<SubscriptionState>> {
        if subs.is_empty() {
            return Ok(Vec::new());
        }

        let total = subs.len();
        let mut tasks = JoinSet::new();
        for (position, sub) in subs.into_iter().enumerate() {
            let chain = self.chain.clone();
            let state = self.state.clone();
            let settings = self.settings;
            tasks.spawn(async move {
                let result = lookup(chain.as_ref(), &state, &sub, &settings).await;
                (position, result)
            });
        }

        let gathered = tokio::time::timeout(self.settings.timeout, async {
            let mut slots: Vec<Option<SubscriptionState>> = vec![None; total];
            while let Some(joined) = tasks.join_next().await {
                let (position, result) = joined.context("Aggregation task panicked")?;
                slots[position] = Some(result?);
            }
            Ok::<_, anyhow::Error>(slots)
        })
        .await;

        let slots = match gathered {
            Ok(Ok(slots)) => slots,
            Ok(Err(e)) => {
                tasks.abort_all();
                warn!("❌ Subscription aggregation failed: {:#}", e);
                return Err(e);
            }
            Err(_) => {
                tasks.abort_all();
                warn!(
                    timeout_secs = self.settings.timeout.as_secs(),
                    "⏰ Subscription aggregation timed out"
                );
                return Err(anyhow!(
                    "Subscription aggregation timed out after {:?}",
                    self.settings.timeout
                ));
            }
        };

        debug!(count = total, "Aggregated subscription states");
        slots
            .into_iter()
            .map(|slot| slot.ok_or_else(|| anyhow!("Aggregation task produced no result")))
            .collect()
    }
}

async fn lookup(
    chain: &dyn ChainApi,
    state: &WatchState,
    sub: &Subscription,
    settings: &AggregatorSettings,
) -> Result<SubscriptionState> {
    let account = chain
        .account_state(&sub.address)
        .await
        .with_context(|| format!("Failed to fetch account state of {}", sub.address))?;
    let token = chain
        .token_balance(&sub.address)
        .await
        .with_context(|| format!("Failed to fetch token balance of {}", sub.address))?;

    let raw_votes = match sub.role {
        SubscriptionRole::Validator => match state.node_owning(&sub.address) {
            Some(node) => chain
                .node_votes(&node.id)
                .await
                .with_context(|| format!("Failed to fetch votes of node {}", node.id))?
                .iter()
                .map(|vote| vote.value)
                .sum(),
            None => Decimal::ZERO,
        },
        SubscriptionRole::Account => chain
            .voted_amount(&sub.address)
            .await
            .with_context(|| format!("Failed to fetch voted amount of {}", sub.address))?,
    };

    Ok(SubscriptionState {
        address: sub.address.clone(),
        alias: sub.alias.clone(),
        role: sub.role,
        balance: scale_amount(account.balance, settings.base_precision)?,
        token_balance: scale_amount(token, settings.token_precision)?,
        votes: scale_amount(raw_votes, settings.token_precision)?,
    })
}
