mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use common::*;
use nebulas_watcher::{
    core::{
        scanner::Scanner,
        storage::KVStorage,
        table::{NewUser, SubscriptionRole},
        types::{Block, NodeAccounts, NodeType, Transaction, ValidatorNode, Vote},
    },
    storage::manager::SubscribeOutcome,
    watch::{
        aggregator::{Aggregator, AggregatorSettings},
        state::WatchState,
    },
};
use rust_decimal_macros::dec;

fn persisted_entries(
    manager: &nebulas_watcher::storage::manager::WatcherStorageManager,
) -> Result<BTreeSet<(String, u64, SubscriptionRole)>> {
    Ok(manager
        .subscriptions
        .list_all()?
        .into_iter()
        .map(|sub| (sub.address, sub.user_id, sub.role))
        .collect())
}

#[test]
fn index_tracks_storage_across_subscribe_and_unsubscribe() -> Result<()> {
    let (_temp_dir, _storage, manager) = test_storage()?;
    let state = WatchState::new();

    let (u1, _) = manager.users.find_or_create(NewUser {
        chat_id: 1,
        ..Default::default()
    })?;
    let (u2, _) = manager.users.find_or_create(NewUser {
        chat_id: 2,
        ..Default::default()
    })?;

    let steps: Vec<(bool, u64, &str, SubscriptionRole)> = vec![
        (true, u1.id, ADDR_A, SubscriptionRole::Account),
        (true, u2.id, ADDR_A, SubscriptionRole::Validator),
        (true, u1.id, ADDR_B, SubscriptionRole::Validator),
        (true, u1.id, ADDR_A, SubscriptionRole::Validator),
        (false, u2.id, ADDR_A, SubscriptionRole::Validator),
        (false, u2.id, ADDR_C, SubscriptionRole::Account),
        (true, u2.id, ADDR_C, SubscriptionRole::Account),
        (false, u1.id, ADDR_B, SubscriptionRole::Validator),
    ];

    for (add, user_id, address, role) in steps {
        if add {
            if let SubscribeOutcome::Created(sub) =
                manager.subscriptions.subscribe(user_id, address, "x", role)?
            {
                state.add_subscription(&sub);
            }
        } else if manager
            .subscriptions
            .unsubscribe(user_id, address)?
            .is_some()
        {
            state.remove_subscription(user_id, address);
        }
        assert_eq!(state.index_entries(), persisted_entries(&manager)?);
    }

    // A restart rebuilds the same index from storage
    let rebuilt = WatchState::new();
    rebuilt.rebuild(manager.users.list()?, &manager.subscriptions.list_all()?);
    assert_eq!(rebuilt.index_entries(), state.index_entries());
    Ok(())
}

#[test]
fn duplicate_subscription_creates_no_second_row() -> Result<()> {
    let (_temp_dir, storage, manager) = test_storage()?;
    let (user, _) = manager.users.find_or_create(NewUser {
        chat_id: 1,
        ..Default::default()
    })?;

    let first = manager
        .subscriptions
        .subscribe(user.id, ADDR_A, "first", SubscriptionRole::Account)?;
    assert!(matches!(first, SubscribeOutcome::Created(_)));

    let second = manager
        .subscriptions
        .subscribe(user.id, ADDR_A, "second", SubscriptionRole::Validator)?;
    assert_eq!(second, SubscribeOutcome::AlreadySubscribed);

    let subs = manager.subscriptions.list_for_user(user.id)?;
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].alias, "first");
    assert_eq!(subs[0].role, SubscriptionRole::Account);
    assert_eq!(storage.scan_prefix("address:", None)?.len(), 1);
    Ok(())
}

#[test]
fn cursor_never_moves_backwards() -> Result<()> {
    let (_temp_dir, _storage, manager) = test_storage()?;

    assert_eq!(manager.cursor.get()?, None);
    assert_eq!(manager.cursor.seed(50)?, 50);
    assert_eq!(manager.cursor.seed(10)?, 50);

    manager.cursor.advance(60)?;
    manager.cursor.advance(60)?;
    assert!(manager.cursor.advance(55).is_err());
    assert_eq!(manager.cursor.get()?, Some(60));
    Ok(())
}

#[tokio::test]
async fn transfer_threshold_bounds_are_exclusive_then_inclusive() -> Result<()> {
    let h = build_harness(test_scanner_config())?;
    let (mut user, _) = h.manager.users.find_or_create(NewUser {
        chat_id: 42,
        ..Default::default()
    })?;
    user.min_threshold = dec!(1);
    user.max_threshold = dec!(10);
    h.manager.users.save(&user)?;
    h.state.upsert_user(user.clone());
    if let SubscribeOutcome::Created(sub) =
        h.manager
            .subscriptions
            .subscribe(user.id, ADDR_A, "a", SubscriptionRole::Account)?
    {
        h.state.add_subscription(&sub);
    }

    let tx = |hash: &str, raw: u64| Transaction {
        hash: hash.to_string(),
        from: ADDR_A.to_string(),
        to: ADDR_B.to_string(),
        value: raw.into(),
        status: 1,
        block_height: 100,
        ..Default::default()
    };
    h.chain.put_block(Block {
        height: 100,
        transactions: vec![
            tx("at-min", 1_000_000_000),
            tx("above-min", 1_000_000_001),
            tx("at-max", 10_000_000_000),
            tx("above-max", 10_000_000_001),
        ],
        ..Default::default()
    });
    h.chain.set_latest(101);

    h.scanner.init().await?;
    h.scanner.scan_next_batch().await?;

    let texts = h.chat.texts_for(user.chat_id);
    assert_eq!(texts.len(), 2);
    assert!(texts[0].contains("above-min"));
    assert!(texts[1].contains("at-max"));
    Ok(())
}

fn settings(timeout: Duration) -> AggregatorSettings {
    AggregatorSettings {
        base_precision: 9,
        token_precision: 9,
        limit: 20,
        timeout,
    }
}

#[tokio::test]
async fn aggregator_returns_states_newest_first() -> Result<()> {
    let (_temp_dir, _storage, manager) = test_storage()?;
    let chain = MockChain::new();
    let state = Arc::new(WatchState::new());

    let (user, _) = manager.users.find_or_create(NewUser {
        chat_id: 1,
        ..Default::default()
    })?;
    manager
        .subscriptions
        .subscribe(user.id, ADDR_A, "older", SubscriptionRole::Account)?;
    manager
        .subscriptions
        .subscribe(user.id, GOV_V1, "newer", SubscriptionRole::Validator)?;

    chain
        .balances
        .lock()
        .insert(ADDR_A.to_string(), dec!(1500000000));
    chain
        .token_balances
        .lock()
        .insert(ADDR_A.to_string(), dec!(2000000000));
    chain.voted.lock().insert(ADDR_A.to_string(), dec!(700000000));
    chain.votes.lock().insert(
        "V1".to_string(),
        vec![
            Vote {
                address: ADDR_A.to_string(),
                value: dec!(3000000000),
            },
            Vote {
                address: ADDR_B.to_string(),
                value: dec!(1000000000),
            },
        ],
    );
    state.merge_nodes(vec![ValidatorNode {
        id: "V1".to_string(),
        accounts: NodeAccounts {
            gov_manager: GOV_V1.to_string(),
            ..Default::default()
        },
        node_type: NodeType::Consensus,
        stability_index: 1.0,
    }]);

    let aggregator = Aggregator::new(
        chain.clone(),
        state,
        manager.subscriptions.clone(),
        settings(Duration::from_secs(5)),
    );
    let states = aggregator.for_user(user.id).await?;

    assert_eq!(states.len(), 2);
    assert_eq!(states[0].alias, "newer");
    assert_eq!(states[0].votes, dec!(4));
    assert_eq!(states[1].alias, "older");
    assert_eq!(states[1].balance, dec!(1.5));
    assert_eq!(states[1].token_balance, dec!(2));
    assert_eq!(states[1].votes, dec!(0.7));
    Ok(())
}

#[tokio::test]
async fn aggregator_fails_whole_request_on_one_error() -> Result<()> {
    let (_temp_dir, _storage, manager) = test_storage()?;
    let chain = MockChain::new();
    let (user, _) = manager.users.find_or_create(NewUser {
        chat_id: 1,
        ..Default::default()
    })?;
    for address in [ADDR_A, ADDR_B, ADDR_C] {
        manager
            .subscriptions
            .subscribe(user.id, address, "x", SubscriptionRole::Account)?;
    }
    chain.failing.lock().insert(ADDR_B.to_string());

    let aggregator = Aggregator::new(
        chain.clone(),
        Arc::new(WatchState::new()),
        manager.subscriptions.clone(),
        settings(Duration::from_secs(5)),
    );
    assert!(aggregator.for_user(user.id).await.is_err());
    Ok(())
}

#[tokio::test]
async fn aggregator_times_out() -> Result<()> {
    let (_temp_dir, _storage, manager) = test_storage()?;
    let chain = MockChain::new();
    let (user, _) = manager.users.find_or_create(NewUser {
        chat_id: 1,
        ..Default::default()
    })?;
    manager
        .subscriptions
        .subscribe(user.id, ADDR_A, "x", SubscriptionRole::Account)?;
    *chain.delay.lock() = Some(Duration::from_secs(5));

    let aggregator = Aggregator::new(
        chain.clone(),
        Arc::new(WatchState::new()),
        manager.subscriptions.clone(),
        settings(Duration::from_millis(50)),
    );
    let err = aggregator
        .for_user(user.id)
        .await
        .expect_err("slow lookup must time out");
    assert!(err.to_string().contains("timed out"));
    Ok(())
}

#[tokio::test]
async fn restart_resumes_from_persisted_cursor() -> Result<()> {
    let h = build_harness(test_scanner_config())?;
    h.manager.cursor.seed(150)?;
    h.chain.set_latest(152);

    h.scanner.init().await?;
    h.scanner.scan_next_batch().await?;
    assert_eq!(h.manager.cursor.get()?, Some(152));
    Ok(())
}
