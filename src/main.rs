use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use nebulas_watcher::{
    bot::{Bot, Prices},
    chains::nebulas::{client::NebulasClient, context::NebulasScannerContext, scanner::NebulasScanner},
    cli::{Cli, Commands},
    config::AppConfig,
    core::{chain::ChainApi, chat::ChatTransport, dictionary::Dictionary, scanner::Scanner, storage::KVStorage},
    market::{feed::PriceFeed, ticker::HttpTicker},
    storage::{manager::WatcherStorageManager, rocksdb::RocksDBStorage},
    telegram::client::TelegramClient,
    utils::{
        logger::init_logger,
        metrics::{NoopWatcherMetrics, PrometheusWatcherMetrics, WatcherMetrics},
    },
    watch::{
        aggregator::{Aggregator, AggregatorSettings},
        dispatcher::Notifier,
        state::WatchState,
    },
};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let cfg = AppConfig::load(&args.config)?;

    // Initialize logger system
    init_logger(
        &cfg.logging.level,
        cfg.logging.to_file,
        &cfg.logging.file_path,
    );

    info!("✅ Configuration load successful");
    info!(rpc_url = %cfg.rpc.url, "RPC node");
    info!(start_height = cfg.scanner.start_height, "Start height");

    // Initialize storage
    let storage = Arc::new(RocksDBStorage::new(&cfg.storage.path)?);
    storage.init()?;
    info!("✅ Storage initialized at: {}", cfg.storage.path);
    let storage_manager = Arc::new(WatcherStorageManager::new(storage.clone()));

    if let Some(Commands::Cursor) = args.command {
        match storage_manager.cursor.get()? {
            Some(cursor) => println!("{}", cursor),
            None => println!("cursor not initialized"),
        }
        return Ok(());
    }

    let metrics: Arc<dyn WatcherMetrics> = if cfg.metrics.enable {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], cfg.metrics.prometheus_exporter_port))
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!(
            port = cfg.metrics.prometheus_exporter_port,
            "📈 Prometheus exporter listening"
        );
        Arc::new(PrometheusWatcherMetrics::new("nebulas"))
    } else {
        Arc::new(NoopWatcherMetrics::new())
    };

    let dictionary = Arc::new(
        Dictionary::load(&cfg.dictionary.path)
            .with_context(|| format!("Failed to load dictionary {}", cfg.dictionary.path))?,
    );

    // Rebuild the in-memory subscription index from storage
    let state = Arc::new(WatchState::new());
    let users = storage_manager.users.list()?;
    let subscriptions = storage_manager.subscriptions.list_all()?;
    info!(
        users = users.len(),
        subscriptions = subscriptions.len(),
        "📚 Subscription index loaded"
    );
    state.rebuild(users, &subscriptions);

    let chat: Arc<dyn ChatTransport> = Arc::new(TelegramClient::new(&cfg.telegram)?);
    let chain: Arc<dyn ChainApi> = Arc::new(NebulasClient::new(
        &cfg.rpc,
        cfg.chain.clone(),
        cfg.oracle.clone(),
    )?);

    let notifier = Arc::new(Notifier::new(
        chat.clone(),
        dictionary.clone(),
        cfg.chain.explorer_url.clone(),
        metrics.clone(),
    ));
    let aggregator = Arc::new(Aggregator::new(
        chain.clone(),
        state.clone(),
        storage_manager.subscriptions.clone(),
        AggregatorSettings {
            base_precision: cfg.chain.base_precision,
            token_precision: cfg.chain.token_precision,
            limit: cfg.oracle.subscriptions_limit,
            timeout: Duration::from_secs(cfg.oracle.aggregation_timeout_secs),
        },
    ));

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);

    // Spawn signal handler task for Ctrl+C
    let shutdown_tx_sigint = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }

        info!("📡 Received shutdown signal (Ctrl+C)");
        let _ = shutdown_tx_sigint.send(());
    });

    // SIGTERM handler (Unix only)
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let shutdown_tx_sigterm = shutdown_tx.clone();
        tokio::spawn(async move {
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                info!("📡 Received SIGTERM signal");
                let _ = shutdown_tx_sigterm.send(());
            }
        });
    }

    // Prices must be known before the bot can value holdings
    let startup_retry = Duration::from_secs(cfg.market.startup_retry_secs);
    let refresh_interval = Duration::from_secs(cfg.market.refresh_interval_secs);
    let nas = PriceFeed::bootstrap(
        Arc::new(HttpTicker::nas(&cfg.market)?),
        startup_retry,
        refresh_interval,
    )
    .await?;
    let nax = PriceFeed::bootstrap(
        Arc::new(HttpTicker::nax(&cfg.market)?),
        startup_retry,
        refresh_interval,
    )
    .await?;
    tokio::spawn(nas.clone().run(shutdown_tx.subscribe()));
    tokio::spawn(nax.clone().run(shutdown_tx.subscribe()));

    let scanner = Arc::new(NebulasScanner::new(NebulasScannerContext {
        config: Arc::new(cfg.scanner.clone()),
        chain_config: Arc::new(cfg.chain.clone()),
        chain: chain.clone(),
        storage_manager: storage_manager.clone(),
        state: state.clone(),
        notifier,
        metrics,
        rpc_timeout: Duration::from_secs(cfg.rpc.timeout_secs),
    }));
    scanner.init().await?;

    info!("🚀 Starting Nebulas block scanner...");
    let scanner_rx = shutdown_tx.subscribe();
    let scanner_task = {
        let scanner = scanner.clone();
        tokio::spawn(async move { scanner.run(scanner_rx).await })
    };

    let bot = Bot::new(
        chat,
        dictionary,
        storage_manager,
        state,
        aggregator,
        Prices { nas, nax },
        cfg.chain.explorer_url.clone(),
    );
    info!("💡 Press Ctrl+C to stop gracefully");
    bot.run(shutdown_rx).await?;

    match scanner_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("❌ Scanner exited with error: {:#}", e),
        Err(e) => error!("❌ Scanner task panicked: {}", e),
    }

    if let Err(e) = storage.flush() {
        warn!("⚠️ Failed to flush storage: {:#}", e);
    }
    info!("✨ Watcher exited successfully");
    Ok(())
}
