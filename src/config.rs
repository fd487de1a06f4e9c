use anyhow::Result;
use config as config_loader;
use dotenvy::dotenv;
use serde::Deserialize;
use std::path::Path;

/// Global config structure
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub rpc: RpcConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub market: MarketConfig,
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub dictionary: DictionaryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Chain node RPC config
#[derive(Debug, Deserialize, Clone)]
pub struct RpcConfig {
    pub url: String,
    #[serde(default = "RpcConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl RpcConfig {
    fn default_timeout_secs() -> u64 {
        15
    }
}

/// RocksDB storage config
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub path: String,
}

/// Block scanner loop config
#[derive(Debug, Deserialize, Clone)]
pub struct ScannerConfig {
    /// Initial cursor when none is persisted; 0 means "start at the chain tip"
    #[serde(default)]
    pub start_height: u64,
    #[serde(default = "ScannerConfig::default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "ScannerConfig::default_node_refresh_interval_blocks")]
    pub node_refresh_interval_blocks: u64,
    #[serde(default = "ScannerConfig::default_governance_anchor_height")]
    pub governance_anchor_height: u64,
    #[serde(default = "ScannerConfig::default_polling_cycle_blocks")]
    pub polling_cycle_blocks: u64,
    #[serde(default = "ScannerConfig::default_blocks_in_governance_period")]
    pub blocks_in_governance_period: u64,
}

impl ScannerConfig {
    fn default_poll_interval_secs() -> u64 {
        2
    }
    fn default_node_refresh_interval_blocks() -> u64 {
        10
    }
    fn default_governance_anchor_height() -> u64 {
        4_893_100
    }
    fn default_polling_cycle_blocks() -> u64 {
        210
    }
    fn default_blocks_in_governance_period() -> u64 {
        820
    }

    /// Number of blocks between two governance-candidate announcements.
    pub fn governance_period_blocks(&self) -> u64 {
        self.polling_cycle_blocks * self.blocks_in_governance_period
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            start_height: 0,
            poll_interval_secs: Self::default_poll_interval_secs(),
            node_refresh_interval_blocks: Self::default_node_refresh_interval_blocks(),
            governance_anchor_height: Self::default_governance_anchor_height(),
            polling_cycle_blocks: Self::default_polling_cycle_blocks(),
            blocks_in_governance_period: Self::default_blocks_in_governance_period(),
        }
    }
}

/// On-chain constants: contracts and unit precisions
#[derive(Debug, Deserialize, Clone)]
pub struct ChainConfig {
    #[serde(default = "ChainConfig::default_staking_contract")]
    pub staking_contract: String,
    #[serde(default = "ChainConfig::default_token_contract")]
    pub token_contract: String,
    /// Decimals of the native coin (NAS)
    #[serde(default = "ChainConfig::default_base_precision")]
    pub base_precision: u32,
    /// Decimals of the staking token (NAX)
    #[serde(default = "ChainConfig::default_token_precision")]
    pub token_precision: u32,
    #[serde(default = "ChainConfig::default_explorer_url")]
    pub explorer_url: String,
}

impl ChainConfig {
    fn default_staking_contract() -> String {
        "n214bLrE3nREcpRewHXF7qRDWCcaxRSiUdw".to_string()
    }
    fn default_token_contract() -> String {
        "n1etmdwczuAUCnMMvpGasfi8kwUbb2ddvRJ".to_string()
    }
    fn default_base_precision() -> u32 {
        18
    }
    fn default_token_precision() -> u32 {
        9
    }
    fn default_explorer_url() -> String {
        "https://explorer.nebulas.io/#".to_string()
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            staking_contract: Self::default_staking_contract(),
            token_contract: Self::default_token_contract(),
            base_precision: Self::default_base_precision(),
            token_precision: Self::default_token_precision(),
            explorer_url: Self::default_explorer_url(),
        }
    }
}

/// Contract-call parameters used by the account oracle and the aggregator
#[derive(Debug, Deserialize, Clone)]
pub struct OracleConfig {
    /// Any valid address; read-only calls still need a `from`
    #[serde(default = "OracleConfig::default_caller_address")]
    pub caller_address: String,
    #[serde(default = "OracleConfig::default_gas_price")]
    pub gas_price: String,
    #[serde(default = "OracleConfig::default_gas_limit")]
    pub gas_limit: String,
    #[serde(default = "OracleConfig::default_node_list_function")]
    pub node_list_function: String,
    #[serde(default = "OracleConfig::default_node_votes_function")]
    pub node_votes_function: String,
    #[serde(default = "OracleConfig::default_voted_amount_function")]
    pub voted_amount_function: String,
    #[serde(default = "OracleConfig::default_subscriptions_limit")]
    pub subscriptions_limit: usize,
    #[serde(default = "OracleConfig::default_aggregation_timeout_secs")]
    pub aggregation_timeout_secs: u64,
}

impl OracleConfig {
    fn default_caller_address() -> String {
        "n1Jkdiq1H1HSXYJXtvDDkYm84Tmapo4hhMv".to_string()
    }
    fn default_gas_price() -> String {
        "20000000000".to_string()
    }
    fn default_gas_limit() -> String {
        "2000000".to_string()
    }
    fn default_node_list_function() -> String {
        "getNodeList".to_string()
    }
    fn default_node_votes_function() -> String {
        "getNodeVoteStatistic".to_string()
    }
    fn default_voted_amount_function() -> String {
        "getVoteAmount".to_string()
    }
    fn default_subscriptions_limit() -> usize {
        20
    }
    fn default_aggregation_timeout_secs() -> u64 {
        30
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            caller_address: Self::default_caller_address(),
            gas_price: Self::default_gas_price(),
            gas_limit: Self::default_gas_limit(),
            node_list_function: Self::default_node_list_function(),
            node_votes_function: Self::default_node_votes_function(),
            voted_amount_function: Self::default_voted_amount_function(),
            subscriptions_limit: Self::default_subscriptions_limit(),
            aggregation_timeout_secs: Self::default_aggregation_timeout_secs(),
        }
    }
}

/// Spot price tickers
#[derive(Debug, Deserialize, Clone)]
pub struct MarketConfig {
    #[serde(default = "MarketConfig::default_nas_ticker_url")]
    pub nas_ticker_url: String,
    #[serde(default = "MarketConfig::default_nax_ticker_url")]
    pub nax_ticker_url: String,
    #[serde(default = "MarketConfig::default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default = "MarketConfig::default_startup_retry_secs")]
    pub startup_retry_secs: u64,
    #[serde(default = "MarketConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl MarketConfig {
    fn default_nas_ticker_url() -> String {
        "https://www.okex.com/api/spot/v3/instruments/NAS-USDT/ticker".to_string()
    }
    fn default_nax_ticker_url() -> String {
        "https://data.gateio.la/api2/1/ticker/nax_usdt".to_string()
    }
    fn default_refresh_interval_secs() -> u64 {
        300
    }
    fn default_startup_retry_secs() -> u64 {
        5
    }
    fn default_timeout_secs() -> u64 {
        10
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            nas_ticker_url: Self::default_nas_ticker_url(),
            nax_ticker_url: Self::default_nax_ticker_url(),
            refresh_interval_secs: Self::default_refresh_interval_secs(),
            startup_retry_secs: Self::default_startup_retry_secs(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

/// Telegram Bot API transport
#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub token: String,
    #[serde(default = "TelegramConfig::default_api_url")]
    pub api_url: String,
    #[serde(default = "TelegramConfig::default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

impl TelegramConfig {
    fn default_api_url() -> String {
        "https://api.telegram.org".to_string()
    }
    fn default_poll_timeout_secs() -> u64 {
        60
    }
}

/// Localised message templates
#[derive(Debug, Deserialize, Clone)]
pub struct DictionaryConfig {
    #[serde(default = "DictionaryConfig::default_path")]
    pub path: String,
}

impl DictionaryConfig {
    fn default_path() -> String {
        "./dictionary.json".to_string()
    }
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
        }
    }
}

/// Logging config
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    #[serde(default = "LoggingConfig::default_to_file")]
    pub to_file: bool,
    #[serde(default = "LoggingConfig::default_file_path")]
    pub file_path: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
    fn default_to_file() -> bool {
        true
    }
    fn default_file_path() -> String {
        "./logs/watcher.log".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            to_file: Self::default_to_file(),
            file_path: Self::default_file_path(),
        }
    }
}

/// Metrics config
#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default = "MetricsConfig::default_enable")]
    pub enable: bool,
    #[serde(default = "MetricsConfig::default_prometheus_exporter_port")]
    pub prometheus_exporter_port: u16,
}

impl MetricsConfig {
    fn default_enable() -> bool {
        true
    }
    fn default_prometheus_exporter_port() -> u16 {
        9100
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enable: Self::default_enable(),
            prometheus_exporter_port: Self::default_prometheus_exporter_port(),
        }
    }
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        dotenv().ok(); // Load the .env file

        if !path.as_ref().exists() {
            anyhow::bail!("Config file not found: {:?}", path.as_ref());
        }

        let builder = config_loader::Config::builder()
            .add_source(config_loader::File::from(path.as_ref().to_path_buf()))
            .add_source(config_loader::Environment::with_prefix("WATCHER").separator("__"))
            .build()?;

        Ok(builder.try_deserialize::<AppConfig>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn load_applies_defaults_for_missing_sections() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        writeln!(
            file,
            "rpc:\n  url: http://127.0.0.1:8685\nstorage:\n  path: ./data\ntelegram:\n  token: abc"
        )
        .unwrap();

        let cfg = AppConfig::load(file.path()).unwrap();
        assert_eq!(cfg.rpc.timeout_secs, 15);
        assert_eq!(cfg.scanner.poll_interval_secs, 2);
        assert_eq!(cfg.scanner.node_refresh_interval_blocks, 10);
        assert_eq!(cfg.scanner.governance_period_blocks(), 210 * 820);
        assert_eq!(cfg.chain.base_precision, 18);
        assert_eq!(cfg.chain.token_precision, 9);
        assert_eq!(cfg.oracle.subscriptions_limit, 20);
        assert_eq!(cfg.market.refresh_interval_secs, 300);
        assert_eq!(cfg.telegram.api_url, "https://api.telegram.org");
    }

    #[test]
    fn load_fails_for_missing_file() {
        let err = AppConfig::load("/definitely/not/here.yaml").unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }
}
