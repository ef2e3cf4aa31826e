use clap::Parser;
use serde::{Deserialize, Serialize};

use feeaudit_common::{
    config::{
        DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_EXPLORER_MIRRORS, DEFAULT_REQUEST_TIMEOUT_SECS,
        VERSION,
    },
    fee::{FeeCurrency, TradeRole},
    network::Network,
};

use crate::logger::LogLevel;

// Functions Helpers
fn default_log_filename() -> String {
    String::from("feeaudit.log")
}

fn default_logs_path() -> String {
    String::from("logs/")
}

fn default_explorer_mirrors() -> Vec<String> {
    DEFAULT_EXPLORER_MIRRORS.iter().map(|s| s.to_string()).collect()
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct ExplorerConfig {
    /// Explorer mirror to query, repeat the flag to add fallbacks
    ///
    /// Mirrors are tried in the given order. When no mirror is set the
    /// public mempool.space compatible mirrors are used.
    #[clap(long)]
    #[serde(default = "default_explorer_mirrors")]
    pub explorer_mirrors: Vec<String>,
    /// Request timeout in seconds
    #[clap(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Connection timeout in seconds
    #[clap(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl ExplorerConfig {
    /// The CLI leaves the mirror list empty when the flag was not given.
    pub fn mirrors_or_default(&self) -> Vec<String> {
        if self.explorer_mirrors.is_empty() {
            default_explorer_mirrors()
        } else {
            self.explorer_mirrors.clone()
        }
    }
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            explorer_mirrors: default_explorer_mirrors(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct LogConfig {
    /// Set log level
    #[clap(long, value_enum, default_value_t)]
    #[serde(default)]
    pub log_level: LogLevel,
    /// Set file log level
    /// By default, it will be the same as log level
    #[clap(long, value_enum)]
    pub file_log_level: Option<LogLevel>,
    /// Disable the log file
    #[clap(long)]
    #[serde(default)]
    pub disable_file_logging: bool,
    /// Disable the log filename date based
    /// If disabled, the log file will be named feeaudit.log instead of YYYY-MM-DD.feeaudit.log
    #[clap(long)]
    #[serde(default)]
    pub disable_file_log_date_based: bool,
    /// Disable the usage of colors in log
    #[clap(long)]
    #[serde(default)]
    pub disable_log_color: bool,
    /// Log filename
    ///
    /// File will be stored in the logs directory, this is only the
    /// filename, not the full path.
    #[clap(long, default_value_t = default_log_filename())]
    #[serde(default = "default_log_filename")]
    pub filename_log: String,
    /// Logs directory
    ///
    /// By default it will be logs/ of the current directory.
    /// It must end with a / to be a valid folder.
    #[clap(long, default_value_t = default_logs_path())]
    #[serde(default = "default_logs_path")]
    pub logs_path: String,
}

#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[clap(version = VERSION, about = "Verifies claimed trading fee payments against public block explorers")]
#[command(styles = feeaudit_common::get_cli_styles())]
pub struct Config {
    /// Explorer configuration
    #[structopt(flatten)]
    pub explorer: ExplorerConfig,
    /// Log configuration
    #[structopt(flatten)]
    pub log: LogConfig,
    /// Network the verified trades are expected to live on
    #[clap(long, value_enum, default_value_t = Network::Mainnet)]
    #[serde(default)]
    pub network: Network,
    /// Skip explorer lookups and accept claims without checking
    #[clap(long)]
    #[serde(default)]
    pub bypass_fee_validation: bool,
    /// Path of a JSON trade filter applied before verifying
    #[clap(long)]
    pub filter_file: Option<String>,
    /// Transaction id whose fee payment is claimed
    #[clap(long)]
    pub tx_id: Option<String>,
    /// Trade amount in satoshis backing the claim
    #[clap(long)]
    pub trade_amount: Option<u64>,
    /// Currency the fee is claimed to be paid in
    ///
    /// Takers can omit it, the verifier then infers the currency from
    /// the transaction itself.
    #[clap(long, value_enum)]
    pub fee_currency: Option<FeeCurrency>,
    /// Side of the trade that paid the fee
    ///
    /// When omitted the transaction is only checked for confirmations,
    /// which requires --chain-height.
    #[clap(long, value_enum)]
    pub role: Option<TradeRole>,
    /// Block height at offer creation, used for maker claims
    #[clap(long)]
    pub height_hint: Option<u64>,
    /// Current chain height, used to count confirmations
    #[clap(long)]
    pub chain_height: Option<u64>,
    /// JSON File to load the configuration from
    #[clap(long)]
    #[serde(skip)]
    #[serde(default)]
    pub config_file: Option<String>,
    /// Generate the template at the `config_file` path
    #[clap(long)]
    #[serde(skip)]
    #[serde(default)]
    pub generate_config_template: bool,
}
