//! Configuration loading and validation
//!
//! Everything is loaded once at startup from environment variables
//! (`.env` is read by `dotenvy` in main). There is no runtime
//! reconfiguration.

use crate::error::{Error, Result};

/// Wrapped SOL mint - the native-asset placeholder that must never be
/// treated as a tradeable candidate.
pub const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// Main configuration structure
#[derive(Debug, Clone)]
pub struct Config {
    pub rpc: RpcConfig,
    pub stream: StreamConfig,
    pub trading: TradingConfig,
    pub eligibility: EligibilityConfig,
    pub monitor: MonitorConfig,
    pub limits: LimitsConfig,
    pub journal_path: String,
}

#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Helius API key (required)
    pub helius_api_key: String,
    /// Network identifier, e.g. "mainnet" or "devnet"
    pub network: String,
    pub timeout_ms: u64,
}

impl RpcConfig {
    pub fn http_endpoint(&self) -> String {
        format!(
            "https://{}.helius-rpc.com/?api-key={}",
            self.network, self.helius_api_key
        )
    }

    pub fn ws_endpoint(&self) -> String {
        format!(
            "wss://{}.helius-rpc.com/?api-key={}",
            self.network, self.helius_api_key
        )
    }

    /// Devnet bypasses eligibility probing and the wallet-activity pre-check.
    pub fn is_devnet(&self) -> bool {
        self.network == "devnet"
    }
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Base reconnect delay; the actual delay grows linearly with
    /// consecutive failures.
    pub reconnect_base_delay_ms: u64,
    /// Cap on the reconnect delay
    pub reconnect_max_delay_ms: u64,
    /// Commitment level for the log subscription
    pub commitment: String,
}

#[derive(Debug, Clone)]
pub struct TradingConfig {
    /// Fixed buy size in lamports (0.01 SOL by default)
    pub buy_amount_lamports: u64,
    /// Reference amount used for sell quotes and price probes
    pub probe_amount: u64,
    /// Slippage tolerance in basis points
    pub slippage_bps: u32,
    /// Extra attempts after the first failure
    pub max_retries: u32,
    /// Retry delay is this value multiplied by the attempt number
    pub retry_base_delay_ms: u64,
    /// Delay before the position monitor starts, allowing settlement
    pub settle_delay_secs: u64,
}

#[derive(Debug, Clone)]
pub struct EligibilityConfig {
    /// Number of distinct-buyer samples in the momentum window
    pub buyer_samples: u32,
    /// Seconds between momentum samples
    pub sample_interval_secs: u64,
    /// Minimum absolute distinct-buyer count (max across samples)
    pub min_buyers: u32,
    /// max must be at least this multiple of min across the window
    pub buyer_growth_factor: f64,
    /// Reject if the top holder owns more than this share of supply
    pub max_top_holder_share: f64,
    /// Minimum route liquidity in lamports (5 SOL by default)
    pub min_liquidity_lamports: u64,
    /// Maximum tolerated price-impact fraction
    pub max_price_impact: f64,
    /// How many top holders to fetch
    pub holder_limit: u32,
    /// How many transfers to scan per buyer-count sample
    pub transfer_limit: u32,
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Seconds between monitoring cycles per position
    pub poll_interval_secs: u64,
    /// Full sell when gain drops to this fraction or below (negative)
    pub stop_loss: f64,
    /// First take-profit tier
    pub tier1_gain: f64,
    /// Second take-profit tier
    pub tier2_gain: f64,
    /// Fraction of the remaining balance sold at each tier
    pub partial_sell_fraction: f64,
    /// A watched-wallet transfer above this amount (smallest denomination)
    /// is treated as a whale sell-off
    pub whale_transfer_threshold: f64,
    /// Recent transactions fetched per watched wallet
    pub whale_tx_limit: u32,
}

#[derive(Debug, Clone)]
pub struct LimitsConfig {
    /// Cap on concurrently open positions
    pub max_open_positions: usize,
    /// Buys allowed per reset period; 0 disables the limit
    pub daily_limit: u32,
    /// Counter reset period in seconds (24h by default)
    pub reset_interval_secs: u64,
    /// Wallets whose large transfers are treated as market-moving signals
    pub watched_wallets: Vec<String>,
    /// Case-insensitive substrings that disqualify a candidate address
    pub banned_keywords: Vec<String>,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// Missing credentials are fatal here, before any network activity.
    pub fn from_env() -> Result<Self> {
        let helius_api_key = require_env("HELIUS_API_KEY")?;
        let network = std::env::var("NETWORK").unwrap_or_else(|_| "mainnet".to_string());

        // PRIVATE_KEY is read again by the wallet module when signing;
        // here we only verify it is present and well-formed.
        let raw_key = require_env("PRIVATE_KEY")?;
        validate_private_key_shape(&raw_key)?;

        Ok(Self {
            rpc: RpcConfig {
                helius_api_key,
                network,
                timeout_ms: env_parse("RPC_TIMEOUT_MS", 30_000)?,
            },
            stream: StreamConfig {
                reconnect_base_delay_ms: env_parse("WS_RECONNECT_BASE_DELAY_MS", 5_000)?,
                reconnect_max_delay_ms: env_parse("WS_RECONNECT_MAX_DELAY_MS", 30_000)?,
                commitment: std::env::var("WS_COMMITMENT")
                    .unwrap_or_else(|_| "finalized".to_string()),
            },
            trading: TradingConfig {
                buy_amount_lamports: env_parse("BUY_AMOUNT_LAMPORTS", 10_000_000)?,
                probe_amount: env_parse("PROBE_AMOUNT", 1_000_000)?,
                slippage_bps: env_parse("SLIPPAGE_BPS", 100)?,
                max_retries: env_parse("TRADE_MAX_RETRIES", 2)?,
                retry_base_delay_ms: env_parse("TRADE_RETRY_BASE_DELAY_MS", 2_000)?,
                settle_delay_secs: env_parse("SETTLE_DELAY_SECS", 30)?,
            },
            eligibility: EligibilityConfig {
                buyer_samples: env_parse("BUYER_SAMPLES", 5)?,
                sample_interval_secs: env_parse("BUYER_SAMPLE_INTERVAL_SECS", 5)?,
                min_buyers: env_parse("MIN_BUYERS", 10)?,
                buyer_growth_factor: env_parse("BUYER_GROWTH_FACTOR", 2.0)?,
                max_top_holder_share: env_parse("MAX_TOP_HOLDER_SHARE", 0.4)?,
                min_liquidity_lamports: env_parse("MIN_LIQUIDITY_LAMPORTS", 5_000_000_000)?,
                max_price_impact: env_parse("MAX_PRICE_IMPACT", 0.02)?,
                holder_limit: env_parse("HOLDER_LIMIT", 10)?,
                transfer_limit: env_parse("TRANSFER_LIMIT", 100)?,
            },
            monitor: MonitorConfig {
                poll_interval_secs: env_parse("MONITOR_POLL_INTERVAL_SECS", 10)?,
                stop_loss: env_parse("STOP_LOSS", -0.10)?,
                tier1_gain: env_parse("TIER1_GAIN", 0.30)?,
                tier2_gain: env_parse("TIER2_GAIN", 0.60)?,
                partial_sell_fraction: env_parse("PARTIAL_SELL_FRACTION", 0.30)?,
                whale_transfer_threshold: env_parse("WHALE_TRANSFER_THRESHOLD", 5_000_000.0)?,
                whale_tx_limit: env_parse("WHALE_TX_LIMIT", 5)?,
            },
            limits: LimitsConfig {
                max_open_positions: env_parse("MAX_OPEN_POSITIONS", 5)?,
                daily_limit: env_parse("DAILY_LIMIT", 0)?,
                reset_interval_secs: env_parse("RESET_INTERVAL_SECS", 86_400)?,
                watched_wallets: env_list("WATCHED_WALLETS"),
                banned_keywords: env_list("BANNED_KEYWORDS"),
            },
            journal_path: std::env::var("JOURNAL_PATH")
                .unwrap_or_else(|_| "transactions.log".to_string()),
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::MissingEnvVar(name.to_string()))
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| Error::Config(format!("invalid value for {}: {}", name, raw))),
        Err(_) => Ok(default),
    }
}

fn env_list(name: &str) -> Vec<String> {
    std::env::var(name)
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Verify PRIVATE_KEY looks like signing key material without keeping it
/// around: either a JSON byte array or a base58 string.
fn validate_private_key_shape(raw: &str) -> Result<()> {
    if raw.trim_start().starts_with('[') {
        let bytes: Vec<u8> = serde_json::from_str(raw)
            .map_err(|e| Error::InvalidKeypair(format!("PRIVATE_KEY is not a byte array: {}", e)))?;
        if bytes.len() < 32 {
            return Err(Error::InvalidKeypair(format!(
                "PRIVATE_KEY has {} bytes, expected at least 32",
                bytes.len()
            )));
        }
        Ok(())
    } else {
        bs58::decode(raw.trim())
            .into_vec()
            .map_err(|e| Error::InvalidKeypair(format!("PRIVATE_KEY is not base58: {}", e)))
            .and_then(|bytes| {
                if bytes.len() < 32 {
                    Err(Error::InvalidKeypair("PRIVATE_KEY too short".to_string()))
                } else {
                    Ok(())
                }
            })
    }
}
