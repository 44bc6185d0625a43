//! CLI command implementations

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::engine::TradingEngine;
use crate::filter::EligibilityEvaluator;
use crate::indexer::HeliusClient;
use crate::journal::Journal;
use crate::router::JupiterClient;
use crate::stream::LogIngestor;
use crate::trading::TradeExecutor;
use crate::wallet;

/// Start the sniper: wire every component together and run the log
/// stream until the process is killed.
pub async fn start(config: &Config, dry_run: bool) -> Result<()> {
    if dry_run {
        warn!("Running in DRY-RUN mode - no transactions will be submitted");
    }
    if config.rpc.is_devnet() {
        warn!("Devnet: eligibility checks and wallet pre-check are bypassed");
    }

    info!(
        "Buy size: {} lamports, slippage: {}bps, position cap: {}, daily limit: {}",
        config.trading.buy_amount_lamports,
        config.trading.slippage_bps,
        config.limits.max_open_positions,
        config.limits.daily_limit
    );

    let journal = Journal::new(&config.journal_path);

    let engine = Arc::new(TradingEngine::new(config.limits.clone()));
    let _daily_reset = Arc::clone(&engine).spawn_daily_reset();

    let helius = Arc::new(HeliusClient::new(config.rpc.helius_api_key.clone()));
    let jupiter = Arc::new(JupiterClient::new());

    let rpc = Arc::new(
        solana_client::nonblocking::rpc_client::RpcClient::new_with_timeout(
            config.rpc.http_endpoint(),
            Duration::from_millis(config.rpc.timeout_ms),
        ),
    );

    let keypair = Arc::new(wallet::load_keypair()?);

    let evaluator = EligibilityEvaluator::new(
        Arc::clone(&helius),
        Arc::clone(&jupiter),
        config.eligibility.clone(),
        config.rpc.is_devnet(),
    );

    let executor = Arc::new(TradeExecutor::new(
        Arc::clone(&engine),
        Arc::clone(&jupiter),
        Arc::clone(&helius),
        evaluator,
        rpc,
        keypair,
        journal.clone(),
        config.trading.clone(),
        config.monitor.clone(),
        config.limits.watched_wallets.clone(),
        dry_run,
    ));

    let ingestor = LogIngestor::new(
        config.rpc.ws_endpoint(),
        config.stream.clone(),
        config.limits.clone(),
        engine,
        executor,
        helius,
        journal,
        config.rpc.is_devnet(),
    );

    // Runs forever, reconnecting as needed
    ingestor.run().await;
    Ok(())
}

/// Print the most recent journal entries
pub fn status(config: &Config, limit: usize) -> Result<()> {
    let journal = Journal::new(&config.journal_path);
    let entries = journal.tail(limit);
    if entries.is_empty() {
        println!("No journal entries at {}", config.journal_path);
        return Ok(());
    }
    for line in entries {
        println!("{}", line);
    }
    Ok(())
}

/// Print the active configuration with secrets masked
pub fn show_config(config: &Config) -> Result<()> {
    println!("network:             {}", config.rpc.network);
    println!("helius api key:      {}", mask(&config.rpc.helius_api_key));
    println!("journal:             {}", config.journal_path);
    println!("buy amount:          {} lamports", config.trading.buy_amount_lamports);
    println!("slippage:            {} bps", config.trading.slippage_bps);
    println!("max open positions:  {}", config.limits.max_open_positions);
    println!("daily limit:         {}", config.limits.daily_limit);
    println!("watched wallets:     {}", config.limits.watched_wallets.len());
    println!("banned keywords:     {}", config.limits.banned_keywords.len());
    println!(
        "stop loss / tiers:   {:.0}% / +{:.0}% / +{:.0}%",
        config.monitor.stop_loss * 100.0,
        config.monitor.tier1_gain * 100.0,
        config.monitor.tier2_gain * 100.0
    );
    Ok(())
}

fn mask(secret: &str) -> String {
    if secret.len() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", &secret[..4])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask() {
        assert_eq!(mask("abcdef123"), "abcd****");
        assert_eq!(mask("ab"), "****");
    }
}
