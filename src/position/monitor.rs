//! Per-position monitoring probe
//!
//! Each open position gets its own recurring probe, re-armed on a fixed
//! delay independent of other positions. A cycle fetches the current
//! sell-side price, applies the exit rules, and checks the watched
//! wallets for whale sell-offs. Transient probe failures never stop the
//! monitor; only a stop-loss or whale-triggered full exit is terminal.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{MonitorConfig, WSOL_MINT};
use crate::engine::ProfitTier;
use crate::indexer::WalletTransaction;
use crate::trading::TradeExecutor;

/// What a monitoring cycle decided from the gain alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitAction {
    Hold,
    /// Full exit, terminal
    StopLoss,
    /// Partial sell; each tier fires at most once per position
    TakeProfit(ProfitTier),
}

/// Exit rules in priority order: stop-loss first, then the higher
/// take-profit tier, then the lower. Fired tiers are suppressed so the
/// same tier cannot trigger on every subsequent cycle.
pub fn decide_exit(
    gain: f64,
    tier1_sold: bool,
    tier2_sold: bool,
    config: &MonitorConfig,
) -> ExitAction {
    if gain <= config.stop_loss {
        return ExitAction::StopLoss;
    }
    if gain >= config.tier2_gain && !tier2_sold {
        return ExitAction::TakeProfit(ProfitTier::Tier2);
    }
    if gain >= config.tier1_gain && !tier1_sold {
        return ExitAction::TakeProfit(ProfitTier::Tier1);
    }
    ExitAction::Hold
}

/// True when any of the transactions carries a transfer of `mint` above
/// the whale threshold
pub fn whale_sold(txs: &[WalletTransaction], mint: &str, threshold: f64) -> bool {
    txs.iter()
        .flat_map(|tx| tx.events.token_transfers.iter())
        .any(|t| t.mint == mint && t.token_amount > threshold)
}

enum Cycle {
    Continue,
    Terminal,
}

/// Recurring probe for one open position
pub struct PositionMonitor {
    executor: Arc<TradeExecutor>,
    mint: String,
}

impl PositionMonitor {
    pub fn new(executor: Arc<TradeExecutor>, mint: String) -> Self {
        Self { executor, mint }
    }

    /// Run until a terminal exit rule fires or the position disappears
    pub async fn run(self) {
        info!("Monitoring position in {}", self.mint);
        let period = Duration::from_secs(self.executor.monitor_config.poll_interval_secs);
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            match self.cycle().await {
                Cycle::Terminal => break,
                Cycle::Continue => {}
            }
        }
        info!("Monitor for {} ended", self.mint);
    }

    async fn cycle(&self) -> Cycle {
        let Some(position) = self.executor.engine.get_position(&self.mint).await else {
            // Closed from elsewhere; nothing left to watch
            return Cycle::Terminal;
        };

        match self.probe_price().await {
            Ok(Some(current_price)) => {
                let gain = (current_price - position.entry_price) / position.entry_price;
                debug!(
                    "{}: entry {:.9} current {:.9} gain {:+.1}%",
                    self.mint,
                    position.entry_price,
                    current_price,
                    gain * 100.0
                );

                let config = &self.executor.monitor_config;
                match decide_exit(gain, position.tier1_sold, position.tier2_sold, config) {
                    ExitAction::StopLoss => {
                        warn!(
                            "Stop loss for {} at {:+.1}% - selling full balance",
                            self.mint,
                            gain * 100.0
                        );
                        // Only a completed full sell closes the position;
                        // a failed exit stays open and fires again next cycle
                        if self.executor.sell(&self.mint, position.token_amount).await {
                            self.executor.engine.close_position(&self.mint).await;
                            return Cycle::Terminal;
                        }
                        warn!(
                            "Stop-loss sell for {} failed, position stays open",
                            self.mint
                        );
                    }
                    ExitAction::TakeProfit(tier) => {
                        let sell_amount = ((position.token_amount as f64
                            * config.partial_sell_fraction)
                            as u64)
                            .max(1);
                        info!(
                            "Take profit {:?} for {} at {:+.1}% - selling {}",
                            tier,
                            self.mint,
                            gain * 100.0,
                            sell_amount
                        );
                        if self.executor.sell(&self.mint, sell_amount).await {
                            self.executor
                                .engine
                                .record_partial_sell(&self.mint, tier, sell_amount)
                                .await;
                        }
                    }
                    ExitAction::Hold => {}
                }
            }
            Ok(None) => {
                warn!("No route for price probe of {} - re-arming", self.mint);
            }
            Err(e) => {
                warn!("Price probe failed for {}: {} - re-arming", self.mint, e);
            }
        }

        // Whale watch runs every cycle regardless of gain
        match self.whale_selloff_detected().await {
            Ok(true) => {
                if let Some(position) = self.executor.engine.get_position(&self.mint).await {
                    warn!("Whale sell-off detected for {} - selling full balance", self.mint);
                    if self.executor.sell(&self.mint, position.token_amount).await {
                        self.executor.engine.close_position(&self.mint).await;
                        return Cycle::Terminal;
                    }
                    warn!(
                        "Whale-exit sell for {} failed, position stays open",
                        self.mint
                    );
                }
            }
            Ok(false) => {}
            Err(e) => {
                warn!("Whale probe failed for {}: {} - re-arming", self.mint, e);
            }
        }

        Cycle::Continue
    }

    /// Current sell-side price in lamports per token, or None when the
    /// quote service has no route
    async fn probe_price(&self) -> crate::error::Result<Option<f64>> {
        let route = self
            .executor
            .jupiter
            .quote(
                &self.mint,
                WSOL_MINT,
                self.executor.config.probe_amount,
                self.executor.config.slippage_bps,
            )
            .await?;
        Ok(route.map(|r| r.price()))
    }

    /// Scan the watched wallets' recent transfers of this mint
    async fn whale_selloff_detected(&self) -> crate::error::Result<bool> {
        let config = &self.executor.monitor_config;
        for wallet in &self.executor.watched_wallets {
            let txs = self
                .executor
                .helius
                .wallet_transactions(wallet, config.whale_tx_limit)
                .await?;
            if whale_sold(&txs, &self.mint, config.whale_transfer_threshold) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EligibilityConfig, LimitsConfig, TradingConfig};
    use crate::engine::{Position, TradingEngine};
    use crate::filter::EligibilityEvaluator;
    use crate::indexer::{HeliusClient, WalletTokenTransfer, WalletTransactionEvents};
    use crate::journal::Journal;
    use crate::router::JupiterClient;
    use solana_client::nonblocking::rpc_client::RpcClient;
    use solana_sdk::signature::Keypair;
    use std::net::SocketAddr;

    fn config() -> MonitorConfig {
        MonitorConfig {
            poll_interval_secs: 10,
            stop_loss: -0.10,
            tier1_gain: 0.30,
            tier2_gain: 0.60,
            partial_sell_fraction: 0.30,
            whale_transfer_threshold: 5_000_000.0,
            whale_tx_limit: 5,
        }
    }

    #[test]
    fn test_stop_loss_at_15_percent_drop() {
        // Entry P, probed P*0.85
        let entry = 0.002;
        let current = entry * 0.85;
        let gain = (current - entry) / entry;
        assert_eq!(decide_exit(gain, false, false, &config()), ExitAction::StopLoss);
    }

    #[test]
    fn test_stop_loss_boundary() {
        assert_eq!(decide_exit(-0.10, false, false, &config()), ExitAction::StopLoss);
        assert_eq!(decide_exit(-0.09, false, false, &config()), ExitAction::Hold);
    }

    #[test]
    fn test_tier_ordering_and_suppression() {
        let cfg = config();
        // +70%: higher tier wins while unfired
        assert_eq!(
            decide_exit(0.70, false, false, &cfg),
            ExitAction::TakeProfit(ProfitTier::Tier2)
        );
        // Tier2 already fired, tier1 not: lower tier still applies
        assert_eq!(
            decide_exit(0.70, false, true, &cfg),
            ExitAction::TakeProfit(ProfitTier::Tier1)
        );
        // Both fired: hold
        assert_eq!(decide_exit(0.70, true, true, &cfg), ExitAction::Hold);
        // +35%: only tier1, once
        assert_eq!(
            decide_exit(0.35, false, false, &cfg),
            ExitAction::TakeProfit(ProfitTier::Tier1)
        );
        assert_eq!(decide_exit(0.35, true, false, &cfg), ExitAction::Hold);
    }

    #[test]
    fn test_stop_loss_beats_take_profit_flags() {
        // Fired tiers never mask a stop-loss
        assert_eq!(decide_exit(-0.50, true, true, &config()), ExitAction::StopLoss);
    }

    fn tx(mint: &str, amount: f64) -> WalletTransaction {
        WalletTransaction {
            signature: "sig".to_string(),
            events: WalletTransactionEvents {
                token_transfers: vec![WalletTokenTransfer {
                    mint: mint.to_string(),
                    token_amount: amount,
                }],
            },
        }
    }

    /// Serve canned responses on a local socket: every GET (quote) gets a
    /// fixed route, everything else (swap build) gets a 500.
    async fn spawn_quote_only_server(quote_body: &'static str) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    use tokio::io::{AsyncReadExt, AsyncWriteExt};
                    let mut buf = [0u8; 4096];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]);
                    let (status, body) = if request.starts_with("GET") {
                        ("200 OK", quote_body)
                    } else {
                        ("500 Internal Server Error", "{}")
                    };
                    let response = format!(
                        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });
        addr
    }

    fn executor_against(
        base_url: String,
        engine: Arc<TradingEngine>,
        journal: Journal,
    ) -> Arc<TradeExecutor> {
        let jupiter = Arc::new(JupiterClient::with_base_url(base_url.clone()));
        let helius = Arc::new(HeliusClient::with_base_url("key".to_string(), base_url.clone()));
        let evaluator = EligibilityEvaluator::new(
            Arc::clone(&helius),
            Arc::clone(&jupiter),
            EligibilityConfig {
                buyer_samples: 1,
                sample_interval_secs: 0,
                min_buyers: 10,
                buyer_growth_factor: 2.0,
                max_top_holder_share: 0.4,
                min_liquidity_lamports: 5_000_000_000,
                max_price_impact: 0.02,
                holder_limit: 10,
                transfer_limit: 100,
            },
            true,
        );
        Arc::new(TradeExecutor::new(
            engine,
            jupiter,
            Arc::clone(&helius),
            evaluator,
            Arc::new(RpcClient::new(base_url)),
            Arc::new(Keypair::new()),
            journal,
            TradingConfig {
                buy_amount_lamports: 10_000_000,
                probe_amount: 1_000_000,
                slippage_bps: 100,
                max_retries: 2,
                retry_base_delay_ms: 1,
                settle_delay_secs: 0,
            },
            config(),
            vec![],
            false,
        ))
    }

    #[tokio::test]
    async fn test_failed_stop_loss_sell_keeps_position_open() {
        // Probe quote prices the position at a deep loss, but the swap
        // build endpoint rejects every sell attempt
        let addr =
            spawn_quote_only_server(r#"{"data":[{"inAmount":1000000,"outAmount":500}]}"#).await;

        let limits = LimitsConfig {
            max_open_positions: 5,
            daily_limit: 0,
            reset_interval_secs: 86_400,
            watched_wallets: vec![],
            banned_keywords: vec![],
        };
        let engine = Arc::new(TradingEngine::new(limits));
        // Entry at 0.001 lamports/token; probed 500/1000000 = 0.0005 is -50%
        assert!(engine
            .open_position(Position::new("mintY".to_string(), 0.001, 1_000_000))
            .await);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transactions.log");
        let executor = executor_against(
            format!("http://{}", addr),
            Arc::clone(&engine),
            Journal::new(&path),
        );

        let monitor = PositionMonitor::new(executor, "mintY".to_string());
        let outcome = monitor.cycle().await;

        // The exit did not complete, so supervision continues
        assert!(matches!(outcome, Cycle::Continue));
        assert!(engine.is_open("mintY").await);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[SELL_FAIL] mintY"));
        assert!(!content.contains("[SELL] mintY"));
    }

    #[test]
    fn test_whale_sold_threshold() {
        let txs = vec![tx("mintA", 6_000_000.0)];
        assert!(whale_sold(&txs, "mintA", 5_000_000.0));
        // Exactly at threshold does not trigger
        let txs = vec![tx("mintA", 5_000_000.0)];
        assert!(!whale_sold(&txs, "mintA", 5_000_000.0));
        // Other mints are ignored
        let txs = vec![tx("mintB", 9_000_000.0)];
        assert!(!whale_sold(&txs, "mintA", 5_000_000.0));
        assert!(!whale_sold(&[], "mintA", 5_000_000.0));
    }
}
