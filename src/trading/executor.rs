//! Trade execution: quote, build, sign, submit
//!
//! Every buy and sell runs the same pipeline with bounded retry. Only
//! transport failures are retried: a validation rejection (no route, a
//! rate gate) fails immediately. Each terminal outcome, success or
//! exhausted retries, produces exactly one journal entry.

use serde_json::json;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use solana_sdk::transaction::VersionedTransaction;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::{MonitorConfig, TradingConfig, WSOL_MINT};
use crate::engine::{Position, TradingEngine};
use crate::error::{Error, Result};
use crate::filter::{EligibilityEvaluator, RejectReason};
use crate::indexer::HeliusClient;
use crate::journal::{EventKind, Journal};
use crate::position::PositionMonitor;
use crate::router::JupiterClient;

/// Executes swaps and owns the buy/sell retry discipline
pub struct TradeExecutor {
    pub(crate) engine: Arc<TradingEngine>,
    pub(crate) jupiter: Arc<JupiterClient>,
    pub(crate) helius: Arc<HeliusClient>,
    evaluator: EligibilityEvaluator,
    rpc: Arc<RpcClient>,
    keypair: Arc<Keypair>,
    pub(crate) journal: Journal,
    pub(crate) config: TradingConfig,
    pub(crate) monitor_config: MonitorConfig,
    pub(crate) watched_wallets: Vec<String>,
    dry_run: bool,
}

impl TradeExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engine: Arc<TradingEngine>,
        jupiter: Arc<JupiterClient>,
        helius: Arc<HeliusClient>,
        evaluator: EligibilityEvaluator,
        rpc: Arc<RpcClient>,
        keypair: Arc<Keypair>,
        journal: Journal,
        config: TradingConfig,
        monitor_config: MonitorConfig,
        watched_wallets: Vec<String>,
        dry_run: bool,
    ) -> Self {
        Self {
            engine,
            jupiter,
            helius,
            evaluator,
            rpc,
            keypair,
            journal,
            config,
            monitor_config,
            watched_wallets,
            dry_run,
        }
    }

    /// Buy a fixed native-asset amount of `mint`.
    ///
    /// All outcomes are journaled here; the caller fires and forgets.
    pub async fn buy(self: Arc<Self>, mint: &str) {
        // Cap gate: journaled failure, swap pipeline never invoked
        if self.engine.at_position_cap().await {
            warn!("Max open trades reached, refusing to buy {}", mint);
            self.journal.record(
                EventKind::BuyFail,
                mint,
                None,
                json!({
                    "error": RejectReason::MaxOpenTrades.as_str(),
                    "open": self.engine.open_mints().await,
                }),
            );
            return;
        }
        if self.engine.is_open(mint).await {
            debug!("Skipping {}: already open", mint);
            return;
        }
        // No re-entry into a mint already bought this period, even after
        // its position closed
        if self.engine.was_purchased(mint).await {
            info!("Skipping {}: already purchased this period", mint);
            self.journal.record(
                EventKind::BuyFail,
                mint,
                None,
                json!({
                    "error": RejectReason::AlreadyPurchased.as_str(),
                    "reason": RejectReason::AlreadyPurchased,
                }),
            );
            return;
        }

        let verdict = self
            .evaluator
            .evaluate(mint, self.config.buy_amount_lamports, self.config.slippage_bps)
            .await;
        if !verdict.admit {
            let reason = verdict.reason.unwrap_or(RejectReason::ProbeFailed);
            self.journal.record(
                EventKind::BuyFail,
                mint,
                None,
                json!({
                    "error": reason.as_str(),
                    "reason": reason,
                    "detail": verdict.detail,
                }),
            );
            return;
        }

        match self.with_retries("buy", || self.buy_attempt(mint)).await {
            Ok((txid, entry_price, tokens_out)) => {
                self.journal.record(
                    EventKind::Buy,
                    mint,
                    Some(&txid),
                    json!({ "pricePerToken": entry_price, "tokensOut": tokens_out }),
                );
                let position = Position::new(mint.to_string(), entry_price, tokens_out);
                if self.engine.open_position(position).await {
                    Arc::clone(&self).spawn_monitor(mint.to_string());
                } else {
                    // Lost the race to the cap while the swap settled
                    self.journal.record(
                        EventKind::Error,
                        mint,
                        Some(&txid),
                        json!({ "error": "bought but position not tracked (cap reached)" }),
                    );
                }
            }
            Err(e) => {
                error!("Buy failed terminally for {}: {}", mint, e);
                self.journal.record(
                    EventKind::BuyFail,
                    mint,
                    None,
                    json!({ "error": e.to_string() }),
                );
            }
        }
    }

    /// Sell `amount` of `mint` back to the native asset. Returns whether
    /// the swap went through. Does not touch the open-position set; exit
    /// bookkeeping belongs to the monitor.
    pub async fn sell(&self, mint: &str, amount: u64) -> bool {
        match self
            .with_retries("sell", || self.sell_attempt(mint, amount))
            .await
        {
            Ok((txid, price)) => {
                self.journal.record(
                    EventKind::Sell,
                    mint,
                    Some(&txid),
                    json!({ "amount": amount, "pricePerToken": price }),
                );
                true
            }
            Err(e) => {
                error!("Sell failed terminally for {}: {}", mint, e);
                self.journal.record(
                    EventKind::SellFail,
                    mint,
                    None,
                    json!({ "error": e.to_string(), "amount": amount }),
                );
                false
            }
        }
    }

    /// One buy pipeline pass: quote, build, sign, submit.
    /// Returns (txid, entry price in lamports per token, tokens bought).
    async fn buy_attempt(&self, mint: &str) -> Result<(String, f64, u64)> {
        let route = self
            .jupiter
            .quote(
                WSOL_MINT,
                mint,
                self.config.buy_amount_lamports,
                self.config.slippage_bps,
            )
            .await?
            .ok_or(Error::Rejected(RejectReason::NoRoute))?;

        // Entry price normalized to lamports per token so the monitor's
        // sell-side probes compare against the same orientation
        let entry_price = if route.out_amount == 0 {
            return Err(Error::Internal("route returned zero output".to_string()));
        } else {
            route.in_amount as f64 / route.out_amount as f64
        };
        let tokens_out = route.out_amount;

        if self.dry_run {
            info!("[dry-run] would buy {} for {} lamports", mint, route.in_amount);
            return Ok(("dry-run".to_string(), entry_price, tokens_out));
        }

        let tx = self.signed_swap(&route).await?;
        let signature = self
            .rpc
            .send_transaction(&tx)
            .await
            .map_err(|e| Error::TransactionSend(e.to_string()))?;
        Ok((signature.to_string(), entry_price, tokens_out))
    }

    /// One sell pipeline pass. Returns (txid, price in lamports per token).
    async fn sell_attempt(&self, mint: &str, amount: u64) -> Result<(String, f64)> {
        let route = self
            .jupiter
            .quote(mint, WSOL_MINT, amount, self.config.slippage_bps)
            .await?
            .ok_or(Error::Rejected(RejectReason::NoRoute))?;

        let price = route.price();

        if self.dry_run {
            info!("[dry-run] would sell {} of {}", amount, mint);
            return Ok(("dry-run".to_string(), price));
        }

        let tx = self.signed_swap(&route).await?;
        let signature = self
            .rpc
            .send_transaction(&tx)
            .await
            .map_err(|e| Error::TransactionSend(e.to_string()))?;
        Ok((signature.to_string(), price))
    }

    /// Fetch the unsigned payload for a route, deserialize and sign it
    async fn signed_swap(&self, route: &crate::router::Route) -> Result<VersionedTransaction> {
        let pubkey = self.keypair.pubkey().to_string();
        let bytes = self.jupiter.build_swap(route, &pubkey).await?;
        let unsigned: VersionedTransaction = bincode::deserialize(&bytes)
            .map_err(|e| Error::Serialization(format!("swap payload decode failed: {}", e)))?;
        VersionedTransaction::try_new(unsigned.message, &[self.keypair.as_ref()])
            .map_err(|e| Error::Internal(format!("signing failed: {}", e)))
    }

    /// Bounded retry: at most `max_retries` extra attempts, delay growing
    /// linearly with the attempt number. Non-retryable errors surface
    /// immediately.
    async fn with_retries<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.config.max_retries as u64 + 1;
        for attempt in 1..=max_attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = Duration::from_millis(self.config.retry_base_delay_ms * attempt);
                    warn!(
                        "{} attempt {}/{} failed: {} - retrying in {:?}",
                        what, attempt, max_attempts, e, delay
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
        Err(Error::Internal(format!("{} retry loop exhausted", what)))
    }

    /// Start the per-position monitor after the settlement delay
    fn spawn_monitor(self: Arc<Self>, mint: String) {
        let settle = Duration::from_secs(self.config.settle_delay_secs);
        tokio::spawn(async move {
            sleep(settle).await;
            PositionMonitor::new(self, mint).run().await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EligibilityConfig, LimitsConfig};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;

    // Nothing listens on the discard port; every swap-side request fails
    // fast with a transport error
    const DEAD_URL: &str = "http://127.0.0.1:9";

    fn limits(max_open: usize) -> LimitsConfig {
        LimitsConfig {
            max_open_positions: max_open,
            daily_limit: 0,
            reset_interval_secs: 86_400,
            watched_wallets: vec![],
            banned_keywords: vec![],
        }
    }

    fn executor_with(limits: LimitsConfig, journal: Journal) -> Arc<TradeExecutor> {
        let engine = Arc::new(TradingEngine::new(limits));
        let jupiter = Arc::new(JupiterClient::with_base_url(DEAD_URL.to_string()));
        let helius = Arc::new(HeliusClient::with_base_url(
            "key".to_string(),
            DEAD_URL.to_string(),
        ));
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
        let rpc = Arc::new(RpcClient::new(DEAD_URL.to_string()));
        Arc::new(TradeExecutor::new(
            engine,
            jupiter,
            Arc::clone(&helius),
            evaluator,
            rpc,
            Arc::new(Keypair::new()),
            journal,
            TradingConfig {
                buy_amount_lamports: 10_000_000,
                probe_amount: 1_000_000,
                slippage_bps: 100,
                max_retries: 2,
                retry_base_delay_ms: 10,
                settle_delay_secs: 0,
            },
            MonitorConfig {
                poll_interval_secs: 10,
                stop_loss: -0.10,
                tier1_gain: 0.30,
                tier2_gain: 0.60,
                partial_sell_fraction: 0.30,
                whale_transfer_threshold: 5_000_000.0,
                whale_tx_limit: 5,
            },
            vec![],
            true,
        ))
    }

    fn test_journal() -> (tempfile::TempDir, std::path::PathBuf, Journal) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transactions.log");
        let journal = Journal::new(&path);
        (dir, path, journal)
    }

    #[tokio::test]
    async fn test_retry_schedule_transport_errors() {
        let (_dir, _path, journal) = test_journal();
        let executor = executor_with(limits(5), journal);

        let attempts = AtomicU32::new(0);
        let starts: Mutex<Vec<Instant>> = Mutex::new(Vec::new());
        let result: Result<()> = executor
            .with_retries("op", || {
                attempts.fetch_add(1, Ordering::SeqCst);
                starts.lock().unwrap().push(Instant::now());
                async { Err(Error::Http("boom".to_string())) }
            })
            .await;

        assert!(result.is_err());
        // One initial attempt plus max_retries extras
        assert_eq!(attempts.load(Ordering::SeqCst), 3);

        // Delays follow the linear schedule: at least base, then 2x base
        let starts = starts.lock().unwrap();
        let base = Duration::from_millis(10);
        assert!(starts[1] - starts[0] >= base);
        assert!(starts[2] - starts[1] >= base * 2);
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let (_dir, _path, journal) = test_journal();
        let executor = executor_with(limits(5), journal);

        let attempts = AtomicU32::new(0);
        let result: Result<()> = executor
            .with_retries("op", || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::Rejected(RejectReason::NoRoute)) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_needs_single_attempt() {
        let (_dir, _path, journal) = test_journal();
        let executor = executor_with(limits(5), journal);

        let attempts = AtomicU32::new(0);
        let result: Result<u32> = executor
            .with_retries("op", || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Ok(7) }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_buy_at_cap_journals_failure_without_pipeline() {
        let (_dir, path, journal) = test_journal();
        let executor = executor_with(limits(1), journal);
        assert!(executor
            .engine
            .open_position(Position::new("occupied".to_string(), 0.5, 1_000))
            .await);

        Arc::clone(&executor).buy("fresh").await;

        let content = std::fs::read_to_string(&path).unwrap();
        let fails: Vec<&str> = content
            .lines()
            .filter(|l| l.contains("[BUY_FAIL]"))
            .collect();
        // Exactly one failure entry, carrying the cap reason rather than
        // the transport error the dead endpoint would produce
        assert_eq!(fails.len(), 1);
        assert!(fails[0].contains("max open trades reached"));
        assert!(!executor.engine.is_open("fresh").await);
    }

    #[tokio::test]
    async fn test_buy_transport_failure_single_terminal_entry() {
        let (_dir, path, journal) = test_journal();
        let executor = executor_with(limits(5), journal);

        // Eligibility is bypassed; the quote against the dead endpoint
        // fails through the full retry schedule
        Arc::clone(&executor).buy("doomed").await;

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content.lines().filter(|l| l.contains("[BUY_FAIL]")).count(),
            1
        );
        assert_eq!(content.lines().filter(|l| l.contains("[BUY] ")).count(), 0);
        assert!(!executor.engine.is_open("doomed").await);
    }
}
