//! Live log-event ingestion
//!
//! Maintains the single persistent `logsSubscribe` connection (the
//! all-transactions feed at the configured commitment), extracts
//! candidate mints from incoming log lines, and dispatches them through
//! the rate gates to the trade executor.
//!
//! Malformed payloads are logged and discarded, never fatal. A dropped
//! connection is re-established after a delay growing linearly with
//! consecutive failures, capped at the configured maximum.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::config::{LimitsConfig, StreamConfig};
use crate::engine::{DropReason, TradingEngine};
use crate::error::{Error, Result};
use crate::indexer::HeliusClient;
use crate::journal::{EventKind, Journal};
use crate::stream::extract::extract_candidate;
use crate::trading::TradeExecutor;

/// Transactions fetched per watched wallet for the pre-check
const PRECHECK_TX_LIMIT: u32 = 10;

/// WebSocket log-event ingestor
pub struct LogIngestor {
    ws_url: String,
    config: StreamConfig,
    limits: LimitsConfig,
    engine: Arc<TradingEngine>,
    executor: Arc<TradeExecutor>,
    helius: Arc<HeliusClient>,
    journal: Journal,
    /// Devnet: the wallet-activity pre-check is a pass-through
    bypass_precheck: bool,
}

impl LogIngestor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ws_url: String,
        config: StreamConfig,
        limits: LimitsConfig,
        engine: Arc<TradingEngine>,
        executor: Arc<TradeExecutor>,
        helius: Arc<HeliusClient>,
        journal: Journal,
        bypass_precheck: bool,
    ) -> Self {
        Self {
            ws_url,
            config,
            limits,
            engine,
            executor,
            helius,
            journal,
            bypass_precheck,
        }
    }

    /// Run the subscription loop forever, reconnecting on failure
    pub async fn run(&self) {
        let mut consecutive_failures: u32 = 0;
        loop {
            match self.connect_and_stream(&mut consecutive_failures).await {
                Ok(()) => {
                    // Server closed the stream cleanly
                    consecutive_failures += 1;
                    info!("Log stream ended");
                }
                Err(e) => {
                    consecutive_failures += 1;
                    error!("Log stream error: {}", e);
                }
            }

            let delay = Duration::from_millis(
                (self.config.reconnect_base_delay_ms * consecutive_failures as u64)
                    .min(self.config.reconnect_max_delay_ms),
            );
            warn!(
                "Reconnecting in {:?} (failure #{})",
                delay, consecutive_failures
            );
            sleep(delay).await;
        }
    }

    /// One connection lifetime: subscribe, then consume messages until
    /// the stream drops
    async fn connect_and_stream(&self, consecutive_failures: &mut u32) -> Result<()> {
        info!("Connecting to log stream...");
        let url = url::Url::parse(&self.ws_url)
            .map_err(|e| Error::Config(format!("invalid WebSocket URL: {}", e)))?;

        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| Error::WsConnection(e.to_string()))?;
        info!("Log stream connected");
        *consecutive_failures = 0;

        let (mut write, mut read) = ws_stream.split();

        let subscribe = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "logsSubscribe",
            "params": [
                { "all": {} },
                { "commitment": self.config.commitment },
            ],
        });
        write
            .send(Message::Text(subscribe.to_string()))
            .await
            .map_err(|e| Error::WsConnection(format!("subscribe failed: {}", e)))?;
        info!(
            "Subscribed to all-transactions logs at {} commitment",
            self.config.commitment
        );

        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    self.handle_message(&text).await;
                }
                Ok(Message::Ping(payload)) => {
                    if let Err(e) = write.send(Message::Pong(payload)).await {
                        return Err(Error::WsConnection(format!("pong failed: {}", e)));
                    }
                }
                Ok(Message::Close(_)) => {
                    info!("Log stream closed by server");
                    return Ok(());
                }
                Ok(_) => {}
                Err(e) => {
                    return Err(Error::WsConnection(e.to_string()));
                }
            }
        }

        Ok(())
    }

    /// Process one inbound message. Parse failures are logged and
    /// discarded; nothing here can take the connection down.
    async fn handle_message(&self, text: &str) {
        let parsed: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                warn!("Discarding unparseable stream payload: {}", e);
                return;
            }
        };

        let logs: Vec<String> = parsed
            .pointer("/params/result/value/logs")
            .and_then(|v| v.as_array())
            .map(|lines| {
                lines
                    .iter()
                    .filter_map(|l| l.as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        if logs.is_empty() {
            return;
        }

        let Some(mint) = extract_candidate(&logs, &self.limits.banned_keywords) else {
            return;
        };

        // Every detection is journaled, even ones the gates drop
        self.journal.record(
            EventKind::MintDetected,
            &mint,
            None,
            json!({ "logs": logs }),
        );

        match self.engine.gate_candidate(&mint).await {
            Some(DropReason::AlreadyOpen) => {
                debug!("Dropping {}: position already open", mint);
                return;
            }
            Some(DropReason::Banned) => {
                debug!("Dropping {}: banned keyword", mint);
                return;
            }
            Some(DropReason::DailyLimitReached) => {
                debug!("Dropping {}: daily purchase limit reached", mint);
                return;
            }
            None => {}
        }

        // The pre-check outcome is journaled regardless of the verdict
        let eligible = self.wallet_activity_precheck(&mint).await;
        self.journal.record(
            EventKind::BuyAttempt,
            &mint,
            None,
            json!({ "eligible": eligible }),
        );

        if !eligible {
            info!("Candidate {} not eligible by wallet activity", mint);
            return;
        }

        info!("Dispatching buy for {}", mint);
        self.engine.record_buy_dispatch(&mint).await;

        // The buy runs through the slow eligibility probes; detach it so
        // the stream keeps being serviced.
        let executor = Arc::clone(&self.executor);
        tokio::spawn(async move {
            executor.buy(&mint).await;
        });
    }

    /// Wallet-activity pre-check: have any watched wallets touched this
    /// mint recently? Pass-through on devnet and when no wallets are
    /// configured; a probe failure is treated as not eligible.
    async fn wallet_activity_precheck(&self, mint: &str) -> bool {
        if self.bypass_precheck {
            return true;
        }
        if self.limits.watched_wallets.is_empty() {
            return true;
        }

        for wallet in &self.limits.watched_wallets {
            match self
                .helius
                .wallet_transactions(wallet, PRECHECK_TX_LIMIT)
                .await
            {
                Ok(txs) => {
                    let touched = txs
                        .iter()
                        .flat_map(|tx| tx.events.token_transfers.iter())
                        .any(|t| t.mint == mint);
                    if touched {
                        return true;
                    }
                }
                Err(e) => {
                    warn!("Wallet activity probe failed for {}: {}", wallet, e);
                    return false;
                }
            }
        }
        false
    }
}
