//! Shared trading state: open positions, the daily purchase counter, and
//! the rate gates that must agree before capital is committed.
//!
//! All check-then-mutate sequences happen under a single write guard so
//! the invariants hold on a multi-threaded runtime too: at most one
//! position per mint, at most `max_open_positions` open at once.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::LimitsConfig;

/// An open position in a token
#[derive(Debug, Clone)]
pub struct Position {
    /// Token mint address
    pub mint: String,
    /// Entry price: quote output/input ratio at buy time
    pub entry_price: f64,
    /// Tokens received at entry, reduced by partial sells
    pub token_amount: u64,
    /// Entry timestamp
    pub entry_time: DateTime<Utc>,
    /// First take-profit tier already fired
    pub tier1_sold: bool,
    /// Second take-profit tier already fired
    pub tier2_sold: bool,
}

impl Position {
    pub fn new(mint: String, entry_price: f64, token_amount: u64) -> Self {
        Self {
            mint,
            entry_price,
            token_amount,
            entry_time: Utc::now(),
            tier1_sold: false,
            tier2_sold: false,
        }
    }
}

/// Take-profit tiers tracked per position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfitTier {
    Tier1,
    Tier2,
}

/// Why a detected candidate was dropped before evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    AlreadyOpen,
    Banned,
    DailyLimitReached,
}

struct EngineState {
    open: HashMap<String, Position>,
    daily_count: u32,
    purchased_today: HashSet<String>,
}

/// Owner of all shared mutable trading state
pub struct TradingEngine {
    state: RwLock<EngineState>,
    limits: LimitsConfig,
}

impl TradingEngine {
    pub fn new(limits: LimitsConfig) -> Self {
        Self {
            state: RwLock::new(EngineState {
                open: HashMap::new(),
                daily_count: 0,
                purchased_today: HashSet::new(),
            }),
            limits,
        }
    }

    /// Pre-dispatch gate, in the order the ingestor applies it:
    /// open position, banned keyword, daily limit. Dropped candidates
    /// are silent (no journal entry) but leave a log trace.
    pub async fn gate_candidate(&self, mint: &str) -> Option<DropReason> {
        let state = self.state.read().await;
        if state.open.contains_key(mint) {
            return Some(DropReason::AlreadyOpen);
        }
        if self.matches_banned(mint) {
            return Some(DropReason::Banned);
        }
        if self.limits.daily_limit > 0 && state.daily_count >= self.limits.daily_limit {
            return Some(DropReason::DailyLimitReached);
        }
        None
    }

    /// Case-insensitive substring match against the banned-keyword list
    pub fn matches_banned(&self, mint: &str) -> bool {
        let lower = mint.to_lowercase();
        self.limits
            .banned_keywords
            .iter()
            .any(|k| !k.is_empty() && lower.contains(&k.to_lowercase()))
    }

    /// True if the open-position cap is reached
    pub async fn at_position_cap(&self) -> bool {
        let state = self.state.read().await;
        state.open.len() >= self.limits.max_open_positions
    }

    /// Mints of all currently open positions
    pub async fn open_mints(&self) -> Vec<String> {
        let state = self.state.read().await;
        state.open.keys().cloned().collect()
    }

    pub async fn is_open(&self, mint: &str) -> bool {
        self.state.read().await.open.contains_key(mint)
    }

    pub async fn open_count(&self) -> usize {
        self.state.read().await.open.len()
    }

    pub async fn get_position(&self, mint: &str) -> Option<Position> {
        self.state.read().await.open.get(mint).cloned()
    }

    /// Record a successful buy: insert the position and mark the mint as
    /// purchased in the current period. The cap and the one-position-per
    /// mint invariant are re-validated under the same write guard that
    /// performs the insert.
    pub async fn open_position(&self, position: Position) -> bool {
        let mut state = self.state.write().await;
        if state.open.len() >= self.limits.max_open_positions
            || state.open.contains_key(&position.mint)
        {
            return false;
        }
        let mint = position.mint.clone();
        state.purchased_today.insert(mint.clone());
        state.open.insert(mint.clone(), position);
        info!("Opened position in {} ({} open)", mint, state.open.len());
        true
    }

    /// True if this mint was already bought in the current period,
    /// whether or not the position is still open
    pub async fn was_purchased(&self, mint: &str) -> bool {
        self.state.read().await.purchased_today.contains(mint)
    }

    /// Count a dispatched buy against the daily limit
    pub async fn record_buy_dispatch(&self, mint: &str) {
        let mut state = self.state.write().await;
        state.daily_count += 1;
        debug!(
            "Buy dispatched for {}, daily counter {}/{}",
            mint, state.daily_count, self.limits.daily_limit
        );
    }

    /// Remove a position from the open set (full exit)
    pub async fn close_position(&self, mint: &str) -> Option<Position> {
        let mut state = self.state.write().await;
        let closed = state.open.remove(mint);
        if closed.is_some() {
            info!("Closed position in {} ({} open)", mint, state.open.len());
        }
        closed
    }

    /// Mark a take-profit tier as fired and reduce the remaining balance
    /// by the sold amount
    pub async fn record_partial_sell(&self, mint: &str, tier: ProfitTier, sold: u64) {
        let mut state = self.state.write().await;
        if let Some(position) = state.open.get_mut(mint) {
            position.token_amount = position.token_amount.saturating_sub(sold);
            match tier {
                ProfitTier::Tier1 => position.tier1_sold = true,
                ProfitTier::Tier2 => position.tier2_sold = true,
            }
        }
    }

    pub async fn daily_count(&self) -> u32 {
        self.state.read().await.daily_count
    }

    /// Reset the daily counter and purchased set. Open positions are not
    /// touched; in-flight operations observe the reset on their next
    /// state access.
    pub async fn reset_daily(&self) {
        let mut state = self.state.write().await;
        state.daily_count = 0;
        state.purchased_today.clear();
        info!("Daily purchase counter reset");
    }

    /// Spawn the periodic reset task (24h by default)
    pub fn spawn_daily_reset(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let period = std::time::Duration::from_secs(self.limits.reset_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick fires immediately; skip it so the first reset
            // happens one full period after startup.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.reset_daily().await;
            }
        })
    }
}
