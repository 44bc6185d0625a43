//! Staged eligibility evaluation
//!
//! Five checks run in order, short-circuiting on the first failure:
//! buyer momentum, holder concentration, route existence, liquidity
//! floor, price-impact ceiling. Probe calls are never retried - a single
//! network failure in the momentum or concentration stage rejects the
//! candidate (fail-closed). On devnet the whole evaluation is bypassed.

use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::{EligibilityConfig, WSOL_MINT};
use crate::indexer::{HeliusClient, TokenHolder};
use crate::router::JupiterClient;

/// Why a candidate was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    MaxOpenTrades,
    AlreadyPurchased,
    BuyerGrowthInsufficient,
    OwnershipConcentrated,
    NoRoute,
    LiquidityLow,
    SpreadHigh,
    ProbeFailed,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::MaxOpenTrades => "max open trades reached",
            RejectReason::AlreadyPurchased => "already purchased",
            RejectReason::BuyerGrowthInsufficient => "buyers not doubled in sampling window",
            RejectReason::OwnershipConcentrated => "ownership too concentrated",
            RejectReason::NoRoute => "no route",
            RejectReason::LiquidityLow => "liquidity too low",
            RejectReason::SpreadHigh => "spread too high",
            RejectReason::ProbeFailed => "eligibility probe failed",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Admit/reject verdict with a structured reason for the journal
#[derive(Debug, Clone)]
pub struct Verdict {
    pub admit: bool,
    pub reason: Option<RejectReason>,
    pub detail: Value,
}

impl Verdict {
    pub fn admit() -> Self {
        Self {
            admit: true,
            reason: None,
            detail: Value::Null,
        }
    }

    pub fn reject(reason: RejectReason, detail: Value) -> Self {
        Self {
            admit: false,
            reason: Some(reason),
            detail,
        }
    }
}

/// Momentum rule: the buyer count must show a doubling trend within the
/// sampling window, not just a high floor.
pub fn momentum_admits(samples: &[u32], min_buyers: u32, growth_factor: f64) -> bool {
    let Some(&max) = samples.iter().max() else {
        return false;
    };
    let min = *samples.iter().min().unwrap_or(&0);
    max >= min_buyers && (max as f64) >= (min as f64) * growth_factor
}

/// Concentration rule: reject only when the top holder's share strictly
/// exceeds the cap. Exactly at the cap admits. An empty holder list
/// admits (nothing to concentrate).
pub fn concentration_ok(holders: &[TokenHolder], max_share: f64) -> bool {
    let Some(top) = holders.first() else {
        return true;
    };
    let total: f64 = holders.iter().map(|h| h.amount).sum();
    if total <= 0.0 {
        return true;
    }
    top.amount / total <= max_share
}

/// Staged eligibility evaluator
pub struct EligibilityEvaluator {
    helius: Arc<HeliusClient>,
    jupiter: Arc<JupiterClient>,
    config: EligibilityConfig,
    /// Devnet bypass: always admit without probing
    bypass: bool,
}

impl EligibilityEvaluator {
    pub fn new(
        helius: Arc<HeliusClient>,
        jupiter: Arc<JupiterClient>,
        config: EligibilityConfig,
        bypass: bool,
    ) -> Self {
        Self {
            helius,
            jupiter,
            config,
            bypass,
        }
    }

    /// Run all stages against a candidate mint.
    ///
    /// `buy_amount` and `slippage_bps` are the executor's parameters; the
    /// route stages quote the same trade the executor would place.
    pub async fn evaluate(&self, mint: &str, buy_amount: u64, slippage_bps: u32) -> Verdict {
        if self.bypass {
            debug!("Eligibility bypassed for {} (devnet)", mint);
            return Verdict::admit();
        }

        // Stage 1: buyer momentum over the sampling window
        let samples = match self.sample_buyers(mint).await {
            Ok(s) => s,
            Err(e) => {
                warn!("Buyer probe failed for {}: {}", mint, e);
                return Verdict::reject(
                    RejectReason::ProbeFailed,
                    json!({ "stage": "buyers", "error": e.to_string() }),
                );
            }
        };
        if !momentum_admits(&samples, self.config.min_buyers, self.config.buyer_growth_factor) {
            info!("Rejecting {}: buyer growth insufficient {:?}", mint, samples);
            return Verdict::reject(
                RejectReason::BuyerGrowthInsufficient,
                json!({ "buyers": samples }),
            );
        }

        // Stage 2: holder concentration
        let holders = match self
            .helius
            .token_holders(mint, self.config.holder_limit)
            .await
        {
            Ok(h) => h,
            Err(e) => {
                warn!("Holder probe failed for {}: {}", mint, e);
                return Verdict::reject(
                    RejectReason::ProbeFailed,
                    json!({ "stage": "holders", "error": e.to_string() }),
                );
            }
        };
        if !concentration_ok(&holders, self.config.max_top_holder_share) {
            let top = holders.first().map(|h| h.amount).unwrap_or(0.0);
            info!("Rejecting {}: ownership too concentrated", mint);
            return Verdict::reject(
                RejectReason::OwnershipConcentrated,
                json!({ "topHolderAmount": top }),
            );
        }

        // Stages 3-5: route, liquidity, spread from one quote
        let route = match self
            .jupiter
            .quote(WSOL_MINT, mint, buy_amount, slippage_bps)
            .await
        {
            Ok(Some(route)) => route,
            Ok(None) => {
                info!("Rejecting {}: no route", mint);
                return Verdict::reject(RejectReason::NoRoute, Value::Null);
            }
            Err(e) => {
                warn!("Quote probe failed for {}: {}", mint, e);
                return Verdict::reject(
                    RejectReason::ProbeFailed,
                    json!({ "stage": "quote", "error": e.to_string() }),
                );
            }
        };

        if let Some(liquidity) = route.liquidity() {
            if liquidity < self.config.min_liquidity_lamports {
                info!("Rejecting {}: liquidity {} too low", mint, liquidity);
                return Verdict::reject(
                    RejectReason::LiquidityLow,
                    json!({ "liquidity": liquidity }),
                );
            }
        }

        if let Some(impact) = route.price_impact() {
            if impact > self.config.max_price_impact {
                info!("Rejecting {}: price impact {} too high", mint, impact);
                return Verdict::reject(RejectReason::SpreadHigh, json!({ "spread": impact }));
            }
        }

        Verdict::admit()
    }

    /// Sample the distinct-buyer count N times, a fixed interval apart
    async fn sample_buyers(&self, mint: &str) -> crate::error::Result<Vec<u32>> {
        let mut samples = Vec::with_capacity(self.config.buyer_samples as usize);
        for i in 0..self.config.buyer_samples {
            if i > 0 {
                sleep(Duration::from_secs(self.config.sample_interval_secs)).await;
            }
            let count = self
                .helius
                .distinct_buyers(mint, self.config.transfer_limit)
                .await?;
            samples.push(count);
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holder(owner: &str, amount: f64) -> TokenHolder {
        TokenHolder {
            owner: owner.to_string(),
            amount,
        }
    }

    #[test]
    fn test_momentum_rejects_high_floor_without_growth() {
        // Max 8 < 10 and 8 < 2*4 anyway
        assert!(!momentum_admits(&[4, 5, 6, 7, 8], 10, 2.0));
        // High floor, no doubling: max 20 >= 10 but 20 < 2*15
        assert!(!momentum_admits(&[15, 16, 17, 18, 20], 10, 2.0));
    }

    #[test]
    fn test_momentum_admits_doubling_trend() {
        assert!(momentum_admits(&[5, 6, 8, 12, 20], 10, 2.0));
    }

    #[test]
    fn test_momentum_edge_cases() {
        assert!(!momentum_admits(&[], 10, 2.0));
        // All zero: max 0 < 10
        assert!(!momentum_admits(&[0, 0, 0, 0, 0], 10, 2.0));
        // Min zero with a real max: 0*2 = 0 <= max, admits on growth
        assert!(momentum_admits(&[0, 2, 5, 8, 11], 10, 2.0));
    }

    #[test]
    fn test_concentration_boundary_admits() {
        // Top holder exactly 40% of 100 total
        let holders = vec![holder("a", 40.0), holder("b", 35.0), holder("c", 25.0)];
        assert!(concentration_ok(&holders, 0.4));
    }

    #[test]
    fn test_concentration_above_cap_rejects() {
        let holders = vec![holder("a", 41.0), holder("b", 59.0)];
        // First holder is the top per API ordering; 41/100 > 0.4
        assert!(!concentration_ok(&holders, 0.4));
    }

    #[test]
    fn test_concentration_empty_admits() {
        assert!(concentration_ok(&[], 0.4));
    }

    #[test]
    fn test_reject_reason_serializes_kebab_case() {
        let v = serde_json::to_value(RejectReason::BuyerGrowthInsufficient).unwrap();
        assert_eq!(v, "buyer-growth-insufficient");
        let v = serde_json::to_value(RejectReason::MaxOpenTrades).unwrap();
        assert_eq!(v, "max-open-trades");
    }
}
