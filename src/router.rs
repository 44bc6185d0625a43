//! Jupiter quote/swap client
//!
//! Thin wrapper over the routing API: quote a swap, then request an
//! unsigned transaction payload for a chosen route. The route JSON is
//! kept intact (flattened) so it can be posted back verbatim to the
//! swap-build endpoint.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};

/// Default quote API base
pub const JUPITER_API_URL: &str = "https://quote-api.jup.ag/v6";

/// One priced path returned by the quote service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub in_amount: u64,
    pub out_amount: u64,
    #[serde(default)]
    pub market_infos: Vec<MarketInfo>,
    /// Fields we do not interpret but must echo back on swap build
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketInfo {
    #[serde(default)]
    pub liquidity: Option<u64>,
    #[serde(default)]
    pub price_impact_pct: Option<f64>,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

impl Route {
    /// Price as output/input ratio
    pub fn price(&self) -> f64 {
        if self.in_amount == 0 {
            return 0.0;
        }
        self.out_amount as f64 / self.in_amount as f64
    }

    /// Reported liquidity of the first leg, if the route carries it
    pub fn liquidity(&self) -> Option<u64> {
        self.market_infos.first().and_then(|m| m.liquidity)
    }

    /// Reported price-impact fraction of the first leg
    pub fn price_impact(&self) -> Option<f64> {
        self.market_infos.first().and_then(|m| m.price_impact_pct)
    }
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(default)]
    data: Vec<Route>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SwapRequest<'a> {
    route: &'a Route,
    user_public_key: &'a str,
    wrap_and_unwrap_sol: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapResponse {
    swap_transaction: String,
}

/// HTTP client for the quote/swap API
pub struct JupiterClient {
    client: Client,
    base_url: String,
}

impl JupiterClient {
    pub fn new() -> Self {
        Self::with_base_url(JUPITER_API_URL.to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self { client, base_url }
    }

    /// Request a quote. Returns the best route, or None when the service
    /// has no path for this pair.
    pub async fn quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
        slippage_bps: u32,
    ) -> Result<Option<Route>> {
        let url = format!("{}/quote", self.base_url);
        debug!("Quoting {} -> {} amount {}", input_mint, output_mint, amount);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("inputMint", input_mint),
                ("outputMint", output_mint),
                ("amount", &amount.to_string()),
                ("slippageBps", &slippage_bps.to_string()),
            ])
            .send()
            .await
            .map_err(|e| Error::Http(format!("quote request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Http(format!("quote API error {}: {}", status, body)));
        }

        let quote: QuoteResponse = response
            .json()
            .await
            .map_err(|e| Error::Serialization(format!("bad quote response: {}", e)))?;

        Ok(quote.data.into_iter().next())
    }

    /// Request an unsigned swap transaction for a route. Returns the
    /// decoded transaction bytes, to be deserialized and signed locally.
    pub async fn build_swap(&self, route: &Route, user_public_key: &str) -> Result<Vec<u8>> {
        let url = format!("{}/swap", self.base_url);
        let request = SwapRequest {
            route,
            user_public_key,
            wrap_and_unwrap_sol: true,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Http(format!("swap request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Http(format!("swap API error {}: {}", status, body)));
        }

        let swap: SwapResponse = response
            .json()
            .await
            .map_err(|e| Error::Serialization(format!("bad swap response: {}", e)))?;

        use base64::Engine;
        base64::engine::general_purpose::STANDARD
            .decode(&swap.swap_transaction)
            .map_err(|e| Error::Serialization(format!("swap payload not base64: {}", e)))
    }
}

impl Default for JupiterClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route_json() -> &'static str {
        r#"{
            "inAmount": 10000000,
            "outAmount": 25000000,
            "otherAmountThreshold": 24750000,
            "marketInfos": [
                { "label": "Raydium", "liquidity": 7000000000, "priceImpactPct": 0.004 }
            ]
        }"#
    }

    #[test]
    fn test_route_parse_and_metrics() {
        let route: Route = serde_json::from_str(route_json()).unwrap();
        assert_eq!(route.in_amount, 10_000_000);
        assert_eq!(route.out_amount, 25_000_000);
        assert!((route.price() - 2.5).abs() < f64::EPSILON);
        assert_eq!(route.liquidity(), Some(7_000_000_000));
        assert_eq!(route.price_impact(), Some(0.004));
    }

    #[test]
    fn test_route_roundtrip_preserves_unknown_fields() {
        let route: Route = serde_json::from_str(route_json()).unwrap();
        let back = serde_json::to_value(&route).unwrap();
        // Unknown fields survive the round trip to the swap endpoint
        assert_eq!(back["otherAmountThreshold"], 24_750_000);
        assert_eq!(back["marketInfos"][0]["label"], "Raydium");
        assert_eq!(back["inAmount"], 10_000_000);
    }

    #[test]
    fn test_route_without_market_infos() {
        let route: Route =
            serde_json::from_str(r#"{"inAmount": 100, "outAmount": 50}"#).unwrap();
        assert_eq!(route.liquidity(), None);
        assert_eq!(route.price_impact(), None);
        assert!((route.price() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_quote_response_is_no_route() {
        let quote: QuoteResponse = serde_json::from_str(r#"{"data": []}"#).unwrap();
        assert!(quote.data.is_empty());
        let quote: QuoteResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(quote.data.is_empty());
    }
}
