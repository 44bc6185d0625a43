//! Helius API client for indexed on-chain data
//!
//! Supplies the probes the eligibility filter and the position monitor
//! depend on: recent token transfers (distinct-buyer counts), top holder
//! lists, and decoded wallet transaction history.

use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};

/// REST API base
const HELIUS_REST_URL: &str = "https://api.helius.xyz";

/// One holder entry, ordered by balance by the API
#[derive(Debug, Clone, Deserialize)]
pub struct TokenHolder {
    pub owner: String,
    pub amount: f64,
}

/// One token transfer record
#[derive(Debug, Clone, Deserialize)]
pub struct TokenTransferRecord {
    #[serde(rename = "type", default)]
    pub transfer_type: String,
    #[serde(default)]
    pub destination: Option<String>,
}

/// A decoded token transfer inside a wallet transaction
#[derive(Debug, Clone, Deserialize)]
pub struct WalletTokenTransfer {
    #[serde(default)]
    pub mint: String,
    #[serde(rename = "tokenAmount", default)]
    pub token_amount: f64,
}

/// A wallet transaction with its decoded token-transfer events
#[derive(Debug, Clone, Deserialize)]
pub struct WalletTransaction {
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub events: WalletTransactionEvents,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalletTransactionEvents {
    #[serde(rename = "tokenTransfers", default)]
    pub token_transfers: Vec<WalletTokenTransfer>,
}

#[derive(Debug, Deserialize)]
struct HoldersResponse {
    #[serde(default)]
    holders: Vec<TokenHolder>,
}

#[derive(Debug, Deserialize)]
struct TransfersResponse {
    #[serde(default)]
    transfers: Vec<TokenTransferRecord>,
}

/// Count distinct transfer destinations - the "distinct recent buyers"
/// signal the momentum check samples.
pub fn count_distinct_buyers(transfers: &[TokenTransferRecord]) -> u32 {
    let buyers: HashSet<&str> = transfers
        .iter()
        .filter(|t| t.transfer_type == "transfer")
        .filter_map(|t| t.destination.as_deref())
        .collect();
    buyers.len() as u32
}

/// Helius REST client
pub struct HeliusClient {
    client: Client,
    api_key: String,
    rest_base_url: String,
}

impl HeliusClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, HELIUS_REST_URL.to_string())
    }

    pub fn with_base_url(api_key: String, rest_base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            api_key,
            rest_base_url,
        }
    }

    /// Distinct recent buyers of a mint, from its latest transfers
    pub async fn distinct_buyers(&self, mint: &str, limit: u32) -> Result<u32> {
        let url = format!(
            "{}/v0/token/{}/transfers?api-key={}&limit={}",
            self.rest_base_url, mint, self.api_key, limit
        );
        debug!("Fetching transfers for {}", mint);

        let response: TransfersResponse = self.get_json(&url).await?;
        Ok(count_distinct_buyers(&response.transfers))
    }

    /// Top holders of a mint, ordered by balance
    pub async fn token_holders(&self, mint: &str, limit: u32) -> Result<Vec<TokenHolder>> {
        let url = format!(
            "{}/v0/token/{}/holders?api-key={}&limit={}",
            self.rest_base_url, mint, self.api_key, limit
        );
        debug!("Fetching holders for {}", mint);

        let response: HoldersResponse = self.get_json(&url).await?;
        Ok(response.holders)
    }

    /// Recent transactions of a wallet with decoded token transfers
    pub async fn wallet_transactions(
        &self,
        address: &str,
        limit: u32,
    ) -> Result<Vec<WalletTransaction>> {
        let url = format!(
            "{}/v0/addresses/{}/transactions?api-key={}&limit={}",
            self.rest_base_url, address, self.api_key, limit
        );
        debug!("Fetching transactions for {}", address);

        self.get_json(&url).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http(format!("Helius request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Http(format!("Helius API error {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Serialization(format!("bad Helius response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(kind: &str, dest: Option<&str>) -> TokenTransferRecord {
        TokenTransferRecord {
            transfer_type: kind.to_string(),
            destination: dest.map(|s| s.to_string()),
        }
    }

    #[test]
    fn test_count_distinct_buyers() {
        let transfers = vec![
            transfer("transfer", Some("walletA")),
            transfer("transfer", Some("walletB")),
            transfer("transfer", Some("walletA")), // duplicate
            transfer("mint", Some("walletC")),     // wrong type
            transfer("transfer", None),            // no destination
        ];
        assert_eq!(count_distinct_buyers(&transfers), 2);
    }

    #[test]
    fn test_count_distinct_buyers_empty() {
        assert_eq!(count_distinct_buyers(&[]), 0);
    }

    #[test]
    fn test_wallet_transaction_parse() {
        let json = r#"[
            {
                "signature": "sig1",
                "events": {
                    "tokenTransfers": [
                        { "mint": "MintX", "tokenAmount": 6000000.0 }
                    ]
                }
            },
            { "signature": "sig2" }
        ]"#;
        let txs: Vec<WalletTransaction> = serde_json::from_str(json).unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].events.token_transfers[0].mint, "MintX");
        assert!(txs[1].events.token_transfers.is_empty());
    }

    #[test]
    fn test_holders_parse() {
        let json = r#"{ "holders": [ { "owner": "w1", "amount": 100.0 }, { "owner": "w2", "amount": 50.0 } ] }"#;
        let response: HoldersResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.holders.len(), 2);
        assert_eq!(response.holders[0].owner, "w1");
    }
}
