//! Signing-key loading
//!
//! The key is read from the PRIVATE_KEY environment variable, either a
//! JSON byte array (the wallet-export format) or a base58 string.

use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use tracing::info;

use crate::error::{Error, Result};

/// Load the signing keypair from PRIVATE_KEY
pub fn load_keypair() -> Result<Keypair> {
    let raw = std::env::var("PRIVATE_KEY")
        .map_err(|_| Error::MissingEnvVar("PRIVATE_KEY".to_string()))?;

    let bytes: Vec<u8> = if raw.trim_start().starts_with('[') {
        serde_json::from_str(&raw)
            .map_err(|e| Error::InvalidKeypair(format!("not a byte array: {}", e)))?
    } else {
        bs58::decode(raw.trim())
            .into_vec()
            .map_err(|e| Error::InvalidKeypair(format!("not base58: {}", e)))?
    };

    if bytes.len() != 64 {
        return Err(Error::InvalidKeypair(format!(
            "expected 64 bytes of key material, got {}",
            bytes.len()
        )));
    }

    let keypair = Keypair::from_bytes(&bytes)
        .map_err(|e| Error::InvalidKeypair(e.to_string()))?;
    info!("Loaded signing key: {}", keypair.pubkey());
    Ok(keypair)
}
