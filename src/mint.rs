//! Seam to the NFT signer. The chain SDK itself lives in a separate signer
//! service; this side only submits a mint request over HTTP and records the
//! receipt it gets back.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;

#[derive(Debug, Serialize)]
pub struct MintSubmission {
    pub product_id: Uuid,
    pub order_id: Option<Uuid>,
    pub contract_address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MintReceipt {
    pub token_id: i64,
    pub tx_hash: String,
    pub mint_address: String,
}

pub struct MintSubmitter {
    client: reqwest::Client,
    endpoint: Option<String>,
    contract_address: Option<String>,
}

impl MintSubmitter {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.mint_signer_url.clone(),
            contract_address: config.mint_contract_address.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Submit one mint request. Single attempt, no retry; the caller decides
    /// whether a failure is fatal or just logged.
    pub async fn submit(
        &self,
        product_id: Uuid,
        order_id: Option<Uuid>,
    ) -> anyhow::Result<MintReceipt> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("mint signer is not configured"))?;

        let submission = MintSubmission {
            product_id,
            order_id,
            contract_address: self.contract_address.clone(),
        };

        let response = self
            .client
            .post(endpoint)
            .json(&submission)
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("mint signer returned status {}", response.status());
        }

        let receipt: MintReceipt = response.json().await?;
        Ok(receipt)
    }
}

/// 0x-prefixed 40-hex-digit account or contract address.
pub fn is_valid_address(value: &str) -> bool {
    let Some(hex) = value.strip_prefix("0x") else {
        return false;
    };
    hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit())
}

/// 0x-prefixed 64-hex-digit transaction hash.
pub fn is_valid_tx_hash(value: &str) -> bool {
    let Some(hex) = value.strip_prefix("0x") else {
        return false;
    };
    hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_format() {
        assert!(is_valid_address(&format!("0x{}", "ab".repeat(20))));
        assert!(!is_valid_address(&"ab".repeat(21)));
        assert!(!is_valid_address("0x123"));
        assert!(!is_valid_address(&format!("0x{}", "zz".repeat(20))));
    }

    #[test]
    fn tx_hash_format() {
        assert!(is_valid_tx_hash(&format!("0x{}", "1f".repeat(32))));
        assert!(!is_valid_tx_hash(&format!("0x{}", "1f".repeat(20))));
        assert!(!is_valid_tx_hash(""));
    }

    #[test]
    fn unconfigured_submitter_refuses() {
        let config = AppConfig {
            database_url: "postgres://unused".into(),
            host: "127.0.0.1".into(),
            port: 0,
            jwt_secret: "secret".into(),
            jwt_ttl_hours: 24,
            shipping_fee_cents: 0,
            free_shipping_min_cents: 0,
            mint_signer_url: None,
            mint_contract_address: None,
        };
        let submitter = MintSubmitter::from_config(&config);
        assert!(!submitter.is_configured());
    }
}
