/// Persona Arena - Settlement Client
///
/// Records value transfers into and out of persona wallets on the settlement
/// chain. Runs in mock mode when no endpoint is configured, so local
/// development needs no live chain.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{ArenaError, ArenaResult};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Default timeout for settlement RPC calls
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// REQUEST/RESPONSE TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransferDirection {
    /// Into the persona wallet
    Deposit,
    /// Out of the persona wallet to an external address
    Withdrawal { destination: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub receipt_id: String,
}

#[derive(Debug, Serialize)]
struct TransferRequest<'a> {
    wallet_id: &'a str,
    amount: Decimal,
    direction: &'a TransferDirection,
}

#[derive(Debug, Deserialize)]
struct TransferResponse {
    recorded: bool,
    tx_hash: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: Decimal,
}

// ============================================================================
// CAPABILITY
// ============================================================================

#[async_trait]
pub trait SettlementClient: Send + Sync {
    async fn transfer(
        &self,
        wallet_id: &str,
        amount: Decimal,
        direction: TransferDirection,
    ) -> ArenaResult<TransferReceipt>;

    async fn balance(&self, wallet_id: &str) -> ArenaResult<Decimal>;
}

// ============================================================================
// L1 SETTLEMENT CLIENT
// ============================================================================

pub struct L1SettlementClient {
    /// Settlement RPC endpoint URL, `None` in mock mode
    endpoint_url: Option<String>,
    client: Client,
}

impl L1SettlementClient {
    pub fn new(endpoint_url: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        L1SettlementClient {
            endpoint_url: endpoint_url.map(|u| u.trim_end_matches('/').to_string()),
            client,
        }
    }

    pub fn mock() -> Self {
        Self::new(None)
    }

    pub fn is_mock_mode(&self) -> bool {
        self.endpoint_url.is_none()
    }

    /// Log connection status (call on startup)
    pub fn log_status(&self) {
        match &self.endpoint_url {
            None => warn!("settlement: mock mode (SETTLEMENT_RPC_URL not set)"),
            Some(url) => info!(endpoint = %url, "settlement: connected"),
        }
    }

    async fn transfer_remote(
        &self,
        endpoint: &str,
        wallet_id: &str,
        amount: Decimal,
        direction: &TransferDirection,
    ) -> ArenaResult<TransferReceipt> {
        let url = format!("{}/rpc/transfer", endpoint);
        let request = TransferRequest { wallet_id, amount, direction };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ArenaError::SettlementFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ArenaError::SettlementFailed(format!(
                "settlement returned status {}",
                response.status()
            )));
        }

        let result: TransferResponse = response
            .json()
            .await
            .map_err(|e| ArenaError::SettlementFailed(format!("invalid response: {}", e)))?;

        match (result.recorded, result.tx_hash) {
            (true, Some(receipt_id)) => Ok(TransferReceipt { receipt_id }),
            _ => Err(ArenaError::SettlementFailed(
                result.error.unwrap_or_else(|| "transfer not recorded".to_string()),
            )),
        }
    }
}

#[async_trait]
impl SettlementClient for L1SettlementClient {
    async fn transfer(
        &self,
        wallet_id: &str,
        amount: Decimal,
        direction: TransferDirection,
    ) -> ArenaResult<TransferReceipt> {
        if amount <= Decimal::ZERO {
            return Err(ArenaError::invalid_input(format!("transfer amount must be positive, got {}", amount)));
        }

        match &self.endpoint_url {
            None => {
                let prefix = match direction {
                    TransferDirection::Deposit => "mock_deposit",
                    TransferDirection::Withdrawal { .. } => "mock_withdraw",
                };
                Ok(TransferReceipt { receipt_id: format!("{}_{}", prefix, uuid::Uuid::new_v4().simple()) })
            }
            Some(endpoint) => self.transfer_remote(endpoint, wallet_id, amount, &direction).await,
        }
    }

    async fn balance(&self, wallet_id: &str) -> ArenaResult<Decimal> {
        let Some(endpoint) = &self.endpoint_url else {
            // Mock wallets hold nothing on chain; the ledger is the record.
            return Ok(Decimal::ZERO);
        };

        let url = format!("{}/rpc/balance/{}", endpoint, wallet_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ArenaError::SettlementFailed(e.to_string()))?;

        if response.status().as_u16() == 404 {
            return Err(ArenaError::not_found("Wallet", wallet_id));
        }
        if !response.status().is_success() {
            return Err(ArenaError::SettlementFailed(format!(
                "settlement returned status {}",
                response.status()
            )));
        }

        let body: BalanceResponse = response
            .json()
            .await
            .map_err(|e| ArenaError::SettlementFailed(format!("invalid response: {}", e)))?;
        Ok(body.balance)
    }
}
