// ============================================================================
// Ledger - per-persona wallet history
// ============================================================================
//
// Append-only record of deposits and withdrawals. Balances are never stored:
// every read folds the full transaction history again.
//
// Deposits are split in two steps so the battle and marketplace engines can
// settle externally first and then fold the deposit into their own atomic
// commit:
//   settle_deposit  → settlement transfer, returns the prepared transaction
//   commit_deposit  → append + revenue increment (Repository)
//
// Withdrawals and ownership changes serialise on the persona's wallet lock.
// The withdrawal commit re-checks owner and balance inside the store, so a
// sale can never land between the owner check and the append.
//
// ============================================================================

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::{error, info, warn};

use crate::error::{ArenaError, ArenaResult};
use crate::models::{EarningType, Persona, TxType, WalletTransaction};
use crate::settlement::{SettlementClient, TransferDirection};
use crate::store::{EntityLocks, Repository};

/// Transactions returned with a wallet view.
pub const WALLET_VIEW_TRANSACTIONS: usize = 50;

/// Default page size of `history`.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

// ============================================================================
// VIEWS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Earnings {
    pub battle: Decimal,
    pub marketplace: Decimal,
    pub chat: Decimal,
    pub tip: Decimal,
    pub total: Decimal,
}

/// Balances derived from a transaction history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSummary {
    pub earnings: Earnings,
    pub total_withdrawn: Decimal,
    /// Deposits minus withdrawals
    pub pending_balance: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletView {
    pub persona_id: String,
    pub wallet_id: String,
    /// `None` when the settlement chain could not be reached
    pub on_chain_balance: Option<Decimal>,
    pub earnings: Earnings,
    pub total_withdrawn: Decimal,
    pub pending_balance: Decimal,
    /// Most recent first
    pub transactions: Vec<WalletTransaction>,
}

pub fn summarize(transactions: &[WalletTransaction]) -> WalletSummary {
    let mut summary = WalletSummary::default();
    for tx in transactions {
        match tx.tx_type {
            TxType::Deposit => {
                let bucket = match tx.earning_type {
                    Some(EarningType::Battle) => &mut summary.earnings.battle,
                    Some(EarningType::Marketplace) => &mut summary.earnings.marketplace,
                    Some(EarningType::Chat) => &mut summary.earnings.chat,
                    Some(EarningType::Tip) => &mut summary.earnings.tip,
                    None => &mut summary.earnings.total,
                };
                *bucket += tx.amount;
                if tx.earning_type.is_some() {
                    summary.earnings.total += tx.amount;
                }
            }
            TxType::Withdrawal => summary.total_withdrawn += tx.amount,
        }
    }
    summary.pending_balance = summary.earnings.total - summary.total_withdrawn;
    summary
}

// ============================================================================
// LEDGER
// ============================================================================

pub struct Ledger {
    repo: Arc<dyn Repository>,
    settlement: Arc<dyn SettlementClient>,
    wallet_locks: EntityLocks,
}

impl Ledger {
    pub fn new(repo: Arc<dyn Repository>, settlement: Arc<dyn SettlementClient>) -> Self {
        Self { repo, settlement, wallet_locks: EntityLocks::new() }
    }

    /// Held across anything that changes who may withdraw from the wallet.
    pub async fn lock_wallet(&self, persona_id: &str) -> OwnedMutexGuard<()> {
        self.wallet_locks.acquire(persona_id).await
    }

    /// Settle a deposit into the persona wallet. Nothing is recorded yet.
    pub async fn settle_deposit(
        &self,
        persona: &Persona,
        amount: Decimal,
        earning_type: EarningType,
        related_battle_id: Option<String>,
    ) -> ArenaResult<WalletTransaction> {
        if amount <= Decimal::ZERO {
            return Err(ArenaError::invalid_input(format!("deposit amount must be positive, got {}", amount)));
        }
        let receipt = self
            .settlement
            .transfer(&persona.wallet_id, amount, TransferDirection::Deposit)
            .await?;
        Ok(WalletTransaction::deposit(
            &persona.id,
            &persona.wallet_id,
            amount,
            earning_type,
            related_battle_id,
            receipt.receipt_id,
        ))
    }

    pub async fn deposit(
        &self,
        persona_id: &str,
        amount: Decimal,
        earning_type: EarningType,
        related_battle_id: Option<String>,
    ) -> ArenaResult<WalletTransaction> {
        let persona = self.repo.get_persona_required(persona_id).await?;
        let tx = self.settle_deposit(&persona, amount, earning_type, related_battle_id).await?;
        self.repo.commit_deposit(tx.clone()).await?;
        info!(
            persona_id = %persona_id,
            amount = %amount,
            category = %earning_type,
            receipt = %tx.receipt_id,
            "deposit recorded"
        );
        Ok(tx)
    }

    pub async fn withdraw(
        &self,
        persona_id: &str,
        amount: Decimal,
        requester_id: &str,
        destination: &str,
    ) -> ArenaResult<WalletTransaction> {
        if amount <= Decimal::ZERO {
            return Err(ArenaError::invalid_input(format!("withdrawal amount must be positive, got {}", amount)));
        }
        if destination.trim().is_empty() {
            return Err(ArenaError::invalid_input("withdrawal destination is required"));
        }

        let _guard = self.lock_wallet(persona_id).await;

        let persona = self.repo.get_persona_required(persona_id).await?;
        if persona.owner_id != requester_id {
            return Err(ArenaError::forbidden(format!(
                "{} does not own persona {}",
                requester_id, persona_id
            )));
        }

        let history = self.repo.transactions_for(persona_id).await?;
        let available = summarize(&history).pending_balance;
        if amount > available {
            return Err(ArenaError::InsufficientBalance { available, requested: amount });
        }

        let receipt = self
            .settlement
            .transfer(
                &persona.wallet_id,
                amount,
                TransferDirection::Withdrawal { destination: destination.to_string() },
            )
            .await?;

        let tx = WalletTransaction::withdrawal(persona_id, &persona.wallet_id, amount, destination, receipt.receipt_id);
        if let Err(e) = self.repo.commit_withdrawal(tx.clone(), requester_id).await {
            error!(
                persona_id = %persona_id,
                receipt = %tx.receipt_id,
                amount = %amount,
                error = %e,
                "withdrawal settled but commit failed; needs reconciliation"
            );
            return Err(e);
        }
        info!(
            persona_id = %persona_id,
            amount = %amount,
            destination = %destination,
            receipt = %tx.receipt_id,
            "withdrawal recorded"
        );
        Ok(tx)
    }

    pub async fn get_wallet(&self, persona_id: &str) -> ArenaResult<WalletView> {
        let persona = self.repo.get_persona_required(persona_id).await?;
        let history = self.repo.transactions_for(persona_id).await?;
        let summary = summarize(&history);

        let on_chain_balance = match self.settlement.balance(&persona.wallet_id).await {
            Ok(balance) => Some(balance),
            Err(e) => {
                warn!(persona_id = %persona_id, error = %e, "on-chain balance unavailable");
                None
            }
        };

        let transactions = history.into_iter().rev().take(WALLET_VIEW_TRANSACTIONS).collect();
        Ok(WalletView {
            persona_id: persona.id,
            wallet_id: persona.wallet_id,
            on_chain_balance,
            earnings: summary.earnings,
            total_withdrawn: summary.total_withdrawn,
            pending_balance: summary.pending_balance,
            transactions,
        })
    }

    /// Newest first.
    pub async fn history(&self, persona_id: &str, limit: Option<usize>) -> ArenaResult<Vec<WalletTransaction>> {
        self.repo.get_persona_required(persona_id).await?;
        let history = self.repo.transactions_for(persona_id).await?;
        Ok(history
            .into_iter()
            .rev()
            .take(limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
            .collect())
    }
}
