use super::PayService;
use crate::core::constants::{
    CREDIT_PREFIX, DEBIT_PREFIX, MAX_DESCRIPTION_LENGTH, REFERENCE_ATTEMPTS, WALLET_CREDITED,
    WALLET_DEBITED, WITHDRAWAL_COMPLETED, WITHDRAWAL_PREFIX, WITHDRAWAL_REVERSAL_PREFIX,
    WITHDRAWAL_REVERSED,
};
use crate::core::errors::PayError;
use crate::core::ids;
use crate::core::models::merchant::BankAccount;
use crate::core::models::user::User;
use crate::core::models::wallet::{
    Direction, LedgerReceipt, Wallet, WalletIntegrity, WalletPosting, WalletTransaction,
};
use crate::core::money;
use crate::core::permissions::{self, Permission};
use crate::infrastructure::gateway::{GatewayClient, TransferRequest};
use crate::infrastructure::logging::LoggingService;
use crate::infrastructure::notifier::Notifier;
use crate::infrastructure::storage::Storage;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct Withdrawal {
    pub reference: String,
    pub transfer_reference: String,
    pub amount: Decimal,
    pub currency: String,
    pub new_balance: Decimal,
}

/// Balance movement requested by a caller, before a reference is settled on.
pub(super) struct EntryRequest<'a> {
    pub user_id: &'a str,
    pub direction: Direction,
    pub amount: Decimal,
    pub currency: Option<&'a str>,
    pub description: &'a str,
    pub transaction_id: Option<&'a str>,
    pub reference: Option<&'a str>,
    pub prefix: &'a str,
}

impl<S: Storage, G: GatewayClient, N: Notifier, L: LoggingService> PayService<S, G, N, L> {
    pub async fn credit(
        &self,
        user_id: &str,
        amount: Decimal,
        currency: Option<&str>,
        description: &str,
        transaction_id: Option<&str>,
        reference: Option<&str>,
    ) -> Result<LedgerReceipt, PayError> {
        self.post_entry(EntryRequest {
            user_id,
            direction: Direction::Credit,
            amount,
            currency,
            description,
            transaction_id,
            reference,
            prefix: CREDIT_PREFIX,
        })
        .await
    }

    pub async fn debit(
        &self,
        user_id: &str,
        amount: Decimal,
        currency: Option<&str>,
        description: &str,
        transaction_id: Option<&str>,
        reference: Option<&str>,
    ) -> Result<LedgerReceipt, PayError> {
        self.post_entry(EntryRequest {
            user_id,
            direction: Direction::Debit,
            amount,
            currency,
            description,
            transaction_id,
            reference,
            prefix: DEBIT_PREFIX,
        })
        .await
    }

    /// Writes one ledger movement. A generated reference that collides is replaced and retried;
    /// a caller-supplied one is not.
    pub(super) async fn post_entry(&self, entry: EntryRequest<'_>) -> Result<LedgerReceipt, PayError> {
        money::ensure_positive("amount", entry.amount)?;
        self.validate_string_input("description", entry.description, MAX_DESCRIPTION_LENGTH)?;
        let currency = entry
            .currency
            .map(|c| self.validate_currency(c))
            .transpose()?;

        let attempts = if entry.reference.is_some() { 1 } else { REFERENCE_ATTEMPTS };
        let mut last_err = PayError::InternalServerError("no ledger attempt made".into());
        for _ in 0..attempts {
            let reference = entry
                .reference
                .map(String::from)
                .unwrap_or_else(|| ids::reference(entry.prefix));
            let posting = WalletPosting {
                user_id: entry.user_id.to_string(),
                direction: entry.direction,
                amount: entry.amount,
                currency: currency.clone(),
                description: entry.description.to_string(),
                transaction_id: entry.transaction_id.map(String::from),
                reference,
            };
            match self.storage.post_wallet_entry(posting, self.clock.now()).await {
                Ok(receipt) => {
                    let action = match entry.direction {
                        Direction::Credit => WALLET_CREDITED,
                        Direction::Debit => WALLET_DEBITED,
                    };
                    self.log_and_audit(
                        action,
                        json!({
                            "reference": receipt.entry.reference,
                            "amount": receipt.entry.amount.to_string(),
                            "currency": receipt.entry.currency,
                            "balance_after": receipt.entry.balance_after.to_string(),
                        }),
                        Some(entry.user_id),
                    )
                    .await?;
                    return Ok(receipt);
                }
                Err(PayError::Conflict(msg)) if entry.reference.is_none() => {
                    tracing::warn!(user_id = entry.user_id, "wallet reference collision, regenerating");
                    last_err = PayError::Conflict(msg);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err)
    }

    pub async fn get_wallet(&self, user_id: &str) -> Result<Wallet, PayError> {
        self.storage
            .get_wallet(user_id)
            .await?
            .ok_or_else(|| PayError::WalletNotFound(user_id.to_string()))
    }

    /// Ledger entries, newest first.
    pub async fn wallet_history(&self, user_id: &str) -> Result<Vec<WalletTransaction>, PayError> {
        let mut entries = self.storage.get_wallet_entries(user_id).await?;
        entries.reverse();
        Ok(entries)
    }

    pub async fn verify_wallet_integrity(&self, user_id: &str) -> Result<WalletIntegrity, PayError> {
        let wallet = self.get_wallet(user_id).await?;
        let entries = self.storage.get_wallet_entries(user_id).await?;
        let ledger_total: Decimal = entries.iter().map(WalletTransaction::signed_amount).sum();
        let consistent = ledger_total == wallet.balance;
        if !consistent {
            tracing::error!(
                user_id,
                balance = %wallet.balance,
                ledger_total = %ledger_total,
                "wallet balance drifted from its ledger"
            );
        }
        Ok(WalletIntegrity {
            user_id: user_id.to_string(),
            balance: wallet.balance,
            ledger_total,
            entries: entries.len(),
            consistent,
        })
    }

    /// Debits the wallet, then asks the gateway to pay out. A failed payout is reversed with
    /// a compensating credit.
    pub async fn withdraw(
        &self,
        actor: &User,
        amount: Decimal,
        bank_account: BankAccount,
    ) -> Result<Withdrawal, PayError> {
        permissions::require(actor, Permission::ManageWallet)?;
        money::ensure_positive("amount", amount)?;
        let token = ids::hex_token().to_uppercase();
        let reference = format!("{}{}", WITHDRAWAL_PREFIX, token);

        let receipt = self
            .post_entry(EntryRequest {
                user_id: &actor.id,
                direction: Direction::Debit,
                amount,
                currency: None,
                description: "Withdrawal to bank account",
                transaction_id: None,
                reference: Some(&reference),
                prefix: WITHDRAWAL_PREFIX,
            })
            .await?;

        let transfer = self
            .gateway
            .initiate_transfer(TransferRequest {
                reference: reference.clone(),
                amount,
                currency: receipt.wallet.currency.clone(),
                bank_account,
                reason: "Wallet withdrawal".to_string(),
            })
            .await;

        match transfer {
            Ok(transfer_reference) => {
                self.log_and_audit(
                    WITHDRAWAL_COMPLETED,
                    json!({
                        "reference": reference,
                        "transfer_reference": transfer_reference,
                        "amount": amount.to_string(),
                    }),
                    Some(&actor.id),
                )
                .await?;
                Ok(Withdrawal {
                    reference,
                    transfer_reference,
                    amount,
                    currency: receipt.wallet.currency,
                    new_balance: receipt.wallet.balance,
                })
            }
            Err(e) => {
                tracing::warn!(user_id = %actor.id, %reference, error = %e, "transfer failed, reversing withdrawal");
                let reversal = format!("{}{}", WITHDRAWAL_REVERSAL_PREFIX, token);
                self.post_entry(EntryRequest {
                    user_id: &actor.id,
                    direction: Direction::Credit,
                    amount,
                    currency: None,
                    description: "Withdrawal reversal",
                    transaction_id: None,
                    reference: Some(&reversal),
                    prefix: WITHDRAWAL_REVERSAL_PREFIX,
                })
                .await?;
                self.log_and_audit(
                    WITHDRAWAL_REVERSED,
                    json!({ "reference": reference, "reversal": reversal, "error": e.to_string() }),
                    Some(&actor.id),
                )
                .await?;
                Err(PayError::Gateway(format!("withdrawal {} failed: {}", reference, e)))
            }
        }
    }
}
