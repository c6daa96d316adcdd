use super::PayService;
use super::ledger::EntryRequest;
use crate::core::clock::next_business_day;
use crate::core::constants::{
    MAX_DESCRIPTION_LENGTH, REFERENCE_ATTEMPTS, SETTLEMENT_APPROVED, SETTLEMENT_COMPLETED,
    SETTLEMENT_FAILED, SETTLEMENT_PREFIX, SETTLEMENT_REJECTED, SETTLEMENT_RELEASE_PREFIX,
    SETTLEMENT_REQUESTED,
};
use crate::core::errors::PayError;
use crate::core::ids;
use crate::core::models::merchant::Merchant;
use crate::core::models::settlement::{Settlement, SettlementStatus, SettlementType};
use crate::core::models::user::{Role, User};
use crate::core::models::wallet::Direction;
use crate::core::money;
use crate::core::permissions::{self, Permission};
use crate::infrastructure::gateway::GatewayClient;
use crate::infrastructure::logging::LoggingService;
use crate::infrastructure::notifier::Notifier;
use crate::infrastructure::storage::Storage;
use chrono::{DateTime, Datelike, Utc, Weekday};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct SettlementBalance {
    pub merchant_id: String,
    /// Gross of every completed payment credited to the merchant.
    pub collected: Decimal,
    /// Amount claimed by settlements that have not failed.
    pub held: Decimal,
    /// Current balance of the owner's wallet; withdrawals and refunds lower it.
    pub wallet_balance: Decimal,
    /// Collected minus held, never more than the wallet balance.
    pub available: Decimal,
    pub transaction_count: usize,
    pub earliest_payment_at: Option<DateTime<Utc>>,
}

fn estimated_completion(kind: SettlementType, now: DateTime<Utc>) -> DateTime<Utc> {
    match kind {
        SettlementType::SameDay if !matches!(now.weekday(), Weekday::Sat | Weekday::Sun) => now,
        _ => next_business_day(now),
    }
}

impl<S: Storage, G: GatewayClient, N: Notifier, L: LoggingService> PayService<S, G, N, L> {
    /// Derived from the store on every call.
    pub async fn compute_available_balance(&self, merchant_id: &str) -> Result<SettlementBalance, PayError> {
        let merchant = self.get_merchant(merchant_id).await?;
        self.balance_for(&merchant).await
    }

    async fn balance_for(&self, merchant: &Merchant) -> Result<SettlementBalance, PayError> {
        let transactions = self.storage.completed_transactions_for(&merchant.user_id).await?;
        let settlements = self.storage.list_settlements(&merchant.id).await?;
        let collected: Decimal = transactions.iter().map(|tx| tx.gross()).sum();
        let held: Decimal = settlements
            .iter()
            .filter(|s| s.holds_funds())
            .map(|s| s.amount)
            .sum();
        let wallet_balance = self
            .storage
            .get_wallet(&merchant.user_id)
            .await?
            .map(|w| w.balance)
            .unwrap_or(Decimal::ZERO);
        Ok(SettlementBalance {
            merchant_id: merchant.id.clone(),
            collected,
            held,
            wallet_balance,
            available: (collected - held).min(wallet_balance).max(Decimal::ZERO),
            transaction_count: transactions.len(),
            earliest_payment_at: transactions.iter().map(|tx| tx.created_at).min(),
        })
    }

    async fn settlement_merchant(&self, actor: &User, merchant_id: &str) -> Result<Merchant, PayError> {
        permissions::require(actor, Permission::RequestSettlement)?;
        let merchant = self.get_merchant(merchant_id).await?;
        if actor.role != Role::Admin && merchant.user_id != actor.id {
            return Err(PayError::Forbidden(
                actor.id.clone(),
                format!("settle for merchant {}", merchant_id),
            ));
        }
        Ok(merchant)
    }

    pub async fn request_settlement(
        &self,
        actor: &User,
        merchant_id: &str,
        amount: Decimal,
        description: Option<String>,
        settlement_type: Option<SettlementType>,
    ) -> Result<Settlement, PayError> {
        let _guard = self.settlement_locks.lock(merchant_id).await;
        let merchant = self.settlement_merchant(actor, merchant_id).await?;

        if !merchant.is_kyc_approved() {
            return Err(PayError::KycNotApproved(merchant.id));
        }
        money::ensure_positive("amount", amount)?;
        let bank_account = merchant
            .bank_account
            .clone()
            .ok_or_else(|| PayError::MissingBankAccount(merchant.id.clone()))?;
        if let Some(text) = &description {
            self.validate_string_input("description", text, MAX_DESCRIPTION_LENGTH)?;
        }
        let balance = self.balance_for(&merchant).await?;
        if amount > balance.available {
            return Err(PayError::InsufficientBalance {
                available: balance.available,
                requested: amount,
            });
        }

        let fee = money::fee_for(amount, merchant.settlement_fee_rate);
        let settlement_type = settlement_type.unwrap_or(merchant.settlement_type);
        let now = self.clock.now();

        let mut last_err = PayError::InternalServerError("no insert attempt made".into());
        for _ in 0..REFERENCE_ATTEMPTS {
            let settlement = Settlement {
                id: ids::new_id(),
                merchant_id: merchant.id.clone(),
                amount,
                fee,
                net_amount: amount - fee,
                status: SettlementStatus::Pending,
                bank_account: bank_account.clone(),
                reference: ids::reference(SETTLEMENT_PREFIX),
                transaction_count: balance.transaction_count,
                settlement_type,
                description: description.clone(),
                period_start: balance.earliest_payment_at.unwrap_or(now),
                period_end: now,
                failure_reason: None,
                estimated_completion: estimated_completion(settlement_type, now),
                created_at: now,
                updated_at: now,
                processed_at: None,
            };
            match self.hold_settlement_funds(&merchant, &settlement).await {
                Ok(()) => {}
                Err(e @ PayError::Conflict(_)) => {
                    last_err = e;
                    continue;
                }
                Err(e) => return Err(e),
            }
            match self.storage.insert_settlement(settlement.clone()).await {
                Ok(()) => {
                    self.log_and_audit(
                        SETTLEMENT_REQUESTED,
                        json!({
                            "settlement_id": settlement.id,
                            "merchant_id": merchant.id,
                            "reference": settlement.reference,
                            "amount": amount.to_string(),
                            "fee": fee.to_string(),
                            "net_amount": settlement.net_amount.to_string(),
                        }),
                        Some(&actor.id),
                    )
                    .await?;
                    tracing::info!(
                        merchant_id = %merchant.id,
                        reference = %settlement.reference,
                        amount = %amount,
                        "settlement requested"
                    );
                    return Ok(settlement);
                }
                Err(e) => {
                    self.release_settlement_funds(&merchant.user_id, &settlement).await?;
                    if !matches!(e, PayError::Conflict(_)) {
                        return Err(e);
                    }
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    /// Moves the settlement amount out of the owner's wallet under the settlement reference.
    async fn hold_settlement_funds(&self, merchant: &Merchant, settlement: &Settlement) -> Result<(), PayError> {
        self.post_entry(EntryRequest {
            user_id: &merchant.user_id,
            direction: Direction::Debit,
            amount: settlement.amount,
            currency: None,
            description: "Settlement hold",
            transaction_id: None,
            reference: Some(&settlement.reference),
            prefix: SETTLEMENT_PREFIX,
        })
        .await
        .map(|_| ())
    }

    async fn release_settlement_funds(&self, user_id: &str, settlement: &Settlement) -> Result<(), PayError> {
        let reference = format!(
            "{}{}",
            SETTLEMENT_RELEASE_PREFIX,
            settlement.reference.trim_start_matches(SETTLEMENT_PREFIX)
        );
        self.post_entry(EntryRequest {
            user_id,
            direction: Direction::Credit,
            amount: settlement.amount,
            currency: None,
            description: "Settlement released",
            transaction_id: None,
            reference: Some(&reference),
            prefix: SETTLEMENT_RELEASE_PREFIX,
        })
        .await
        .map(|_| ())
    }

    pub async fn get_settlement(&self, settlement_id: &str) -> Result<Settlement, PayError> {
        self.storage
            .get_settlement(settlement_id)
            .await?
            .ok_or_else(|| PayError::SettlementNotFound(settlement_id.to_string()))
    }

    pub async fn list_settlements(&self, actor: &User, merchant_id: &str) -> Result<Vec<Settlement>, PayError> {
        if actor.role != Role::Admin {
            self.settlement_merchant(actor, merchant_id).await?;
        }
        self.storage.list_settlements(merchant_id).await
    }

    async fn transition_settlement(
        &self,
        actor: &User,
        settlement_id: &str,
        from: SettlementStatus,
        to: SettlementStatus,
        reason: Option<&str>,
        action: &str,
    ) -> Result<Settlement, PayError> {
        permissions::require(actor, Permission::ApproveSettlement)?;
        if let Some(reason) = reason {
            self.validate_string_input("reason", reason, MAX_DESCRIPTION_LENGTH)?;
        }
        let mut settlement = self.get_settlement(settlement_id).await?;
        if settlement.status != from {
            return Err(PayError::InvalidStateTransition {
                entity: format!("settlement {}", settlement.id),
                from: settlement.status.to_string(),
                to: to.to_string(),
            });
        }
        let now = self.clock.now();
        settlement.status = to;
        settlement.updated_at = now;
        if let Some(reason) = reason {
            settlement.failure_reason = Some(reason.trim().to_string());
        }
        if matches!(to, SettlementStatus::Completed | SettlementStatus::Failed) {
            settlement.processed_at = Some(now);
        }
        let settlement = self.storage.update_settlement(settlement, from).await?;
        if to == SettlementStatus::Failed {
            let merchant = self.get_merchant(&settlement.merchant_id).await?;
            self.release_settlement_funds(&merchant.user_id, &settlement).await?;
        }

        self.log_and_audit(
            action,
            json!({
                "settlement_id": settlement.id,
                "merchant_id": settlement.merchant_id,
                "from": from,
                "to": to,
                "reason": reason,
            }),
            Some(&actor.id),
        )
        .await?;
        Ok(settlement)
    }

    pub async fn approve_settlement(&self, actor: &User, settlement_id: &str) -> Result<Settlement, PayError> {
        self.transition_settlement(
            actor,
            settlement_id,
            SettlementStatus::Pending,
            SettlementStatus::Processing,
            None,
            SETTLEMENT_APPROVED,
        )
        .await
    }

    pub async fn reject_settlement(
        &self,
        actor: &User,
        settlement_id: &str,
        reason: &str,
    ) -> Result<Settlement, PayError> {
        self.transition_settlement(
            actor,
            settlement_id,
            SettlementStatus::Pending,
            SettlementStatus::Failed,
            Some(reason),
            SETTLEMENT_REJECTED,
        )
        .await
    }

    pub async fn complete_settlement(&self, actor: &User, settlement_id: &str) -> Result<Settlement, PayError> {
        self.transition_settlement(
            actor,
            settlement_id,
            SettlementStatus::Processing,
            SettlementStatus::Completed,
            None,
            SETTLEMENT_COMPLETED,
        )
        .await
    }

    pub async fn fail_settlement(
        &self,
        actor: &User,
        settlement_id: &str,
        reason: &str,
    ) -> Result<Settlement, PayError> {
        self.transition_settlement(
            actor,
            settlement_id,
            SettlementStatus::Processing,
            SettlementStatus::Failed,
            Some(reason),
            SETTLEMENT_FAILED,
        )
        .await
    }
}
