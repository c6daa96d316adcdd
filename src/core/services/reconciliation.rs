//! Turning gateway confirmations into completed transactions, exactly once.

use super::PayService;
use crate::core::constants::{
    CREDIT_PREFIX, PAYMENT_RECONCILED, PAYMENT_REFUNDED, REFUND_PREFIX, WEBHOOK_FAILURE_RECEIVED,
};
use crate::core::errors::PayError;
use crate::core::ids;
use crate::core::models::transaction::{PayerDetails, Transaction, TransactionOwner, TransactionStatus};
use crate::core::models::user::User;
use crate::core::models::wallet::{Direction, WalletPosting};
use crate::core::money;
use crate::core::permissions::{self, Permission};
use crate::infrastructure::gateway::GatewayClient;
use crate::infrastructure::logging::LoggingService;
use crate::infrastructure::notifier::{self, Notifier, Recipient};
use crate::infrastructure::storage::{ReconciliationCommit, ReconciliationOutcome, Storage};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use utoipa::ToSchema;

const SUCCESS_TOKENS: &[&str] = &["success", "successful", "succeeded", "completed", "paid", "charge.success"];
const FAILURE_TOKENS: &[&str] = &["failed", "failure", "error", "declined", "cancelled", "abandoned", "reversed"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StatusClass {
    Success,
    Failure,
    Unknown,
}

/// Classifies a gateway status or event name, ignoring case. For dotted event names the last
/// segment is also considered, so `charge.failed` is a failure.
pub(crate) fn classify_status(status: &str) -> StatusClass {
    let status = status.trim().to_lowercase();
    let tail = status.rsplit('.').next().unwrap_or(&status).to_string();
    let any_of = |tokens: &[&str]| tokens.iter().any(|t| *t == status || *t == tail);
    if any_of(FAILURE_TOKENS) {
        StatusClass::Failure
    } else if any_of(SUCCESS_TOKENS) {
        StatusClass::Success
    } else {
        StatusClass::Unknown
    }
}

/// A gateway-confirmed payment to be reconciled.
#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct PaymentConfirmation {
    pub external_reference: String,
    pub status: String,
    pub owner: TransactionOwner,
    pub amount: Decimal,
    #[serde(default)]
    pub tip_amount: Decimal,
    pub payment_method: Option<String>,
    #[serde(default)]
    pub payer: PayerDetails,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub raw_payload: serde_json::Value,
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct WebhookEvent {
    pub event: String,
    pub data: WebhookData,
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct WebhookCustomer {
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct WebhookData {
    pub reference: String,
    /// Integer minor units, or a decimal string in major units.
    #[schema(value_type = Object)]
    pub amount: serde_json::Value,
    pub currency: Option<String>,
    pub status: Option<String>,
    pub channel: Option<String>,
    pub customer: Option<WebhookCustomer>,
    #[serde(default)]
    pub metadata: WebhookMetadata,
}

#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct WebhookMetadata {
    pub payment_request_id: Option<String>,
    pub participant_id: Option<String>,
    pub qr_code_id: Option<String>,
    pub tip_amount: Option<Decimal>,
    pub payer_name: Option<String>,
}

/// What a transaction owner expects to receive, and who receives it.
struct OwnerTerms {
    owner_user: Option<String>,
    currency: String,
    description: String,
    /// Base amount a confirmation must match; `None` for open-amount QR codes.
    expected_amount: Option<Decimal>,
}

fn webhook_amount(value: &serde_json::Value) -> Result<Decimal, PayError> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_i64().map(|minor| Decimal::new(minor, 2)),
        serde_json::Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    };
    parsed.ok_or_else(|| PayError::invalid("amount", "Webhook amount must be minor units or a decimal string"))
}

impl<S: Storage, G: GatewayClient, N: Notifier, L: LoggingService> PayService<S, G, N, L> {
    /// Records a confirmed payment and applies its effects once, however often it is delivered.
    pub async fn reconcile(&self, confirmation: PaymentConfirmation) -> Result<Transaction, PayError> {
        match classify_status(&confirmation.status) {
            StatusClass::Failure => return Err(PayError::PaymentDeclined(confirmation.status)),
            StatusClass::Unknown => return Err(PayError::InvalidStatus(confirmation.status)),
            StatusClass::Success => {}
        }
        self.validate_string_input("external_reference", &confirmation.external_reference, 128)?;
        money::ensure_positive("amount", confirmation.amount)?;
        if confirmation.tip_amount < Decimal::ZERO {
            return Err(PayError::invalid("tip_amount", "Tip cannot be negative"));
        }

        let key = confirmation.owner.unique_key(&confirmation.external_reference);
        let _guard = self.reconcile_locks.lock(&key).await;

        let existing = self
            .storage
            .find_transaction(&confirmation.external_reference, confirmation.owner.owner_id())
            .await?;
        if let Some(tx) = existing.as_ref().filter(|tx| tx.is_completed()) {
            tracing::debug!(reference = %tx.external_reference, "confirmation already reconciled");
            return Ok(tx.clone());
        }

        let OwnerTerms {
            owner_user,
            currency,
            description,
            expected_amount,
        } = self.resolve_owner(&confirmation.owner).await?;
        if let Some(expected) = expected_amount {
            if !money::within_tolerance(expected, confirmation.amount) {
                tracing::warn!(
                    reference = %confirmation.external_reference,
                    expected = %expected,
                    received = %confirmation.amount,
                    "confirmed amount does not match the owner"
                );
                return Err(PayError::AmountMismatch {
                    expected,
                    received: confirmation.amount,
                });
            }
        }
        let beneficiary_id = owner_user.or_else(|| confirmation.payer.user_id.clone());
        let now = self.clock.now();

        let transaction = match existing {
            Some(pending) => Transaction {
                payer: merge_payer(pending.payer.clone(), confirmation.payer.clone()),
                amount: confirmation.amount,
                tip_amount: confirmation.tip_amount,
                payment_method: confirmation
                    .payment_method
                    .clone()
                    .unwrap_or_else(|| pending.payment_method.clone()),
                beneficiary_id: beneficiary_id.clone(),
                gateway_response: confirmation.raw_payload.clone(),
                ..pending
            },
            None => Transaction {
                id: ids::new_id(),
                external_reference: confirmation.external_reference.clone(),
                owner: confirmation.owner.clone(),
                payer: confirmation.payer.clone(),
                amount: confirmation.amount,
                tip_amount: confirmation.tip_amount,
                currency: currency.clone(),
                payment_method: confirmation
                    .payment_method
                    .clone()
                    .unwrap_or_else(|| "card".to_string()),
                provider: self.gateway.provider().to_string(),
                status: TransactionStatus::Pending,
                beneficiary_id: beneficiary_id.clone(),
                gateway_response: confirmation.raw_payload.clone(),
                created_at: now,
                updated_at: now,
                completed_at: None,
            },
        };
        let credit = beneficiary_id.as_ref().map(|user_id| WalletPosting {
            user_id: user_id.clone(),
            direction: Direction::Credit,
            amount: transaction.gross(),
            currency: Some(transaction.currency.clone()),
            description: format!("Payment received: {}", description),
            transaction_id: Some(transaction.id.clone()),
            reference: ids::reference(CREDIT_PREFIX),
        });

        let outcome = self
            .commit_with_retry(ReconciliationCommit {
                transaction,
                credit,
                now,
            })
            .await?;
        if outcome.replayed {
            return Ok(outcome.transaction);
        }

        let tx = &outcome.transaction;
        self.log_and_audit(
            PAYMENT_RECONCILED,
            json!({
                "transaction_id": tx.id,
                "reference": tx.external_reference,
                "owner": tx.owner,
                "amount": tx.amount.to_string(),
                "tip_amount": tx.tip_amount.to_string(),
                "beneficiary_id": tx.beneficiary_id,
                "request_status": outcome.request.as_ref().map(|r| r.status),
                "qr_usage": outcome.qr_code.as_ref().map(|q| q.usage_count),
            }),
            tx.payer.user_id.as_deref(),
        )
        .await?;
        tracing::info!(reference = %tx.external_reference, amount = %tx.gross(), "payment reconciled");
        self.send_confirmation(tx, &description).await;

        Ok(outcome.transaction)
    }

    async fn resolve_owner(&self, owner: &TransactionOwner) -> Result<OwnerTerms, PayError> {
        match owner {
            TransactionOwner::PaymentRequest { request_id } => {
                let request = self
                    .storage
                    .get_payment_request(request_id)
                    .await?
                    .ok_or_else(|| PayError::PaymentRequestNotFound(request_id.clone()))?;
                Ok(OwnerTerms {
                    expected_amount: Some(request.amount),
                    owner_user: request.owner_id,
                    currency: request.currency,
                    description: request.description,
                })
            }
            TransactionOwner::Participant {
                request_id,
                participant_id,
            } => {
                let request = self
                    .storage
                    .get_payment_request(request_id)
                    .await?
                    .ok_or_else(|| PayError::PaymentRequestNotFound(request_id.clone()))?;
                let participant = self
                    .storage
                    .get_participant(participant_id)
                    .await?
                    .filter(|p| p.payment_request_id == *request_id)
                    .ok_or_else(|| PayError::ParticipantNotFound(participant_id.clone()))?;
                Ok(OwnerTerms {
                    expected_amount: Some(participant.amount),
                    owner_user: request.owner_id,
                    currency: request.currency,
                    description: request.description,
                })
            }
            TransactionOwner::QrCode { qr_code_id } => {
                let qr = self
                    .storage
                    .get_qr_code(qr_code_id)
                    .await?
                    .ok_or_else(|| PayError::QrCodeNotFound(qr_code_id.clone()))?;
                Ok(OwnerTerms {
                    expected_amount: qr.amount,
                    owner_user: Some(qr.owner_id),
                    currency: qr.currency,
                    description: qr.description,
                })
            }
        }
    }

    async fn commit_with_retry(&self, commit: ReconciliationCommit) -> Result<ReconciliationOutcome, PayError> {
        let max_attempts = self.settings.reconcile_max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.storage.commit_reconciliation(commit.clone()).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    tracing::warn!(
                        reference = %commit.transaction.external_reference,
                        attempt,
                        error = %e,
                        "reconciliation commit failed, retrying"
                    );
                    tokio::time::sleep(self.settings.reconcile_backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(
                        reference = %commit.transaction.external_reference,
                        attempt,
                        error = %e,
                        "reconciliation commit failed"
                    );
                    return Err(e);
                }
            }
        }
    }

    async fn send_confirmation(&self, tx: &Transaction, description: &str) {
        let Some(email) = tx.payer.email.clone() else {
            return;
        };
        let confirmation = notifier::PaymentConfirmation {
            recipient: Recipient {
                name: tx.payer.name.clone().unwrap_or_default(),
                email,
            },
            amount: tx.gross(),
            currency: tx.currency.clone(),
            description: description.to_string(),
            reference: tx.external_reference.clone(),
        };
        if let Err(e) = self.notifier.send_payment_confirmation(confirmation).await {
            tracing::warn!(reference = %tx.external_reference, error = %e, "payment confirmation failed");
        }
    }

    /// The single transaction opened for a gateway reference. A reference shared by several
    /// owners cannot be attributed without the owner, so it is refused.
    async fn transaction_for_reference(&self, reference: &str) -> Result<Transaction, PayError> {
        let mut matches = self.storage.find_transactions_by_reference(reference).await?;
        match matches.len() {
            0 => Err(PayError::TransactionNotFound(reference.to_string())),
            1 => Ok(matches.remove(0)),
            n => Err(PayError::Conflict(format!(
                "reference {} matches {} transactions",
                reference, n
            ))),
        }
    }

    /// Client-submitted verification of a charge opened through this service.
    pub async fn verify_payment(&self, reference: &str) -> Result<Transaction, PayError> {
        let pending = self.transaction_for_reference(reference).await?;
        if pending.is_completed() {
            return Ok(pending);
        }

        let verification = self.gateway.verify_charge(reference).await?;
        if !verification.verified {
            return Err(PayError::PaymentDeclined(format!("charge {} was not successful", reference)));
        }
        if let Some(charged) = verification.amount {
            if !money::within_tolerance(pending.gross(), charged) {
                return Err(PayError::AmountMismatch {
                    expected: pending.gross(),
                    received: charged,
                });
            }
        }

        self.reconcile(PaymentConfirmation {
            external_reference: pending.external_reference.clone(),
            status: "success".to_string(),
            owner: pending.owner.clone(),
            amount: pending.amount,
            tip_amount: pending.tip_amount,
            payment_method: verification.channel,
            payer: pending.payer.clone(),
            raw_payload: verification.raw_payload,
        })
        .await
    }

    /// Webhook ingress. Failure events are recorded and acknowledged with `Ok(None)`.
    pub async fn handle_webhook(&self, event: WebhookEvent) -> Result<Option<Transaction>, PayError> {
        let data = event.data;
        let status = data.status.clone().unwrap_or_else(|| event.event.clone());
        if classify_status(&status) == StatusClass::Failure {
            self.log_and_audit(
                WEBHOOK_FAILURE_RECEIVED,
                json!({ "event": &event.event, "reference": &data.reference, "status": &status }),
                None,
            )
            .await?;
            tracing::info!(reference = %data.reference, %status, "failure webhook acknowledged");
            return Ok(None);
        }

        let tip = data.metadata.tip_amount.unwrap_or(Decimal::ZERO);
        let charged = webhook_amount(&data.amount)?;
        let owner = match (
            data.metadata.payment_request_id.clone(),
            data.metadata.participant_id.clone(),
            data.metadata.qr_code_id.clone(),
        ) {
            (Some(request_id), Some(participant_id), _) => TransactionOwner::Participant {
                request_id,
                participant_id,
            },
            (Some(request_id), None, _) => TransactionOwner::PaymentRequest { request_id },
            (None, _, Some(qr_code_id)) => TransactionOwner::QrCode { qr_code_id },
            _ => self.transaction_for_reference(&data.reference).await?.owner,
        };
        let customer = data.customer.clone();
        let payer = PayerDetails {
            user_id: None,
            name: data
                .metadata
                .payer_name
                .clone()
                .or_else(|| customer.as_ref().and_then(|c| c.name.clone())),
            email: customer.as_ref().and_then(|c| c.email.clone()),
            phone: customer.as_ref().and_then(|c| c.phone.clone()),
        };
        let raw_payload = json!({
            "event": event.event,
            "reference": &data.reference,
            "amount": &data.amount,
            "currency": &data.currency,
            "channel": &data.channel,
        });

        self.reconcile(PaymentConfirmation {
            external_reference: data.reference,
            status,
            owner,
            amount: charged - tip,
            tip_amount: tip,
            payment_method: data.channel,
            payer,
            raw_payload,
        })
        .await
        .map(Some)
    }

    /// Reverses a completed payment: gateway refund, then the beneficiary wallet is debited.
    pub async fn refund_transaction(
        &self,
        actor: &User,
        transaction_id: &str,
        reason: &str,
    ) -> Result<Transaction, PayError> {
        permissions::require(actor, Permission::RefundTransaction)?;
        self.validate_string_input("reason", reason, 255)?;
        let tx = self
            .storage
            .get_transaction(transaction_id)
            .await?
            .ok_or_else(|| PayError::TransactionNotFound(transaction_id.to_string()))?;
        let _guard = self
            .reconcile_locks
            .lock(&tx.owner.unique_key(&tx.external_reference))
            .await;
        if tx.status != TransactionStatus::Completed {
            return Err(PayError::InvalidStateTransition {
                entity: format!("transaction {}", tx.id),
                from: tx.status.to_string(),
                to: TransactionStatus::Refunded.to_string(),
            });
        }
        if let Some(beneficiary) = &tx.beneficiary_id {
            let balance = self
                .storage
                .get_wallet(beneficiary)
                .await?
                .map(|w| w.balance)
                .unwrap_or(Decimal::ZERO);
            if balance < tx.gross() {
                return Err(PayError::InsufficientBalance {
                    available: balance,
                    requested: tx.gross(),
                });
            }
        }

        let refund_reference = self
            .gateway
            .refund_charge(&tx.external_reference, tx.gross())
            .await?;
        let debit = tx.beneficiary_id.as_ref().map(|user_id| WalletPosting {
            user_id: user_id.clone(),
            direction: Direction::Debit,
            amount: tx.gross(),
            currency: Some(tx.currency.clone()),
            description: format!("Refund: {}", reason.trim()),
            transaction_id: Some(tx.id.clone()),
            reference: ids::reference(REFUND_PREFIX),
        });
        let (refunded, _) = self
            .storage
            .commit_refund(&tx.id, debit, self.clock.now())
            .await?;

        self.log_and_audit(
            PAYMENT_REFUNDED,
            json!({
                "transaction_id": refunded.id,
                "reference": refunded.external_reference,
                "refund_reference": refund_reference,
                "amount": refunded.gross().to_string(),
                "reason": reason,
            }),
            Some(&actor.id),
        )
        .await?;
        Ok(refunded)
    }
}

fn merge_payer(stored: PayerDetails, confirmed: PayerDetails) -> PayerDetails {
    PayerDetails {
        user_id: confirmed.user_id.or(stored.user_id),
        name: confirmed.name.or(stored.name),
        email: confirmed.email.or(stored.email),
        phone: confirmed.phone.or(stored.phone),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn status_tokens_are_case_insensitive() {
        assert_eq!(classify_status("SUCCESS"), StatusClass::Success);
        assert_eq!(classify_status("charge.success"), StatusClass::Success);
        assert_eq!(classify_status("Paid"), StatusClass::Success);
        assert_eq!(classify_status("charge.failed"), StatusClass::Failure);
        assert_eq!(classify_status("Declined"), StatusClass::Failure);
        assert_eq!(classify_status("pending"), StatusClass::Unknown);
    }

    #[test]
    fn webhook_amounts_accept_minor_units_and_strings() {
        assert_eq!(webhook_amount(&json!(2500000)).unwrap(), dec!(25000.00));
        assert_eq!(webhook_amount(&json!("25000.50")).unwrap(), dec!(25000.50));
        assert!(webhook_amount(&json!(null)).is_err());
    }
}
