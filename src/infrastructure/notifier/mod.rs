use crate::core::errors::PayError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recipient {
    pub name: String,
    pub email: String,
}

#[derive(Clone, Debug)]
pub struct PaymentRequestNotice {
    pub recipient: Recipient,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    pub pay_url: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug)]
pub struct PaymentConfirmation {
    pub recipient: Recipient,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    pub reference: String,
}

/// Outbound email/SMS delivery. Callers treat every error as non-fatal.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_payment_request_notice(&self, notice: PaymentRequestNotice) -> Result<(), PayError>;
    async fn send_payment_confirmation(&self, confirmation: PaymentConfirmation) -> Result<(), PayError>;
}

/// Writes notices to the tracing log and keeps the recipients for inspection.
#[derive(Clone, Default)]
pub struct LogNotifier {
    sent: Arc<RwLock<Vec<(String, Recipient)>>>,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(kind, recipient)` pairs in send order; kind is `request` or `confirmation`.
    pub async fn sent(&self) -> Vec<(String, Recipient)> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_payment_request_notice(&self, notice: PaymentRequestNotice) -> Result<(), PayError> {
        tracing::info!(
            to = %notice.recipient.email,
            amount = %notice.amount,
            currency = %notice.currency,
            pay_url = %notice.pay_url,
            "payment request notice"
        );
        self.sent
            .write()
            .await
            .push(("request".into(), notice.recipient));
        Ok(())
    }

    async fn send_payment_confirmation(&self, confirmation: PaymentConfirmation) -> Result<(), PayError> {
        tracing::info!(
            to = %confirmation.recipient.email,
            amount = %confirmation.amount,
            reference = %confirmation.reference,
            "payment confirmation"
        );
        self.sent
            .write()
            .await
            .push(("confirmation".into(), confirmation.recipient));
        Ok(())
    }
}
