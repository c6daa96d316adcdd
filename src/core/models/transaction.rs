use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Processing => "processing",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Refunded => "refunded",
        };
        write!(f, "{}", s)
    }
}

/// The entity a payment is collected for.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionOwner {
    PaymentRequest {
        request_id: String,
    },
    Participant {
        request_id: String,
        participant_id: String,
    },
    QrCode {
        qr_code_id: String,
    },
}

impl TransactionOwner {
    /// Id of the most specific owning row; half of the reconciliation unique key.
    pub fn owner_id(&self) -> &str {
        match self {
            TransactionOwner::PaymentRequest { request_id } => request_id,
            TransactionOwner::Participant { participant_id, .. } => participant_id,
            TransactionOwner::QrCode { qr_code_id } => qr_code_id,
        }
    }

    pub fn unique_key(&self, external_reference: &str) -> String {
        format!("{}:{}", external_reference, self.owner_id())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct PayerDetails {
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    pub id: String,
    pub external_reference: String,
    pub owner: TransactionOwner,
    pub payer: PayerDetails,
    pub amount: Decimal,
    pub tip_amount: Decimal,
    pub currency: String,
    pub payment_method: String,
    pub provider: String,
    pub status: TransactionStatus,
    /// User whose wallet received the funds; set when the payment is reconciled.
    pub beneficiary_id: Option<String>,
    #[schema(value_type = Object)]
    pub gateway_response: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn gross(&self) -> Decimal {
        self.amount + self.tip_amount
    }

    pub fn is_completed(&self) -> bool {
        self.status == TransactionStatus::Completed
    }
}
