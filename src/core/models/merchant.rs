use super::settlement::SettlementType;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct BankAccount {
    pub account_name: String,
    pub account_number: String,
    pub bank_code: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Merchant {
    pub id: String,
    pub user_id: String,
    pub business_name: String,
    pub kyc_status: KycStatus,
    pub bank_account: Option<BankAccount>,
    /// Fraction of the gross settlement kept as fee, e.g. `0.02`.
    pub settlement_fee_rate: Decimal,
    pub settlement_type: SettlementType,
    #[serde(skip_serializing, default)]
    pub api_key_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Merchant {
    pub fn is_kyc_approved(&self) -> bool {
        self.kyc_status == KycStatus::Approved
    }
}
