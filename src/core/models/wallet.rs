use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Credit,
    Debit,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Credit => write!(f, "credit"),
            Direction::Debit => write!(f, "debit"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Wallet {
    pub user_id: String,
    pub balance: Decimal,
    pub currency: String,
    pub is_active: bool,
    pub last_transaction_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Append-only ledger entry. Never edited once written.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct WalletTransaction {
    pub id: String,
    pub user_id: String,
    pub transaction_id: Option<String>,
    pub direction: Direction,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    pub balance_after: Decimal,
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    pub fn signed_amount(&self) -> Decimal {
        match self.direction {
            Direction::Credit => self.amount,
            Direction::Debit => -self.amount,
        }
    }
}

/// A single balance movement handed to the store, applied together with its ledger entry.
#[derive(Clone, Debug)]
pub struct WalletPosting {
    pub user_id: String,
    pub direction: Direction,
    pub amount: Decimal,
    /// `None` uses the wallet's currency, or the user's preferred one for a new wallet.
    pub currency: Option<String>,
    pub description: String,
    pub transaction_id: Option<String>,
    pub reference: String,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct LedgerReceipt {
    pub wallet: Wallet,
    pub entry: WalletTransaction,
}

impl LedgerReceipt {
    pub fn new_balance(&self) -> Decimal {
        self.wallet.balance
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct WalletIntegrity {
    pub user_id: String,
    pub balance: Decimal,
    pub ledger_total: Decimal,
    pub entries: usize,
    pub consistent: bool,
}
