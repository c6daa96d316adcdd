pub mod in_memory;

use crate::core::errors::PayError;
use crate::core::models::{
    merchant::Merchant,
    payment_request::{Participant, PaymentRequest},
    qr_code::QrCode,
    settlement::{Settlement, SettlementStatus},
    transaction::Transaction,
    user::User,
    wallet::{LedgerReceipt, Wallet, WalletPosting, WalletTransaction},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// What a link token points at. Tokens are unique across all three kinds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkTarget {
    PaymentRequest(String),
    Participant {
        request_id: String,
        participant_id: String,
    },
    QrCode(String),
}

/// Everything a confirmed payment changes, written as one unit.
#[derive(Clone, Debug)]
pub struct ReconciliationCommit {
    /// The transaction in its completed form. Reuses the pending row's id when one exists.
    pub transaction: Transaction,
    /// Credit to the beneficiary wallet; `None` when nobody can be credited.
    pub credit: Option<WalletPosting>,
    pub now: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct ReconciliationOutcome {
    pub transaction: Transaction,
    pub receipt: Option<LedgerReceipt>,
    pub request: Option<PaymentRequest>,
    pub qr_code: Option<QrCode>,
    /// The transaction was already completed; nothing was written.
    pub replayed: bool,
}

/// Persistence seam. Multi-entity methods are all-or-nothing: they validate every
/// precondition before the first write.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn insert_user(&self, user: User) -> Result<User, PayError>;
    async fn get_user(&self, user_id: &str) -> Result<Option<User>, PayError>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, PayError>;

    async fn insert_merchant(&self, merchant: Merchant) -> Result<Merchant, PayError>;
    async fn update_merchant(&self, merchant: Merchant) -> Result<Merchant, PayError>;
    async fn get_merchant(&self, merchant_id: &str) -> Result<Option<Merchant>, PayError>;
    async fn get_merchant_by_user(&self, user_id: &str) -> Result<Option<Merchant>, PayError>;

    async fn get_wallet(&self, user_id: &str) -> Result<Option<Wallet>, PayError>;
    async fn get_wallet_entries(&self, user_id: &str) -> Result<Vec<WalletTransaction>, PayError>;
    /// Applies one balance movement and appends its ledger entry, creating the wallet if needed.
    async fn post_wallet_entry(
        &self,
        posting: WalletPosting,
        now: DateTime<Utc>,
    ) -> Result<LedgerReceipt, PayError>;

    async fn insert_payment_request(
        &self,
        request: PaymentRequest,
        participants: Vec<Participant>,
    ) -> Result<(), PayError>;
    async fn get_payment_request(&self, request_id: &str) -> Result<Option<PaymentRequest>, PayError>;
    async fn list_payment_requests(&self, owner_id: &str) -> Result<Vec<PaymentRequest>, PayError>;
    async fn get_participant(&self, participant_id: &str) -> Result<Option<Participant>, PayError>;
    async fn get_participants(&self, request_id: &str) -> Result<Vec<Participant>, PayError>;
    /// Re-derives a request's status from its current participants and payments.
    async fn recalculate_request_status(
        &self,
        request_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PaymentRequest, PayError>;

    async fn resolve_link(&self, token: &str) -> Result<Option<LinkTarget>, PayError>;

    async fn insert_qr_code(&self, qr_code: QrCode) -> Result<(), PayError>;
    async fn get_qr_code(&self, qr_code_id: &str) -> Result<Option<QrCode>, PayError>;
    async fn list_qr_codes(&self, owner_id: &str) -> Result<Vec<QrCode>, PayError>;
    async fn deactivate_qr_code(&self, qr_code_id: &str) -> Result<QrCode, PayError>;

    async fn insert_transaction(&self, transaction: Transaction) -> Result<(), PayError>;
    async fn get_transaction(&self, transaction_id: &str) -> Result<Option<Transaction>, PayError>;
    async fn find_transaction(
        &self,
        external_reference: &str,
        owner_id: &str,
    ) -> Result<Option<Transaction>, PayError>;
    /// Every transaction carrying the reference, oldest first.
    async fn find_transactions_by_reference(
        &self,
        external_reference: &str,
    ) -> Result<Vec<Transaction>, PayError>;
    async fn completed_transactions_for(&self, beneficiary_id: &str) -> Result<Vec<Transaction>, PayError>;
    async fn commit_reconciliation(
        &self,
        commit: ReconciliationCommit,
    ) -> Result<ReconciliationOutcome, PayError>;
    /// Marks a completed transaction refunded and applies the matching debit together.
    async fn commit_refund(
        &self,
        transaction_id: &str,
        debit: Option<WalletPosting>,
        now: DateTime<Utc>,
    ) -> Result<(Transaction, Option<LedgerReceipt>), PayError>;

    async fn insert_settlement(&self, settlement: Settlement) -> Result<(), PayError>;
    async fn get_settlement(&self, settlement_id: &str) -> Result<Option<Settlement>, PayError>;
    async fn list_settlements(&self, merchant_id: &str) -> Result<Vec<Settlement>, PayError>;
    /// Replaces a settlement only if it is still in `expected` status.
    async fn update_settlement(
        &self,
        settlement: Settlement,
        expected: SettlementStatus,
    ) -> Result<Settlement, PayError>;
}
