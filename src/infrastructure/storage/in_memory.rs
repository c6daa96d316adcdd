use crate::core::errors::PayError;
use crate::core::ids;
use crate::core::models::{
    merchant::Merchant,
    payment_request::{Participant, PaymentRequest, RequestKind, RequestStatus, status_for_paid_count},
    qr_code::QrCode,
    settlement::{Settlement, SettlementStatus},
    transaction::{Transaction, TransactionOwner, TransactionStatus},
    user::User,
    wallet::{Direction, LedgerReceipt, Wallet, WalletPosting, WalletTransaction},
};
use crate::infrastructure::storage::{
    LinkTarget, ReconciliationCommit, ReconciliationOutcome, Storage,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct Store {
    users: HashMap<String, User>,
    user_ids_by_email: HashMap<String, String>,
    merchants: HashMap<String, Merchant>,
    merchant_ids_by_user: HashMap<String, String>,
    wallets: HashMap<String, Wallet>,
    wallet_entries: HashMap<String, Vec<WalletTransaction>>,
    wallet_references: HashSet<String>,
    payment_requests: HashMap<String, PaymentRequest>,
    participants: HashMap<String, Participant>,
    participant_ids_by_request: HashMap<String, Vec<String>>,
    qr_codes: HashMap<String, QrCode>,
    links: HashMap<String, LinkTarget>,
    transactions: HashMap<String, Transaction>,
    transaction_ids_by_key: HashMap<String, String>,
    settlements: HashMap<String, Settlement>,
    settlement_references: HashSet<String>,
}

/// Every collection sits behind one lock so a multi-entity write is checked in full
/// and then applied without any other writer in between.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    store: Arc<RwLock<Store>>,
    commit_failures: Arc<AtomicUsize>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` reconciliation commits fail with a retryable error before writing.
    pub fn inject_commit_failures(&self, count: usize) {
        self.commit_failures.store(count, Ordering::SeqCst);
    }

    fn take_injected_failure(&self) -> bool {
        self.commit_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Store {
    /// Computes the wallet and entry a posting would produce without touching state.
    fn prepare_posting(
        &self,
        posting: &WalletPosting,
        now: DateTime<Utc>,
    ) -> Result<(Wallet, WalletTransaction), PayError> {
        if posting.amount <= rust_decimal::Decimal::ZERO {
            return Err(PayError::invalid("amount", "Amount must be greater than 0"));
        }
        if self.wallet_references.contains(&posting.reference) {
            return Err(PayError::Conflict(format!(
                "wallet reference {} already used",
                posting.reference
            )));
        }
        let mut wallet = match self.wallets.get(&posting.user_id) {
            Some(wallet) => wallet.clone(),
            None => {
                let user = self
                    .users
                    .get(&posting.user_id)
                    .ok_or_else(|| PayError::WalletNotFound(posting.user_id.clone()))?;
                Wallet {
                    user_id: user.id.clone(),
                    balance: rust_decimal::Decimal::ZERO,
                    currency: posting
                        .currency
                        .clone()
                        .unwrap_or_else(|| user.preferred_currency.clone()),
                    is_active: true,
                    last_transaction_at: None,
                    created_at: now,
                }
            }
        };
        if !wallet.is_active {
            return Err(PayError::invalid("wallet", "Wallet is inactive"));
        }
        if let Some(currency) = &posting.currency {
            if !currency.eq_ignore_ascii_case(&wallet.currency) {
                return Err(PayError::invalid(
                    "currency",
                    format!("Wallet holds {}, posting is in {}", wallet.currency, currency),
                ));
            }
        }
        match posting.direction {
            Direction::Credit => wallet.balance += posting.amount,
            Direction::Debit => {
                if posting.amount > wallet.balance {
                    return Err(PayError::InsufficientBalance {
                        available: wallet.balance,
                        requested: posting.amount,
                    });
                }
                wallet.balance -= posting.amount;
            }
        }
        wallet.last_transaction_at = Some(now);
        let entry = WalletTransaction {
            id: ids::new_id(),
            user_id: wallet.user_id.clone(),
            transaction_id: posting.transaction_id.clone(),
            direction: posting.direction,
            amount: posting.amount,
            currency: wallet.currency.clone(),
            description: posting.description.clone(),
            balance_after: wallet.balance,
            reference: posting.reference.clone(),
            created_at: now,
        };
        Ok((wallet, entry))
    }

    fn apply_posting(&mut self, wallet: Wallet, entry: WalletTransaction) -> LedgerReceipt {
        self.wallet_references.insert(entry.reference.clone());
        self.wallet_entries
            .entry(wallet.user_id.clone())
            .or_default()
            .push(entry.clone());
        self.wallets.insert(wallet.user_id.clone(), wallet.clone());
        LedgerReceipt { wallet, entry }
    }

    fn check_link_free(&self, token: &str) -> Result<(), PayError> {
        if self.links.contains_key(token) {
            return Err(PayError::Conflict(format!("link token {} already in use", token)));
        }
        Ok(())
    }

    fn participants_of(&self, request_id: &str) -> Vec<Participant> {
        self.participant_ids_by_request
            .get(request_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.participants.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn derived_status(&self, request: &PaymentRequest) -> RequestStatus {
        match request.kind {
            RequestKind::GroupSplit => {
                let participants = self.participants_of(&request.id);
                let paid = participants.iter().filter(|p| p.has_paid).count();
                status_for_paid_count(paid, participants.len())
            }
            RequestKind::SinglePayer => {
                let paid = self.transactions.values().any(|tx| {
                    tx.is_completed()
                        && matches!(&tx.owner, TransactionOwner::PaymentRequest { request_id } if *request_id == request.id)
                });
                if paid {
                    RequestStatus::Completed
                } else {
                    RequestStatus::Pending
                }
            }
        }
    }

    fn refresh_request(&mut self, request_id: &str, now: DateTime<Utc>) -> Option<PaymentRequest> {
        let current = self.payment_requests.get(request_id)?.clone();
        let status = self.derived_status(&current);
        let request = self.payment_requests.get_mut(request_id)?;
        if request.status != status {
            request.status = status;
            request.updated_at = now;
            if status == RequestStatus::Completed {
                request.completed_at = Some(now);
            }
        }
        Some(request.clone())
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn insert_user(&self, user: User) -> Result<User, PayError> {
        let mut store = self.store.write().await;
        let email = user.email.to_lowercase();
        if store.user_ids_by_email.contains_key(&email) {
            return Err(PayError::EmailAlreadyRegistered(user.email));
        }
        store.user_ids_by_email.insert(email, user.id.clone());
        store.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, PayError> {
        let store = self.store.read().await;
        Ok(store.users.get(user_id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, PayError> {
        let store = self.store.read().await;
        Ok(store
            .user_ids_by_email
            .get(&email.to_lowercase())
            .and_then(|id| store.users.get(id).cloned()))
    }

    async fn insert_merchant(&self, merchant: Merchant) -> Result<Merchant, PayError> {
        let mut store = self.store.write().await;
        if !store.users.contains_key(&merchant.user_id) {
            return Err(PayError::UserNotFound(merchant.user_id));
        }
        if store.merchant_ids_by_user.contains_key(&merchant.user_id) {
            return Err(PayError::Conflict(format!(
                "user {} already has a merchant profile",
                merchant.user_id
            )));
        }
        store
            .merchant_ids_by_user
            .insert(merchant.user_id.clone(), merchant.id.clone());
        store.merchants.insert(merchant.id.clone(), merchant.clone());
        Ok(merchant)
    }

    async fn update_merchant(&self, merchant: Merchant) -> Result<Merchant, PayError> {
        let mut store = self.store.write().await;
        match store.merchants.get_mut(&merchant.id) {
            Some(existing) => {
                *existing = merchant.clone();
                Ok(merchant)
            }
            None => Err(PayError::MerchantNotFound(merchant.id)),
        }
    }

    async fn get_merchant(&self, merchant_id: &str) -> Result<Option<Merchant>, PayError> {
        let store = self.store.read().await;
        Ok(store.merchants.get(merchant_id).cloned())
    }

    async fn get_merchant_by_user(&self, user_id: &str) -> Result<Option<Merchant>, PayError> {
        let store = self.store.read().await;
        Ok(store
            .merchant_ids_by_user
            .get(user_id)
            .and_then(|id| store.merchants.get(id).cloned()))
    }

    async fn get_wallet(&self, user_id: &str) -> Result<Option<Wallet>, PayError> {
        let store = self.store.read().await;
        Ok(store.wallets.get(user_id).cloned())
    }

    async fn get_wallet_entries(&self, user_id: &str) -> Result<Vec<WalletTransaction>, PayError> {
        let store = self.store.read().await;
        Ok(store.wallet_entries.get(user_id).cloned().unwrap_or_default())
    }

    async fn post_wallet_entry(
        &self,
        posting: WalletPosting,
        now: DateTime<Utc>,
    ) -> Result<LedgerReceipt, PayError> {
        let mut store = self.store.write().await;
        let (wallet, entry) = store.prepare_posting(&posting, now)?;
        Ok(store.apply_posting(wallet, entry))
    }

    async fn insert_payment_request(
        &self,
        request: PaymentRequest,
        participants: Vec<Participant>,
    ) -> Result<(), PayError> {
        let mut store = self.store.write().await;
        if store.payment_requests.contains_key(&request.id) {
            return Err(PayError::Conflict(format!("payment request {} exists", request.id)));
        }
        store.check_link_free(&request.link_token)?;
        let mut tokens = HashSet::new();
        for participant in &participants {
            store.check_link_free(&participant.link_token)?;
            if participant.link_token == request.link_token || !tokens.insert(&participant.link_token) {
                return Err(PayError::Conflict(format!(
                    "link token {} already in use",
                    participant.link_token
                )));
            }
        }

        store.links.insert(
            request.link_token.clone(),
            LinkTarget::PaymentRequest(request.id.clone()),
        );
        let mut participant_ids = Vec::with_capacity(participants.len());
        for participant in participants {
            store.links.insert(
                participant.link_token.clone(),
                LinkTarget::Participant {
                    request_id: request.id.clone(),
                    participant_id: participant.id.clone(),
                },
            );
            participant_ids.push(participant.id.clone());
            store.participants.insert(participant.id.clone(), participant);
        }
        store
            .participant_ids_by_request
            .insert(request.id.clone(), participant_ids);
        store.payment_requests.insert(request.id.clone(), request);
        Ok(())
    }

    async fn get_payment_request(&self, request_id: &str) -> Result<Option<PaymentRequest>, PayError> {
        let store = self.store.read().await;
        Ok(store.payment_requests.get(request_id).cloned())
    }

    async fn list_payment_requests(&self, owner_id: &str) -> Result<Vec<PaymentRequest>, PayError> {
        let store = self.store.read().await;
        let mut requests: Vec<PaymentRequest> = store
            .payment_requests
            .values()
            .filter(|r| r.owner_id.as_deref() == Some(owner_id))
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn get_participant(&self, participant_id: &str) -> Result<Option<Participant>, PayError> {
        let store = self.store.read().await;
        Ok(store.participants.get(participant_id).cloned())
    }

    async fn get_participants(&self, request_id: &str) -> Result<Vec<Participant>, PayError> {
        let store = self.store.read().await;
        Ok(store.participants_of(request_id))
    }

    async fn recalculate_request_status(
        &self,
        request_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PaymentRequest, PayError> {
        let mut store = self.store.write().await;
        store
            .refresh_request(request_id, now)
            .ok_or_else(|| PayError::PaymentRequestNotFound(request_id.to_string()))
    }

    async fn resolve_link(&self, token: &str) -> Result<Option<LinkTarget>, PayError> {
        let store = self.store.read().await;
        Ok(store.links.get(token).cloned())
    }

    async fn insert_qr_code(&self, qr_code: QrCode) -> Result<(), PayError> {
        let mut store = self.store.write().await;
        store.check_link_free(&qr_code.link_token)?;
        store.links.insert(
            qr_code.link_token.clone(),
            LinkTarget::QrCode(qr_code.id.clone()),
        );
        store.qr_codes.insert(qr_code.id.clone(), qr_code);
        Ok(())
    }

    async fn get_qr_code(&self, qr_code_id: &str) -> Result<Option<QrCode>, PayError> {
        let store = self.store.read().await;
        Ok(store.qr_codes.get(qr_code_id).cloned())
    }

    async fn list_qr_codes(&self, owner_id: &str) -> Result<Vec<QrCode>, PayError> {
        let store = self.store.read().await;
        Ok(store
            .qr_codes
            .values()
            .filter(|q| q.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn deactivate_qr_code(&self, qr_code_id: &str) -> Result<QrCode, PayError> {
        let mut store = self.store.write().await;
        let qr_code = store
            .qr_codes
            .get_mut(qr_code_id)
            .ok_or_else(|| PayError::QrCodeNotFound(qr_code_id.to_string()))?;
        qr_code.is_active = false;
        Ok(qr_code.clone())
    }

    async fn insert_transaction(&self, transaction: Transaction) -> Result<(), PayError> {
        let mut store = self.store.write().await;
        let key = transaction.owner.unique_key(&transaction.external_reference);
        if store.transaction_ids_by_key.contains_key(&key) {
            return Err(PayError::Conflict(format!(
                "transaction {} already recorded for {}",
                transaction.external_reference,
                transaction.owner.owner_id()
            )));
        }
        store.transaction_ids_by_key.insert(key, transaction.id.clone());
        store.transactions.insert(transaction.id.clone(), transaction);
        Ok(())
    }

    async fn get_transaction(&self, transaction_id: &str) -> Result<Option<Transaction>, PayError> {
        let store = self.store.read().await;
        Ok(store.transactions.get(transaction_id).cloned())
    }

    async fn find_transaction(
        &self,
        external_reference: &str,
        owner_id: &str,
    ) -> Result<Option<Transaction>, PayError> {
        let store = self.store.read().await;
        let key = format!("{}:{}", external_reference, owner_id);
        Ok(store
            .transaction_ids_by_key
            .get(&key)
            .and_then(|id| store.transactions.get(id).cloned()))
    }

    async fn find_transactions_by_reference(
        &self,
        external_reference: &str,
    ) -> Result<Vec<Transaction>, PayError> {
        let store = self.store.read().await;
        let mut matches: Vec<Transaction> = store
            .transactions
            .values()
            .filter(|tx| tx.external_reference == external_reference)
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(matches)
    }

    async fn completed_transactions_for(&self, beneficiary_id: &str) -> Result<Vec<Transaction>, PayError> {
        let store = self.store.read().await;
        Ok(store
            .transactions
            .values()
            .filter(|tx| tx.is_completed() && tx.beneficiary_id.as_deref() == Some(beneficiary_id))
            .cloned()
            .collect())
    }

    async fn commit_reconciliation(
        &self,
        commit: ReconciliationCommit,
    ) -> Result<ReconciliationOutcome, PayError> {
        if self.take_injected_failure() {
            return Err(PayError::StorageError("injected commit failure".into()));
        }
        let mut guard = self.store.write().await;
        let store = &mut *guard;
        let ReconciliationCommit {
            mut transaction,
            credit,
            now,
        } = commit;
        let key = transaction.owner.unique_key(&transaction.external_reference);

        let existing_id = store.transaction_ids_by_key.get(&key).cloned();
        if let Some(existing) = existing_id.as_ref().and_then(|id| store.transactions.get(id)) {
            if existing.is_completed() {
                return Ok(ReconciliationOutcome {
                    transaction: existing.clone(),
                    receipt: None,
                    request: None,
                    qr_code: None,
                    replayed: true,
                });
            }
            if existing.status != TransactionStatus::Pending
                && existing.status != TransactionStatus::Processing
            {
                return Err(PayError::InvalidStateTransition {
                    entity: format!("transaction {}", existing.id),
                    from: existing.status.to_string(),
                    to: TransactionStatus::Completed.to_string(),
                });
            }
            transaction.id = existing.id.clone();
            transaction.created_at = existing.created_at;
        }

        // Validate the owner and the ledger movement before any write.
        match &transaction.owner {
            TransactionOwner::PaymentRequest { request_id } => {
                let request = store
                    .payment_requests
                    .get(request_id)
                    .ok_or_else(|| PayError::PaymentRequestNotFound(request_id.clone()))?;
                if request.status == RequestStatus::Completed {
                    return Err(PayError::AlreadyPaid(format!("payment request {}", request_id)));
                }
            }
            TransactionOwner::Participant {
                request_id,
                participant_id,
            } => {
                if !store.payment_requests.contains_key(request_id) {
                    return Err(PayError::PaymentRequestNotFound(request_id.clone()));
                }
                let participant = store
                    .participants
                    .get(participant_id)
                    .filter(|p| p.payment_request_id == *request_id)
                    .ok_or_else(|| PayError::ParticipantNotFound(participant_id.clone()))?;
                if participant.has_paid {
                    return Err(PayError::AlreadyPaid(format!("participant {}", participant_id)));
                }
            }
            TransactionOwner::QrCode { qr_code_id } => {
                if !store.qr_codes.contains_key(qr_code_id) {
                    return Err(PayError::QrCodeNotFound(qr_code_id.clone()));
                }
            }
        }
        let prepared = match &credit {
            Some(posting) => Some(store.prepare_posting(posting, now)?),
            None => None,
        };

        transaction.status = TransactionStatus::Completed;
        transaction.completed_at = Some(now);
        transaction.updated_at = now;
        let receipt = prepared.map(|(wallet, entry)| store.apply_posting(wallet, entry));

        let mut request = None;
        let mut qr_code = None;
        match &transaction.owner {
            TransactionOwner::PaymentRequest { request_id } => {
                if let Some(req) = store.payment_requests.get_mut(request_id) {
                    req.status = RequestStatus::Completed;
                    req.completed_at = Some(now);
                    req.updated_at = now;
                    request = Some(req.clone());
                }
            }
            TransactionOwner::Participant {
                request_id,
                participant_id,
            } => {
                if let Some(participant) = store.participants.get_mut(participant_id) {
                    participant.has_paid = true;
                    participant.paid_amount = Some(transaction.amount);
                    participant.paid_at = Some(now);
                    participant.payment_method = Some(transaction.payment_method.clone());
                    participant.transaction_id = Some(transaction.id.clone());
                }
                request = store.refresh_request(request_id, now);
            }
            TransactionOwner::QrCode { qr_code_id } => {
                if let Some(code) = store.qr_codes.get_mut(qr_code_id) {
                    code.record_use();
                    qr_code = Some(code.clone());
                }
            }
        }

        store.transaction_ids_by_key.insert(key, transaction.id.clone());
        store
            .transactions
            .insert(transaction.id.clone(), transaction.clone());

        Ok(ReconciliationOutcome {
            transaction,
            receipt,
            request,
            qr_code,
            replayed: false,
        })
    }

    async fn commit_refund(
        &self,
        transaction_id: &str,
        debit: Option<WalletPosting>,
        now: DateTime<Utc>,
    ) -> Result<(Transaction, Option<LedgerReceipt>), PayError> {
        let mut guard = self.store.write().await;
        let store = &mut *guard;
        let transaction = store
            .transactions
            .get(transaction_id)
            .ok_or_else(|| PayError::TransactionNotFound(transaction_id.to_string()))?;
        if transaction.status != TransactionStatus::Completed {
            return Err(PayError::InvalidStateTransition {
                entity: format!("transaction {}", transaction_id),
                from: transaction.status.to_string(),
                to: TransactionStatus::Refunded.to_string(),
            });
        }
        let prepared = match &debit {
            Some(posting) => Some(store.prepare_posting(posting, now)?),
            None => None,
        };
        let receipt = prepared.map(|(wallet, entry)| store.apply_posting(wallet, entry));
        let transaction = store
            .transactions
            .get_mut(transaction_id)
            .ok_or_else(|| PayError::TransactionNotFound(transaction_id.to_string()))?;
        transaction.status = TransactionStatus::Refunded;
        transaction.updated_at = now;
        Ok((transaction.clone(), receipt))
    }

    async fn insert_settlement(&self, settlement: Settlement) -> Result<(), PayError> {
        let mut store = self.store.write().await;
        if store.settlement_references.contains(&settlement.reference) {
            return Err(PayError::Conflict(format!(
                "settlement reference {} already used",
                settlement.reference
            )));
        }
        store
            .settlement_references
            .insert(settlement.reference.clone());
        store.settlements.insert(settlement.id.clone(), settlement);
        Ok(())
    }

    async fn get_settlement(&self, settlement_id: &str) -> Result<Option<Settlement>, PayError> {
        let store = self.store.read().await;
        Ok(store.settlements.get(settlement_id).cloned())
    }

    async fn list_settlements(&self, merchant_id: &str) -> Result<Vec<Settlement>, PayError> {
        let store = self.store.read().await;
        let mut settlements: Vec<Settlement> = store
            .settlements
            .values()
            .filter(|s| s.merchant_id == merchant_id)
            .cloned()
            .collect();
        settlements.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(settlements)
    }

    async fn update_settlement(
        &self,
        settlement: Settlement,
        expected: SettlementStatus,
    ) -> Result<Settlement, PayError> {
        let mut store = self.store.write().await;
        let current = store
            .settlements
            .get_mut(&settlement.id)
            .ok_or_else(|| PayError::SettlementNotFound(settlement.id.clone()))?;
        if current.status != expected {
            return Err(PayError::InvalidStateTransition {
                entity: format!("settlement {}", settlement.id),
                from: current.status.to_string(),
                to: settlement.status.to_string(),
            });
        }
        *current = settlement.clone();
        Ok(settlement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::user::Role;
    use rust_decimal_macros::dec;

    fn user(id: &str) -> User {
        User {
            id: id.into(),
            name: "Ada".into(),
            email: format!("{}@example.com", id),
            password_hash: String::new(),
            preferred_currency: "NGN".into(),
            role: Role::User,
            created_at: Utc::now(),
        }
    }

    fn posting(user_id: &str, direction: Direction, amount: rust_decimal::Decimal) -> WalletPosting {
        WalletPosting {
            user_id: user_id.into(),
            direction,
            amount,
            currency: None,
            description: "test".into(),
            transaction_id: None,
            reference: ids::reference("T_"),
        }
    }

    #[tokio::test]
    async fn posting_creates_wallet_in_preferred_currency() {
        let storage = InMemoryStorage::new();
        storage.insert_user(user("u1")).await.unwrap();
        let receipt = storage
            .post_wallet_entry(posting("u1", Direction::Credit, dec!(150)), Utc::now())
            .await
            .unwrap();
        assert_eq!(receipt.new_balance(), dec!(150));
        assert_eq!(receipt.wallet.currency, "NGN");
        assert_eq!(receipt.entry.balance_after, dec!(150));
    }

    #[tokio::test]
    async fn posting_for_unknown_user_fails() {
        let storage = InMemoryStorage::new();
        let err = storage
            .post_wallet_entry(posting("ghost", Direction::Credit, dec!(1)), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, PayError::WalletNotFound(_)));
    }

    #[tokio::test]
    async fn overdraft_leaves_no_trace() {
        let storage = InMemoryStorage::new();
        storage.insert_user(user("u1")).await.unwrap();
        storage
            .post_wallet_entry(posting("u1", Direction::Credit, dec!(10)), Utc::now())
            .await
            .unwrap();
        let err = storage
            .post_wallet_entry(posting("u1", Direction::Debit, dec!(10.01)), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, PayError::InsufficientBalance { .. }));
        assert_eq!(storage.get_wallet_entries("u1").await.unwrap().len(), 1);
        assert_eq!(storage.get_wallet("u1").await.unwrap().unwrap().balance, dec!(10));
    }

    #[tokio::test]
    async fn duplicate_wallet_reference_is_a_conflict() {
        let storage = InMemoryStorage::new();
        storage.insert_user(user("u1")).await.unwrap();
        let mut first = posting("u1", Direction::Credit, dec!(5));
        first.reference = "CREDIT_SAME".into();
        let second = first.clone();
        storage.post_wallet_entry(first, Utc::now()).await.unwrap();
        let err = storage.post_wallet_entry(second, Utc::now()).await.unwrap_err();
        assert!(matches!(err, PayError::Conflict(_)));
    }

    #[tokio::test]
    async fn emails_are_unique_ignoring_case() {
        let storage = InMemoryStorage::new();
        storage.insert_user(user("u1")).await.unwrap();
        let mut dup = user("u2");
        dup.email = "U1@Example.com".into();
        let err = storage.insert_user(dup).await.unwrap_err();
        assert!(matches!(err, PayError::EmailAlreadyRegistered(_)));
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let storage = InMemoryStorage::new();
        storage.inject_commit_failures(2);
        assert!(storage.take_injected_failure());
        assert!(storage.take_injected_failure());
        assert!(!storage.take_injected_failure());
    }
}
