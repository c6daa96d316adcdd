mod payment_request_tests;
mod qr_tests;

use crate::core::clock::ManualClock;
use crate::core::models::merchant::{BankAccount, KycStatus, Merchant};
use crate::core::models::transaction::{PayerDetails, Transaction};
use crate::core::models::user::{Role, User};
use crate::core::services::{NewSinglePayerRequest, PayService, PayServiceParts, ServiceSettings};
use crate::infrastructure::gateway::sandbox::SandboxGateway;
use crate::infrastructure::logging::in_memory::InMemoryLogging;
use crate::infrastructure::notifier::LogNotifier;
use crate::infrastructure::qr::DataUriRenderer;
use crate::infrastructure::storage::in_memory::InMemoryStorage;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

pub type TestService = PayService<InMemoryStorage, SandboxGateway, LogNotifier, InMemoryLogging>;

/// The service plus handles on its collaborators, shared with the service by `Arc`.
pub struct TestContext {
    pub service: Arc<TestService>,
    pub storage: InMemoryStorage,
    pub gateway: SandboxGateway,
    pub notifier: LogNotifier,
    pub logging: InMemoryLogging,
    pub clock: ManualClock,
}

pub fn create_test_service() -> TestContext {
    let storage = InMemoryStorage::new();
    let gateway = SandboxGateway::new();
    let notifier = LogNotifier::new();
    let logging = InMemoryLogging::new();
    // A Wednesday, so same-day settlements complete today.
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 5, 10, 0, 0).unwrap());
    let service = PayService::new(PayServiceParts {
        storage: storage.clone(),
        gateway: gateway.clone(),
        notifier: notifier.clone(),
        logging: logging.clone(),
        clock: Arc::new(clock.clone()),
        renderer: Arc::new(DataUriRenderer),
        jwt_secret: "test-secret".to_string(),
        settings: ServiceSettings {
            bcrypt_cost: 4, // bcrypt::MIN_COST (private in the bcrypt crate)
            reconcile_backoff: Duration::from_millis(1),
            ..ServiceSettings::default()
        },
    });
    TestContext {
        service: Arc::new(service),
        storage,
        gateway,
        notifier,
        logging,
        clock,
    }
}

impl TestContext {
    pub async fn user(&self, email: &str, role: Role) -> User {
        self.service
            .register_user("Test User", email, "password123", None, role)
            .await
            .unwrap()
    }

    /// A merchant with approved KYC and a bank account on file, plus its owning user and an admin.
    pub async fn approved_merchant(&self) -> (User, Merchant, User) {
        let owner = self.user("merchant@example.com", Role::Merchant).await;
        let admin = self.user("admin@example.com", Role::Admin).await;
        let merchant = self
            .service
            .register_merchant(&owner.id, "Ada's Kitchen")
            .await
            .unwrap();
        self.service
            .update_bank_account(&owner, &merchant.id, bank_account())
            .await
            .unwrap();
        let merchant = self
            .service
            .set_kyc_status(&admin, &merchant.id, KycStatus::Approved)
            .await
            .unwrap();
        (owner, merchant, admin)
    }

    /// Creates a pay-for-me request owned by `owner` and drives it to a completed payment.
    pub async fn collect(&self, owner: &User, amount: Decimal) -> Transaction {
        let request = self
            .service
            .create_single_payer_request(
                Some(owner),
                NewSinglePayerRequest {
                    description: "Invoice".to_string(),
                    amount,
                    currency: None,
                    expiry_hours: None,
                    allow_tips: false,
                },
            )
            .await
            .unwrap();
        let initiation = self
            .service
            .initiate_request_payment(&request.id, amount, Decimal::ZERO, payer())
            .await
            .unwrap();
        self.service
            .verify_payment(&initiation.transaction.external_reference)
            .await
            .unwrap()
    }
}

pub fn bank_account() -> BankAccount {
    BankAccount {
        account_name: "Ada Lovelace".to_string(),
        account_number: "0123456789".to_string(),
        bank_code: "058".to_string(),
    }
}

pub fn payer() -> PayerDetails {
    PayerDetails {
        user_id: None,
        name: Some("Grace Hopper".to_string()),
        email: Some("grace@example.com".to_string()),
        phone: None,
    }
}
