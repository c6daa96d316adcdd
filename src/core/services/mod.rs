//! The payment service and its operations.
//!
//! `PayService` is split across files by area; every file adds an `impl` block to the
//! same type.

mod accounts;
mod ledger;
mod qr;
mod reconciliation;
mod requests;
mod settlement;

pub use ledger::Withdrawal;
pub use qr::NewQrCode;
pub use reconciliation::{
    PaymentConfirmation, WebhookCustomer, WebhookData, WebhookEvent, WebhookMetadata,
};
pub use requests::{NewGroupSplitRequest, NewSinglePayerRequest, PaymentInitiation};
pub use settlement::SettlementBalance;

use crate::auth::jwt::{Claims, JwtService};
use crate::core::clock::Clock;
use crate::core::errors::PayError;
use crate::core::models::audit::AppLog;
use crate::core::models::user::User;
use crate::core::permissions::{self, Permission};
use crate::infrastructure::gateway::GatewayClient;
use crate::infrastructure::locks::KeyedLocks;
use crate::infrastructure::logging::LoggingService;
use crate::infrastructure::notifier::Notifier;
use crate::infrastructure::qr::QrRenderer;
use crate::infrastructure::storage::Storage;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct ServiceSettings {
    /// Base for shareable links, without a trailing slash.
    pub public_base_url: String,
    pub default_currency: String,
    pub settlement_fee_rate: Decimal,
    pub bcrypt_cost: u32,
    pub reconcile_max_attempts: u32,
    pub reconcile_backoff: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        ServiceSettings {
            public_base_url: "http://localhost:8080".to_string(),
            default_currency: "NGN".to_string(),
            settlement_fee_rate: Decimal::new(2, 2),
            bcrypt_cost: bcrypt::DEFAULT_COST,
            reconcile_max_attempts: 3,
            reconcile_backoff: Duration::from_millis(50),
        }
    }
}

/// Collaborators the service is built from.
pub struct PayServiceParts<S, G, N, L> {
    pub storage: S,
    pub gateway: G,
    pub notifier: N,
    pub logging: L,
    pub clock: Arc<dyn Clock>,
    pub renderer: Arc<dyn QrRenderer>,
    pub jwt_secret: String,
    pub settings: ServiceSettings,
}

pub struct PayService<S: Storage, G: GatewayClient, N: Notifier, L: LoggingService> {
    storage: S,
    gateway: G,
    notifier: N,
    logging: L,
    clock: Arc<dyn Clock>,
    renderer: Arc<dyn QrRenderer>,
    jwt_service: JwtService,
    settings: ServiceSettings,
    reconcile_locks: KeyedLocks,
    settlement_locks: KeyedLocks,
}

impl<S: Storage, G: GatewayClient, N: Notifier, L: LoggingService> PayService<S, G, N, L> {
    pub fn new(parts: PayServiceParts<S, G, N, L>) -> Self {
        PayService {
            storage: parts.storage,
            gateway: parts.gateway,
            notifier: parts.notifier,
            logging: parts.logging,
            clock: parts.clock,
            renderer: parts.renderer,
            jwt_service: JwtService::new(parts.jwt_secret),
            settings: parts.settings,
            reconcile_locks: KeyedLocks::new(),
            settlement_locks: KeyedLocks::new(),
        }
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, PayError> {
        self.jwt_service.validate_token(token)
    }

    pub async fn get_app_logs(&self, actor: &User) -> Result<Vec<AppLog>, PayError> {
        permissions::require(actor, Permission::ViewAuditLog)?;
        self.logging.get_logs().await
    }

    async fn log_and_audit(
        &self,
        action: &str,
        details: serde_json::Value,
        user_id: Option<&str>,
    ) -> Result<(), PayError> {
        self.logging.log_action(action, details, user_id).await
    }

    fn validate_string_input(&self, field: &str, value: &str, max_length: usize) -> Result<(), PayError> {
        if value.trim().is_empty() {
            return Err(PayError::invalid(field, format!("{} cannot be empty", field)));
        }
        if value.chars().count() > max_length {
            return Err(PayError::invalid(
                field,
                format!("{} cannot exceed {} characters", field, max_length),
            ));
        }
        Ok(())
    }

    fn validate_currency(&self, currency: &str) -> Result<String, PayError> {
        let currency = currency.trim().to_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(PayError::invalid("currency", "Currency must be a 3-letter ISO code"));
        }
        Ok(currency)
    }

    fn pay_url(&self, token: &str) -> String {
        format!("{}/pay/{}", self.settings.public_base_url, token)
    }

    async fn require_user(&self, user_id: &str) -> Result<User, PayError> {
        self.storage
            .get_user(user_id)
            .await?
            .ok_or_else(|| PayError::UserNotFound(user_id.to_string()))
    }
}
