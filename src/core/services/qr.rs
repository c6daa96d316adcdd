use super::PayService;
use super::requests::{ChargeIntent, PaymentInitiation};
use crate::core::constants::{
    MAX_DESCRIPTION_LENGTH, QR_CODE_CREATED, QR_CODE_DEACTIVATED, REFERENCE_ATTEMPTS,
};
use crate::core::errors::PayError;
use crate::core::ids;
use crate::core::models::payment_request::RequestKind;
use crate::core::models::qr_code::QrCode;
use crate::core::models::transaction::{PayerDetails, TransactionOwner};
use crate::core::models::user::{Role, User};
use crate::core::money;
use crate::core::permissions::{self, Permission};
use crate::infrastructure::gateway::GatewayClient;
use crate::infrastructure::logging::LoggingService;
use crate::infrastructure::notifier::Notifier;
use crate::infrastructure::storage::{LinkTarget, Storage};
use chrono::Duration;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct NewQrCode {
    pub description: String,
    /// Fixed price; open-amount codes leave this empty.
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub usage_limit: Option<u32>,
    pub expiry_hours: Option<i64>,
    pub kind: Option<RequestKind>,
}

impl<S: Storage, G: GatewayClient, N: Notifier, L: LoggingService> PayService<S, G, N, L> {
    pub async fn create_qr_code(&self, actor: &User, new: NewQrCode) -> Result<QrCode, PayError> {
        permissions::require(actor, Permission::ManageQrCodes)?;
        self.validate_string_input("description", &new.description, MAX_DESCRIPTION_LENGTH)?;
        if let Some(amount) = new.amount {
            money::ensure_positive("amount", amount)?;
        }
        if new.usage_limit == Some(0) {
            return Err(PayError::invalid("usage_limit", "Usage limit must be at least 1"));
        }
        let currency = self
            .collection_currency(new.currency.as_deref(), Some(actor))
            .await?;
        let now = self.clock.now();
        let expires_at = match new.expiry_hours {
            Some(h) if h <= 0 => {
                return Err(PayError::invalid("expiry_hours", "Expiry must be a positive number of hours"));
            }
            Some(h) => Some(now + Duration::hours(h)),
            None => None,
        };

        let mut last_err = PayError::InternalServerError("no insert attempt made".into());
        for _ in 0..REFERENCE_ATTEMPTS {
            let token = ids::hex_token();
            let pay_url = self.pay_url(&token);
            let qr_code = QrCode {
                id: ids::new_id(),
                owner_id: actor.id.clone(),
                kind: new.kind.unwrap_or(RequestKind::SinglePayer),
                description: new.description.trim().to_string(),
                amount: new.amount,
                currency: currency.clone(),
                usage_limit: new.usage_limit,
                usage_count: 0,
                expires_at,
                is_active: true,
                link_token: token,
                qr_image: self.renderer.render(&pay_url),
                pay_url,
                created_at: now,
            };
            match self.storage.insert_qr_code(qr_code.clone()).await {
                Ok(()) => {
                    self.log_and_audit(
                        QR_CODE_CREATED,
                        json!({
                            "qr_code_id": qr_code.id,
                            "amount": qr_code.amount.map(|a| a.to_string()),
                            "usage_limit": qr_code.usage_limit,
                        }),
                        Some(&actor.id),
                    )
                    .await?;
                    return Ok(qr_code);
                }
                Err(e @ PayError::Conflict(_)) => last_err = e,
                Err(e) => return Err(e),
            }
        }
        Err(last_err)
    }

    pub async fn get_qr_code(&self, qr_code_id: &str) -> Result<QrCode, PayError> {
        self.storage
            .get_qr_code(qr_code_id)
            .await?
            .ok_or_else(|| PayError::QrCodeNotFound(qr_code_id.to_string()))
    }

    pub async fn resolve_qr_code(&self, token: &str) -> Result<QrCode, PayError> {
        match self.storage.resolve_link(token).await? {
            Some(LinkTarget::QrCode(id)) => self.get_qr_code(&id).await,
            _ => Err(PayError::LinkNotFound(token.to_string())),
        }
    }

    pub async fn list_qr_codes(&self, actor: &User) -> Result<Vec<QrCode>, PayError> {
        self.storage.list_qr_codes(&actor.id).await
    }

    pub async fn deactivate_qr_code(&self, actor: &User, qr_code_id: &str) -> Result<QrCode, PayError> {
        permissions::require(actor, Permission::ManageQrCodes)?;
        let qr_code = self.get_qr_code(qr_code_id).await?;
        if actor.role != Role::Admin && qr_code.owner_id != actor.id {
            return Err(PayError::Forbidden(
                actor.id.clone(),
                format!("deactivate QR code {}", qr_code_id),
            ));
        }
        let qr_code = self.storage.deactivate_qr_code(qr_code_id).await?;
        self.log_and_audit(QR_CODE_DEACTIVATED, json!({ "qr_code_id": qr_code.id }), Some(&actor.id))
            .await?;
        Ok(qr_code)
    }

    /// Validates a scan and opens a charge against the code. Usage is only counted once the
    /// payment is reconciled.
    pub async fn initiate_qr_payment(
        &self,
        token: &str,
        amount: Decimal,
        tip: Decimal,
        payer: PayerDetails,
    ) -> Result<PaymentInitiation, PayError> {
        let qr_code = self.resolve_qr_code(token).await?;
        qr_code.check_usable(amount, self.clock.now())?;
        self.validate_tip(tip, true)?;

        self.open_charge(ChargeIntent {
            owner: TransactionOwner::QrCode {
                qr_code_id: qr_code.id.clone(),
            },
            amount: qr_code.amount.unwrap_or(amount),
            tip,
            currency: qr_code.currency.clone(),
            payer,
            beneficiary_id: Some(qr_code.owner_id.clone()),
        })
        .await
    }
}
