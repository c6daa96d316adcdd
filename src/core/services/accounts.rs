use super::PayService;
use crate::core::constants::{
    API_KEY_ISSUED, API_KEY_PREFIX, MAX_NAME_LENGTH, MERCHANT_BANK_ACCOUNT_UPDATED,
    MERCHANT_FEE_RATE_UPDATED, MERCHANT_KYC_UPDATED, MERCHANT_REGISTERED, USER_REGISTERED,
};
use crate::core::errors::PayError;
use crate::core::ids;
use crate::core::models::merchant::{BankAccount, KycStatus, Merchant};
use crate::core::models::settlement::SettlementType;
use crate::core::models::user::{Role, User};
use crate::core::permissions::{self, Permission};
use crate::infrastructure::gateway::GatewayClient;
use crate::infrastructure::logging::LoggingService;
use crate::infrastructure::notifier::Notifier;
use crate::infrastructure::storage::Storage;
use rust_decimal::Decimal;
use serde_json::json;

impl<S: Storage, G: GatewayClient, N: Notifier, L: LoggingService> PayService<S, G, N, L> {
    pub async fn register_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
        preferred_currency: Option<&str>,
        role: Role,
    ) -> Result<User, PayError> {
        let email = email.trim();
        if !email.contains('@') || !email.contains('.') || email.len() < 5 {
            return Err(PayError::InvalidEmail(email.to_string()));
        }
        if password.is_empty() {
            return Err(PayError::invalid("password", "Password cannot be empty"));
        }
        self.validate_string_input("name", name, MAX_NAME_LENGTH)?;
        let currency = self.validate_currency(
            preferred_currency.unwrap_or(&self.settings.default_currency),
        )?;
        if self.storage.get_user_by_email(email).await?.is_some() {
            return Err(PayError::EmailAlreadyRegistered(email.to_string()));
        }

        let user = User::with_password(
            name.trim().to_string(),
            email.to_string(),
            password,
            currency,
            role,
            self.settings.bcrypt_cost,
        )?;
        let user = self.storage.insert_user(user).await?;

        self.log_and_audit(
            USER_REGISTERED,
            json!({ "user_id": user.id, "email": user.email, "role": user.role }),
            Some(&user.id),
        )
        .await?;
        tracing::info!(user_id = %user.id, role = %user.role, "user registered");
        Ok(user)
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> Result<String, PayError> {
        let user = self
            .storage
            .get_user_by_email(email.trim())
            .await?
            .ok_or(PayError::InvalidCredentials)?;

        if user.verify_password(password)? {
            self.jwt_service.generate_token(&user.id, user.role)
        } else {
            Err(PayError::InvalidCredentials)
        }
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User, PayError> {
        self.require_user(user_id).await
    }

    pub async fn register_merchant(&self, user_id: &str, business_name: &str) -> Result<Merchant, PayError> {
        self.validate_string_input("business_name", business_name, MAX_NAME_LENGTH)?;
        self.require_user(user_id).await?;

        let merchant = Merchant {
            id: ids::new_id(),
            user_id: user_id.to_string(),
            business_name: business_name.trim().to_string(),
            kyc_status: KycStatus::Pending,
            bank_account: None,
            settlement_fee_rate: self.settings.settlement_fee_rate,
            settlement_type: SettlementType::NextDay,
            api_key_hash: None,
            created_at: self.clock.now(),
        };
        let merchant = self.storage.insert_merchant(merchant).await?;

        self.log_and_audit(
            MERCHANT_REGISTERED,
            json!({ "merchant_id": merchant.id, "business_name": merchant.business_name }),
            Some(user_id),
        )
        .await?;
        Ok(merchant)
    }

    pub async fn get_merchant(&self, merchant_id: &str) -> Result<Merchant, PayError> {
        self.storage
            .get_merchant(merchant_id)
            .await?
            .ok_or_else(|| PayError::MerchantNotFound(merchant_id.to_string()))
    }

    pub async fn get_merchant_for_user(&self, user_id: &str) -> Result<Merchant, PayError> {
        self.storage
            .get_merchant_by_user(user_id)
            .await?
            .ok_or_else(|| PayError::MerchantNotFound(format!("for user {}", user_id)))
    }

    /// Loads a merchant the actor may manage: its owner, or an admin.
    async fn managed_merchant(&self, actor: &User, merchant_id: &str) -> Result<Merchant, PayError> {
        let merchant = self.get_merchant(merchant_id).await?;
        if actor.role != Role::Admin {
            permissions::require(actor, Permission::ManageMerchantProfile)?;
            if merchant.user_id != actor.id {
                return Err(PayError::Forbidden(
                    actor.id.clone(),
                    format!("manage merchant {}", merchant_id),
                ));
            }
        }
        Ok(merchant)
    }

    pub async fn update_bank_account(
        &self,
        actor: &User,
        merchant_id: &str,
        account: BankAccount,
    ) -> Result<Merchant, PayError> {
        let mut merchant = self.managed_merchant(actor, merchant_id).await?;
        self.validate_string_input("account_name", &account.account_name, MAX_NAME_LENGTH)?;
        if account.account_number.len() < 6 || !account.account_number.chars().all(|c| c.is_ascii_digit()) {
            return Err(PayError::invalid("account_number", "Account number must be at least 6 digits"));
        }
        self.validate_string_input("bank_code", &account.bank_code, 16)?;

        merchant.bank_account = Some(account);
        let merchant = self.storage.update_merchant(merchant).await?;
        self.log_and_audit(
            MERCHANT_BANK_ACCOUNT_UPDATED,
            json!({ "merchant_id": merchant.id }),
            Some(&actor.id),
        )
        .await?;
        Ok(merchant)
    }

    pub async fn set_kyc_status(
        &self,
        actor: &User,
        merchant_id: &str,
        status: KycStatus,
    ) -> Result<Merchant, PayError> {
        permissions::require(actor, Permission::ReviewKyc)?;
        let mut merchant = self.get_merchant(merchant_id).await?;
        let previous = merchant.kyc_status;
        merchant.kyc_status = status;
        let merchant = self.storage.update_merchant(merchant).await?;
        self.log_and_audit(
            MERCHANT_KYC_UPDATED,
            json!({ "merchant_id": merchant.id, "from": previous, "to": status }),
            Some(&actor.id),
        )
        .await?;
        Ok(merchant)
    }

    /// Changes the fee applied to settlements requested from now on.
    pub async fn set_fee_rate(&self, actor: &User, merchant_id: &str, rate: Decimal) -> Result<Merchant, PayError> {
        permissions::require(actor, Permission::ManageFees)?;
        if rate < Decimal::ZERO || rate >= Decimal::ONE {
            return Err(PayError::invalid("settlement_fee_rate", "Fee rate must be in [0, 1)"));
        }
        let mut merchant = self.get_merchant(merchant_id).await?;
        merchant.settlement_fee_rate = rate;
        let merchant = self.storage.update_merchant(merchant).await?;
        self.log_and_audit(
            MERCHANT_FEE_RATE_UPDATED,
            json!({ "merchant_id": merchant.id, "rate": rate.to_string() }),
            Some(&actor.id),
        )
        .await?;
        Ok(merchant)
    }

    /// Returns a fresh live key once; only its hash is kept.
    pub async fn issue_api_key(&self, actor: &User, merchant_id: &str) -> Result<String, PayError> {
        let mut merchant = self.managed_merchant(actor, merchant_id).await?;
        if !merchant.is_kyc_approved() {
            return Err(PayError::KycNotApproved(merchant.id));
        }
        let key = format!("{}{}", API_KEY_PREFIX, ids::hex_token());
        let hash = bcrypt::hash(&key, self.settings.bcrypt_cost)
            .map_err(|e| PayError::InternalServerError(format!("API key hashing error: {}", e)))?;
        merchant.api_key_hash = Some(hash);
        let merchant = self.storage.update_merchant(merchant).await?;
        self.log_and_audit(API_KEY_ISSUED, json!({ "merchant_id": merchant.id }), Some(&actor.id))
            .await?;
        Ok(key)
    }

    pub async fn verify_api_key(&self, merchant_id: &str, key: &str) -> Result<bool, PayError> {
        let merchant = self.get_merchant(merchant_id).await?;
        match merchant.api_key_hash {
            Some(hash) => bcrypt::verify(key, &hash)
                .map_err(|e| PayError::InternalServerError(format!("API key verification error: {}", e))),
            None => Ok(false),
        }
    }
}
