use super::payment_request::{Expiring, RequestKind};
use crate::core::errors::PayError;
use crate::core::money;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct QrCode {
    pub id: String,
    pub owner_id: String,
    pub kind: RequestKind,
    pub description: String,
    pub amount: Option<Decimal>,
    pub currency: String,
    pub usage_limit: Option<u32>,
    pub usage_count: u32,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub link_token: String,
    pub pay_url: String,
    pub qr_image: String,
    pub created_at: DateTime<Utc>,
}

impl Expiring for QrCode {
    fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

impl QrCode {
    pub fn limit_reached(&self) -> bool {
        self.usage_limit.is_some_and(|limit| self.usage_count >= limit)
    }

    /// Checks a payment of `amount` against this code; the first failing rule wins.
    pub fn check_usable(&self, amount: Decimal, now: DateTime<Utc>) -> Result<(), PayError> {
        if !self.is_active {
            return Err(PayError::QrCodeInactive(self.id.clone()));
        }
        if self.is_expired(now) {
            return Err(PayError::QrCodeExpired(self.id.clone()));
        }
        if self.limit_reached() {
            return Err(PayError::UsageLimitReached(self.id.clone()));
        }
        match self.amount {
            Some(fixed) if !money::within_tolerance(fixed, amount) => Err(PayError::invalid(
                "amount",
                format!("QR code expects exactly {}", fixed),
            )),
            Some(_) => Ok(()),
            None => money::ensure_positive("amount", amount),
        }
    }

    /// Counts one successful payment and switches the code off once the limit is hit.
    pub fn record_use(&mut self) {
        self.usage_count += 1;
        if self.limit_reached() {
            self.is_active = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ErrorKind;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn qr(amount: Option<Decimal>, usage_limit: Option<u32>) -> QrCode {
        QrCode {
            id: "qr1".into(),
            owner_id: "u1".into(),
            kind: RequestKind::SinglePayer,
            description: "Stall".into(),
            amount,
            currency: "NGN".into(),
            usage_limit,
            usage_count: 0,
            expires_at: None,
            is_active: true,
            link_token: "tok".into(),
            pay_url: String::new(),
            qr_image: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn inactive_wins_over_every_other_failure() {
        let mut code = qr(Some(dec!(500)), Some(1));
        code.usage_count = 1;
        code.is_active = false;
        code.expires_at = Some(Utc::now() - Duration::hours(1));
        let err = code.check_usable(dec!(1), Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QrCodeInactive);
    }

    #[test]
    fn expiry_is_checked_before_usage_limit() {
        let mut code = qr(None, Some(1));
        code.usage_count = 1;
        code.expires_at = Some(Utc::now() - Duration::hours(1));
        let err = code.check_usable(dec!(10), Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QrCodeExpired);
    }

    #[test]
    fn usage_limit_is_checked_before_amount() {
        let mut code = qr(Some(dec!(500)), Some(2));
        code.usage_count = 2;
        let err = code.check_usable(dec!(1), Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UsageLimitReached);
    }

    #[test]
    fn fixed_amount_must_match() {
        let code = qr(Some(dec!(500)), None);
        assert!(code.check_usable(dec!(500.00), Utc::now()).is_ok());
        let err = code.check_usable(dec!(450), Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[test]
    fn record_use_deactivates_at_limit() {
        let mut code = qr(None, Some(2));
        code.record_use();
        assert!(code.is_active);
        code.record_use();
        assert!(!code.is_active);
        assert_eq!(code.usage_count, 2);
    }
}
