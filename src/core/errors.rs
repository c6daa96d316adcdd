use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub title: String,
    pub description: String,
}

impl FieldError {
    pub fn new(field: &str, title: impl Into<String>, description: impl Into<String>) -> Self {
        FieldError {
            field: field.to_string(),
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Coarse error taxonomy callers map to status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ValidationError,
    NotFound,
    AlreadyPaid,
    Expired,
    AmountMismatch,
    InsufficientBalance,
    KycNotApproved,
    QrCodeInactive,
    QrCodeExpired,
    UsageLimitReached,
    InvalidStatus,
    GatewayError,
    Conflict,
    Unauthorized,
    Forbidden,
    Internal,
}

#[derive(Error, Debug, Clone, Serialize)]
pub enum PayError {
    /// Generic input validation error with detailed field information
    #[error("Invalid input for field `{0}`: {1:?}")]
    InvalidInput(String, FieldError),

    #[error("Invalid email format: {0}")]
    InvalidEmail(String),

    #[error("Email {0} already registered")]
    EmailAlreadyRegistered(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("User {0} lacks permission {1}")]
    Forbidden(String, String),

    #[error("User {0} not found")]
    UserNotFound(String),

    #[error("Wallet for user {0} not found")]
    WalletNotFound(String),

    #[error("Merchant {0} not found")]
    MerchantNotFound(String),

    #[error("Payment request {0} not found")]
    PaymentRequestNotFound(String),

    #[error("Participant {0} not found")]
    ParticipantNotFound(String),

    #[error("Transaction {0} not found")]
    TransactionNotFound(String),

    #[error("Settlement {0} not found")]
    SettlementNotFound(String),

    #[error("QR code {0} not found")]
    QrCodeNotFound(String),

    #[error("Link token {0} not found")]
    LinkNotFound(String),

    /// Group split needs at least two contributors
    #[error("Group split needs at least 2 participants, got {0}")]
    NotEnoughParticipants(usize),

    #[error("Split amounts sum to {sum} but total is {total}")]
    SplitMismatch { total: Decimal, sum: Decimal },

    #[error("Amount {received} does not match expected {expected}")]
    AmountMismatch { expected: Decimal, received: Decimal },

    #[error("{0} has already been paid")]
    AlreadyPaid(String),

    #[error("{0} has expired")]
    Expired(String),

    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: Decimal, requested: Decimal },

    #[error("Merchant {0} KYC is not approved")]
    KycNotApproved(String),

    #[error("Merchant {0} has no settlement bank account")]
    MissingBankAccount(String),

    #[error("QR code {0} is inactive")]
    QrCodeInactive(String),

    #[error("QR code {0} has expired")]
    QrCodeExpired(String),

    #[error("QR code {0} reached its usage limit")]
    UsageLimitReached(String),

    #[error("Unrecognized payment status: {0}")]
    InvalidStatus(String),

    #[error("Payment was not successful: {0}")]
    PaymentDeclined(String),

    #[error("{entity} cannot move from {from} to {to}")]
    InvalidStateTransition {
        entity: String,
        from: String,
        to: String,
    },

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Logging error: {0}")]
    LoggingError(String),

    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl PayError {
    pub fn invalid(field: &str, description: impl Into<String>) -> Self {
        let description = description.into();
        PayError::InvalidInput(
            field.to_string(),
            FieldError::new(field, format!("Invalid {}", field), description),
        )
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PayError::InvalidInput(..)
            | PayError::InvalidEmail(_)
            | PayError::NotEnoughParticipants(_)
            | PayError::MissingBankAccount(_)
            | PayError::PaymentDeclined(_)
            | PayError::InvalidStateTransition { .. } => ErrorKind::ValidationError,
            PayError::UserNotFound(_)
            | PayError::WalletNotFound(_)
            | PayError::MerchantNotFound(_)
            | PayError::PaymentRequestNotFound(_)
            | PayError::ParticipantNotFound(_)
            | PayError::TransactionNotFound(_)
            | PayError::SettlementNotFound(_)
            | PayError::QrCodeNotFound(_)
            | PayError::LinkNotFound(_) => ErrorKind::NotFound,
            PayError::SplitMismatch { .. } | PayError::AmountMismatch { .. } => {
                ErrorKind::AmountMismatch
            }
            PayError::AlreadyPaid(_) => ErrorKind::AlreadyPaid,
            PayError::Expired(_) => ErrorKind::Expired,
            PayError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            PayError::KycNotApproved(_) => ErrorKind::KycNotApproved,
            PayError::QrCodeInactive(_) => ErrorKind::QrCodeInactive,
            PayError::QrCodeExpired(_) => ErrorKind::QrCodeExpired,
            PayError::UsageLimitReached(_) => ErrorKind::UsageLimitReached,
            PayError::InvalidStatus(_) => ErrorKind::InvalidStatus,
            PayError::Gateway(_) => ErrorKind::GatewayError,
            PayError::Conflict(_) | PayError::EmailAlreadyRegistered(_) => ErrorKind::Conflict,
            PayError::InvalidCredentials | PayError::InvalidToken(_) => ErrorKind::Unauthorized,
            PayError::Forbidden(..) => ErrorKind::Forbidden,
            PayError::StorageError(_)
            | PayError::LoggingError(_)
            | PayError::InternalServerError(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            PayError::InvalidInput(..) => "VALIDATION_ERROR",
            PayError::InvalidEmail(_) => "INVALID_EMAIL",
            PayError::EmailAlreadyRegistered(_) => "EMAIL_ALREADY_REGISTERED",
            PayError::InvalidCredentials => "INVALID_CREDENTIALS",
            PayError::InvalidToken(_) => "INVALID_TOKEN",
            PayError::Forbidden(..) => "FORBIDDEN",
            PayError::UserNotFound(_) => "USER_NOT_FOUND",
            PayError::WalletNotFound(_) => "WALLET_NOT_FOUND",
            PayError::MerchantNotFound(_) => "MERCHANT_NOT_FOUND",
            PayError::PaymentRequestNotFound(_) => "PAYMENT_REQUEST_NOT_FOUND",
            PayError::ParticipantNotFound(_) => "PARTICIPANT_NOT_FOUND",
            PayError::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            PayError::SettlementNotFound(_) => "SETTLEMENT_NOT_FOUND",
            PayError::QrCodeNotFound(_) => "QR_CODE_NOT_FOUND",
            PayError::LinkNotFound(_) => "LINK_NOT_FOUND",
            PayError::NotEnoughParticipants(_) => "NOT_ENOUGH_PARTICIPANTS",
            PayError::SplitMismatch { .. } | PayError::AmountMismatch { .. } => "AMOUNT_MISMATCH",
            PayError::AlreadyPaid(_) => "ALREADY_PAID",
            PayError::Expired(_) => "EXPIRED",
            PayError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            PayError::KycNotApproved(_) => "KYC_NOT_APPROVED",
            PayError::MissingBankAccount(_) => "BANK_ACCOUNT_REQUIRED",
            PayError::QrCodeInactive(_) => "QR_CODE_INACTIVE",
            PayError::QrCodeExpired(_) => "QR_CODE_EXPIRED",
            PayError::UsageLimitReached(_) => "USAGE_LIMIT_REACHED",
            PayError::InvalidStatus(_) => "INVALID_STATUS",
            PayError::PaymentDeclined(_) => "PAYMENT_DECLINED",
            PayError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            PayError::Gateway(_) => "GATEWAY_ERROR",
            PayError::Conflict(_) => "CONFLICT",
            PayError::StorageError(_) => "STORAGE_ERROR",
            PayError::LoggingError(_) => "LOGGING_ERROR",
            PayError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Transient store failures that a caller may safely retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PayError::StorageError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn not_found_variants_share_a_kind_but_keep_their_codes() {
        let request = PayError::PaymentRequestNotFound("r1".into());
        let participant = PayError::ParticipantNotFound("p1".into());
        assert_eq!(request.kind(), ErrorKind::NotFound);
        assert_eq!(participant.kind(), ErrorKind::NotFound);
        assert_eq!(request.code(), "PAYMENT_REQUEST_NOT_FOUND");
        assert_eq!(participant.code(), "PARTICIPANT_NOT_FOUND");
    }

    #[test]
    fn split_mismatch_is_an_amount_mismatch() {
        let err = PayError::SplitMismatch {
            total: dec!(100),
            sum: dec!(90),
        };
        assert_eq!(err.kind(), ErrorKind::AmountMismatch);
        assert!(!err.is_retryable());
        assert!(PayError::StorageError("busy".into()).is_retryable());
    }
}
