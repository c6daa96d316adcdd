// Audit log action names
pub const USER_REGISTERED: &str = "USER_REGISTERED";
pub const MERCHANT_REGISTERED: &str = "MERCHANT_REGISTERED";
pub const MERCHANT_BANK_ACCOUNT_UPDATED: &str = "MERCHANT_BANK_ACCOUNT_UPDATED";
pub const MERCHANT_KYC_UPDATED: &str = "MERCHANT_KYC_UPDATED";
pub const MERCHANT_FEE_RATE_UPDATED: &str = "MERCHANT_FEE_RATE_UPDATED";
pub const API_KEY_ISSUED: &str = "API_KEY_ISSUED";
pub const WALLET_CREDITED: &str = "WALLET_CREDITED";
pub const WALLET_DEBITED: &str = "WALLET_DEBITED";
pub const WITHDRAWAL_COMPLETED: &str = "WITHDRAWAL_COMPLETED";
pub const WITHDRAWAL_REVERSED: &str = "WITHDRAWAL_REVERSED";
pub const PAYMENT_REQUEST_CREATED: &str = "PAYMENT_REQUEST_CREATED";
pub const PAYMENT_INITIATED: &str = "PAYMENT_INITIATED";
pub const PAYMENT_RECONCILED: &str = "PAYMENT_RECONCILED";
pub const PAYMENT_REFUNDED: &str = "PAYMENT_REFUNDED";
pub const WEBHOOK_FAILURE_RECEIVED: &str = "WEBHOOK_FAILURE_RECEIVED";
pub const QR_CODE_CREATED: &str = "QR_CODE_CREATED";
pub const QR_CODE_DEACTIVATED: &str = "QR_CODE_DEACTIVATED";
pub const SETTLEMENT_REQUESTED: &str = "SETTLEMENT_REQUESTED";
pub const SETTLEMENT_APPROVED: &str = "SETTLEMENT_APPROVED";
pub const SETTLEMENT_REJECTED: &str = "SETTLEMENT_REJECTED";
pub const SETTLEMENT_COMPLETED: &str = "SETTLEMENT_COMPLETED";
pub const SETTLEMENT_FAILED: &str = "SETTLEMENT_FAILED";

// Reference prefixes
pub const CREDIT_PREFIX: &str = "CREDIT_";
pub const DEBIT_PREFIX: &str = "DEBIT_";
pub const WITHDRAWAL_PREFIX: &str = "WITHDRAWAL_";
pub const WITHDRAWAL_REVERSAL_PREFIX: &str = "WITHDRAWAL_REVERSAL_";
pub const REFUND_PREFIX: &str = "REFUND_";
pub const CHARGE_PREFIX: &str = "PAY_";
pub const SETTLEMENT_PREFIX: &str = "STL_";
pub const SETTLEMENT_RELEASE_PREFIX: &str = "STL_RELEASE_";
pub const API_KEY_PREFIX: &str = "pk_live_";

pub const MIN_SPLIT_PARTICIPANTS: usize = 2;
pub const MAX_DESCRIPTION_LENGTH: usize = 255;
pub const MAX_NAME_LENGTH: usize = 100;
pub const REFERENCE_ATTEMPTS: usize = 3;
