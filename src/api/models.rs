use axum::{Json, http::StatusCode, response::IntoResponse};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::core::errors::{ErrorKind, FieldError, PayError};
use crate::core::models::merchant::KycStatus;
use crate::core::models::settlement::SettlementType;
use crate::core::models::transaction::PayerDetails;
use crate::core::models::user::Role;

#[derive(Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub preferred_currency: Option<String>,
    /// Self-registration may pick `USER` or `MERCHANT`.
    pub role: Option<Role>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Deserialize, ToSchema)]
pub struct RegisterMerchantRequest {
    pub business_name: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateKycRequest {
    pub status: KycStatus,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateFeeRateRequest {
    pub settlement_fee_rate: Decimal,
}

#[derive(Serialize, ToSchema)]
pub struct ApiKeyResponse {
    pub api_key: String,
}

#[derive(Deserialize, ToSchema)]
pub struct PayRequest {
    pub amount: Decimal,
    #[serde(default)]
    pub tip_amount: Decimal,
    #[serde(default)]
    pub payer: PayerDetails,
}

#[derive(Deserialize, ToSchema)]
pub struct WithdrawRequest {
    pub amount: Decimal,
    pub account_name: String,
    pub account_number: String,
    pub bank_code: String,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateSettlementRequest {
    pub amount: Decimal,
    pub description: Option<String>,
    pub settlement_type: Option<SettlementType>,
}

#[derive(Deserialize, ToSchema)]
pub struct ReasonRequest {
    pub reason: String,
}

#[derive(Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
    pub transaction_id: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub details: Option<FieldError>,
}

// Newtype wrapper for PayError to implement IntoResponse
pub struct ApiError(pub PayError);

impl From<PayError> for ApiError {
    fn from(err: PayError) -> Self {
        ApiError(err)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::ValidationError | ErrorKind::InvalidStatus => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Expired | ErrorKind::QrCodeExpired => StatusCode::GONE,
        ErrorKind::AlreadyPaid | ErrorKind::Conflict | ErrorKind::QrCodeInactive => StatusCode::CONFLICT,
        ErrorKind::AmountMismatch | ErrorKind::InsufficientBalance | ErrorKind::UsageLimitReached => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ErrorKind::KycNotApproved | ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::GatewayError => StatusCode::BAD_GATEWAY,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = status_for(self.0.kind());
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let details = match &self.0 {
            PayError::InvalidInput(_, field) => Some(field.clone()),
            _ => None,
        };
        let body = ErrorResponse {
            error: self.0.to_string(),
            code: self.0.code().to_string(),
            details,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_distinct_statuses() {
        assert_eq!(status_for(ErrorKind::Expired), StatusCode::GONE);
        assert_eq!(status_for(ErrorKind::AlreadyPaid), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::AmountMismatch), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(ErrorKind::InsufficientBalance), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(ErrorKind::GatewayError), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
    }

    #[test]
    fn error_response_carries_machine_code() {
        let response = ApiError(PayError::ParticipantNotFound("p1".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
