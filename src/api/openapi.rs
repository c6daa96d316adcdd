use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::{
    api::models::{
        ApiKeyResponse, CreateSettlementRequest, CreateUserRequest, ErrorResponse, LoginRequest,
        LoginResponse, PayRequest, ReasonRequest, RegisterMerchantRequest, UpdateFeeRateRequest,
        UpdateKycRequest, WebhookAck, WithdrawRequest,
    },
    core::{
        errors::FieldError,
        models::{
            audit::AppLog,
            merchant::{BankAccount, KycStatus, Merchant},
            payment_request::{
                NewParticipant, Participant, PaymentRequest, PaymentRequestDetails, RequestKind,
                RequestStatus, SplitStrategy,
            },
            qr_code::QrCode,
            settlement::{Settlement, SettlementStatus, SettlementType},
            transaction::{PayerDetails, Transaction, TransactionOwner, TransactionStatus},
            user::{Role, User},
            wallet::{Direction, Wallet, WalletIntegrity, WalletTransaction},
        },
        services::{
            NewGroupSplitRequest, NewQrCode, NewSinglePayerRequest, PaymentInitiation,
            SettlementBalance, WebhookCustomer, WebhookData, WebhookEvent, WebhookMetadata,
            Withdrawal,
        },
    },
};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        super::handlers::login,
        super::handlers::create_user,
        super::handlers::get_me,
        super::handlers::register_merchant,
        super::handlers::get_merchant,
        super::handlers::update_bank_account,
        super::handlers::update_kyc,
        super::handlers::update_fee_rate,
        super::handlers::issue_api_key,
        super::handlers::get_available_balance,
        super::handlers::request_settlement,
        super::handlers::list_settlements,
        super::handlers::get_settlement,
        super::handlers::approve_settlement,
        super::handlers::reject_settlement,
        super::handlers::complete_settlement,
        super::handlers::fail_settlement,
        super::handlers::create_single_payer_request,
        super::handlers::create_group_split_request,
        super::handlers::list_payment_requests,
        super::handlers::get_payment_request,
        super::handlers::resolve_link,
        super::handlers::pay_request,
        super::handlers::pay_participant,
        super::handlers::resolve_qr_code,
        super::handlers::pay_qr_code,
        super::handlers::verify_payment,
        super::handlers::gateway_webhook,
        super::handlers::get_wallet,
        super::handlers::get_wallet_history,
        super::handlers::verify_wallet_integrity,
        super::handlers::withdraw,
        super::handlers::create_qr_code,
        super::handlers::list_qr_codes,
        super::handlers::deactivate_qr_code,
        super::handlers::refund_transaction,
        super::handlers::get_app_logs
    ),
    components(schemas(
        CreateUserRequest,
        LoginRequest,
        LoginResponse,
        RegisterMerchantRequest,
        UpdateKycRequest,
        UpdateFeeRateRequest,
        ApiKeyResponse,
        PayRequest,
        WithdrawRequest,
        CreateSettlementRequest,
        ReasonRequest,
        WebhookAck,
        ErrorResponse,
        FieldError,
        AppLog,
        BankAccount,
        KycStatus,
        Merchant,
        NewParticipant,
        Participant,
        PaymentRequest,
        PaymentRequestDetails,
        RequestKind,
        RequestStatus,
        SplitStrategy,
        QrCode,
        Settlement,
        SettlementStatus,
        SettlementType,
        PayerDetails,
        Transaction,
        TransactionOwner,
        TransactionStatus,
        Role,
        User,
        Direction,
        Wallet,
        WalletIntegrity,
        WalletTransaction,
        NewGroupSplitRequest,
        NewQrCode,
        NewSinglePayerRequest,
        PaymentInitiation,
        SettlementBalance,
        WebhookCustomer,
        WebhookData,
        WebhookEvent,
        WebhookMetadata,
        Withdrawal
    )),
    modifiers(&BearerAuth),
    info(
        title = "Paysplit API",
        description = "Payment requests, group splits, wallets and merchant settlements",
        version = "0.1.0"
    )
)]
pub struct ApiDoc;
