use crate::{
    api::models::*,
    auth::jwt::Claims,
    core::{
        errors::PayError,
        models::{
            audit::AppLog,
            merchant::{BankAccount, Merchant},
            payment_request::{PaymentRequest, PaymentRequestDetails},
            qr_code::QrCode,
            settlement::Settlement,
            transaction::Transaction,
            user::{Role, User},
            wallet::{Wallet, WalletIntegrity, WalletTransaction},
        },
        services::{
            NewGroupSplitRequest, NewQrCode, NewSinglePayerRequest, PayService, PaymentInitiation,
            SettlementBalance, WebhookEvent, Withdrawal,
        },
    },
    infrastructure::{
        gateway::sandbox::SandboxGateway, logging::in_memory::InMemoryLogging,
        notifier::LogNotifier, storage::in_memory::InMemoryStorage,
    },
};
use axum::{
    Extension, Json, Router,
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::IntoResponse,
    routing::{get, post, put},
};
use http::header;
use std::sync::Arc;

pub type AppService = PayService<InMemoryStorage, SandboxGateway, LogNotifier, InMemoryLogging>;
type AppState = State<Arc<AppService>>;

// Middleware to validate JWT
async fn auth_middleware(
    State(service): AppState,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| PayError::InvalidToken("Missing Authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| PayError::InvalidToken("Invalid Authorization header".to_string()))?;

    let claims = service.validate_token(token)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

async fn actor(service: &AppService, claims: &Claims) -> Result<User, PayError> {
    service.get_user(&claims.sub).await
}

pub fn api_routes(service: Arc<AppService>) -> Router {
    let protected_routes = Router::new()
        .route("/users/me", get(get_me))
        .route("/merchants", post(register_merchant))
        .route("/merchants/{merchant_id}", get(get_merchant))
        .route("/merchants/{merchant_id}/bank-account", put(update_bank_account))
        .route("/merchants/{merchant_id}/kyc", put(update_kyc))
        .route("/merchants/{merchant_id}/fee-rate", put(update_fee_rate))
        .route("/merchants/{merchant_id}/api-keys", post(issue_api_key))
        .route("/merchants/{merchant_id}/balance", get(get_available_balance))
        .route(
            "/merchants/{merchant_id}/settlements",
            post(request_settlement).get(list_settlements),
        )
        .route("/settlements/{settlement_id}", get(get_settlement))
        .route("/settlements/{settlement_id}/approve", post(approve_settlement))
        .route("/settlements/{settlement_id}/reject", post(reject_settlement))
        .route("/settlements/{settlement_id}/complete", post(complete_settlement))
        .route("/settlements/{settlement_id}/fail", post(fail_settlement))
        .route(
            "/payment-requests",
            post(create_single_payer_request).get(list_payment_requests),
        )
        .route("/payment-requests/split", post(create_group_split_request))
        .route("/wallet", get(get_wallet))
        .route("/wallet/history", get(get_wallet_history))
        .route("/wallet/integrity", get(verify_wallet_integrity))
        .route("/wallet/withdraw", post(withdraw))
        .route("/qr-codes", post(create_qr_code).get(list_qr_codes))
        .route("/qr-codes/{qr_code_id}/deactivate", post(deactivate_qr_code))
        .route("/transactions/{transaction_id}/refund", post(refund_transaction))
        .route("/logs", get(get_app_logs))
        .route_layer(middleware::from_fn_with_state(service.clone(), auth_middleware));

    Router::new()
        .route("/login", post(login))
        .route("/users", post(create_user))
        .route("/pay/{token}", get(resolve_link))
        .route("/payment-requests/{request_id}", get(get_payment_request))
        .route("/payment-requests/{request_id}/pay", post(pay_request))
        .route(
            "/payment-requests/{request_id}/participants/{participant_id}/pay",
            post(pay_participant),
        )
        .route("/qr/{token}", get(resolve_qr_code))
        .route("/qr/{token}/pay", post(pay_qr_code))
        .route("/payments/{reference}/verify", post(verify_payment))
        .route("/webhooks/gateway", post(gateway_webhook))
        .merge(protected_routes)
        .with_state(service)
}

#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
async fn login(State(service): AppState, Json(req): Json<LoginRequest>) -> Result<Json<LoginResponse>, ApiError> {
    let token = service.authenticate(&req.email, &req.password).await?;
    Ok(Json(LoginResponse { token }))
}

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    )
)]
async fn create_user(
    State(service): AppState,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let role = match req.role.unwrap_or(Role::User) {
        Role::Admin => return Err(PayError::invalid("role", "Admins cannot self-register").into()),
        role => role,
    };
    let user = service
        .register_user(
            &req.name,
            &req.email,
            &req.password,
            req.preferred_currency.as_deref(),
            role,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    get,
    path = "/api/users/me",
    responses((status = 200, description = "Authenticated user", body = User)),
    security(("Bearer" = []))
)]
async fn get_me(State(service): AppState, Extension(claims): Extension<Claims>) -> Result<Json<User>, ApiError> {
    Ok(Json(actor(&service, &claims).await?))
}

#[utoipa::path(
    post,
    path = "/api/merchants",
    request_body = RegisterMerchantRequest,
    responses(
        (status = 201, description = "Merchant registered", body = Merchant),
        (status = 409, description = "User already has a merchant profile", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn register_merchant(
    State(service): AppState,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RegisterMerchantRequest>,
) -> Result<(StatusCode, Json<Merchant>), ApiError> {
    let merchant = service.register_merchant(&claims.sub, &req.business_name).await?;
    Ok((StatusCode::CREATED, Json(merchant)))
}

#[utoipa::path(
    get,
    path = "/api/merchants/{merchant_id}",
    params(("merchant_id" = String, Path, description = "Merchant id")),
    responses(
        (status = 200, description = "Merchant", body = Merchant),
        (status = 404, description = "Merchant not found", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn get_merchant(State(service): AppState, Path(merchant_id): Path<String>) -> Result<Json<Merchant>, ApiError> {
    Ok(Json(service.get_merchant(&merchant_id).await?))
}

#[utoipa::path(
    put,
    path = "/api/merchants/{merchant_id}/bank-account",
    params(("merchant_id" = String, Path, description = "Merchant id")),
    request_body = BankAccount,
    responses(
        (status = 200, description = "Bank account updated", body = Merchant),
        (status = 403, description = "Not the merchant owner", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn update_bank_account(
    State(service): AppState,
    Extension(claims): Extension<Claims>,
    Path(merchant_id): Path<String>,
    Json(account): Json<BankAccount>,
) -> Result<Json<Merchant>, ApiError> {
    let actor = actor(&service, &claims).await?;
    Ok(Json(service.update_bank_account(&actor, &merchant_id, account).await?))
}

#[utoipa::path(
    put,
    path = "/api/merchants/{merchant_id}/kyc",
    params(("merchant_id" = String, Path, description = "Merchant id")),
    request_body = UpdateKycRequest,
    responses(
        (status = 200, description = "KYC status updated", body = Merchant),
        (status = 403, description = "Admin only", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn update_kyc(
    State(service): AppState,
    Extension(claims): Extension<Claims>,
    Path(merchant_id): Path<String>,
    Json(req): Json<UpdateKycRequest>,
) -> Result<Json<Merchant>, ApiError> {
    let actor = actor(&service, &claims).await?;
    Ok(Json(service.set_kyc_status(&actor, &merchant_id, req.status).await?))
}

#[utoipa::path(
    put,
    path = "/api/merchants/{merchant_id}/fee-rate",
    params(("merchant_id" = String, Path, description = "Merchant id")),
    request_body = UpdateFeeRateRequest,
    responses(
        (status = 200, description = "Fee rate updated", body = Merchant),
        (status = 403, description = "Admin only", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn update_fee_rate(
    State(service): AppState,
    Extension(claims): Extension<Claims>,
    Path(merchant_id): Path<String>,
    Json(req): Json<UpdateFeeRateRequest>,
) -> Result<Json<Merchant>, ApiError> {
    let actor = actor(&service, &claims).await?;
    Ok(Json(
        service
            .set_fee_rate(&actor, &merchant_id, req.settlement_fee_rate)
            .await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/merchants/{merchant_id}/api-keys",
    params(("merchant_id" = String, Path, description = "Merchant id")),
    responses(
        (status = 201, description = "Key issued; shown only once", body = ApiKeyResponse),
        (status = 403, description = "KYC not approved", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn issue_api_key(
    State(service): AppState,
    Extension(claims): Extension<Claims>,
    Path(merchant_id): Path<String>,
) -> Result<(StatusCode, Json<ApiKeyResponse>), ApiError> {
    let actor = actor(&service, &claims).await?;
    let api_key = service.issue_api_key(&actor, &merchant_id).await?;
    Ok((StatusCode::CREATED, Json(ApiKeyResponse { api_key })))
}

#[utoipa::path(
    get,
    path = "/api/merchants/{merchant_id}/balance",
    params(("merchant_id" = String, Path, description = "Merchant id")),
    responses((status = 200, description = "Settleable balance", body = SettlementBalance)),
    security(("Bearer" = []))
)]
async fn get_available_balance(
    State(service): AppState,
    Extension(claims): Extension<Claims>,
    Path(merchant_id): Path<String>,
) -> Result<Json<SettlementBalance>, ApiError> {
    let actor = actor(&service, &claims).await?;
    let merchant = service.get_merchant(&merchant_id).await?;
    if actor.role != Role::Admin && merchant.user_id != actor.id {
        return Err(PayError::Forbidden(actor.id, format!("view balance of {}", merchant_id)).into());
    }
    Ok(Json(service.compute_available_balance(&merchant_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/merchants/{merchant_id}/settlements",
    params(("merchant_id" = String, Path, description = "Merchant id")),
    request_body = CreateSettlementRequest,
    responses(
        (status = 201, description = "Settlement requested", body = Settlement),
        (status = 403, description = "KYC not approved", body = ErrorResponse),
        (status = 422, description = "Insufficient balance", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn request_settlement(
    State(service): AppState,
    Extension(claims): Extension<Claims>,
    Path(merchant_id): Path<String>,
    Json(req): Json<CreateSettlementRequest>,
) -> Result<(StatusCode, Json<Settlement>), ApiError> {
    let actor = actor(&service, &claims).await?;
    let settlement = service
        .request_settlement(&actor, &merchant_id, req.amount, req.description, req.settlement_type)
        .await?;
    Ok((StatusCode::CREATED, Json(settlement)))
}

#[utoipa::path(
    get,
    path = "/api/merchants/{merchant_id}/settlements",
    params(("merchant_id" = String, Path, description = "Merchant id")),
    responses((status = 200, description = "Settlements, newest first", body = Vec<Settlement>)),
    security(("Bearer" = []))
)]
async fn list_settlements(
    State(service): AppState,
    Extension(claims): Extension<Claims>,
    Path(merchant_id): Path<String>,
) -> Result<Json<Vec<Settlement>>, ApiError> {
    let actor = actor(&service, &claims).await?;
    Ok(Json(service.list_settlements(&actor, &merchant_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/settlements/{settlement_id}",
    params(("settlement_id" = String, Path, description = "Settlement id")),
    responses(
        (status = 200, description = "Settlement", body = Settlement),
        (status = 404, description = "Settlement not found", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn get_settlement(
    State(service): AppState,
    Path(settlement_id): Path<String>,
) -> Result<Json<Settlement>, ApiError> {
    Ok(Json(service.get_settlement(&settlement_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/settlements/{settlement_id}/approve",
    params(("settlement_id" = String, Path, description = "Settlement id")),
    responses(
        (status = 200, description = "Settlement processing", body = Settlement),
        (status = 400, description = "Not pending", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn approve_settlement(
    State(service): AppState,
    Extension(claims): Extension<Claims>,
    Path(settlement_id): Path<String>,
) -> Result<Json<Settlement>, ApiError> {
    let actor = actor(&service, &claims).await?;
    Ok(Json(service.approve_settlement(&actor, &settlement_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/settlements/{settlement_id}/reject",
    params(("settlement_id" = String, Path, description = "Settlement id")),
    request_body = ReasonRequest,
    responses((status = 200, description = "Settlement failed", body = Settlement)),
    security(("Bearer" = []))
)]
async fn reject_settlement(
    State(service): AppState,
    Extension(claims): Extension<Claims>,
    Path(settlement_id): Path<String>,
    Json(req): Json<ReasonRequest>,
) -> Result<Json<Settlement>, ApiError> {
    let actor = actor(&service, &claims).await?;
    Ok(Json(service.reject_settlement(&actor, &settlement_id, &req.reason).await?))
}

#[utoipa::path(
    post,
    path = "/api/settlements/{settlement_id}/complete",
    params(("settlement_id" = String, Path, description = "Settlement id")),
    responses((status = 200, description = "Settlement paid out", body = Settlement)),
    security(("Bearer" = []))
)]
async fn complete_settlement(
    State(service): AppState,
    Extension(claims): Extension<Claims>,
    Path(settlement_id): Path<String>,
) -> Result<Json<Settlement>, ApiError> {
    let actor = actor(&service, &claims).await?;
    Ok(Json(service.complete_settlement(&actor, &settlement_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/settlements/{settlement_id}/fail",
    params(("settlement_id" = String, Path, description = "Settlement id")),
    request_body = ReasonRequest,
    responses((status = 200, description = "Settlement failed", body = Settlement)),
    security(("Bearer" = []))
)]
async fn fail_settlement(
    State(service): AppState,
    Extension(claims): Extension<Claims>,
    Path(settlement_id): Path<String>,
    Json(req): Json<ReasonRequest>,
) -> Result<Json<Settlement>, ApiError> {
    let actor = actor(&service, &claims).await?;
    Ok(Json(service.fail_settlement(&actor, &settlement_id, &req.reason).await?))
}

#[utoipa::path(
    post,
    path = "/api/payment-requests",
    request_body = NewSinglePayerRequest,
    responses(
        (status = 201, description = "Payment request created", body = PaymentRequest),
        (status = 400, description = "Bad request", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn create_single_payer_request(
    State(service): AppState,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NewSinglePayerRequest>,
) -> Result<(StatusCode, Json<PaymentRequest>), ApiError> {
    let owner = actor(&service, &claims).await?;
    let request = service.create_single_payer_request(Some(&owner), req).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

#[utoipa::path(
    post,
    path = "/api/payment-requests/split",
    request_body = NewGroupSplitRequest,
    responses(
        (status = 201, description = "Split request created", body = PaymentRequestDetails),
        (status = 422, description = "Shares do not add up", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn create_group_split_request(
    State(service): AppState,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NewGroupSplitRequest>,
) -> Result<(StatusCode, Json<PaymentRequestDetails>), ApiError> {
    let owner = actor(&service, &claims).await?;
    let details = service.create_group_split_request(Some(&owner), req).await?;
    Ok((StatusCode::CREATED, Json(details)))
}

#[utoipa::path(
    get,
    path = "/api/payment-requests",
    responses((status = 200, description = "Requests owned by the caller", body = Vec<PaymentRequest>)),
    security(("Bearer" = []))
)]
async fn list_payment_requests(
    State(service): AppState,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<PaymentRequest>>, ApiError> {
    let owner = actor(&service, &claims).await?;
    Ok(Json(service.list_payment_requests(&owner).await?))
}

#[utoipa::path(
    get,
    path = "/api/payment-requests/{request_id}",
    params(("request_id" = String, Path, description = "Payment request id")),
    responses(
        (status = 200, description = "Request with participants", body = PaymentRequestDetails),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
async fn get_payment_request(
    State(service): AppState,
    Path(request_id): Path<String>,
) -> Result<Json<PaymentRequestDetails>, ApiError> {
    Ok(Json(service.get_payment_request(&request_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/pay/{token}",
    params(("token" = String, Path, description = "Request or participant link token")),
    responses(
        (status = 200, description = "Request behind the link", body = PaymentRequestDetails),
        (status = 404, description = "Unknown link", body = ErrorResponse),
        (status = 410, description = "Request expired", body = ErrorResponse)
    )
)]
async fn resolve_link(
    State(service): AppState,
    Path(token): Path<String>,
) -> Result<Json<PaymentRequestDetails>, ApiError> {
    Ok(Json(service.resolve_by_link_token(&token).await?))
}

#[utoipa::path(
    post,
    path = "/api/payment-requests/{request_id}/pay",
    params(("request_id" = String, Path, description = "Payment request id")),
    request_body = PayRequest,
    responses(
        (status = 201, description = "Charge opened", body = PaymentInitiation),
        (status = 409, description = "Already paid", body = ErrorResponse),
        (status = 410, description = "Expired", body = ErrorResponse),
        (status = 422, description = "Amount mismatch", body = ErrorResponse),
        (status = 502, description = "Gateway error", body = ErrorResponse)
    )
)]
async fn pay_request(
    State(service): AppState,
    Path(request_id): Path<String>,
    Json(req): Json<PayRequest>,
) -> Result<(StatusCode, Json<PaymentInitiation>), ApiError> {
    let initiation = service
        .initiate_request_payment(&request_id, req.amount, req.tip_amount, req.payer)
        .await?;
    Ok((StatusCode::CREATED, Json(initiation)))
}

#[utoipa::path(
    post,
    path = "/api/payment-requests/{request_id}/participants/{participant_id}/pay",
    params(
        ("request_id" = String, Path, description = "Payment request id"),
        ("participant_id" = String, Path, description = "Participant id")
    ),
    request_body = PayRequest,
    responses(
        (status = 201, description = "Charge opened", body = PaymentInitiation),
        (status = 409, description = "Already paid", body = ErrorResponse),
        (status = 410, description = "Expired", body = ErrorResponse),
        (status = 422, description = "Amount mismatch", body = ErrorResponse)
    )
)]
async fn pay_participant(
    State(service): AppState,
    Path((request_id, participant_id)): Path<(String, String)>,
    Json(req): Json<PayRequest>,
) -> Result<(StatusCode, Json<PaymentInitiation>), ApiError> {
    let initiation = service
        .record_participant_payment(&request_id, &participant_id, req.amount, req.payer)
        .await?;
    Ok((StatusCode::CREATED, Json(initiation)))
}

#[utoipa::path(
    get,
    path = "/api/qr/{token}",
    params(("token" = String, Path, description = "QR link token")),
    responses(
        (status = 200, description = "QR code", body = QrCode),
        (status = 404, description = "Unknown link", body = ErrorResponse)
    )
)]
async fn resolve_qr_code(State(service): AppState, Path(token): Path<String>) -> Result<Json<QrCode>, ApiError> {
    Ok(Json(service.resolve_qr_code(&token).await?))
}

#[utoipa::path(
    post,
    path = "/api/qr/{token}/pay",
    params(("token" = String, Path, description = "QR link token")),
    request_body = PayRequest,
    responses(
        (status = 201, description = "Charge opened", body = PaymentInitiation),
        (status = 409, description = "QR code inactive", body = ErrorResponse),
        (status = 410, description = "QR code expired", body = ErrorResponse),
        (status = 422, description = "Usage limit reached", body = ErrorResponse)
    )
)]
async fn pay_qr_code(
    State(service): AppState,
    Path(token): Path<String>,
    Json(req): Json<PayRequest>,
) -> Result<(StatusCode, Json<PaymentInitiation>), ApiError> {
    let initiation = service
        .initiate_qr_payment(&token, req.amount, req.tip_amount, req.payer)
        .await?;
    Ok((StatusCode::CREATED, Json(initiation)))
}

#[utoipa::path(
    post,
    path = "/api/payments/{reference}/verify",
    params(("reference" = String, Path, description = "Gateway charge reference")),
    responses(
        (status = 200, description = "Payment reconciled", body = Transaction),
        (status = 400, description = "Charge not successful", body = ErrorResponse),
        (status = 502, description = "Gateway error", body = ErrorResponse)
    )
)]
async fn verify_payment(
    State(service): AppState,
    Path(reference): Path<String>,
) -> Result<Json<Transaction>, ApiError> {
    Ok(Json(service.verify_payment(&reference).await?))
}

#[utoipa::path(
    post,
    path = "/api/webhooks/gateway",
    request_body = WebhookEvent,
    responses(
        (status = 200, description = "Event acknowledged", body = WebhookAck),
        (status = 400, description = "Unrecognized status", body = ErrorResponse)
    )
)]
async fn gateway_webhook(
    State(service): AppState,
    Json(event): Json<WebhookEvent>,
) -> Result<Json<WebhookAck>, ApiError> {
    let transaction = service.handle_webhook(event).await?;
    Ok(Json(WebhookAck {
        received: true,
        transaction_id: transaction.map(|tx| tx.id),
    }))
}

#[utoipa::path(
    get,
    path = "/api/wallet",
    responses(
        (status = 200, description = "Caller's wallet", body = Wallet),
        (status = 404, description = "No wallet yet", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn get_wallet(State(service): AppState, Extension(claims): Extension<Claims>) -> Result<Json<Wallet>, ApiError> {
    Ok(Json(service.get_wallet(&claims.sub).await?))
}

#[utoipa::path(
    get,
    path = "/api/wallet/history",
    responses((status = 200, description = "Ledger entries, newest first", body = Vec<WalletTransaction>)),
    security(("Bearer" = []))
)]
async fn get_wallet_history(
    State(service): AppState,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<WalletTransaction>>, ApiError> {
    Ok(Json(service.wallet_history(&claims.sub).await?))
}

#[utoipa::path(
    get,
    path = "/api/wallet/integrity",
    responses((status = 200, description = "Balance against ledger", body = WalletIntegrity)),
    security(("Bearer" = []))
)]
async fn verify_wallet_integrity(
    State(service): AppState,
    Extension(claims): Extension<Claims>,
) -> Result<Json<WalletIntegrity>, ApiError> {
    Ok(Json(service.verify_wallet_integrity(&claims.sub).await?))
}

#[utoipa::path(
    post,
    path = "/api/wallet/withdraw",
    request_body = WithdrawRequest,
    responses(
        (status = 200, description = "Withdrawal sent", body = Withdrawal),
        (status = 422, description = "Insufficient balance", body = ErrorResponse),
        (status = 502, description = "Transfer failed and was reversed", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn withdraw(
    State(service): AppState,
    Extension(claims): Extension<Claims>,
    Json(req): Json<WithdrawRequest>,
) -> Result<Json<Withdrawal>, ApiError> {
    let actor = actor(&service, &claims).await?;
    let account = BankAccount {
        account_name: req.account_name,
        account_number: req.account_number,
        bank_code: req.bank_code,
    };
    Ok(Json(service.withdraw(&actor, req.amount, account).await?))
}

#[utoipa::path(
    post,
    path = "/api/qr-codes",
    request_body = NewQrCode,
    responses((status = 201, description = "QR code created", body = QrCode)),
    security(("Bearer" = []))
)]
async fn create_qr_code(
    State(service): AppState,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NewQrCode>,
) -> Result<(StatusCode, Json<QrCode>), ApiError> {
    let actor = actor(&service, &claims).await?;
    Ok((StatusCode::CREATED, Json(service.create_qr_code(&actor, req).await?)))
}

#[utoipa::path(
    get,
    path = "/api/qr-codes",
    responses((status = 200, description = "Caller's QR codes", body = Vec<QrCode>)),
    security(("Bearer" = []))
)]
async fn list_qr_codes(
    State(service): AppState,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<QrCode>>, ApiError> {
    let actor = actor(&service, &claims).await?;
    Ok(Json(service.list_qr_codes(&actor).await?))
}

#[utoipa::path(
    post,
    path = "/api/qr-codes/{qr_code_id}/deactivate",
    params(("qr_code_id" = String, Path, description = "QR code id")),
    responses((status = 200, description = "QR code deactivated", body = QrCode)),
    security(("Bearer" = []))
)]
async fn deactivate_qr_code(
    State(service): AppState,
    Extension(claims): Extension<Claims>,
    Path(qr_code_id): Path<String>,
) -> Result<Json<QrCode>, ApiError> {
    let actor = actor(&service, &claims).await?;
    Ok(Json(service.deactivate_qr_code(&actor, &qr_code_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/transactions/{transaction_id}/refund",
    params(("transaction_id" = String, Path, description = "Transaction id")),
    request_body = ReasonRequest,
    responses(
        (status = 200, description = "Transaction refunded", body = Transaction),
        (status = 403, description = "Admin only", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn refund_transaction(
    State(service): AppState,
    Extension(claims): Extension<Claims>,
    Path(transaction_id): Path<String>,
    Json(req): Json<ReasonRequest>,
) -> Result<Json<Transaction>, ApiError> {
    let actor = actor(&service, &claims).await?;
    Ok(Json(
        service
            .refund_transaction(&actor, &transaction_id, &req.reason)
            .await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/logs",
    responses(
        (status = 200, description = "Audit log", body = Vec<AppLog>),
        (status = 403, description = "Admin only", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn get_app_logs(
    State(service): AppState,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<AppLog>>, ApiError> {
    let actor = actor(&service, &claims).await?;
    Ok(Json(service.get_app_logs(&actor).await?))
}
