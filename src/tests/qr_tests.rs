use crate::core::errors::PayError;
use crate::core::models::transaction::{PayerDetails, TransactionOwner, TransactionStatus};
use crate::core::models::user::Role;
use crate::core::services::{NewQrCode, PaymentConfirmation};
use crate::tests::{TestContext, create_test_service, payer};
use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn stall_code(amount: Option<Decimal>, usage_limit: Option<u32>, expiry_hours: Option<i64>) -> NewQrCode {
    NewQrCode {
        description: "Suya stall".to_string(),
        amount,
        currency: None,
        usage_limit,
        expiry_hours,
        kind: None,
    }
}

async fn pay(ctx: &TestContext, token: &str, amount: Decimal) -> Result<(), PayError> {
    let initiation = ctx
        .service
        .initiate_qr_payment(token, amount, Decimal::ZERO, payer())
        .await?;
    ctx.service
        .verify_payment(&initiation.transaction.external_reference)
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_usage_limit_deactivates_code() {
    let ctx = create_test_service();
    let owner = ctx.user("vendor@example.com", Role::Merchant).await;
    let code = ctx
        .service
        .create_qr_code(&owner, stall_code(Some(dec!(1500)), Some(2), None))
        .await
        .unwrap();
    assert!(code.is_active);
    assert_eq!(code.usage_count, 0);

    pay(&ctx, &code.link_token, dec!(1500)).await.unwrap();
    let after_one = ctx.service.get_qr_code(&code.id).await.unwrap();
    assert_eq!(after_one.usage_count, 1);
    assert!(after_one.is_active);

    pay(&ctx, &code.link_token, dec!(1500)).await.unwrap();
    let after_two = ctx.service.get_qr_code(&code.id).await.unwrap();
    assert_eq!(after_two.usage_count, 2);
    assert!(!after_two.is_active);

    // An inactive code is reported as inactive before its limit.
    let result = ctx
        .service
        .initiate_qr_payment(&code.link_token, dec!(1500), Decimal::ZERO, payer())
        .await;
    assert!(matches!(result, Err(PayError::QrCodeInactive(_))));

    assert_eq!(ctx.service.get_wallet(&owner.id).await.unwrap().balance, dec!(3000));
}

#[tokio::test]
async fn test_checks_run_in_order() {
    let ctx = create_test_service();
    let owner = ctx.user("vendor@example.com", Role::Merchant).await;
    let code = ctx
        .service
        .create_qr_code(&owner, stall_code(Some(dec!(500)), None, Some(1)))
        .await
        .unwrap();

    let result = ctx
        .service
        .initiate_qr_payment(&code.link_token, dec!(400), Decimal::ZERO, payer())
        .await;
    assert!(matches!(result, Err(PayError::InvalidInput(..))));

    ctx.clock.advance(Duration::hours(2));
    let result = ctx
        .service
        .initiate_qr_payment(&code.link_token, dec!(400), Decimal::ZERO, payer())
        .await;
    assert!(matches!(result, Err(PayError::QrCodeExpired(_))));

    ctx.service.deactivate_qr_code(&owner, &code.id).await.unwrap();
    let result = ctx
        .service
        .initiate_qr_payment(&code.link_token, dec!(400), Decimal::ZERO, payer())
        .await;
    assert!(matches!(result, Err(PayError::QrCodeInactive(_))));
}

#[tokio::test]
async fn test_open_amount_code_takes_payer_amount() {
    let ctx = create_test_service();
    let owner = ctx.user("vendor@example.com", Role::User).await;
    let code = ctx
        .service
        .create_qr_code(&owner, stall_code(None, None, None))
        .await
        .unwrap();

    let initiation = ctx
        .service
        .initiate_qr_payment(&code.link_token, dec!(725.50), dec!(50), payer())
        .await
        .unwrap();
    assert_eq!(initiation.transaction.amount, dec!(725.50));
    assert!(matches!(
        initiation.transaction.owner,
        TransactionOwner::QrCode { ref qr_code_id } if *qr_code_id == code.id
    ));
    let tx = ctx
        .service
        .verify_payment(&initiation.transaction.external_reference)
        .await
        .unwrap();
    assert_eq!(tx.status, TransactionStatus::Completed);
    assert_eq!(ctx.service.get_wallet(&owner.id).await.unwrap().balance, dec!(775.50));

    let result = ctx
        .service
        .initiate_qr_payment(&code.link_token, Decimal::ZERO, Decimal::ZERO, payer())
        .await;
    assert!(matches!(result, Err(PayError::InvalidInput(..))));
}

#[tokio::test]
async fn test_qr_tokens_do_not_resolve_as_requests() {
    let ctx = create_test_service();
    let owner = ctx.user("vendor@example.com", Role::User).await;
    let code = ctx
        .service
        .create_qr_code(&owner, stall_code(None, None, None))
        .await
        .unwrap();
    assert_eq!(ctx.service.resolve_qr_code(&code.link_token).await.unwrap().id, code.id);
    assert!(matches!(
        ctx.service.resolve_by_link_token(&code.link_token).await,
        Err(PayError::LinkNotFound(_))
    ));
    assert_eq!(ctx.service.list_qr_codes(&owner).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_only_owner_deactivates() {
    let ctx = create_test_service();
    let owner = ctx.user("vendor@example.com", Role::User).await;
    let stranger = ctx.user("stranger@example.com", Role::User).await;
    let admin = ctx.user("admin@example.com", Role::Admin).await;
    let code = ctx
        .service
        .create_qr_code(&owner, stall_code(None, None, None))
        .await
        .unwrap();

    assert!(matches!(
        ctx.service.deactivate_qr_code(&stranger, &code.id).await,
        Err(PayError::Forbidden(..))
    ));
    let code = ctx.service.deactivate_qr_code(&admin, &code.id).await.unwrap();
    assert!(!code.is_active);
}

#[tokio::test]
async fn test_zero_usage_limit_rejected() {
    let ctx = create_test_service();
    let owner = ctx.user("vendor@example.com", Role::User).await;
    let result = ctx
        .service
        .create_qr_code(&owner, stall_code(None, Some(0), None))
        .await;
    assert!(matches!(result, Err(PayError::InvalidInput(..))));
}

#[tokio::test]
async fn test_code_currency_must_match_owner_wallet() {
    let ctx = create_test_service();
    let owner = ctx.user("vendor@example.com", Role::Merchant).await;
    ctx.collect(&owner, dec!(100)).await;

    let result = ctx
        .service
        .create_qr_code(
            &owner,
            NewQrCode {
                currency: Some("USD".to_string()),
                ..stall_code(Some(dec!(1500)), None, None)
            },
        )
        .await;
    assert!(matches!(result, Err(PayError::InvalidInput(ref field, _)) if field == "currency"));

    let code = ctx
        .service
        .create_qr_code(&owner, stall_code(Some(dec!(1500)), None, None))
        .await
        .unwrap();
    assert_eq!(code.currency, "NGN");
    pay(&ctx, &code.link_token, dec!(1500)).await.unwrap();
    assert_eq!(ctx.service.get_wallet(&owner.id).await.unwrap().balance, dec!(1600));
}

#[tokio::test]
async fn test_fixed_price_code_rejects_short_confirmation() {
    let ctx = create_test_service();
    let owner = ctx.user("vendor@example.com", Role::Merchant).await;
    let code = ctx
        .service
        .create_qr_code(&owner, stall_code(Some(dec!(1500)), None, None))
        .await
        .unwrap();

    let result = ctx
        .service
        .reconcile(PaymentConfirmation {
            external_reference: "PAY_QR_SHORT".to_string(),
            status: "success".to_string(),
            owner: TransactionOwner::QrCode {
                qr_code_id: code.id.clone(),
            },
            amount: dec!(15),
            tip_amount: Decimal::ZERO,
            payment_method: None,
            payer: PayerDetails::default(),
            raw_payload: serde_json::Value::Null,
        })
        .await;
    assert!(matches!(result, Err(PayError::AmountMismatch { .. })));
    assert_eq!(ctx.service.get_qr_code(&code.id).await.unwrap().usage_count, 0);
}
