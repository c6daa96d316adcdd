use crate::core::errors::PayError;
use crate::core::models::payment_request::{NewParticipant, RequestKind, RequestStatus, SplitStrategy};
use crate::core::models::user::Role;
use crate::core::services::{NewGroupSplitRequest, NewSinglePayerRequest};
use crate::tests::{create_test_service, payer};
use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn participant(name: &str, email: Option<&str>, amount: Option<Decimal>) -> NewParticipant {
    NewParticipant {
        name: name.to_string(),
        email: email.map(String::from),
        phone: None,
        amount,
    }
}

fn dinner_split(strategy: SplitStrategy, participants: Vec<NewParticipant>) -> NewGroupSplitRequest {
    NewGroupSplitRequest {
        description: "Team dinner".to_string(),
        total_amount: dec!(75000),
        currency: Some("NGN".to_string()),
        participants,
        split_strategy: strategy,
        expiry_hours: Some(48),
        allow_tips: false,
    }
}

fn invoice(amount: Decimal, expiry_hours: Option<i64>, allow_tips: bool) -> NewSinglePayerRequest {
    NewSinglePayerRequest {
        description: "Logo design".to_string(),
        amount,
        currency: None,
        expiry_hours,
        allow_tips,
    }
}

#[tokio::test]
async fn test_group_split_equal_shares_progress_to_completed() {
    let ctx = create_test_service();
    let owner = ctx.user("host@example.com", Role::User).await;
    let details = ctx
        .service
        .create_group_split_request(
            Some(&owner),
            dinner_split(
                SplitStrategy::Equal,
                vec![
                    participant("Ada", Some("ada@example.com"), None),
                    participant("Grace", Some("grace@example.com"), None),
                    participant("Linus", None, None),
                ],
            ),
        )
        .await
        .unwrap();
    assert_eq!(details.request.kind, RequestKind::GroupSplit);
    assert_eq!(details.request.total_amount, Some(dec!(75000)));
    for p in &details.participants {
        assert_eq!(p.amount, dec!(25000.00));
    }
    // Only participants with an email are notified.
    assert_eq!(ctx.notifier.sent().await.len(), 2);

    let request_id = details.request.id.clone();
    for (i, p) in details.participants.iter().enumerate() {
        let initiation = ctx
            .service
            .record_participant_payment(&request_id, &p.id, p.amount, Default::default())
            .await
            .unwrap();
        ctx.service
            .verify_payment(&initiation.transaction.external_reference)
            .await
            .unwrap();

        let status = ctx.service.get_payment_request(&request_id).await.unwrap().request.status;
        if i < 2 {
            assert_eq!(status, RequestStatus::PartiallyPaid);
        } else {
            assert_eq!(status, RequestStatus::Completed);
        }
    }

    let details = ctx.service.get_payment_request(&request_id).await.unwrap();
    assert_eq!(details.paid_count(), 3);
    assert!(details.request.completed_at.is_some());
    let wallet = ctx.service.get_wallet(&owner.id).await.unwrap();
    assert_eq!(wallet.balance, dec!(75000));
}

#[tokio::test]
async fn test_equal_split_remainder_goes_to_last_participant() {
    let ctx = create_test_service();
    let mut new = dinner_split(
        SplitStrategy::Equal,
        vec![
            participant("A", None, None),
            participant("B", None, None),
            participant("C", None, None),
        ],
    );
    new.total_amount = dec!(100);
    let details = ctx.service.create_group_split_request(None, new).await.unwrap();
    let shares: Vec<Decimal> = details.participants.iter().map(|p| p.amount).collect();
    assert_eq!(shares, vec![dec!(33.33), dec!(33.33), dec!(33.34)]);
}

#[tokio::test]
async fn test_custom_split_must_add_up() {
    let ctx = create_test_service();
    let result = ctx
        .service
        .create_group_split_request(
            None,
            dinner_split(
                SplitStrategy::Custom,
                vec![
                    participant("A", None, Some(dec!(50000))),
                    participant("B", None, Some(dec!(20000))),
                ],
            ),
        )
        .await;
    assert!(matches!(result, Err(PayError::SplitMismatch { .. })));

    let details = ctx
        .service
        .create_group_split_request(
            None,
            dinner_split(
                SplitStrategy::Custom,
                vec![
                    participant("A", None, Some(dec!(50000))),
                    participant("B", None, Some(dec!(25000))),
                ],
            ),
        )
        .await
        .unwrap();
    assert_eq!(details.participants[0].amount, dec!(50000));
    assert_eq!(details.participants[1].amount, dec!(25000));
}

#[tokio::test]
async fn test_custom_split_needs_every_amount() {
    let ctx = create_test_service();
    let result = ctx
        .service
        .create_group_split_request(
            None,
            dinner_split(
                SplitStrategy::Custom,
                vec![participant("A", None, Some(dec!(75000))), participant("B", None, None)],
            ),
        )
        .await;
    assert!(matches!(result, Err(PayError::InvalidInput(..))));
}

#[tokio::test]
async fn test_group_split_needs_two_participants() {
    let ctx = create_test_service();
    let result = ctx
        .service
        .create_group_split_request(None, dinner_split(SplitStrategy::Equal, vec![participant("A", None, None)]))
        .await;
    assert!(matches!(result, Err(PayError::NotEnoughParticipants(1))));
}

#[tokio::test]
async fn test_request_expires_lazily() {
    let ctx = create_test_service();
    let owner = ctx.user("ada@example.com", Role::User).await;
    let request = ctx
        .service
        .create_single_payer_request(Some(&owner), invoice(dec!(25000), Some(1), false))
        .await
        .unwrap();
    assert_eq!(request.status, RequestStatus::Pending);

    ctx.clock.advance(Duration::hours(2));

    let read = ctx.service.get_payment_request(&request.id).await.unwrap();
    assert_eq!(read.request.status, RequestStatus::Expired);
    let listed = ctx.service.list_payment_requests(&owner).await.unwrap();
    assert_eq!(listed[0].status, RequestStatus::Expired);

    let result = ctx
        .service
        .initiate_request_payment(&request.id, dec!(25000), Decimal::ZERO, payer())
        .await;
    assert!(matches!(result, Err(PayError::Expired(_))));
    let result = ctx.service.resolve_by_link_token(&request.link_token).await;
    assert!(matches!(result, Err(PayError::Expired(_))));
}

#[tokio::test]
async fn test_completed_request_never_expires() {
    let ctx = create_test_service();
    let owner = ctx.user("ada@example.com", Role::User).await;
    let request = ctx
        .service
        .create_single_payer_request(Some(&owner), invoice(dec!(500), Some(1), false))
        .await
        .unwrap();
    let initiation = ctx
        .service
        .initiate_request_payment(&request.id, dec!(500), Decimal::ZERO, payer())
        .await
        .unwrap();
    ctx.service
        .verify_payment(&initiation.transaction.external_reference)
        .await
        .unwrap();

    ctx.clock.advance(Duration::hours(5));
    let read = ctx.service.get_payment_request(&request.id).await.unwrap();
    assert_eq!(read.request.status, RequestStatus::Completed);
}

#[tokio::test]
async fn test_paid_request_rejects_second_payment() {
    let ctx = create_test_service();
    let owner = ctx.user("ada@example.com", Role::User).await;
    let tx = ctx.collect(&owner, dec!(1500)).await;
    let request_id = match &tx.owner {
        crate::core::models::transaction::TransactionOwner::PaymentRequest { request_id } => request_id.clone(),
        other => panic!("unexpected owner {:?}", other),
    };
    let result = ctx
        .service
        .initiate_request_payment(&request_id, dec!(1500), Decimal::ZERO, payer())
        .await;
    assert!(matches!(result, Err(PayError::AlreadyPaid(_))));
}

#[tokio::test]
async fn test_amount_must_match_within_a_cent() {
    let ctx = create_test_service();
    let request = ctx
        .service
        .create_single_payer_request(None, invoice(dec!(1000), None, false))
        .await
        .unwrap();
    let result = ctx
        .service
        .initiate_request_payment(&request.id, dec!(999.98), Decimal::ZERO, payer())
        .await;
    assert!(matches!(result, Err(PayError::AmountMismatch { .. })));
    ctx.service
        .initiate_request_payment(&request.id, dec!(999.99), Decimal::ZERO, payer())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_tips_only_when_allowed() {
    let ctx = create_test_service();
    let owner = ctx.user("ada@example.com", Role::User).await;
    let strict = ctx
        .service
        .create_single_payer_request(Some(&owner), invoice(dec!(1000), None, false))
        .await
        .unwrap();
    let result = ctx
        .service
        .initiate_request_payment(&strict.id, dec!(1000), dec!(100), payer())
        .await;
    assert!(matches!(result, Err(PayError::InvalidInput(..))));

    let tipped = ctx
        .service
        .create_single_payer_request(Some(&owner), invoice(dec!(1000), None, true))
        .await
        .unwrap();
    let initiation = ctx
        .service
        .initiate_request_payment(&tipped.id, dec!(1000), dec!(100), payer())
        .await
        .unwrap();
    let tx = ctx
        .service
        .verify_payment(&initiation.transaction.external_reference)
        .await
        .unwrap();
    assert_eq!(tx.tip_amount, dec!(100));
    assert_eq!(tx.gross(), dec!(1100));
    assert_eq!(ctx.service.get_wallet(&owner.id).await.unwrap().balance, dec!(1100));
}

#[tokio::test]
async fn test_split_requests_are_paid_per_participant() {
    let ctx = create_test_service();
    let details = ctx
        .service
        .create_group_split_request(
            None,
            dinner_split(SplitStrategy::Equal, vec![participant("A", None, None), participant("B", None, None)]),
        )
        .await
        .unwrap();
    let result = ctx
        .service
        .initiate_request_payment(&details.request.id, dec!(75000), Decimal::ZERO, payer())
        .await;
    assert!(matches!(result, Err(PayError::InvalidInput(..))));
}

#[tokio::test]
async fn test_links_resolve_to_their_request() {
    let ctx = create_test_service();
    let details = ctx
        .service
        .create_group_split_request(
            None,
            dinner_split(SplitStrategy::Equal, vec![participant("A", None, None), participant("B", None, None)]),
        )
        .await
        .unwrap();
    assert!(details.request.pay_url.ends_with(&format!("/pay/{}", details.request.link_token)));
    assert!(details.request.qr_image.starts_with("data:"));

    let by_request = ctx.service.resolve_by_link_token(&details.request.link_token).await.unwrap();
    assert_eq!(by_request.request.id, details.request.id);
    let by_participant = ctx
        .service
        .resolve_by_link_token(&details.participants[1].link_token)
        .await
        .unwrap();
    assert_eq!(by_participant.request.id, details.request.id);

    let result = ctx.service.resolve_by_link_token("unknown").await;
    assert!(matches!(result, Err(PayError::LinkNotFound(_))));
}

#[tokio::test]
async fn test_participant_amount_and_double_payment_checks() {
    let ctx = create_test_service();
    let details = ctx
        .service
        .create_group_split_request(
            None,
            dinner_split(SplitStrategy::Equal, vec![participant("A", None, None), participant("B", None, None)]),
        )
        .await
        .unwrap();
    let request_id = &details.request.id;
    let first = &details.participants[0];

    let result = ctx
        .service
        .record_participant_payment(request_id, &first.id, dec!(30000), Default::default())
        .await;
    assert!(matches!(result, Err(PayError::AmountMismatch { .. })));

    let initiation = ctx
        .service
        .record_participant_payment(request_id, &first.id, first.amount, Default::default())
        .await
        .unwrap();
    assert_eq!(initiation.transaction.payer.name.as_deref(), Some("A"));
    ctx.service
        .verify_payment(&initiation.transaction.external_reference)
        .await
        .unwrap();

    let result = ctx
        .service
        .record_participant_payment(request_id, &first.id, first.amount, Default::default())
        .await;
    assert!(matches!(result, Err(PayError::AlreadyPaid(_))));

    let result = ctx
        .service
        .record_participant_payment(request_id, "missing", first.amount, Default::default())
        .await;
    assert!(matches!(result, Err(PayError::ParticipantNotFound(_))));
}

#[tokio::test]
async fn test_expired_partial_split_keeps_collected_funds() {
    let ctx = create_test_service();
    let owner = ctx.user("host@example.com", Role::User).await;
    let details = ctx
        .service
        .create_group_split_request(
            Some(&owner),
            dinner_split(SplitStrategy::Equal, vec![participant("A", None, None), participant("B", None, None)]),
        )
        .await
        .unwrap();
    let first = &details.participants[0];
    let initiation = ctx
        .service
        .record_participant_payment(&details.request.id, &first.id, first.amount, Default::default())
        .await
        .unwrap();
    ctx.service
        .verify_payment(&initiation.transaction.external_reference)
        .await
        .unwrap();

    ctx.clock.advance(Duration::hours(49));
    let read = ctx.service.get_payment_request(&details.request.id).await.unwrap();
    assert_eq!(read.request.status, RequestStatus::Expired);
    assert_eq!(ctx.service.get_wallet(&owner.id).await.unwrap().balance, dec!(37500));

    let second = &details.participants[1];
    let result = ctx
        .service
        .record_participant_payment(&details.request.id, &second.id, second.amount, Default::default())
        .await;
    assert!(matches!(result, Err(PayError::Expired(_))));
}

#[tokio::test]
async fn test_gateway_failure_leaves_no_pending_transaction() {
    let ctx = create_test_service();
    let request = ctx
        .service
        .create_single_payer_request(None, invoice(dec!(1000), None, false))
        .await
        .unwrap();
    ctx.gateway.set_charges_failing(true);
    let result = ctx
        .service
        .initiate_request_payment(&request.id, dec!(1000), Decimal::ZERO, payer())
        .await;
    assert!(matches!(result, Err(PayError::Gateway(_))));

    ctx.gateway.set_charges_failing(false);
    ctx.service
        .initiate_request_payment(&request.id, dec!(1000), Decimal::ZERO, payer())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_expiry_hours_validated() {
    let ctx = create_test_service();
    for hours in [0, -1, 24 * 91] {
        let result = ctx
            .service
            .create_single_payer_request(None, invoice(dec!(10), Some(hours), false))
            .await;
        assert!(matches!(result, Err(PayError::InvalidInput(..))), "{} hours accepted", hours);
    }
}

#[tokio::test]
async fn test_request_currency_follows_owner_wallet() {
    let ctx = create_test_service();
    let owner = ctx.user("ada@example.com", Role::User).await;
    ctx.collect(&owner, dec!(100)).await;

    let foreign = NewSinglePayerRequest {
        currency: Some("USD".to_string()),
        ..invoice(dec!(50), Some(24), false)
    };
    let result = ctx.service.create_single_payer_request(Some(&owner), foreign).await;
    assert!(matches!(result, Err(PayError::InvalidInput(ref field, _)) if field == "currency"));

    let split = NewGroupSplitRequest {
        currency: Some("USD".to_string()),
        ..dinner_split(
            SplitStrategy::Equal,
            vec![participant("Grace", None, None), participant("Linus", None, None)],
        )
    };
    let result = ctx.service.create_group_split_request(Some(&owner), split).await;
    assert!(matches!(result, Err(PayError::InvalidInput(ref field, _)) if field == "currency"));

    let request = ctx
        .service
        .create_single_payer_request(
            Some(&owner),
            NewSinglePayerRequest {
                currency: Some("ngn".to_string()),
                ..invoice(dec!(50), Some(24), false)
            },
        )
        .await
        .unwrap();
    assert_eq!(request.currency, "NGN");
    let initiation = ctx
        .service
        .initiate_request_payment(&request.id, dec!(50), Decimal::ZERO, payer())
        .await
        .unwrap();
    ctx.service
        .verify_payment(&initiation.transaction.external_reference)
        .await
        .unwrap();
    assert_eq!(ctx.service.get_wallet(&owner.id).await.unwrap().balance, dec!(150));
}

#[tokio::test]
async fn test_request_currency_defaults_to_existing_wallet() {
    let ctx = create_test_service();
    let owner = ctx.user("ada@example.com", Role::User).await;
    ctx.service
        .credit(&owner.id, dec!(10), Some("USD"), "Opening balance", None, None)
        .await
        .unwrap();

    let request = ctx
        .service
        .create_single_payer_request(Some(&owner), invoice(dec!(20), Some(24), false))
        .await
        .unwrap();
    assert_eq!(request.currency, "USD");
    let result = ctx
        .service
        .create_single_payer_request(
            Some(&owner),
            NewSinglePayerRequest {
                currency: Some("NGN".to_string()),
                ..invoice(dec!(20), Some(24), false)
            },
        )
        .await;
    assert!(matches!(result, Err(PayError::InvalidInput(ref field, _)) if field == "currency"));
}

#[tokio::test]
async fn test_split_shares_are_never_zero() {
    let ctx = create_test_service();
    let owner = ctx.user("host@example.com", Role::User).await;
    let guests = || {
        vec![
            participant("Ada", None, None),
            participant("Grace", None, None),
            participant("Linus", None, None),
        ]
    };

    let tiny = NewGroupSplitRequest {
        total_amount: dec!(0.02),
        ..dinner_split(SplitStrategy::Equal, guests())
    };
    let result = ctx.service.create_group_split_request(Some(&owner), tiny).await;
    assert!(matches!(result, Err(PayError::InvalidInput(ref field, _)) if field == "total_amount"));

    let smallest = NewGroupSplitRequest {
        total_amount: dec!(0.03),
        ..dinner_split(SplitStrategy::Equal, guests())
    };
    let details = ctx
        .service
        .create_group_split_request(Some(&owner), smallest)
        .await
        .unwrap();
    assert!(details.participants.iter().all(|p| p.amount == dec!(0.01)));

    let custom = NewGroupSplitRequest {
        total_amount: dec!(100),
        ..dinner_split(
            SplitStrategy::Custom,
            vec![
                participant("Ada", None, Some(dec!(100))),
                participant("Grace", None, Some(Decimal::ZERO)),
            ],
        )
    };
    let result = ctx.service.create_group_split_request(Some(&owner), custom).await;
    assert!(matches!(result, Err(PayError::InvalidInput(..))));
}
