use super::PayService;
use crate::core::constants::{
    CHARGE_PREFIX, MAX_DESCRIPTION_LENGTH, MAX_NAME_LENGTH, MIN_SPLIT_PARTICIPANTS,
    PAYMENT_INITIATED, PAYMENT_REQUEST_CREATED, REFERENCE_ATTEMPTS,
};
use crate::core::errors::PayError;
use crate::core::ids;
use crate::core::models::payment_request::{
    Expiring, NewParticipant, Participant, PaymentRequest, PaymentRequestDetails, RequestKind,
    RequestStatus, SplitStrategy,
};
use crate::core::models::transaction::{PayerDetails, Transaction, TransactionOwner, TransactionStatus};
use crate::core::models::user::User;
use crate::core::money;
use crate::core::permissions::{self, Permission};
use crate::infrastructure::gateway::{ChargeRequest, GatewayClient};
use crate::infrastructure::logging::LoggingService;
use crate::infrastructure::notifier::{Notifier, PaymentRequestNotice, Recipient};
use crate::infrastructure::storage::{LinkTarget, Storage};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

const MAX_EXPIRY_HOURS: i64 = 24 * 90;

#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct NewSinglePayerRequest {
    pub description: String,
    pub amount: Decimal,
    pub currency: Option<String>,
    pub expiry_hours: Option<i64>,
    #[serde(default)]
    pub allow_tips: bool,
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct NewGroupSplitRequest {
    pub description: String,
    pub total_amount: Decimal,
    pub currency: Option<String>,
    pub participants: Vec<NewParticipant>,
    pub split_strategy: SplitStrategy,
    pub expiry_hours: Option<i64>,
    #[serde(default)]
    pub allow_tips: bool,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct PaymentInitiation {
    pub transaction: Transaction,
    pub redirect_url: String,
}

/// A charge about to be opened with the gateway.
pub(super) struct ChargeIntent {
    pub owner: TransactionOwner,
    pub amount: Decimal,
    pub tip: Decimal,
    pub currency: String,
    pub payer: PayerDetails,
    pub beneficiary_id: Option<String>,
}

impl<S: Storage, G: GatewayClient, N: Notifier, L: LoggingService> PayService<S, G, N, L> {
    fn expiry_from(&self, hours: Option<i64>, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, PayError> {
        match hours {
            None => Ok(None),
            Some(h) if h <= 0 || h > MAX_EXPIRY_HOURS => Err(PayError::invalid(
                "expiry_hours",
                format!("Expiry must be between 1 and {} hours", MAX_EXPIRY_HOURS),
            )),
            Some(h) => Ok(Some(now + Duration::hours(h))),
        }
    }

    /// Currency an owner collects in: the wallet's once one exists, the preferred one before.
    pub(super) async fn collection_currency(
        &self,
        requested: Option<&str>,
        owner: Option<&User>,
    ) -> Result<String, PayError> {
        let Some(owner) = owner else {
            return self.validate_currency(requested.unwrap_or(&self.settings.default_currency));
        };
        let wallet_currency = match self.storage.get_wallet(&owner.id).await? {
            Some(wallet) => wallet.currency,
            None => self.validate_currency(&owner.preferred_currency)?,
        };
        let Some(requested) = requested else {
            return Ok(wallet_currency);
        };
        let currency = self.validate_currency(requested)?;
        if !currency.eq_ignore_ascii_case(&wallet_currency) {
            return Err(PayError::invalid(
                "currency",
                format!("Payments to this account settle in {}", wallet_currency),
            ));
        }
        Ok(wallet_currency)
    }

    pub(super) fn validate_tip(&self, tip: Decimal, allowed: bool) -> Result<(), PayError> {
        if tip.is_zero() {
            return Ok(());
        }
        if !allowed {
            return Err(PayError::invalid("tip_amount", "Tips are not enabled for this payment"));
        }
        money::ensure_positive("tip_amount", tip)
    }

    pub async fn create_single_payer_request(
        &self,
        owner: Option<&User>,
        new: NewSinglePayerRequest,
    ) -> Result<PaymentRequest, PayError> {
        if let Some(user) = owner {
            permissions::require(user, Permission::CreatePaymentRequest)?;
        }
        self.validate_string_input("description", &new.description, MAX_DESCRIPTION_LENGTH)?;
        money::ensure_positive("amount", new.amount)?;
        let currency = self.collection_currency(new.currency.as_deref(), owner).await?;
        let now = self.clock.now();
        let expires_at = self.expiry_from(new.expiry_hours, now)?;

        let mut last_err = PayError::InternalServerError("no insert attempt made".into());
        for _ in 0..REFERENCE_ATTEMPTS {
            let token = ids::hex_token();
            let pay_url = self.pay_url(&token);
            let request = PaymentRequest {
                id: ids::new_id(),
                owner_id: owner.map(|u| u.id.clone()),
                kind: RequestKind::SinglePayer,
                description: new.description.trim().to_string(),
                amount: new.amount,
                currency: currency.clone(),
                status: RequestStatus::Pending,
                expires_at,
                link_token: token,
                qr_image: self.renderer.render(&pay_url),
                pay_url,
                qr_code_id: None,
                allow_tips: new.allow_tips,
                total_amount: None,
                split_strategy: None,
                created_at: now,
                updated_at: now,
                completed_at: None,
            };
            match self.storage.insert_payment_request(request.clone(), Vec::new()).await {
                Ok(()) => {
                    self.log_and_audit(
                        PAYMENT_REQUEST_CREATED,
                        json!({
                            "request_id": request.id,
                            "kind": request.kind,
                            "amount": request.amount.to_string(),
                            "currency": request.currency,
                        }),
                        request.owner_id.as_deref(),
                    )
                    .await?;
                    return Ok(request);
                }
                Err(e @ PayError::Conflict(_)) => last_err = e,
                Err(e) => return Err(e),
            }
        }
        Err(last_err)
    }

    /// Works out each participant's share; nothing is stored if the shares do not add up.
    fn split_amounts(
        &self,
        total: Decimal,
        participants: &[NewParticipant],
        strategy: SplitStrategy,
    ) -> Result<Vec<Decimal>, PayError> {
        let shares = match strategy {
            SplitStrategy::Equal => {
                if total < money::MINOR_UNIT * Decimal::from(participants.len()) {
                    return Err(PayError::invalid(
                        "total_amount",
                        format!(
                            "Total is too small to split between {} participants",
                            participants.len()
                        ),
                    ));
                }
                money::equal_shares(total, participants.len())
            }
            SplitStrategy::Custom => {
                let mut shares = Vec::with_capacity(participants.len());
                for (i, p) in participants.iter().enumerate() {
                    let amount = p.amount.ok_or_else(|| {
                        PayError::invalid(
                            "participants",
                            format!("Participant {} needs an amount for a custom split", i + 1),
                        )
                    })?;
                    money::ensure_positive("participants.amount", amount)?;
                    shares.push(amount);
                }
                shares
            }
        };
        let sum: Decimal = shares.iter().copied().sum();
        if !money::within_tolerance(total, sum) {
            return Err(PayError::SplitMismatch { total, sum });
        }
        Ok(shares)
    }

    pub async fn create_group_split_request(
        &self,
        owner: Option<&User>,
        new: NewGroupSplitRequest,
    ) -> Result<PaymentRequestDetails, PayError> {
        if let Some(user) = owner {
            permissions::require(user, Permission::CreatePaymentRequest)?;
        }
        self.validate_string_input("description", &new.description, MAX_DESCRIPTION_LENGTH)?;
        money::ensure_positive("total_amount", new.total_amount)?;
        if new.participants.len() < MIN_SPLIT_PARTICIPANTS {
            return Err(PayError::NotEnoughParticipants(new.participants.len()));
        }
        for p in &new.participants {
            self.validate_string_input("participants.name", &p.name, MAX_NAME_LENGTH)?;
        }
        let shares = self.split_amounts(new.total_amount, &new.participants, new.split_strategy)?;
        let currency = self.collection_currency(new.currency.as_deref(), owner).await?;
        let now = self.clock.now();
        let expires_at = self.expiry_from(new.expiry_hours, now)?;

        let mut last_err = PayError::InternalServerError("no insert attempt made".into());
        for _ in 0..REFERENCE_ATTEMPTS {
            let request_id = ids::new_id();
            let token = ids::hex_token();
            let pay_url = self.pay_url(&token);
            let request = PaymentRequest {
                id: request_id.clone(),
                owner_id: owner.map(|u| u.id.clone()),
                kind: RequestKind::GroupSplit,
                description: new.description.trim().to_string(),
                amount: new.total_amount,
                currency: currency.clone(),
                status: RequestStatus::Pending,
                expires_at,
                link_token: token,
                qr_image: self.renderer.render(&pay_url),
                pay_url,
                qr_code_id: None,
                allow_tips: new.allow_tips,
                total_amount: Some(new.total_amount),
                split_strategy: Some(new.split_strategy),
                created_at: now,
                updated_at: now,
                completed_at: None,
            };
            let participants: Vec<Participant> = new
                .participants
                .iter()
                .zip(&shares)
                .map(|(p, share)| {
                    let token = ids::hex_token();
                    Participant {
                        id: ids::new_id(),
                        payment_request_id: request_id.clone(),
                        name: p.name.trim().to_string(),
                        email: p.email.clone(),
                        phone: p.phone.clone(),
                        amount: *share,
                        has_paid: false,
                        paid_amount: None,
                        paid_at: None,
                        payment_method: None,
                        transaction_id: None,
                        pay_url: self.pay_url(&token),
                        link_token: token,
                    }
                })
                .collect();

            match self
                .storage
                .insert_payment_request(request.clone(), participants.clone())
                .await
            {
                Ok(()) => {
                    self.log_and_audit(
                        PAYMENT_REQUEST_CREATED,
                        json!({
                            "request_id": request.id,
                            "kind": request.kind,
                            "total_amount": new.total_amount.to_string(),
                            "participants": participants.len(),
                            "split_strategy": new.split_strategy,
                        }),
                        request.owner_id.as_deref(),
                    )
                    .await?;
                    self.notify_participants(&request, &participants).await;
                    return Ok(PaymentRequestDetails {
                        request,
                        participants,
                    });
                }
                Err(e @ PayError::Conflict(_)) => last_err = e,
                Err(e) => return Err(e),
            }
        }
        Err(last_err)
    }

    async fn notify_participants(&self, request: &PaymentRequest, participants: &[Participant]) {
        for participant in participants {
            let Some(email) = participant.email.clone() else {
                continue;
            };
            let notice = PaymentRequestNotice {
                recipient: Recipient {
                    name: participant.name.clone(),
                    email,
                },
                amount: participant.amount,
                currency: request.currency.clone(),
                description: request.description.clone(),
                pay_url: participant.pay_url.clone(),
                expires_at: request.expires_at,
            };
            if let Err(e) = self.notifier.send_payment_request_notice(notice).await {
                tracing::warn!(participant_id = %participant.id, error = %e, "payment request notice failed");
            }
        }
    }

    async fn load_request(&self, request_id: &str) -> Result<PaymentRequest, PayError> {
        self.storage
            .get_payment_request(request_id)
            .await?
            .ok_or_else(|| PayError::PaymentRequestNotFound(request_id.to_string()))
    }

    /// The request with its status as of now, plus its participants.
    pub async fn get_payment_request(&self, request_id: &str) -> Result<PaymentRequestDetails, PayError> {
        let request = self.load_request(request_id).await?;
        let participants = self.storage.get_participants(request_id).await?;
        Ok(PaymentRequestDetails {
            request: request.as_of(self.clock.now()),
            participants,
        })
    }

    pub async fn list_payment_requests(&self, owner: &User) -> Result<Vec<PaymentRequest>, PayError> {
        let now = self.clock.now();
        Ok(self
            .storage
            .list_payment_requests(&owner.id)
            .await?
            .into_iter()
            .map(|r| r.as_of(now))
            .collect())
    }

    /// Finds the request behind a request or participant link.
    pub async fn resolve_by_link_token(&self, token: &str) -> Result<PaymentRequestDetails, PayError> {
        let request_id = match self.storage.resolve_link(token).await? {
            Some(LinkTarget::PaymentRequest(id)) => id,
            Some(LinkTarget::Participant { request_id, .. }) => request_id,
            Some(LinkTarget::QrCode(_)) | None => return Err(PayError::LinkNotFound(token.to_string())),
        };
        let details = self.get_payment_request(&request_id).await?;
        if details.request.status == RequestStatus::Expired {
            return Err(PayError::Expired(format!("payment request {}", request_id)));
        }
        Ok(details)
    }

    pub async fn recalculate_status(&self, request_id: &str) -> Result<PaymentRequest, PayError> {
        let now = self.clock.now();
        let request = self.storage.recalculate_request_status(request_id, now).await?;
        Ok(request.as_of(now))
    }

    /// Starts a contributor's payment on a split request.
    pub async fn record_participant_payment(
        &self,
        request_id: &str,
        participant_id: &str,
        amount: Decimal,
        payer: PayerDetails,
    ) -> Result<PaymentInitiation, PayError> {
        let request = self.load_request(request_id).await?;
        let participant = self
            .storage
            .get_participant(participant_id)
            .await?
            .filter(|p| p.payment_request_id == request.id)
            .ok_or_else(|| PayError::ParticipantNotFound(participant_id.to_string()))?;
        if request.is_expired(self.clock.now()) {
            return Err(PayError::Expired(format!("payment request {}", request.id)));
        }
        if participant.has_paid {
            return Err(PayError::AlreadyPaid(format!("participant {}", participant.id)));
        }
        if !money::within_tolerance(participant.amount, amount) {
            return Err(PayError::AmountMismatch {
                expected: participant.amount,
                received: amount,
            });
        }

        let payer = PayerDetails {
            name: payer.name.or_else(|| Some(participant.name.clone())),
            email: payer.email.or_else(|| participant.email.clone()),
            phone: payer.phone.or_else(|| participant.phone.clone()),
            user_id: payer.user_id,
        };
        self.open_charge(ChargeIntent {
            owner: TransactionOwner::Participant {
                request_id: request.id.clone(),
                participant_id: participant.id.clone(),
            },
            amount: participant.amount,
            tip: Decimal::ZERO,
            currency: request.currency.clone(),
            payer,
            beneficiary_id: request.owner_id.clone(),
        })
        .await
    }

    /// Starts the single payment of a pay-for-me request.
    pub async fn initiate_request_payment(
        &self,
        request_id: &str,
        amount: Decimal,
        tip: Decimal,
        payer: PayerDetails,
    ) -> Result<PaymentInitiation, PayError> {
        let request = self.load_request(request_id).await?;
        if request.is_group_split() {
            return Err(PayError::invalid(
                "request_id",
                "Split requests are paid per participant",
            ));
        }
        if request.is_expired(self.clock.now()) {
            return Err(PayError::Expired(format!("payment request {}", request.id)));
        }
        if request.status == RequestStatus::Completed {
            return Err(PayError::AlreadyPaid(format!("payment request {}", request.id)));
        }
        if !money::within_tolerance(request.amount, amount) {
            return Err(PayError::AmountMismatch {
                expected: request.amount,
                received: amount,
            });
        }
        self.validate_tip(tip, request.allow_tips)?;

        self.open_charge(ChargeIntent {
            owner: TransactionOwner::PaymentRequest {
                request_id: request.id.clone(),
            },
            amount: request.amount,
            tip,
            currency: request.currency.clone(),
            payer,
            beneficiary_id: request.owner_id.clone(),
        })
        .await
    }

    /// Opens a gateway charge and records the pending transaction. A gateway failure leaves
    /// nothing behind.
    pub(super) async fn open_charge(&self, intent: ChargeIntent) -> Result<PaymentInitiation, PayError> {
        let reference = ids::reference(CHARGE_PREFIX);
        let metadata = match &intent.owner {
            TransactionOwner::PaymentRequest { request_id } => {
                json!({ "payment_request_id": request_id, "tip_amount": intent.tip.to_string() })
            }
            TransactionOwner::Participant {
                request_id,
                participant_id,
            } => json!({
                "payment_request_id": request_id,
                "participant_id": participant_id,
                "tip_amount": intent.tip.to_string(),
            }),
            TransactionOwner::QrCode { qr_code_id } => {
                json!({ "qr_code_id": qr_code_id, "tip_amount": intent.tip.to_string() })
            }
        };
        let init = self
            .gateway
            .initialize_charge(ChargeRequest {
                reference,
                amount: intent.amount + intent.tip,
                currency: intent.currency.clone(),
                email: intent.payer.email.clone(),
                callback_url: Some(format!("{}/payments/callback", self.settings.public_base_url)),
                metadata: metadata.clone(),
            })
            .await?;

        let now = self.clock.now();
        let transaction = Transaction {
            id: ids::new_id(),
            external_reference: init.external_reference.clone(),
            owner: intent.owner,
            payer: intent.payer,
            amount: intent.amount,
            tip_amount: intent.tip,
            currency: intent.currency,
            payment_method: "pending".to_string(),
            provider: self.gateway.provider().to_string(),
            status: TransactionStatus::Pending,
            beneficiary_id: intent.beneficiary_id,
            gateway_response: metadata,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        self.storage.insert_transaction(transaction.clone()).await?;

        self.log_and_audit(
            PAYMENT_INITIATED,
            json!({
                "transaction_id": transaction.id,
                "reference": transaction.external_reference,
                "owner": transaction.owner,
                "amount": transaction.gross().to_string(),
            }),
            transaction.payer.user_id.as_deref(),
        )
        .await?;
        tracing::info!(reference = %transaction.external_reference, "payment initiated");

        Ok(PaymentInitiation {
            transaction,
            redirect_url: init.redirect_url,
        })
    }
}
