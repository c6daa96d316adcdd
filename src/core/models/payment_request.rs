//! Payment requests and their split participants.
//!
//! Status is stored as last written, but reads go through [`PaymentRequest::effective_status`]
//! so a request past its expiry reports `expired` without any background sweep.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    SinglePayer,
    GroupSplit,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    PartiallyPaid,
    Completed,
    Expired,
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RequestStatus::Pending => "pending",
            RequestStatus::PartiallyPaid => "partially_paid",
            RequestStatus::Completed => "completed",
            RequestStatus::Expired => "expired",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SplitStrategy {
    Equal,
    Custom,
}

/// Anything with an optional deadline checked lazily against a caller-supplied clock.
pub trait Expiring {
    fn expires_at(&self) -> Option<DateTime<Utc>>;

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|at| now > at)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentRequest {
    pub id: String,
    pub owner_id: Option<String>,
    pub kind: RequestKind,
    pub description: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: RequestStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub link_token: String,
    pub pay_url: String,
    pub qr_image: String,
    pub qr_code_id: Option<String>,
    pub allow_tips: bool,
    pub total_amount: Option<Decimal>,
    pub split_strategy: Option<SplitStrategy>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Expiring for PaymentRequest {
    fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    // A completed request keeps its status forever.
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status != RequestStatus::Completed && self.expires_at.is_some_and(|at| now > at)
    }
}

impl PaymentRequest {
    pub fn effective_status(&self, now: DateTime<Utc>) -> RequestStatus {
        if self.is_expired(now) {
            RequestStatus::Expired
        } else {
            self.status
        }
    }

    pub fn is_group_split(&self) -> bool {
        self.kind == RequestKind::GroupSplit
    }

    /// Copy of the request with its status resolved against `now`.
    pub fn as_of(&self, now: DateTime<Utc>) -> Self {
        PaymentRequest {
            status: self.effective_status(now),
            ..self.clone()
        }
    }
}

/// Status a split request should hold given how many of its participants have paid.
pub fn status_for_paid_count(paid: usize, total: usize) -> RequestStatus {
    if paid == 0 {
        RequestStatus::Pending
    } else if paid < total {
        RequestStatus::PartiallyPaid
    } else {
        RequestStatus::Completed
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Participant {
    pub id: String,
    pub payment_request_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub amount: Decimal,
    pub has_paid: bool,
    pub paid_amount: Option<Decimal>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<String>,
    pub transaction_id: Option<String>,
    pub link_token: String,
    pub pay_url: String,
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct NewParticipant {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Required for custom splits, ignored for equal ones.
    pub amount: Option<Decimal>,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct PaymentRequestDetails {
    pub request: PaymentRequest,
    pub participants: Vec<Participant>,
}

impl PaymentRequestDetails {
    pub fn paid_count(&self) -> usize {
        self.participants.iter().filter(|p| p.has_paid).count()
    }
}
