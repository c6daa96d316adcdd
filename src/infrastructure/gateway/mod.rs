//! Payment gateway seam.
//!
//! The service never talks HTTP to a processor directly; it goes through [`GatewayClient`].
//! [`sandbox::SandboxGateway`] settles everything in-process.

pub mod sandbox;

use crate::core::errors::PayError;
use crate::core::models::merchant::BankAccount;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChargeRequest {
    /// Reference the charge is created under; echoed back by the processor.
    pub reference: String,
    pub amount: Decimal,
    pub currency: String,
    pub email: Option<String>,
    pub callback_url: Option<String>,
    pub metadata: serde_json::Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChargeInit {
    pub external_reference: String,
    pub redirect_url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChargeVerification {
    pub verified: bool,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub channel: Option<String>,
    pub raw_payload: serde_json::Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferRequest {
    pub reference: String,
    pub amount: Decimal,
    pub currency: String,
    pub bank_account: BankAccount,
    pub reason: String,
}

#[async_trait]
pub trait GatewayClient: Send + Sync {
    async fn initialize_charge(&self, request: ChargeRequest) -> Result<ChargeInit, PayError>;
    async fn verify_charge(&self, reference: &str) -> Result<ChargeVerification, PayError>;
    async fn refund_charge(&self, reference: &str, amount: Decimal) -> Result<String, PayError>;
    /// Pushes funds to a bank account and returns the processor's transfer reference.
    async fn initiate_transfer(&self, request: TransferRequest) -> Result<String, PayError>;
    fn provider(&self) -> &str;
}
