use super::{ChargeInit, ChargeRequest, ChargeVerification, GatewayClient, TransferRequest};
use crate::core::errors::PayError;
use crate::core::ids;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// In-process gateway: every initialized charge verifies unless it was declined.
#[derive(Clone, Default)]
pub struct SandboxGateway {
    charges: Arc<RwLock<HashMap<String, ChargeRequest>>>,
    declined: Arc<RwLock<HashSet<String>>>,
    transfers: Arc<RwLock<Vec<TransferRequest>>>,
    refunds: Arc<RwLock<Vec<(String, Decimal)>>>,
    fail_charges: Arc<AtomicBool>,
    fail_transfers: Arc<AtomicBool>,
}

impl SandboxGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes later `verify_charge` calls for `reference` report an unsuccessful charge.
    pub async fn decline(&self, reference: &str) {
        self.declined.write().await.insert(reference.to_string());
    }

    pub fn set_charges_failing(&self, failing: bool) {
        self.fail_charges.store(failing, Ordering::SeqCst);
    }

    pub fn set_transfers_failing(&self, failing: bool) {
        self.fail_transfers.store(failing, Ordering::SeqCst);
    }

    pub async fn transfers(&self) -> Vec<TransferRequest> {
        self.transfers.read().await.clone()
    }

    pub async fn refunds(&self) -> Vec<(String, Decimal)> {
        self.refunds.read().await.clone()
    }
}

#[async_trait]
impl GatewayClient for SandboxGateway {
    async fn initialize_charge(&self, request: ChargeRequest) -> Result<ChargeInit, PayError> {
        if self.fail_charges.load(Ordering::SeqCst) {
            return Err(PayError::Gateway("charge initialization unavailable".into()));
        }
        let external_reference = request.reference.clone();
        let redirect_url = format!("https://checkout.sandbox.local/{}", external_reference);
        self.charges
            .write()
            .await
            .insert(external_reference.clone(), request);
        tracing::debug!(reference = %external_reference, "sandbox charge initialized");
        Ok(ChargeInit {
            external_reference,
            redirect_url,
        })
    }

    async fn verify_charge(&self, reference: &str) -> Result<ChargeVerification, PayError> {
        let charges = self.charges.read().await;
        let Some(charge) = charges.get(reference) else {
            return Ok(ChargeVerification {
                verified: false,
                amount: None,
                currency: None,
                channel: None,
                raw_payload: json!({ "reference": reference, "status": "not_found" }),
            });
        };
        let verified = !self.declined.read().await.contains(reference);
        let status = if verified { "success" } else { "failed" };
        Ok(ChargeVerification {
            verified,
            amount: Some(charge.amount),
            currency: Some(charge.currency.clone()),
            channel: Some("card".into()),
            raw_payload: json!({
                "reference": reference,
                "status": status,
                "amount": charge.amount.to_string(),
                "currency": charge.currency,
                "metadata": charge.metadata,
            }),
        })
    }

    async fn refund_charge(&self, reference: &str, amount: Decimal) -> Result<String, PayError> {
        if !self.charges.read().await.contains_key(reference) {
            return Err(PayError::Gateway(format!("unknown charge {}", reference)));
        }
        self.refunds
            .write()
            .await
            .push((reference.to_string(), amount));
        Ok(ids::reference("RFND_"))
    }

    async fn initiate_transfer(&self, request: TransferRequest) -> Result<String, PayError> {
        if self.fail_transfers.load(Ordering::SeqCst) {
            return Err(PayError::Gateway(format!(
                "transfer {} rejected by bank",
                request.reference
            )));
        }
        self.transfers.write().await.push(request);
        Ok(ids::reference("TRF_"))
    }

    fn provider(&self) -> &str {
        "sandbox"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn charge(reference: &str) -> ChargeRequest {
        ChargeRequest {
            reference: reference.into(),
            amount: dec!(2500),
            currency: "NGN".into(),
            email: None,
            callback_url: None,
            metadata: json!({}),
        }
    }

    #[tokio::test]
    async fn initialized_charge_verifies() {
        let gateway = SandboxGateway::new();
        let init = gateway.initialize_charge(charge("PAY_1")).await.unwrap();
        assert_eq!(init.external_reference, "PAY_1");
        let verification = gateway.verify_charge("PAY_1").await.unwrap();
        assert!(verification.verified);
        assert_eq!(verification.amount, Some(dec!(2500)));
    }

    #[tokio::test]
    async fn declined_and_unknown_charges_do_not_verify() {
        let gateway = SandboxGateway::new();
        gateway.initialize_charge(charge("PAY_2")).await.unwrap();
        gateway.decline("PAY_2").await;
        assert!(!gateway.verify_charge("PAY_2").await.unwrap().verified);
        assert!(!gateway.verify_charge("PAY_404").await.unwrap().verified);
    }

    #[tokio::test]
    async fn failing_charges_surface_gateway_errors() {
        let gateway = SandboxGateway::new();
        gateway.set_charges_failing(true);
        let err = gateway.initialize_charge(charge("PAY_3")).await.unwrap_err();
        assert!(matches!(err, PayError::Gateway(_)));
    }
}
