use crate::core::errors::PayError;
use crate::core::models::audit::AppLog;
use crate::infrastructure::logging::LoggingService;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Entries kept before the oldest are dropped.
pub const DEFAULT_RETENTION: usize = 10_000;

/// Process-local audit trail, oldest entry first, bounded by a retention count.
#[derive(Clone)]
pub struct InMemoryLogging {
    entries: Arc<RwLock<VecDeque<AppLog>>>,
    retention: usize,
}

impl Default for InMemoryLogging {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }
}

impl InMemoryLogging {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: usize) -> Self {
        InMemoryLogging {
            entries: Arc::new(RwLock::new(VecDeque::new())),
            retention: retention.max(1),
        }
    }
}

fn audit_details(details: serde_json::Value) -> Result<HashMap<String, serde_json::Value>, PayError> {
    match details {
        serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
        serde_json::Value::Null => Ok(HashMap::new()),
        other => Err(PayError::LoggingError(format!(
            "audit details must be a JSON object, got {}",
            other
        ))),
    }
}

#[async_trait]
impl LoggingService for InMemoryLogging {
    async fn log_action(
        &self,
        action: &str,
        details: serde_json::Value,
        user_id: Option<&str>,
    ) -> Result<(), PayError> {
        if action.trim().is_empty() {
            return Err(PayError::LoggingError("audit action is empty".to_string()));
        }
        let entry = AppLog {
            id: Uuid::new_v4().to_string(),
            action: action.to_string(),
            user_id: user_id.map(String::from),
            details: audit_details(details)?,
            timestamp: chrono::Utc::now(),
        };

        let mut entries = self.entries.write().await;
        if entries.len() == self.retention {
            entries.pop_front();
        }
        entries.push_back(entry);
        tracing::debug!(action, user_id, "audit entry recorded");
        Ok(())
    }

    async fn get_logs(&self) -> Result<Vec<AppLog>, PayError> {
        Ok(self.entries.read().await.iter().cloned().collect())
    }

    async fn get_logs_for_action(&self, action: &str) -> Result<Vec<AppLog>, PayError> {
        let entries = self.entries.read().await;
        Ok(entries.iter().filter(|log| log.action == action).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn filters_entries_by_action() {
        let logging = InMemoryLogging::new();
        logging
            .log_action("WALLET_CREDITED", json!({ "amount": "10.00" }), Some("u1"))
            .await
            .unwrap();
        logging
            .log_action("WALLET_DEBITED", json!({ "amount": "4.00" }), Some("u1"))
            .await
            .unwrap();

        let credited = logging.get_logs_for_action("WALLET_CREDITED").await.unwrap();
        assert_eq!(credited.len(), 1);
        assert_eq!(credited[0].details["amount"], json!("10.00"));
        assert_eq!(logging.get_logs().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn rejects_scalar_details_and_blank_actions() {
        let logging = InMemoryLogging::new();
        let err = logging.log_action("SETTLEMENT_REQUESTED", json!(42), None).await.unwrap_err();
        assert!(matches!(err, PayError::LoggingError(_)));
        let err = logging.log_action("  ", json!({}), None).await.unwrap_err();
        assert!(matches!(err, PayError::LoggingError(_)));

        logging.log_action("USER_LOGIN", serde_json::Value::Null, Some("u1")).await.unwrap();
        assert!(logging.get_logs().await.unwrap()[0].details.is_empty());
    }

    #[tokio::test]
    async fn retention_drops_oldest_entries() {
        let logging = InMemoryLogging::with_retention(2);
        for reference in ["PAY_1", "PAY_2", "PAY_3"] {
            logging
                .log_action("PAYMENT_RECONCILED", json!({ "reference": reference }), None)
                .await
                .unwrap();
        }
        let kept: Vec<_> = logging
            .get_logs()
            .await
            .unwrap()
            .into_iter()
            .map(|log| log.details["reference"].clone())
            .collect();
        assert_eq!(kept, vec![json!("PAY_2"), json!("PAY_3")]);
    }
}
