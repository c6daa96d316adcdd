pub mod in_memory;

use crate::core::errors::PayError;
use crate::core::models::audit::AppLog;
use async_trait::async_trait;

/// Append-only business audit trail.
#[async_trait]
pub trait LoggingService: Send + Sync {
    async fn log_action(
        &self,
        action: &str,
        details: serde_json::Value,
        user_id: Option<&str>,
    ) -> Result<(), PayError>;
    async fn get_logs(&self) -> Result<Vec<AppLog>, PayError>;
    async fn get_logs_for_action(&self, action: &str) -> Result<Vec<AppLog>, PayError>;
}
