//! Outcome notifier that writes outcomes to the tracing pipeline.
//!
//! Useful wherever no chat or mail channel is wired up, such as local runs
//! and tests.

use async_trait::async_trait;
use tracing::info;

use crate::domain::UserId;
use crate::domain::ports::{OutcomeNotifier, OutcomeNotifierError};

/// Logs every outcome at `info` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingOutcomeNotifier;

#[async_trait]
impl OutcomeNotifier for TracingOutcomeNotifier {
    async fn notify(&self, user_id: UserId, message: &str) -> Result<(), OutcomeNotifierError> {
        info!(user_id = %user_id, outcome = message, "user outcome");
        Ok(())
    }
}
