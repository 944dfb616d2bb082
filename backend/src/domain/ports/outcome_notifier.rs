//! Driven port delivering a final, human-readable outcome to a user.

use async_trait::async_trait;

use crate::domain::UserId;

use super::define_port_error;

define_port_error! {
    /// Errors raised by notifier adapters.
    pub enum OutcomeNotifierError {
        /// The message could not be delivered.
        Delivery { message: String } => "outcome delivery failed: {message}",
    }
}

/// Port for telling a user how their request ended.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OutcomeNotifier: Send + Sync {
    /// Deliver `message` to `user_id`.
    async fn notify(&self, user_id: UserId, message: &str) -> Result<(), OutcomeNotifierError>;
}
