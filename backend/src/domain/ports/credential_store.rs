//! Driven port for persisting encrypted portal credentials.
//!
//! The presence of a row is the only authorization marker the system keeps:
//! a user with stored credentials has completed at least one portal login.

use async_trait::async_trait;

use crate::domain::{StoredCredentials, UserId};

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by credential store adapters.
    pub enum CredentialStoreError {
        /// Store connection could not be established.
        Connection { message: String } => "credential store connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "credential store query failed: {message}",
    }
}

/// Port for credential persistence keyed by user.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch the credentials row for `user_id`, if one exists.
    async fn get(&self, user_id: UserId) -> Result<Option<StoredCredentials>, CredentialStoreError>;

    /// Insert the credentials row. The password is already encrypted.
    async fn save(&self, credentials: &StoredCredentials) -> Result<(), CredentialStoreError>;

    /// Remove the credentials row. Deleting an absent row succeeds.
    async fn delete(&self, user_id: UserId) -> Result<(), CredentialStoreError>;
}
