//! Driven port for persisting progress-table snapshots.

use async_trait::async_trait;

use crate::domain::{ProgressTable, UserId};

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by progress-table store adapters.
    pub enum ProgressTableStoreError {
        /// Store connection could not be established.
        Connection { message: String } => "progress table store connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "progress table store query failed: {message}",
        /// A stored snapshot could not be decoded into domain types.
        Corrupt { message: String } => "progress table store holds a corrupt snapshot: {message}",
    }
}

/// Port for progress-table persistence keyed by user.
///
/// `save` has upsert semantics: the stored snapshot for the table's user is
/// replaced wholesale.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProgressTableStore: Send + Sync {
    /// Insert or replace the snapshot for `table.user_id()`.
    async fn save(&self, table: &ProgressTable) -> Result<(), ProgressTableStoreError>;

    /// Fetch the stored snapshot for `user_id`, if one exists.
    async fn find(&self, user_id: UserId) -> Result<Option<ProgressTable>, ProgressTableStoreError>;

    /// Remove the snapshot. Deleting an absent snapshot succeeds.
    async fn delete(&self, user_id: UserId) -> Result<(), ProgressTableStoreError>;
}
