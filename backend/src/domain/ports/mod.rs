//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod credential_store;
mod outcome_notifier;
mod portal_session;
mod progress_table_store;

#[cfg(test)]
pub use credential_store::MockCredentialStore;
pub use credential_store::{CredentialStore, CredentialStoreError};
#[cfg(test)]
pub use outcome_notifier::MockOutcomeNotifier;
pub use outcome_notifier::{OutcomeNotifier, OutcomeNotifierError};
#[cfg(test)]
pub use portal_session::MockPortalSession;
pub use portal_session::{PortalSession, PortalSessionError, PortalSessionFactory};
#[cfg(test)]
pub use progress_table_store::MockProgressTableStore;
pub use progress_table_store::{ProgressTableStore, ProgressTableStoreError};
