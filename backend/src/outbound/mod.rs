//! Outbound adapters implementing domain ports.
//!
//! - **portal**: reqwest-backed portal sessions with a private cookie jar
//! - **memory**: process-local credential and progress-table stores
//! - **notifier**: outcome delivery through `tracing`
//!
//! Adapters translate between domain types and their transport. They contain
//! no business logic.

pub mod memory;
pub mod notifier;
pub mod portal;

pub use self::memory::{InMemoryCredentialStore, InMemoryProgressTableStore};
pub use self::notifier::TracingOutcomeNotifier;
pub use self::portal::{PortalHttpSession, PortalHttpSessionFactory};
