//! Domain primitives, services and ports.
//!
//! Purpose: Define the progress-table model, the grades page extractor, the
//! credential vault and the authorization orchestrator. Everything here is
//! transport agnostic; adapters live under `crate::outbound`.
//!
//! Public surface:
//! - ProgressTable, Discipline, ControlEvent, UserId: grade snapshot model.
//! - BarsCredentials, StoredCredentials: portal credentials in transit and
//!   at rest.
//! - GradesPage, extract_progress_table: grades page extraction.
//! - CredentialVault, PasswordCipher, EncryptionKey: encrypted storage.
//! - SessionPool, UserLocks: concurrency primitives.
//! - AuthorizationService: Authorize, Logout and RefreshProgressTable.
//! - OutcomeMessages, OutcomeReporter: final user-facing texts.
//! - Error, ErrorKind: the closed failure taxonomy.

pub mod authorization_service;
pub mod credentials;
pub mod error;
pub mod extraction;
pub mod outcome;
pub mod password_cipher;
pub mod ports;
pub mod progress_table;
pub mod session_pool;
pub mod user_locks;
pub mod vault;

pub use self::authorization_service::{
    AuthorizationConfig, AuthorizationPorts, AuthorizationService,
};
pub use self::credentials::{BarsCredentials, CredentialsValidationError, StoredCredentials};
pub use self::error::{Error, ErrorKind};
pub use self::extraction::{ExtractionError, FieldLocation, GradesPage, extract_progress_table};
pub use self::outcome::{Operation, OutcomeMessages, OutcomeReporter};
pub use self::password_cipher::{CipherError, EncryptionKey, PasswordCipher};
pub use self::progress_table::{
    ABSENT_GRADE, ControlEvent, Discipline, EntityValidationError, ProgressTable, UserId,
    clean_text,
};
pub use self::session_pool::{PooledSession, SessionPool};
pub use self::user_locks::{UserLockGuard, UserLocks};
pub use self::vault::CredentialVault;
