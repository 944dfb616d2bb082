//! Authorization orchestrator.
//!
//! Drives the per-user lifecycle: authorize, refresh, read and logout. A
//! user's state is never stored explicitly; it is inferred from whether a
//! credentials row exists.
//!
//! Every operation holds the user's lock for its whole duration, so an
//! Authorize and a Logout for the same user never interleave. Portal work
//! runs on a pooled session that is reset when the operation lets go of it,
//! whatever the outcome.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, timeout_at};
use tracing::{error, info, warn};
use url::Url;

use crate::domain::ports::{
    CredentialStore, PortalSessionError, ProgressTableStore, ProgressTableStoreError,
};
use crate::domain::{
    BarsCredentials, CredentialVault, Error, PasswordCipher, ProgressTable, SessionPool, UserId,
    UserLockGuard, UserLocks, extract_progress_table,
};

/// Port bundle required by the orchestrator.
pub struct AuthorizationPorts {
    /// Encrypted credential persistence.
    pub credential_store: Arc<dyn CredentialStore>,
    /// Progress-table snapshot persistence.
    pub progress_table_store: Arc<dyn ProgressTableStore>,
}

impl AuthorizationPorts {
    /// Build a strongly-typed port bundle.
    pub fn new(
        credential_store: Arc<dyn CredentialStore>,
        progress_table_store: Arc<dyn ProgressTableStore>,
    ) -> Self {
        Self {
            credential_store,
            progress_table_store,
        }
    }
}

/// Static settings for the orchestrator.
#[derive(Debug, Clone)]
pub struct AuthorizationConfig {
    /// Page holding the user's grade sheet.
    pub grades_page_url: Url,
    /// Budget for one operation when the caller supplies no deadline.
    pub operation_timeout: Duration,
}

/// Orchestrates Authorize, Logout and RefreshProgressTable.
#[derive(Clone)]
pub struct AuthorizationService {
    vault: CredentialVault,
    progress_tables: Arc<dyn ProgressTableStore>,
    sessions: SessionPool,
    locks: UserLocks,
    config: Arc<AuthorizationConfig>,
}

impl AuthorizationService {
    /// Wire the orchestrator to its collaborators.
    pub fn new(
        ports: AuthorizationPorts,
        cipher: PasswordCipher,
        sessions: SessionPool,
        config: AuthorizationConfig,
    ) -> Self {
        Self {
            vault: CredentialVault::new(ports.credential_store, cipher),
            progress_tables: ports.progress_table_store,
            sessions,
            locks: UserLocks::new(),
            config: Arc::new(config),
        }
    }

    /// Log in with fresh credentials, fetch grades and persist both.
    ///
    /// Fails with [`Error::AlreadyAuthorized`] before any portal traffic if
    /// the user already has credentials. On any failure nothing is stored.
    pub async fn authorize(&self, credentials: BarsCredentials) -> Result<ProgressTable, Error> {
        self.authorize_with_deadline(credentials, self.default_deadline())
            .await
    }

    /// [`AuthorizationService::authorize`] bounded by a caller deadline.
    pub async fn authorize_with_deadline(
        &self,
        credentials: BarsCredentials,
        deadline: Instant,
    ) -> Result<ProgressTable, Error> {
        let user_id = credentials.user_id();
        let guard = self.lock_user(user_id, deadline).await?;
        self.vault.ensure_absent(user_id).await?;

        let table = self.fetch_progress_table(&credentials, deadline).await?;
        self.persist_new_user(guard, credentials, table.clone())
            .await?;

        info!(
            user_id = %user_id,
            disciplines = table.disciplines().len(),
            "user authorized"
        );
        Ok(table)
    }

    /// Forget a user: drop the snapshot, then the credentials.
    ///
    /// Safe to repeat. If the snapshot cannot be deleted the credentials are
    /// left in place.
    pub async fn logout(&self, user_id: UserId) -> Result<(), Error> {
        let _guard = self.locks.lock(user_id).await;
        self.progress_tables
            .delete(user_id)
            .await
            .map_err(map_progress_table_store_error)?;
        self.vault.delete(user_id).await?;
        info!(user_id = %user_id, "user logged out");
        Ok(())
    }

    /// Re-fetch the grades of an authorized user and replace the snapshot.
    ///
    /// The stored credentials are never modified, whatever the outcome.
    pub async fn refresh_progress_table(&self, user_id: UserId) -> Result<ProgressTable, Error> {
        self.refresh_progress_table_with_deadline(user_id, self.default_deadline())
            .await
    }

    /// [`AuthorizationService::refresh_progress_table`] bounded by a caller
    /// deadline.
    pub async fn refresh_progress_table_with_deadline(
        &self,
        user_id: UserId,
        deadline: Instant,
    ) -> Result<ProgressTable, Error> {
        let _guard = self.lock_user(user_id, deadline).await?;
        self.refresh_locked(user_id, deadline).await
    }

    /// Read the stored snapshot, refreshing it first if it was never fetched.
    ///
    /// Fails with [`Error::NotAuthorized`] if there is no snapshot at all.
    pub async fn progress_table(&self, user_id: UserId) -> Result<ProgressTable, Error> {
        let deadline = self.default_deadline();
        let _guard = self.lock_user(user_id, deadline).await?;
        let stored = self
            .progress_tables
            .find(user_id)
            .await
            .map_err(map_progress_table_store_error)?;
        match stored {
            None => Err(Error::NotAuthorized { user_id }),
            Some(table) if !table.is_fetched() => self.refresh_locked(user_id, deadline).await,
            Some(table) => Ok(table),
        }
    }

    /// Whether the user has stored credentials.
    pub async fn is_authorized(&self, user_id: UserId) -> Result<bool, Error> {
        self.vault.is_authorized(user_id).await
    }

    fn default_deadline(&self) -> Instant {
        Instant::now() + self.config.operation_timeout
    }

    async fn lock_user(&self, user_id: UserId, deadline: Instant) -> Result<UserLockGuard, Error> {
        within(deadline, "user lock", async { Ok(self.locks.lock(user_id).await) }).await
    }

    async fn refresh_locked(
        &self,
        user_id: UserId,
        deadline: Instant,
    ) -> Result<ProgressTable, Error> {
        let credentials = self
            .vault
            .get(user_id)
            .await?
            .ok_or(Error::NotAuthorized { user_id })?;
        let table = self.fetch_progress_table(&credentials, deadline).await?;
        self.progress_tables
            .save(&table)
            .await
            .map_err(map_progress_table_store_error)?;
        info!(
            user_id = %user_id,
            disciplines = table.disciplines().len(),
            "progress table refreshed"
        );
        Ok(table)
    }

    /// Login, fetch and extract on one pooled session.
    ///
    /// The session goes back to the pool, reset, before extraction starts.
    async fn fetch_progress_table(
        &self,
        credentials: &BarsCredentials,
        deadline: Instant,
    ) -> Result<ProgressTable, Error> {
        let user_id = credentials.user_id();
        let raw = {
            let mut session = within(deadline, "session checkout", self.sessions.checkout()).await?;
            within(deadline, "login", async {
                session
                    .login(credentials.username(), credentials.password())
                    .await
                    .map_err(map_portal_session_error)
            })
            .await
            .inspect_err(|err| warn!(user_id = %user_id, error = %err, "portal login failed"))?;
            within(deadline, "grades fetch", async {
                session
                    .fetch(&self.config.grades_page_url)
                    .await
                    .map_err(map_portal_session_error)
            })
            .await?
        };

        extract_progress_table(user_id, &raw).map_err(|err| {
            warn!(user_id = %user_id, error = %err, "grades page extraction failed");
            Error::from(err)
        })
    }

    /// Store credentials and snapshot for a freshly authorized user.
    ///
    /// Runs as a detached task that owns the user's lock, so a caller that
    /// gives up mid-way cannot leave one row without the other.
    async fn persist_new_user(
        &self,
        guard: UserLockGuard,
        credentials: BarsCredentials,
        table: ProgressTable,
    ) -> Result<(), Error> {
        let vault = self.vault.clone();
        let progress_tables = Arc::clone(&self.progress_tables);
        let task = tokio::spawn(async move {
            let _guard = guard;
            let user_id = credentials.user_id();
            vault.save_new(&credentials).await?;
            let saved = progress_tables
                .save(&table)
                .await
                .map_err(map_progress_table_store_error);
            if let Err(err) = saved {
                warn!(user_id = %user_id, error = %err, "snapshot save failed; removing credentials");
                if let Err(cleanup) = vault.delete(user_id).await {
                    error!(
                        user_id = %user_id,
                        error = %cleanup,
                        "credentials left without a snapshot"
                    );
                }
                return Err(err);
            }
            Ok(())
        });
        task.await
            .map_err(|err| Error::store(format!("persistence task failed: {err}")))?
    }
}

/// Bound `operation` by `deadline`.
async fn within<T>(
    deadline: Instant,
    stage: &'static str,
    operation: impl Future<Output = Result<T, Error>>,
) -> Result<T, Error> {
    timeout_at(deadline, operation)
        .await
        .map_err(|_| Error::transport(format!("deadline exceeded during {stage}")))?
}

fn map_portal_session_error(error: PortalSessionError) -> Error {
    match error {
        PortalSessionError::Rejected { message } => Error::AuthFailed { message },
        PortalSessionError::Transport { message } => Error::transport(message),
        PortalSessionError::Timeout { message } => {
            Error::transport(format!("portal timed out: {message}"))
        }
        PortalSessionError::RateLimited { message } => {
            Error::transport(format!("portal rate limited: {message}"))
        }
    }
}

fn map_progress_table_store_error(error: ProgressTableStoreError) -> Error {
    match error {
        ProgressTableStoreError::Connection { message } => {
            Error::store(format!("progress table store unavailable: {message}"))
        }
        ProgressTableStoreError::Query { message } => {
            Error::store(format!("progress table store error: {message}"))
        }
        ProgressTableStoreError::Corrupt { message } => {
            Error::store(format!("progress table store returned corrupt data: {message}"))
        }
    }
}

#[cfg(test)]
#[path = "authorization_service_tests.rs"]
mod tests;
