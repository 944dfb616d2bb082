//! Process-local store adapters.
//!
//! Both stores keep rows in a mutex-guarded map and lose everything on
//! restart. Progress tables are held as serialized JSON, the same shape a
//! durable adapter would write, so decoding is exercised on every read.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::ports::{
    CredentialStore, CredentialStoreError, ProgressTableStore, ProgressTableStoreError,
};
use crate::domain::{ProgressTable, StoredCredentials, UserId};

/// Credential rows held in memory.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    rows: Mutex<HashMap<UserId, StoredCredentials>>,
}

impl InMemoryCredentialStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<UserId, StoredCredentials>>, CredentialStoreError> {
        self.rows
            .lock()
            .map_err(|_| CredentialStoreError::connection("credential rows lock poisoned"))
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get(
        &self,
        user_id: UserId,
    ) -> Result<Option<StoredCredentials>, CredentialStoreError> {
        Ok(self.rows()?.get(&user_id).cloned())
    }

    async fn save(&self, credentials: &StoredCredentials) -> Result<(), CredentialStoreError> {
        let mut rows = self.rows()?;
        if rows.contains_key(&credentials.user_id) {
            return Err(CredentialStoreError::query(format!(
                "credentials for user {} already exist",
                credentials.user_id
            )));
        }
        rows.insert(credentials.user_id, credentials.clone());
        Ok(())
    }

    async fn delete(&self, user_id: UserId) -> Result<(), CredentialStoreError> {
        self.rows()?.remove(&user_id);
        Ok(())
    }
}

/// Progress-table snapshots held in memory as JSON.
#[derive(Debug, Default)]
pub struct InMemoryProgressTableStore {
    snapshots: Mutex<HashMap<UserId, String>>,
}

impl InMemoryProgressTableStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshots(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<UserId, String>>, ProgressTableStoreError> {
        self.snapshots
            .lock()
            .map_err(|_| ProgressTableStoreError::connection("snapshot lock poisoned"))
    }

    #[cfg(test)]
    fn put_raw(&self, user_id: UserId, raw: &str) {
        if let Ok(mut snapshots) = self.snapshots.lock() {
            snapshots.insert(user_id, raw.to_owned());
        }
    }
}

#[async_trait]
impl ProgressTableStore for InMemoryProgressTableStore {
    async fn save(&self, table: &ProgressTable) -> Result<(), ProgressTableStoreError> {
        let encoded = serde_json::to_string(table)
            .map_err(|error| ProgressTableStoreError::query(error.to_string()))?;
        self.snapshots()?.insert(table.user_id(), encoded);
        Ok(())
    }

    async fn find(
        &self,
        user_id: UserId,
    ) -> Result<Option<ProgressTable>, ProgressTableStoreError> {
        let Some(encoded) = self.snapshots()?.get(&user_id).cloned() else {
            return Ok(None);
        };
        let table: ProgressTable = serde_json::from_str(&encoded).map_err(|error| {
            ProgressTableStoreError::corrupt(format!("user {user_id}: {error}"))
        })?;
        if table.user_id() != user_id {
            return Err(ProgressTableStoreError::corrupt(format!(
                "snapshot under user {user_id} belongs to user {}",
                table.user_id()
            )));
        }
        Ok(Some(table))
    }

    async fn delete(&self, user_id: UserId) -> Result<(), ProgressTableStoreError> {
        self.snapshots()?.remove(&user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::{ControlEvent, Discipline};
    use rstest::{fixture, rstest};

    const USER: UserId = UserId::new(11);

    #[fixture]
    fn credentials() -> StoredCredentials {
        StoredCredentials {
            user_id: USER,
            username: "s.ivanov".to_owned(),
            encrypted_password: vec![1, 2, 3],
        }
    }

    fn table() -> ProgressTable {
        ProgressTable::new(
            USER,
            vec![
                Discipline::new(
                    "Физика",
                    vec![ControlEvent::new("Экзамен", "отл").expect("event")],
                )
                .expect("discipline"),
            ],
        )
    }

    #[rstest]
    #[tokio::test]
    async fn credentials_round_trip_and_delete(credentials: StoredCredentials) {
        let store = InMemoryCredentialStore::new();

        store.save(&credentials).await.expect("save");
        assert_eq!(store.get(USER).await.expect("get"), Some(credentials));

        store.delete(USER).await.expect("delete");
        store.delete(USER).await.expect("deleting twice succeeds");
        assert_eq!(store.get(USER).await.expect("get"), None);
    }

    #[rstest]
    #[tokio::test]
    async fn second_credentials_row_is_refused(credentials: StoredCredentials) {
        let store = InMemoryCredentialStore::new();
        store.save(&credentials).await.expect("first save");

        let error = store.save(&credentials).await.expect_err("duplicate row");

        assert!(matches!(error, CredentialStoreError::Query { .. }));
    }

    #[tokio::test]
    async fn snapshots_are_replaced_wholesale() {
        let store = InMemoryProgressTableStore::new();
        store
            .save(&ProgressTable::not_fetched(USER))
            .await
            .expect("save placeholder");
        store.save(&table()).await.expect("save table");

        assert_eq!(store.find(USER).await.expect("find"), Some(table()));

        store.delete(USER).await.expect("delete");
        assert_eq!(store.find(USER).await.expect("find"), None);
    }

    #[rstest]
    #[case::not_json("{")]
    #[case::wrong_owner(r#"{"user_id":99,"disciplines":[]}"#)]
    #[tokio::test]
    async fn undecodable_snapshots_are_corrupt(#[case] raw: &str) {
        let store = InMemoryProgressTableStore::new();
        store.put_raw(USER, raw);

        let error = store.find(USER).await.expect_err("snapshot is corrupt");

        assert!(matches!(error, ProgressTableStoreError::Corrupt { .. }));
    }
}
