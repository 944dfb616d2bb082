//! Per-user mutual exclusion for orchestrator operations.
//!
//! Different users never contend. Operations for the same user queue on one
//! async mutex. Map entries only live while some operation holds or awaits
//! the lock, so the map does not grow with the user base.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::UserId;

type LockTable = HashMap<UserId, Arc<AsyncMutex<()>>>;

/// Registry of per-user async locks.
#[derive(Clone, Default)]
pub struct UserLocks {
    table: Arc<Mutex<LockTable>>,
}

impl UserLocks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other operation holds `user_id`'s lock, then take it.
    pub async fn lock(&self, user_id: UserId) -> UserLockGuard {
        let lock = {
            let mut table = self.table();
            Arc::clone(table.entry(user_id).or_default())
        };
        let guard = lock.lock_owned().await;
        UserLockGuard {
            user_id,
            guard: Some(guard),
            table: Arc::clone(&self.table),
        }
    }

    /// Number of users with a held or awaited lock.
    pub fn tracked_users(&self) -> usize {
        self.table().len()
    }

    fn table(&self) -> std::sync::MutexGuard<'_, LockTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Proof that the holder runs the only operation for its user.
pub struct UserLockGuard {
    user_id: UserId,
    guard: Option<OwnedMutexGuard<()>>,
    table: Arc<Mutex<LockTable>>,
}

impl UserLockGuard {
    /// User the lock belongs to.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

impl Drop for UserLockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the map itself still references an idle lock.
        let idle = table
            .get(&self.user_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            table.remove(&self.user_id);
        }
    }
}
