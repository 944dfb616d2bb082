//! Bounded pool of portal sessions with reset-on-return.
//!
//! Checking out a session yields a [`PooledSession`] guard. Dropping the
//! guard resets the session and hands it back, on every exit path: normal
//! return, early `?`, panic unwinding, or a caller dropping the future that
//! owned the guard. A session therefore never carries one user's cookies
//! into another user's operation.

use std::mem;
use std::num::NonZeroUsize;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;
use url::Url;

use crate::domain::Error;
use crate::domain::ports::{PortalSession, PortalSessionError, PortalSessionFactory};

struct PoolInner {
    idle: Mutex<Vec<Box<dyn PortalSession>>>,
    permits: Arc<Semaphore>,
    size: usize,
}

impl PoolInner {
    fn idle(&self) -> std::sync::MutexGuard<'_, Vec<Box<dyn PortalSession>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fixed-size set of independent portal sessions.
///
/// The pool size caps concurrent outbound sessions to the portal. Callers
/// wait in [`SessionPool::checkout`] while every session is busy.
#[derive(Clone)]
pub struct SessionPool {
    inner: Arc<PoolInner>,
}

impl SessionPool {
    /// Build a pool that owns `sessions`.
    ///
    /// An empty pool is valid but never hands out a session; checkouts then
    /// only end through the caller's deadline.
    pub fn new(sessions: Vec<Box<dyn PortalSession>>) -> Self {
        let size = sessions.len();
        Self {
            inner: Arc::new(PoolInner {
                idle: Mutex::new(sessions),
                permits: Arc::new(Semaphore::new(size)),
                size,
            }),
        }
    }

    /// Build a pool of `size` fresh sessions from `factory`.
    pub fn from_factory(
        factory: &dyn PortalSessionFactory,
        size: NonZeroUsize,
    ) -> Result<Self, Error> {
        let sessions = (0..size.get())
            .map(|_| factory.create())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| Error::transport(format!("failed to build portal session: {err}")))?;
        Ok(Self::new(sessions))
    }

    /// Wait for a free session.
    pub async fn checkout(&self) -> Result<PooledSession, Error> {
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| Error::transport("session pool is closed"))?;
        let session = self
            .inner
            .idle()
            .pop()
            .ok_or_else(|| Error::transport("session pool has no idle session"))?;
        debug!(idle = self.idle_count(), size = self.inner.size, "checked out portal session");
        Ok(PooledSession {
            session,
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Sessions currently waiting in the pool.
    pub fn idle_count(&self) -> usize {
        self.inner.idle().len()
    }

    /// Total number of sessions the pool owns.
    pub fn size(&self) -> usize {
        self.inner.size
    }
}

/// Exclusive lease on one pooled session.
///
/// Dereferences to the session. The permit field is declared last so it is
/// released only after `Drop` has pushed the session back.
pub struct PooledSession {
    session: Box<dyn PortalSession>,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledSession {
    type Target = dyn PortalSession;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl DerefMut for PooledSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut()
    }
}

impl Drop for PooledSession {
    fn drop(&mut self) {
        let mut session = mem::replace(&mut self.session, Box::new(ReturnedSession));
        session.reset();
        let mut idle = self.pool.idle();
        idle.push(session);
        debug!(idle = idle.len(), size = self.pool.size, "returned portal session");
    }
}

/// Stand-in occupying a guard's slot while its real session goes home.
struct ReturnedSession;

#[async_trait]
impl PortalSession for ReturnedSession {
    async fn login(&mut self, _username: &str, _password: &str) -> Result<(), PortalSessionError> {
        Err(PortalSessionError::transport("session already returned to pool"))
    }

    async fn fetch(&mut self, _url: &Url) -> Result<Vec<u8>, PortalSessionError> {
        Err(PortalSessionError::transport("session already returned to pool"))
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;
    use std::future::pending;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingSession {
        resets: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PortalSession for CountingSession {
        async fn login(&mut self, _: &str, _: &str) -> Result<(), PortalSessionError> {
            Ok(())
        }

        async fn fetch(&mut self, _: &Url) -> Result<Vec<u8>, PortalSessionError> {
            Ok(Vec::new())
        }

        fn reset(&mut self) {
            self.resets.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct CountingFactory {
        resets: Arc<AtomicUsize>,
    }

    impl PortalSessionFactory for CountingFactory {
        fn create(&self) -> Result<Box<dyn PortalSession>, PortalSessionError> {
            Ok(Box::new(CountingSession {
                resets: Arc::clone(&self.resets),
            }))
        }
    }

    fn pool(size: usize) -> (SessionPool, Arc<AtomicUsize>) {
        let resets = Arc::new(AtomicUsize::new(0));
        let factory = CountingFactory {
            resets: Arc::clone(&resets),
        };
        let size = NonZeroUsize::new(size).expect("non-zero pool size");
        let pool = SessionPool::from_factory(&factory, size).expect("pool builds");
        (pool, resets)
    }

    #[tokio::test]
    async fn dropping_the_guard_resets_and_returns_the_session() {
        let (pool, resets) = pool(2);

        let mut session = pool.checkout().await.expect("checkout succeeds");
        session.login("user", "pw").await.expect("login succeeds");
        assert_eq!(pool.idle_count(), 1);
        drop(session);

        assert_eq!(resets.load(Ordering::SeqCst), 1);
        assert_eq!(pool.idle_count(), 2);
    }

    #[tokio::test]
    async fn pool_size_bounds_concurrent_checkouts() {
        let (pool, _) = pool(1);

        let held = pool.checkout().await.expect("checkout succeeds");
        let waiting = tokio::time::timeout(Duration::from_millis(20), pool.checkout()).await;
        assert!(waiting.is_err(), "second checkout must wait for the first");

        drop(held);
        let again = tokio::time::timeout(Duration::from_millis(200), pool.checkout()).await;
        assert!(matches!(again, Ok(Ok(_))), "released session must be reusable");
    }

    #[tokio::test]
    async fn cancelled_operation_still_resets_its_session() {
        let (pool, resets) = pool(1);
        let worker = pool.clone();

        let outcome = tokio::time::timeout(Duration::from_millis(20), async move {
            let _session = worker.checkout().await.expect("checkout succeeds");
            pending::<()>().await;
        })
        .await;

        assert!(outcome.is_err(), "operation must have been cancelled");
        assert_eq!(resets.load(Ordering::SeqCst), 1);
        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test]
    async fn panicking_operation_still_resets_its_session() {
        let (pool, resets) = pool(1);
        let worker = pool.clone();

        let joined = tokio::spawn(async move {
            let _session = worker.checkout().await.expect("checkout succeeds");
            panic!("operation blew up");
        })
        .await;

        assert!(joined.is_err_and(|err| err.is_panic()));
        assert_eq!(resets.load(Ordering::SeqCst), 1);
        assert_eq!(pool.idle_count(), 1);
    }

    #[rstest]
    #[case(1)]
    #[case(4)]
    fn pool_owns_requested_number_of_sessions(#[case] size: usize) {
        let (pool, resets) = pool(size);
        assert_eq!(pool.size(), size);
        assert_eq!(pool.idle_count(), size);
        assert_eq!(resets.load(Ordering::SeqCst), 0);
    }
}
