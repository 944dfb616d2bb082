//! End-to-end coverage of the authorization lifecycle.
//!
//! Drives the public API with the in-memory stores and a scripted portal.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use rstest::{fixture, rstest};
use tracking_bars::domain::ports::PortalSession;
use tracking_bars::domain::{
    AuthorizationConfig, AuthorizationPorts, AuthorizationService, BarsCredentials,
    EncryptionKey, Error, ErrorKind, PasswordCipher, SessionPool, UserId,
};
use tracking_bars::outbound::{InMemoryCredentialStore, InMemoryProgressTableStore};
use tracking_bars::test_support::{GradesPageBuilder, LOGIN_PAGE, ScriptedPortal};
use url::Url;

const KEY: &str = "0123456789abcdef0123456789abcdef";
const ROTATED_KEY: &str = "fedcba9876543210fedcba9876543210";

struct Harness {
    portal: ScriptedPortal,
    credentials: Arc<InMemoryCredentialStore>,
    tables: Arc<InMemoryProgressTableStore>,
    sessions: SessionPool,
    service: AuthorizationService,
}

impl Harness {
    fn new(portal: ScriptedPortal, pool_size: usize) -> Self {
        let credentials = Arc::new(InMemoryCredentialStore::new());
        let tables = Arc::new(InMemoryProgressTableStore::new());
        let sessions = SessionPool::from_factory(
            &portal,
            NonZeroUsize::new(pool_size).expect("non-zero pool"),
        )
        .expect("pool builds");
        let service = build_service(&credentials, &tables, sessions.clone(), KEY);
        Self {
            portal,
            credentials,
            tables,
            sessions,
            service,
        }
    }

    fn with_key(&self, key: &str) -> AuthorizationService {
        build_service(&self.credentials, &self.tables, self.sessions.clone(), key)
    }
}

fn build_service(
    credentials: &Arc<InMemoryCredentialStore>,
    tables: &Arc<InMemoryProgressTableStore>,
    sessions: SessionPool,
    key: &str,
) -> AuthorizationService {
    let cipher = PasswordCipher::new(&EncryptionKey::parse(key).expect("valid key"));
    AuthorizationService::new(
        AuthorizationPorts::new(credentials.clone(), tables.clone()),
        cipher,
        sessions,
        AuthorizationConfig {
            grades_page_url: Url::parse("https://bars.example/bars_web/Student/Part1")
                .expect("grades url"),
            operation_timeout: Duration::from_secs(5),
        },
    )
}

fn username(user: i64) -> String {
    format!("student{user}")
}

fn page_for(user: i64, grade: &str) -> String {
    GradesPageBuilder::new()
        .discipline(&format!("Course of student {user}"), [("Exam", grade)])
        .discipline("Physical education", [("Credit", "pass")])
        .build()
}

fn credentials(user: i64) -> BarsCredentials {
    BarsCredentials::try_new(UserId::new(user), &username(user), "secret")
        .expect("valid credentials")
}

#[fixture]
fn portal() -> ScriptedPortal {
    (1..=4).fold(ScriptedPortal::new(), |portal, user| {
        portal.with_account(&username(user), "secret", page_for(user, "5"))
    })
}

#[rstest]
#[tokio::test]
async fn full_lifecycle(portal: ScriptedPortal) {
    let harness = Harness::new(portal, 1);
    let user = UserId::new(1);

    let table = harness.service.authorize(credentials(1)).await.expect("authorize");
    assert_eq!(table.disciplines().len(), 2);
    assert!(harness.service.is_authorized(user).await.expect("lookup"));

    let fetches = harness.portal.fetches();
    let stored = harness.service.progress_table(user).await.expect("read");
    assert_eq!(stored, table);
    assert_eq!(harness.portal.fetches(), fetches, "stored snapshot needs no portal traffic");

    harness
        .portal
        .set_page_for(&username(1), "secret", page_for(1, "4"));
    let refreshed = harness
        .service
        .refresh_progress_table(user)
        .await
        .expect("refresh");
    assert_eq!(
        refreshed.disciplines().first().map(|d| d.control_events()[0].grade()),
        Some("4")
    );
    assert_eq!(harness.service.progress_table(user).await.expect("read"), refreshed);

    harness.service.logout(user).await.expect("logout");
    harness.service.logout(user).await.expect("second logout is a no-op");
    assert!(!harness.service.is_authorized(user).await.expect("lookup"));
    assert_eq!(
        harness
            .service
            .refresh_progress_table(user)
            .await
            .expect_err("no credentials")
            .kind(),
        ErrorKind::NotAuthorized
    );
    assert_eq!(
        harness
            .service
            .progress_table(user)
            .await
            .expect_err("no snapshot")
            .kind(),
        ErrorKind::NotAuthorized
    );

    harness
        .service
        .authorize(credentials(1))
        .await
        .expect("authorize again after logout");
}

#[rstest]
#[tokio::test]
async fn repeated_authorize_is_refused_without_portal_traffic(portal: ScriptedPortal) {
    let harness = Harness::new(portal, 1);
    harness.service.authorize(credentials(2)).await.expect("authorize");
    let logins = harness.portal.logins();

    let wrong_password = BarsCredentials::try_new(UserId::new(2), &username(2), "wrong")
        .expect("valid credentials");
    let error = harness
        .service
        .authorize(wrong_password)
        .await
        .expect_err("already authorized");

    assert!(matches!(error, Error::AlreadyAuthorized { .. }));
    assert_eq!(harness.portal.logins(), logins);
}

#[rstest]
#[tokio::test]
async fn failed_authorize_stores_nothing(portal: ScriptedPortal) {
    let harness = Harness::new(portal, 1);
    let rejected = BarsCredentials::try_new(UserId::new(3), &username(3), "wrong")
        .expect("valid credentials");

    let error = harness.service.authorize(rejected).await.expect_err("rejected");

    assert_eq!(error.kind(), ErrorKind::AuthFailed);
    assert!(!harness.service.is_authorized(UserId::new(3)).await.expect("lookup"));
    assert_eq!(
        harness
            .service
            .progress_table(UserId::new(3))
            .await
            .expect_err("no snapshot")
            .kind(),
        ErrorKind::NotAuthorized
    );
}

#[rstest]
#[tokio::test]
async fn unexpected_page_is_retryable_and_stores_nothing(portal: ScriptedPortal) {
    portal.set_page_for(&username(4), "secret", LOGIN_PAGE);
    let harness = Harness::new(portal, 1);

    let error = harness
        .service
        .authorize(credentials(4))
        .await
        .expect_err("wrong page");

    assert_eq!(error.kind(), ErrorKind::WrongGradesPage);
    assert!(error.is_retryable());
    assert!(!harness.service.is_authorized(UserId::new(4)).await.expect("lookup"));
}

#[rstest]
#[tokio::test]
async fn rotated_key_makes_refresh_fail_with_decryption(portal: ScriptedPortal) {
    let harness = Harness::new(portal, 1);
    harness.service.authorize(credentials(1)).await.expect("authorize");

    let error = harness
        .with_key(ROTATED_KEY)
        .refresh_progress_table(UserId::new(1))
        .await
        .expect_err("old ciphertext");

    assert_eq!(error.kind(), ErrorKind::Decryption);
    assert!(!error.is_retryable());
}

#[rstest]
#[tokio::test]
async fn pooled_sessions_come_back_logged_out(portal: ScriptedPortal) {
    let harness = Harness::new(portal, 1);
    harness.service.authorize(credentials(1)).await.expect("authorize");

    let mut session = harness.sessions.checkout().await.expect("checkout");
    let body = session
        .fetch(&Url::parse("https://bars.example/bars_web/Student/Part1").expect("url"))
        .await
        .expect("fetch");

    assert_eq!(body, LOGIN_PAGE.as_bytes(), "previous user's login must not leak");
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_users_get_their_own_grades(portal: ScriptedPortal) {
    let harness = Harness::new(portal.with_latency(Duration::from_millis(20)), 2);

    let tasks = (1..=4)
        .map(|user| {
            let service = harness.service.clone();
            tokio::spawn(async move { (user, service.authorize(credentials(user)).await) })
        })
        .collect::<Vec<_>>();

    for task in tasks {
        let (user, result) = task.await.expect("task completes");
        let table = result.expect("authorize");
        assert_eq!(table.user_id(), UserId::new(user));
        assert_eq!(
            table.disciplines().first().map(|d| d.name().to_owned()),
            Some(format!("Course of student {user}"))
        );
    }
    assert_eq!(harness.sessions.idle_count(), 2);
    assert_eq!(harness.portal.resets(), 4);
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_authorizations_for_one_user_admit_exactly_one(portal: ScriptedPortal) {
    let harness = Harness::new(portal.with_latency(Duration::from_millis(20)), 2);

    let first = harness.service.clone();
    let second = harness.service.clone();
    let (a, b) = tokio::join!(
        tokio::spawn(async move { first.authorize(credentials(1)).await }),
        tokio::spawn(async move { second.authorize(credentials(1)).await }),
    );
    let results = [a.expect("task completes"), b.expect("task completes")];

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(results.iter().any(|result| {
        matches!(result, Err(Error::AlreadyAuthorized { .. }))
    }));
    assert_eq!(harness.portal.logins(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn authorize_and_logout_for_one_user_never_interleave(portal: ScriptedPortal) {
    let harness = Harness::new(portal.with_latency(Duration::from_millis(20)), 1);
    let user = UserId::new(1);

    let authorizer = harness.service.clone();
    let logger_out = harness.service.clone();
    let (authorized, logged_out) = tokio::join!(
        tokio::spawn(async move { authorizer.authorize(credentials(1)).await }),
        tokio::spawn(async move { logger_out.logout(user).await }),
    );
    authorized.expect("task completes").expect("authorize");
    logged_out.expect("task completes").expect("logout");

    let has_credentials = harness.service.is_authorized(user).await.expect("lookup");
    let has_snapshot = harness.service.progress_table(user).await.is_ok();
    assert_eq!(
        has_credentials, has_snapshot,
        "credentials and snapshot must be stored or removed together"
    );
}
