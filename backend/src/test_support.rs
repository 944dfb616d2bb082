//! Test doubles shared by unit and integration tests.
//!
//! [`ScriptedPortal`] stands in for the grading portal: it knows a set of
//! accounts, serves each logged-in account its own grades page and serves a
//! login form to anyone else. Its sessions keep the logged-in account until
//! `reset`, so a pool that forgot to reset would leak one user's grades to
//! the next. [`GradesPageBuilder`] renders pages in the portal's layout.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::domain::ports::{PortalSession, PortalSessionError, PortalSessionFactory};

/// Login form markup the portal serves to anonymous visitors.
pub const LOGIN_PAGE: &str = r#"<!DOCTYPE html><html><body>
<form method="post" action="/bars_web/">
<input name="__RequestVerificationToken" type="hidden" value="token-123">
<input name="UserName" type="text">
<input name="Password" type="password">
</form></body></html>"#;

/// Renders grades pages in the portal's layout.
#[derive(Debug, Default, Clone)]
pub struct GradesPageBuilder {
    body: String,
}

impl GradesPageBuilder {
    /// Start an empty grades page.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a discipline: its name block followed by its table.
    pub fn discipline<'a>(
        mut self,
        name: &str,
        events: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let rows = events
            .into_iter()
            .map(|(event, grade)| format!("<tr><td>{event}</td><td>{grade}</td></tr>"))
            .collect::<String>();
        self.body.push_str(&format!(
            r#"<div class="my-2"><div>{name}</div></div><table><tbody>{rows}</tbody></table>"#
        ));
        self
    }

    /// Render the full document.
    pub fn build(self) -> String {
        format!(
            r#"<!DOCTYPE html><html><body><div id="div-Student_SemesterSheet__Mark">{}</div></body></html>"#,
            self.body
        )
    }
}

#[derive(Clone)]
struct Account {
    password: String,
    page: String,
}

#[derive(Default)]
struct PortalState {
    accounts: HashMap<String, Account>,
    latency: Duration,
    logins: usize,
    fetches: usize,
    resets: usize,
}

/// In-process fake of the grading portal.
#[derive(Clone, Default)]
pub struct ScriptedPortal {
    state: Arc<Mutex<PortalState>>,
}

impl ScriptedPortal {
    /// A portal with no accounts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account and the page its grades request returns.
    pub fn with_account(self, username: &str, password: &str, page: impl Into<String>) -> Self {
        self.set_page_for(username, password, page);
        self
    }

    /// Delay every login and fetch by `latency`.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.state().latency = latency;
        self
    }

    /// Replace (or create) an account's password and page.
    pub fn set_page_for(&self, username: &str, password: &str, page: impl Into<String>) {
        self.state().accounts.insert(
            username.to_owned(),
            Account {
                password: password.to_owned(),
                page: page.into(),
            },
        );
    }

    /// Login attempts seen so far.
    pub fn logins(&self) -> usize {
        self.state().logins
    }

    /// Fetches seen so far.
    pub fn fetches(&self) -> usize {
        self.state().fetches
    }

    /// Session resets seen so far.
    pub fn resets(&self) -> usize {
        self.state().resets
    }

    /// Build one session bound to this portal.
    pub fn session(&self) -> ScriptedSession {
        ScriptedSession {
            portal: self.clone(),
            logged_in_as: None,
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, PortalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn latency(&self) -> Duration {
        self.state().latency
    }
}

impl PortalSessionFactory for ScriptedPortal {
    fn create(&self) -> Result<Box<dyn PortalSession>, PortalSessionError> {
        Ok(Box::new(self.session()))
    }
}

/// Session against a [`ScriptedPortal`].
pub struct ScriptedSession {
    portal: ScriptedPortal,
    logged_in_as: Option<String>,
}

#[async_trait]
impl PortalSession for ScriptedSession {
    async fn login(&mut self, username: &str, password: &str) -> Result<(), PortalSessionError> {
        tokio::time::sleep(self.portal.latency()).await;
        let mut state = self.portal.state();
        state.logins += 1;
        let accepted = state
            .accounts
            .get(username)
            .is_some_and(|account| account.password == password);
        if !accepted {
            return Err(PortalSessionError::rejected("invalid username or password"));
        }
        self.logged_in_as = Some(username.to_owned());
        Ok(())
    }

    async fn fetch(&mut self, _url: &Url) -> Result<Vec<u8>, PortalSessionError> {
        tokio::time::sleep(self.portal.latency()).await;
        let mut state = self.portal.state();
        state.fetches += 1;
        let page = self
            .logged_in_as
            .as_ref()
            .and_then(|username| state.accounts.get(username))
            .map_or_else(|| LOGIN_PAGE.to_owned(), |account| account.page.clone());
        Ok(page.into_bytes())
    }

    fn reset(&mut self) {
        self.logged_in_as = None;
        self.portal.state().resets += 1;
    }
}
