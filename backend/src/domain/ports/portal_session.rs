//! Driven port for an authenticated session against the grading portal.
//!
//! A session holds cookies and any other per-login state. It never
//! interprets the pages it fetches; turning a grades page into domain data
//! is the extractor's job.

use async_trait::async_trait;
use url::Url;

use super::define_port_error;

define_port_error! {
    /// Errors surfaced while talking to the portal.
    pub enum PortalSessionError {
        /// The portal refused the supplied username and password.
        Rejected { message: String } =>
            "portal rejected credentials: {message}",
        /// Network transport failed or the portal answered with an error status.
        Transport { message: String } =>
            "portal transport failed: {message}",
        /// The portal did not answer within the request timeout.
        Timeout { message: String } =>
            "portal timeout: {message}",
        /// The portal asked us to slow down.
        RateLimited { message: String } =>
            "portal rate limited request: {message}",
    }
}

/// One stateful connection to the portal.
///
/// ## Contract
/// - `login` fails with [`PortalSessionError::Rejected`] when the portal
///   refuses the credentials.
/// - `reset` clears every piece of session state (cookies, tokens) while
///   keeping the underlying transport. It is idempotent and cannot fail.
/// - Callers must `reset` before handing the session to anyone else.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PortalSession: Send + Sync {
    /// Perform the login handshake for `username`.
    async fn login(&mut self, username: &str, password: &str) -> Result<(), PortalSessionError>;

    /// Fetch `url` with the current session state and return the raw body.
    async fn fetch(&mut self, url: &Url) -> Result<Vec<u8>, PortalSessionError>;

    /// Drop all session state.
    fn reset(&mut self);
}

/// Builds fresh sessions for the session pool.
pub trait PortalSessionFactory: Send + Sync {
    /// Create one logged-out session.
    fn create(&self) -> Result<Box<dyn PortalSession>, PortalSessionError>;
}
