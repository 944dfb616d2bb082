//! Cookie jar owned by one portal session.
//!
//! Storage and matching are delegated to `cookie_store`, which applies the
//! RFC 6265 rules for `Domain`, `Path`, `Secure`, `Max-Age` and `Expires`.
//! The jar only adapts it to reqwest headers and to the session lifecycle.

use std::fmt;

use cookie_store::CookieStore;
use reqwest::header::{HeaderMap, SET_COOKIE};
use tracing::debug;
use url::Url;

/// Cookies received during one session.
#[derive(Default)]
pub(crate) struct CookieJar {
    store: CookieStore,
}

impl fmt::Debug for CookieJar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieJar")
            .field("cookies", &self.len())
            .finish_non_exhaustive()
    }
}

impl CookieJar {
    /// Record every `Set-Cookie` header of a response from `url`.
    pub(crate) fn store_response_cookies(&mut self, url: &Url, headers: &HeaderMap) {
        for value in headers.get_all(SET_COOKIE) {
            if let Ok(raw) = value.to_str() {
                self.store(url, raw);
            }
        }
    }

    /// Record one `Set-Cookie` value.
    ///
    /// Malformed cookies and cookies the origin may not set are dropped. An
    /// already expired cookie removes any stored cookie it names.
    pub(crate) fn store(&mut self, url: &Url, set_cookie: &str) {
        if let Err(error) = self.store.parse(set_cookie, url) {
            debug!(%url, %error, "ignoring portal cookie");
        }
    }

    /// `Cookie` header value for a request to `url`, if any cookie applies.
    pub(crate) fn header_for(&self, url: &Url) -> Option<String> {
        let mut pairs = self
            .store
            .get_request_values(url)
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>();
        pairs.sort_unstable();
        (!pairs.is_empty()).then(|| pairs.join("; "))
    }

    /// Forget every cookie.
    pub(crate) fn clear(&mut self) {
        self.store.clear();
    }

    /// Number of unexpired cookies.
    pub(crate) fn len(&self) -> usize {
        self.store.iter_unexpired().count()
    }
}
