//! Reqwest-backed portal session adapter.
//!
//! This adapter owns transport details only: the login handshake, redirect
//! handling, cookie bookkeeping and HTTP error mapping. It never interprets
//! the grades page.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, COOKIE, LOCATION};
use reqwest::{Client, Method, StatusCode, redirect};
use tracing::debug;
use url::Url;
use zeroize::Zeroizing;

use super::cookies::CookieJar;
use super::login_form::{LoginForm, asks_for_password, rejection_message};
use crate::domain::ports::{PortalSession, PortalSessionError, PortalSessionFactory};

const DEFAULT_USER_AGENT: &str = "tracking-bars/0.1";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const MAX_REDIRECTS: usize = 10;

/// Builds [`PortalHttpSession`]s that share one connection pool.
#[derive(Debug, Clone)]
pub struct PortalHttpSessionFactory {
    client: Client,
    login_url: Url,
}

impl PortalHttpSessionFactory {
    /// Build a factory whose sessions log in at `login_url`.
    ///
    /// `timeout` bounds every single HTTP request.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(login_url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .redirect(redirect::Policy::none())
            .build()?;
        Ok(Self { client, login_url })
    }

    /// A logged-out session.
    pub fn session(&self) -> PortalHttpSession {
        PortalHttpSession {
            client: self.client.clone(),
            login_url: self.login_url.clone(),
            jar: CookieJar::default(),
        }
    }
}

impl PortalSessionFactory for PortalHttpSessionFactory {
    fn create(&self) -> Result<Box<dyn PortalSession>, PortalSessionError> {
        Ok(Box::new(self.session()))
    }
}

/// One portal login: a shared HTTP client plus a private cookie jar.
#[derive(Debug)]
pub struct PortalHttpSession {
    client: Client,
    login_url: Url,
    jar: CookieJar,
}

struct PortalResponse {
    url: Url,
    body: Vec<u8>,
}

impl PortalHttpSession {
    async fn send(
        &mut self,
        method: Method,
        url: Url,
        form: Option<&str>,
    ) -> Result<PortalResponse, PortalSessionError> {
        let mut method = method;
        let mut url = url;
        let mut form = form;

        for _ in 0..=MAX_REDIRECTS {
            let mut request = self.client.request(method.clone(), url.clone());
            if let Some(cookies) = self.jar.header_for(&url) {
                request = request.header(COOKIE, cookies);
            }
            if let Some(body) = form {
                request = request
                    .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
                    .body(body.to_owned());
            }

            let response = request.send().await.map_err(map_transport_error)?;
            self.jar.store_response_cookies(&url, response.headers());
            let status = response.status();

            if status.is_redirection() {
                let target = redirect_target(&url, response.headers().get(LOCATION))?;
                debug!(
                    status = status.as_u16(),
                    from = %url,
                    to = %target,
                    "following portal redirect"
                );
                if !matches!(
                    status,
                    StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT
                ) {
                    method = Method::GET;
                    form = None;
                }
                url = target;
                continue;
            }

            let body = response.bytes().await.map_err(map_transport_error)?;
            if !status.is_success() {
                return Err(map_status_error(status, body.as_ref()));
            }
            return Ok(PortalResponse {
                url,
                body: body.to_vec(),
            });
        }

        Err(PortalSessionError::transport(format!(
            "more than {MAX_REDIRECTS} redirects starting at {url}"
        )))
    }
}

#[async_trait]
impl PortalSession for PortalHttpSession {
    async fn login(&mut self, username: &str, password: &str) -> Result<(), PortalSessionError> {
        let login_url = self.login_url.clone();
        let page = self.send(Method::GET, login_url, None).await?;
        let form = LoginForm::parse(&String::from_utf8_lossy(&page.body), &page.url)
            .ok_or_else(|| {
                PortalSessionError::transport(format!("no login form at {}", page.url))
            })?;

        let body = Zeroizing::new(form.encode(username, password));
        let landing = self
            .send(Method::POST, form.action.clone(), Some(body.as_str()))
            .await?;

        let landing_text = String::from_utf8_lossy(&landing.body);
        if asks_for_password(&landing_text) {
            return Err(PortalSessionError::rejected(
                rejection_message(&landing_text)
                    .unwrap_or_else(|| "login form shown again".to_owned()),
            ));
        }
        debug!(landing = %landing.url, "portal login accepted");
        Ok(())
    }

    async fn fetch(&mut self, url: &Url) -> Result<Vec<u8>, PortalSessionError> {
        let response = self.send(Method::GET, url.clone(), None).await?;
        Ok(response.body)
    }

    fn reset(&mut self) {
        self.jar.clear();
    }
}

fn redirect_target(
    current: &Url,
    location: Option<&reqwest::header::HeaderValue>,
) -> Result<Url, PortalSessionError> {
    let location = location
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            PortalSessionError::transport(format!("redirect from {current} without Location"))
        })?;
    current.join(location).map_err(|error| {
        PortalSessionError::transport(format!("invalid redirect target {location:?}: {error}"))
    })
}

fn map_transport_error(error: reqwest::Error) -> PortalSessionError {
    if error.is_timeout() {
        PortalSessionError::timeout(error.to_string())
    } else {
        PortalSessionError::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> PortalSessionError {
    let body_preview = body_preview(body);
    let message = if body_preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {}", status.as_u16(), body_preview)
    };

    match status {
        StatusCode::TOO_MANY_REQUESTS => PortalSessionError::rate_limited(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            PortalSessionError::timeout(message)
        }
        _ => PortalSessionError::transport(message),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

#[cfg(test)]
#[path = "http_session_tests.rs"]
mod tests;
