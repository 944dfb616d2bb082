//! Portal configuration loaded via OrthoConfig.
//!
//! Raw settings come from `BARS_*` environment variables (or any other
//! OrthoConfig source). [`PortalSettings::validate`] turns them into a typed
//! [`PortalConfig`] once at startup, so nothing downstream re-parses strings.

use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use url::Url;

use crate::domain::{AuthorizationConfig, CipherError, EncryptionKey};

const DEFAULT_REGISTRATION_PAGE_URL: &str = "https://bars.mpei.ru/bars_web/";
const DEFAULT_GRADES_PAGE_URL: &str = "https://bars.mpei.ru/bars_web/Student/Part1";
const DEFAULT_SESSION_POOL_SIZE: usize = 4;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 60;

/// Raw portal settings.
#[derive(Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "BARS")]
pub struct PortalSettings {
    /// AES-256 key: 32 raw bytes or 64 hex characters.
    pub encryption_key: Option<String>,
    /// Login page of the portal.
    pub registration_page_url: Option<String>,
    /// Grade sheet page of the portal.
    pub grades_page_url: Option<String>,
    /// Number of concurrent portal sessions.
    pub session_pool_size: Option<usize>,
    /// Timeout for a single HTTP request, in seconds.
    pub request_timeout_secs: Option<u64>,
    /// Default budget for one orchestrator operation, in seconds.
    pub operation_timeout_secs: Option<u64>,
}

impl fmt::Debug for PortalSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortalSettings")
            .field(
                "encryption_key",
                &self.encryption_key.as_ref().map(|_| "<redacted>"),
            )
            .field("registration_page_url", &self.registration_page_url)
            .field("grades_page_url", &self.grades_page_url)
            .field("session_pool_size", &self.session_pool_size)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("operation_timeout_secs", &self.operation_timeout_secs)
            .finish()
    }
}

/// Reasons the raw settings were refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    /// No encryption key was configured.
    #[error("BARS_ENCRYPTION_KEY is required")]
    MissingEncryptionKey,
    /// The encryption key has the wrong shape.
    #[error("BARS_ENCRYPTION_KEY is invalid: {0}")]
    InvalidEncryptionKey(#[source] CipherError),
    /// A URL setting is not an absolute http(s) URL.
    #[error("{setting} is not an absolute http(s) URL: {value}")]
    InvalidUrl {
        /// Offending setting name.
        setting: &'static str,
        /// Value as configured.
        value: String,
    },
    /// A numeric setting was zero.
    #[error("{setting} must be greater than zero")]
    Zero {
        /// Offending setting name.
        setting: &'static str,
    },
}

/// Validated portal configuration.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Password encryption key.
    pub encryption_key: EncryptionKey,
    /// Login page of the portal.
    pub registration_page_url: Url,
    /// Grade sheet page of the portal.
    pub grades_page_url: Url,
    /// Number of concurrent portal sessions.
    pub session_pool_size: NonZeroUsize,
    /// Timeout for a single HTTP request.
    pub request_timeout: Duration,
    /// Default budget for one orchestrator operation.
    pub operation_timeout: Duration,
}

impl PortalConfig {
    /// Orchestrator settings derived from this configuration.
    pub fn authorization(&self) -> AuthorizationConfig {
        AuthorizationConfig {
            grades_page_url: self.grades_page_url.clone(),
            operation_timeout: self.operation_timeout,
        }
    }
}

impl PortalSettings {
    /// Check every setting and apply defaults.
    pub fn validate(&self) -> Result<PortalConfig, SettingsError> {
        let encryption_key = self
            .encryption_key
            .as_deref()
            .ok_or(SettingsError::MissingEncryptionKey)
            .and_then(|raw| {
                EncryptionKey::parse(raw).map_err(SettingsError::InvalidEncryptionKey)
            })?;
        let registration_page_url = parse_url(
            "BARS_REGISTRATION_PAGE_URL",
            self.registration_page_url
                .as_deref()
                .unwrap_or(DEFAULT_REGISTRATION_PAGE_URL),
        )?;
        let grades_page_url = parse_url(
            "BARS_GRADES_PAGE_URL",
            self.grades_page_url
                .as_deref()
                .unwrap_or(DEFAULT_GRADES_PAGE_URL),
        )?;
        let session_pool_size = NonZeroUsize::new(
            self.session_pool_size
                .unwrap_or(DEFAULT_SESSION_POOL_SIZE),
        )
        .ok_or(SettingsError::Zero {
            setting: "BARS_SESSION_POOL_SIZE",
        })?;
        let request_timeout = non_zero_secs(
            "BARS_REQUEST_TIMEOUT_SECS",
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )?;
        let operation_timeout = non_zero_secs(
            "BARS_OPERATION_TIMEOUT_SECS",
            self.operation_timeout_secs
                .unwrap_or(DEFAULT_OPERATION_TIMEOUT_SECS),
        )?;

        Ok(PortalConfig {
            encryption_key,
            registration_page_url,
            grades_page_url,
            session_pool_size,
            request_timeout,
            operation_timeout,
        })
    }
}

fn parse_url(setting: &'static str, value: &str) -> Result<Url, SettingsError> {
    let invalid = || SettingsError::InvalidUrl {
        setting,
        value: value.to_owned(),
    };
    let url = Url::parse(value).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(invalid());
    }
    Ok(url)
}

fn non_zero_secs(setting: &'static str, secs: u64) -> Result<Duration, SettingsError> {
    if secs == 0 {
        return Err(SettingsError::Zero { setting });
    }
    Ok(Duration::from_secs(secs))
}
