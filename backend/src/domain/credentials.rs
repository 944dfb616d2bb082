//! Portal credentials in their two shapes: plaintext in transit, encrypted
//! at rest.

use std::fmt;

use zeroize::Zeroizing;

use super::UserId;

/// Errors returned when credential inputs are invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialsValidationError {
    /// Username was missing or blank once trimmed.
    EmptyUsername,
    /// Password was blank.
    EmptyPassword,
}

impl fmt::Display for CredentialsValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyUsername => write!(f, "portal username must not be empty"),
            Self::EmptyPassword => write!(f, "portal password must not be empty"),
        }
    }
}

impl std::error::Error for CredentialsValidationError {}

/// Plaintext portal credentials for one user.
///
/// ## Invariants
/// - `username` is trimmed and non-empty.
/// - `password` is non-empty and keeps caller-provided whitespace. It is
///   wiped from memory on drop.
///
/// # Examples
/// ```
/// use tracking_bars::domain::{BarsCredentials, UserId};
///
/// let creds = BarsCredentials::try_new(UserId::new(42), " s1234567 ", "hunter2").unwrap();
/// assert_eq!(creds.username(), "s1234567");
/// assert_eq!(creds.password(), "hunter2");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct BarsCredentials {
    user_id: UserId,
    username: String,
    password: Zeroizing<String>,
}

impl BarsCredentials {
    /// Validate raw inputs into credentials.
    pub fn try_new(
        user_id: UserId,
        username: &str,
        password: &str,
    ) -> Result<Self, CredentialsValidationError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(CredentialsValidationError::EmptyUsername);
        }
        if password.is_empty() {
            return Err(CredentialsValidationError::EmptyPassword);
        }
        Ok(Self {
            user_id,
            username: username.to_owned(),
            password: Zeroizing::new(password.to_owned()),
        })
    }

    /// User the credentials belong to.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Portal login name.
    pub fn username(&self) -> &str {
        self.username.as_str()
    }

    /// Portal password in plaintext.
    pub fn password(&self) -> &str {
        self.password.as_str()
    }
}

impl fmt::Debug for BarsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BarsCredentials")
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Credentials row as persisted by the credential store.
///
/// `encrypted_password` is `nonce || AES-256-GCM ciphertext`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredentials {
    /// User the row belongs to.
    pub user_id: UserId,
    /// Portal login name.
    pub username: String,
    /// Encrypted password bytes.
    pub encrypted_password: Vec<u8>,
}
