//! Credential vault: encrypted persistence of portal credentials.
//!
//! The vault is the only component that sees both the cipher and the
//! credential store. Callers hand it plaintext [`BarsCredentials`] and get
//! plaintext back; ciphertexts never leave this module.

use std::sync::Arc;

use tracing::debug;
use zeroize::Zeroizing;

use crate::domain::ports::{CredentialStore, CredentialStoreError};
use crate::domain::{
    BarsCredentials, CipherError, Error, PasswordCipher, StoredCredentials, UserId,
};

/// Encrypting front for a [`CredentialStore`].
#[derive(Clone)]
pub struct CredentialVault {
    store: Arc<dyn CredentialStore>,
    cipher: PasswordCipher,
}

impl CredentialVault {
    /// Create a vault over `store` sealing passwords with `cipher`.
    pub fn new(store: Arc<dyn CredentialStore>, cipher: PasswordCipher) -> Self {
        Self { store, cipher }
    }

    /// Fail with [`Error::AlreadyAuthorized`] if `user_id` has a stored row.
    ///
    /// Authorize calls this before touching the network.
    pub async fn ensure_absent(&self, user_id: UserId) -> Result<(), Error> {
        if self.is_authorized(user_id).await? {
            return Err(Error::AlreadyAuthorized { user_id });
        }
        Ok(())
    }

    /// Whether `user_id` has stored credentials.
    pub async fn is_authorized(&self, user_id: UserId) -> Result<bool, Error> {
        let row = self
            .store
            .get(user_id)
            .await
            .map_err(map_credential_store_error)?;
        Ok(row.is_some())
    }

    /// Encrypt and persist credentials for a user that has none yet.
    pub async fn save_new(&self, credentials: &BarsCredentials) -> Result<(), Error> {
        let user_id = credentials.user_id();
        self.ensure_absent(user_id).await?;

        let encrypted_password = self
            .cipher
            .encrypt(credentials.password().as_bytes())
            .map_err(map_cipher_error)?;
        let row = StoredCredentials {
            user_id,
            username: credentials.username().to_owned(),
            encrypted_password,
        };
        self.store
            .save(&row)
            .await
            .map_err(map_credential_store_error)?;
        debug!(
            user_id = %user_id,
            key_fingerprint = self.cipher.key_fingerprint(),
            "stored encrypted credentials"
        );
        Ok(())
    }

    /// Load and decrypt the credentials for `user_id`, if any.
    pub async fn get(&self, user_id: UserId) -> Result<Option<BarsCredentials>, Error> {
        let Some(row) = self
            .store
            .get(user_id)
            .await
            .map_err(map_credential_store_error)?
        else {
            return Ok(None);
        };

        let plaintext = self
            .cipher
            .decrypt(&row.encrypted_password)
            .map_err(map_cipher_error)?;
        let password = Zeroizing::new(String::from_utf8(plaintext.to_vec()).map_err(|_| {
            Error::Decryption {
                message: "stored password is not valid UTF-8".to_owned(),
            }
        })?);
        let credentials = BarsCredentials::try_new(row.user_id, &row.username, &password)
            .map_err(|err| Error::Decryption {
                message: format!("stored credentials are invalid: {err}"),
            })?;
        Ok(Some(credentials))
    }

    /// Remove the credentials for `user_id`. Idempotent.
    pub async fn delete(&self, user_id: UserId) -> Result<(), Error> {
        self.store
            .delete(user_id)
            .await
            .map_err(map_credential_store_error)
    }
}

fn map_cipher_error(error: CipherError) -> Error {
    match error {
        CipherError::Encrypt => Error::store(error.to_string()),
        CipherError::InvalidKeyLength { .. } | CipherError::Decrypt { .. } => {
            Error::Decryption {
                message: error.to_string(),
            }
        }
    }
}

fn map_credential_store_error(error: CredentialStoreError) -> Error {
    match error {
        CredentialStoreError::Connection { message } => {
            Error::store(format!("credential store unavailable: {message}"))
        }
        CredentialStoreError::Query { message } => {
            Error::store(format!("credential store error: {message}"))
        }
    }
}
