//! AES-256-GCM encryption of portal passwords at rest.
//!
//! The key is process-wide configuration. Rotating it makes every stored
//! password undecryptable, so all users must authorize again afterwards.

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Key length in bytes (AES-256).
pub const KEY_BYTES: usize = 32;
/// Nonce length in bytes prepended to every ciphertext.
pub const NONCE_BYTES: usize = 12;
/// Length of the key fingerprint in bytes before hex encoding.
const FINGERPRINT_BYTES: usize = 8;

/// Errors raised while parsing keys or processing ciphertexts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CipherError {
    /// Key material has the wrong shape.
    #[error(
        "encryption key must be {} raw bytes or {} hex characters, got {length} bytes",
        KEY_BYTES,
        KEY_BYTES * 2
    )]
    InvalidKeyLength {
        /// Length of the rejected input in bytes.
        length: usize,
    },
    /// Encryption failed inside the AEAD implementation.
    #[error("password encryption failed")]
    Encrypt,
    /// Ciphertext is too short, tampered with, or sealed under another key.
    #[error("password decryption failed: {reason}")]
    Decrypt {
        /// What went wrong.
        reason: &'static str,
    },
}

/// Validated AES-256 key, wiped from memory on drop.
#[derive(Clone)]
pub struct EncryptionKey(Zeroizing<[u8; KEY_BYTES]>);

impl EncryptionKey {
    /// Parse key material from configuration.
    ///
    /// Accepts exactly 32 raw bytes or 64 hex characters.
    ///
    /// # Examples
    /// ```
    /// use tracking_bars::domain::EncryptionKey;
    ///
    /// assert!(EncryptionKey::parse("0123456789abcdef0123456789abcdef").is_ok());
    /// assert!(EncryptionKey::parse("too-short").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, CipherError> {
        let mut key = Zeroizing::new([0_u8; KEY_BYTES]);
        if raw.len() == KEY_BYTES * 2 {
            if let Ok(decoded) = hex::decode(raw) {
                let decoded = Zeroizing::new(decoded);
                key.copy_from_slice(&decoded);
                return Ok(Self(key));
            }
        }
        if raw.len() != KEY_BYTES {
            return Err(CipherError::InvalidKeyLength { length: raw.len() });
        }
        key.copy_from_slice(raw.as_bytes());
        Ok(Self(key))
    }

    /// Truncated SHA-256 fingerprint (16 lowercase hex characters).
    ///
    /// Safe to log; lets operators tell which key a process runs with.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_slice());
        hex::encode(&digest[..FINGERPRINT_BYTES])
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EncryptionKey")
            .field(&self.fingerprint())
            .finish()
    }
}

/// Seals and opens password bytes under one [`EncryptionKey`].
#[derive(Clone)]
pub struct PasswordCipher {
    cipher: Aes256Gcm,
    fingerprint: String,
}

impl PasswordCipher {
    /// Build a cipher for `key`.
    pub fn new(key: &EncryptionKey) -> Self {
        Self {
            cipher: Aes256Gcm::new(key.0.as_slice().into()),
            fingerprint: key.fingerprint(),
        }
    }

    /// Fingerprint of the key in use.
    pub fn key_fingerprint(&self) -> &str {
        self.fingerprint.as_str()
    }

    /// Encrypt `plaintext` under a fresh random nonce.
    ///
    /// Output layout: `nonce (12 bytes) || ciphertext+tag`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let mut nonce = [0_u8; NONCE_BYTES];
        OsRng.fill_bytes(&mut nonce);
        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CipherError::Encrypt)?;

        let mut output = Vec::with_capacity(NONCE_BYTES + sealed.len());
        output.extend_from_slice(&nonce);
        output.extend_from_slice(&sealed);
        Ok(output)
    }

    /// Decrypt bytes produced by [`PasswordCipher::encrypt`].
    pub fn decrypt(&self, sealed: &[u8]) -> Result<Zeroizing<Vec<u8>>, CipherError> {
        if sealed.len() <= NONCE_BYTES {
            return Err(CipherError::Decrypt {
                reason: "ciphertext shorter than nonce",
            });
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_BYTES);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map(Zeroizing::new)
            .map_err(|_| CipherError::Decrypt {
                reason: "authentication failed",
            })
    }
}

impl fmt::Debug for PasswordCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordCipher")
            .field("key_fingerprint", &self.fingerprint)
            .finish()
    }
}
