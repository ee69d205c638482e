//! At-rest encryption for stored OAuth tokens (AES-256-GCM)
//!
//! Ciphertext is stored as `enc:<base64(version || nonce || ciphertext)>`.
//! Values without the prefix are treated as plaintext, which is what a
//! deployment without `credentials.encryption_key` writes.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};

use crate::{Error, Result};

const NONCE_SIZE: usize = 12;

const ENCRYPTED_PREFIX: &str = "enc:";

/// Leading byte of every payload; bump when rotating keys.
const KEY_VERSION: u8 = 0x01;

#[derive(Clone)]
pub struct CredentialEncryption {
    cipher: Option<Aes256Gcm>,
}

impl std::fmt::Debug for CredentialEncryption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialEncryption")
            .field("enabled", &self.cipher.is_some())
            .finish()
    }
}

impl CredentialEncryption {
    /// Create from a 32-byte AES-256 key
    pub fn new(key_bytes: &[u8]) -> Result<Self> {
        if key_bytes.len() != 32 {
            return Err(Error::Internal(format!(
                "Credential encryption key must be exactly 32 bytes, got {}",
                key_bytes.len()
            )));
        }
        let key = Key::<Aes256Gcm>::from_slice(key_bytes);
        Ok(Self {
            cipher: Some(Aes256Gcm::new(key)),
        })
    }

    /// Create from a 64-character hex string
    pub fn from_hex_key(hex_key: &str) -> Result<Self> {
        let key_bytes =
            hex::decode(hex_key).map_err(|e| Error::Internal(format!("Invalid hex key: {e}")))?;
        Self::new(&key_bytes)
    }

    /// Store tokens as plaintext. Only for deployments without a configured key.
    #[must_use]
    pub const fn passthrough() -> Self {
        Self { cipher: None }
    }

    /// Build from `credentials.encryption_key`; empty means passthrough
    pub fn from_config(hex_key: &str) -> Result<Self> {
        if hex_key.is_empty() {
            tracing::warn!(
                "credentials.encryption_key is not set; YouTube tokens will be stored unencrypted"
            );
            Ok(Self::passthrough())
        } else {
            Self::from_hex_key(hex_key)
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.cipher.is_some()
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let Some(cipher) = &self.cipher else {
            return Ok(plaintext.to_string());
        };

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| Error::Internal(format!("Credential encryption failed: {e}")))?;

        let mut combined = Vec::with_capacity(1 + NONCE_SIZE + ciphertext.len());
        combined.push(KEY_VERSION);
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(format!("{ENCRYPTED_PREFIX}{}", STANDARD.encode(&combined)))
    }

    pub fn decrypt(&self, stored: &str) -> Result<String> {
        let Some(encoded) = stored.strip_prefix(ENCRYPTED_PREFIX) else {
            return Ok(stored.to_string());
        };
        let cipher = self.cipher.as_ref().ok_or_else(|| {
            Error::Internal(
                "Stored credential is encrypted but no encryption key is configured".to_string(),
            )
        })?;

        let combined = STANDARD
            .decode(encoded)
            .map_err(|e| Error::Internal(format!("Invalid base64 in encrypted credential: {e}")))?;

        let Some((&version, rest)) = combined.split_first() else {
            return Err(Error::Internal("Encrypted credential is empty".to_string()));
        };
        if version != KEY_VERSION {
            return Err(Error::Internal(format!(
                "Unsupported credential encryption version: {version} (expected {KEY_VERSION})"
            )));
        }
        if rest.len() < NONCE_SIZE {
            return Err(Error::Internal("Encrypted credential data too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_SIZE);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| {
                Error::Internal(
                    "Credential decryption failed (wrong key or corrupted data)".to_string(),
                )
            })?;

        String::from_utf8(plaintext)
            .map_err(|e| Error::Internal(format!("Decrypted credential is not UTF-8: {e}")))
    }

    #[must_use]
    pub fn is_encrypted(stored: &str) -> bool {
        stored.starts_with(ENCRYPTED_PREFIX)
    }
}
