//! Credential vault built on AES-256-GCM.
//!
//! The vault seals one secret at a time (a calendar app password) into a
//! self-describing envelope: a random 96-bit nonce, the ciphertext and the
//! algorithm name, serialized as JSON and base64-encoded for storage in a
//! TEXT column. Opening an envelope with the wrong key or a tampered
//! ciphertext fails the GCM tag check and surfaces as
//! [`CommonError::Crypto`]; plaintext is never returned on a failed check.
//!
//! ## Usage
//!
//! ```rust
//! use chime_common::crypto::vault::CredentialVault;
//!
//! let vault = CredentialVault::new(CredentialVault::generate_key())?;
//! let envelope = vault.encrypt_to_string("app-password")?;
//! assert_eq!(vault.decrypt_from_string(&envelope)?, "app-password");
//! # Ok::<(), chime_common::error::CommonError>(())
//! ```

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{CommonError, CommonResult};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const ALGORITHM: &str = "AES-256-GCM";

/// Serializable envelope produced by [`CredentialVault::encrypt_to_string`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedCredential {
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub algorithm: String,
}

/// AES-256-GCM vault for per-user credentials.
pub struct CredentialVault {
    key: Vec<u8>,
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault").field("key", &"[REDACTED]").finish()
    }
}

impl CredentialVault {
    /// Create a vault from a raw 32-byte key.
    ///
    /// # Errors
    /// Returns [`CommonError::Crypto`] if the key is not exactly 32 bytes.
    pub fn new(key: Vec<u8>) -> CommonResult<Self> {
        if key.len() != KEY_LEN {
            return Err(CommonError::crypto(format!(
                "Vault key must be exactly {KEY_LEN} bytes, got {}",
                key.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| CommonError::crypto(format!("Failed to create cipher: {e}")))?;

        Ok(Self { key, cipher })
    }

    /// Create a vault from a base64-encoded 32-byte key.
    ///
    /// This is the form the key takes in configuration.
    pub fn from_base64_key(key_b64: &str) -> CommonResult<Self> {
        let key = BASE64
            .decode(key_b64.trim())
            .map_err(|e| CommonError::crypto(format!("Vault key is not valid base64: {e}")))?;
        Self::new(key)
    }

    /// Generate a random 32-byte vault key.
    pub fn generate_key() -> Vec<u8> {
        let mut key = vec![0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        key
    }

    /// Generate a random key in the base64 form configuration expects.
    pub fn generate_key_base64() -> String {
        BASE64.encode(Self::generate_key())
    }

    /// Seal a credential into a base64 envelope string.
    ///
    /// # Errors
    /// Returns [`CommonError::Crypto`] if encryption fails.
    pub fn encrypt_to_string(&self, plaintext: &str) -> CommonResult<String> {
        let envelope = self.encrypt(plaintext.as_bytes())?;
        let serialized = serde_json::to_vec(&envelope)
            .map_err(|e| CommonError::crypto(format!("Envelope serialization failed: {e}")))?;
        Ok(BASE64.encode(serialized))
    }

    /// Open a base64 envelope string back into the credential.
    ///
    /// # Errors
    /// Returns [`CommonError::Crypto`] if the envelope is malformed, the key
    /// does not match or the ciphertext was modified. The GCM tag check
    /// guarantees this never yields garbage plaintext.
    pub fn decrypt_from_string(&self, envelope_str: &str) -> CommonResult<String> {
        let decoded = BASE64
            .decode(envelope_str)
            .map_err(|e| CommonError::crypto(format!("Envelope base64 decode failed: {e}")))?;
        let envelope: EncryptedCredential = serde_json::from_slice(&decoded)
            .map_err(|e| CommonError::crypto(format!("Envelope deserialization failed: {e}")))?;
        let plaintext = self.decrypt(&envelope)?;
        String::from_utf8(plaintext)
            .map_err(|e| CommonError::crypto(format!("Decrypted credential is not UTF-8: {e}")))
    }

    /// Short identifier for the loaded key, safe to log.
    pub fn key_fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(&self.key);
        let digest = hasher.finalize();
        hex::encode(&digest[..8])
    }

    fn encrypt(&self, data: &[u8]) -> CommonResult<EncryptedCredential> {
        let nonce_bytes = Self::generate_nonce();
        let ciphertext = self
            .cipher
            .encrypt(&Nonce::from(nonce_bytes), data)
            .map_err(|e| CommonError::crypto(format!("Encryption failed: {e}")))?;

        Ok(EncryptedCredential {
            nonce: nonce_bytes.to_vec(),
            ciphertext,
            algorithm: ALGORITHM.to_string(),
        })
    }

    fn decrypt(&self, envelope: &EncryptedCredential) -> CommonResult<Vec<u8>> {
        if envelope.algorithm != ALGORITHM {
            return Err(CommonError::crypto(format!(
                "Unsupported algorithm: {}",
                envelope.algorithm
            )));
        }

        let nonce_array: [u8; NONCE_LEN] =
            envelope.nonce.as_slice().try_into().map_err(|_| {
                CommonError::crypto(format!("Nonce must be exactly {NONCE_LEN} bytes"))
            })?;

        self.cipher
            .decrypt(&Nonce::from(nonce_array), envelope.ciphertext.as_ref())
            .map_err(|_| CommonError::crypto("Decryption failed: key mismatch or tampered data"))
    }

    fn generate_nonce() -> [u8; NONCE_LEN] {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        nonce
    }
}
