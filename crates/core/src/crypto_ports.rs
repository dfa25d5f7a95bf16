//! Port interface for credential encryption

use chime_domain::Result;

/// Trait for sealing and opening credential envelopes
///
/// Implemented over the vault in infra; services never see key material.
pub trait CredentialCipher: Send + Sync {
    /// Seal a plaintext credential into a storable envelope string
    fn encrypt(&self, plaintext: &str) -> Result<String>;

    /// Open an envelope string back into the plaintext credential
    ///
    /// # Errors
    /// Returns `ChimeError::Crypto` when the envelope is malformed or was
    /// sealed under a different key; plaintext is never produced from a
    /// failed authentication check.
    fn decrypt(&self, envelope: &str) -> Result<String>;
}
