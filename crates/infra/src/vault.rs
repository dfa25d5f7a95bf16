//! Credential cipher adapter over the shared vault.
//!
//! Bridges [`chime_common::CredentialVault`] into the [`CredentialCipher`]
//! port so services seal and open app passwords without touching key
//! material or the envelope format.

use chime_common::CredentialVault;
use chime_core::crypto_ports::CredentialCipher;
use chime_domain::{ChimeError, Result};
use tracing::info;

use crate::errors::InfraError;

/// [`CredentialCipher`] implementation backed by AES-256-GCM envelopes.
pub struct VaultCipher {
    vault: CredentialVault,
}

impl VaultCipher {
    /// Create a cipher from a base64-encoded 32-byte key, the form the key
    /// takes in configuration.
    pub fn from_base64_key(key_b64: &str) -> Result<Self> {
        let vault = CredentialVault::from_base64_key(key_b64).map_err(map_common_error)?;
        info!(key_fingerprint = %vault.key_fingerprint(), "credential vault unlocked");
        Ok(Self { vault })
    }
}

impl std::fmt::Debug for VaultCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultCipher").field("vault", &self.vault).finish()
    }
}

impl CredentialCipher for VaultCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        self.vault.encrypt_to_string(plaintext).map_err(map_common_error)
    }

    fn decrypt(&self, envelope: &str) -> Result<String> {
        self.vault.decrypt_from_string(envelope).map_err(map_common_error)
    }
}

fn map_common_error(err: chime_common::error::CommonError) -> ChimeError {
    ChimeError::from(InfraError::from(err))
}
