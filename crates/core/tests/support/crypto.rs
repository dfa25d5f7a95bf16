use chime_core::CredentialCipher;
use chime_domain::{ChimeError, Result as DomainResult};

/// Reversible stand-in for the credential vault.
///
/// "Encryption" is a visible prefix so tests can assert the stored form is
/// not the plaintext, and an envelope without the prefix decrypts to a
/// `Crypto` error the same way a wrong-key envelope would.
#[derive(Default, Clone)]
pub struct PlainCipher;

const PREFIX: &str = "sealed:";

impl CredentialCipher for PlainCipher {
    fn encrypt(&self, plaintext: &str) -> DomainResult<String> {
        Ok(format!("{PREFIX}{plaintext}"))
    }

    fn decrypt(&self, envelope: &str) -> DomainResult<String> {
        envelope
            .strip_prefix(PREFIX)
            .map(str::to_string)
            .ok_or_else(|| ChimeError::Crypto("Decryption failed".to_string()))
    }
}
