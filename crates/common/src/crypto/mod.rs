//! Cryptographic primitives for credential storage.

pub mod vault;

pub use vault::{CredentialVault, EncryptedCredential};
