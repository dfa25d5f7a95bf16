//! User management service - core business logic
//!
//! Registration proves the credentials against the calendar server before
//! anything is stored, then persists only the encrypted form. The plaintext
//! password never outlives the registration call.

use std::sync::Arc;

use chime_domain::{ChimeError, Result, User, UserStatus};
use tracing::info;

use crate::calendar_ports::CalendarLocator;
use crate::clock::{Clock, SystemClock};
use crate::crypto_ports::CredentialCipher;
use crate::store_ports::UserRepository;

/// User management service
pub struct UserService {
    users: Arc<dyn UserRepository>,
    cipher: Arc<dyn CredentialCipher>,
    locator: Arc<dyn CalendarLocator>,
    clock: Arc<dyn Clock>,
}

impl UserService {
    /// Create a new user service
    pub fn new(
        users: Arc<dyn UserRepository>,
        cipher: Arc<dyn CredentialCipher>,
        locator: Arc<dyn CalendarLocator>,
    ) -> Self {
        Self { users, cipher, locator, clock: Arc::new(SystemClock) }
    }

    /// Replace the time source (tests pin and advance it)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register a user, or re-register an existing one with fresh credentials
    ///
    /// Discovery runs first so a wrong password fails the whole call before
    /// anything touches storage.
    ///
    /// # Errors
    /// - `ChimeError::Auth` when the calendar server rejects the credentials
    /// - `ChimeError::Crypto` when the credential cannot be sealed
    pub async fn register(&self, user_id: &str, email: &str, password: &str) -> Result<User> {
        let calendar_url = self.locator.discover_calendar_url(email, password).await?;
        let encrypted_credential = self.cipher.encrypt(password)?;

        let now = self.clock.now().timestamp();
        let user = User {
            id: user_id.to_string(),
            email: email.to_string(),
            encrypted_credential,
            calendar_url,
            status: UserStatus::Active,
            last_synced_at: None,
            created_at: now,
            updated_at: now,
        };
        self.users.save_user(user.clone()).await?;

        info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Replace a user's stored credential and reactivate them
    ///
    /// # Errors
    /// - `ChimeError::NotFound` when the user was never registered
    /// - `ChimeError::Auth` when the new credentials are rejected
    pub async fn rotate_credentials(&self, user_id: &str, password: &str) -> Result<User> {
        let Some(mut user) = self.users.find_user(user_id).await? else {
            return Err(ChimeError::NotFound(format!("User not found: {user_id}")));
        };

        user.calendar_url = self.locator.discover_calendar_url(&user.email, password).await?;
        user.encrypted_credential = self.cipher.encrypt(password)?;
        user.status = UserStatus::Active;
        user.updated_at = self.clock.now().timestamp();
        self.users.save_user(user.clone()).await?;

        info!(user_id = %user.id, "User credentials rotated");
        Ok(user)
    }

    /// Remove a user and, through cascade, all their events and reminders
    pub async fn unregister(&self, user_id: &str) -> Result<()> {
        self.users.delete_user(user_id).await?;
        info!(user_id = %user_id, "User unregistered");
        Ok(())
    }
}
