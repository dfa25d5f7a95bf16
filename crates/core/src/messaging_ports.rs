//! Port interface for the messaging platform

use async_trait::async_trait;
use chime_domain::{ObservedEvent, Result};

/// Trait for delivering messages to users
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Deliver an interactive reminder card for `event`
    ///
    /// Returns the callback id embedded in the card's buttons. The id is
    /// generated fresh per delivery, so the caller can record which
    /// delivery currently owns the live buttons.
    ///
    /// # Errors
    /// Returns `ChimeError::Delivery` when the platform rejects the post;
    /// the reminder record must stay untouched so the next tick retries.
    async fn send_reminder(&self, user_id: &str, event: &ObservedEvent) -> Result<String>;

    /// Deliver a plain one-way notice
    async fn send_notice(&self, user_id: &str, text: &str) -> Result<()>;
}
