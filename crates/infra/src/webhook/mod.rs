//! Reminder action webhook
//!
//! The inbound HTTP surface of the bot: one POST route that receives
//! Mattermost button callbacks and applies them through the
//! `ActionService`. Origin is verified by the shared-secret token carried
//! in each button's context; rejected callbacks all share one uniform
//! acknowledgment body.

pub mod server;

pub use server::WebhookServer;
