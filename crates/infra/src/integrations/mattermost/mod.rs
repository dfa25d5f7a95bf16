//! Mattermost integration
//!
//! REST v4 client for the delivery side of the pipeline: direct-channel
//! reminder cards with Snooze/Dismiss buttons, plain notices, and the
//! startup identity check that validates the bot token.
//!
//! # Architecture
//!
//! - **Client**: `MattermostClient` implements the `MessagingGateway` port
//!   over the shared retrying `HttpClient`
//! - **Types**: serde wire types for the REST payloads, including the
//!   button `context` the platform round-trips to the action webhook
//!
//! # Error Handling
//!
//! - **Identity check**: 401 surfaces as `ChimeError::Auth` so startup
//!   fails loudly on a bad bot token
//! - **Post rejections**: `ChimeError::Delivery`; the reminder record
//!   stays untouched and the next tick retries

pub mod client;
pub mod types;

pub use client::MattermostClient;
pub use types::ActionContext;
