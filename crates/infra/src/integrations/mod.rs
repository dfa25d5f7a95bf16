//! External service integrations

pub mod caldav;
pub mod mattermost;

pub use caldav::CaldavClient;
pub use mattermost::MattermostClient;
