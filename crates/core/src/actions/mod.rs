//! Reminder button-action handling

pub mod service;

pub use service::{ActionReply, ActionRequest, ActionService};
