//! HTTP client support shared by the CalDAV and Mattermost integrations

pub mod client;

pub use client::{HttpClient, HttpClientBuilder};
