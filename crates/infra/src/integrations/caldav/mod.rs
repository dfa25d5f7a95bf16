//! CalDAV integration
//!
//! Talks to the remote calendar server over WebDAV: `PROPFIND` for calendar
//! discovery at registration time and `REPORT calendar-query` for the
//! per-tick event fetch, both authenticated with HTTP Basic using the
//! account email and the app password opened from the vault.
//!
//! # Architecture
//!
//! - **Client**: `CaldavClient` implements the `CalendarSource` and
//!   `CalendarLocator` ports over the shared retrying `HttpClient`
//! - **ics**: iCalendar parsing (RFC 5545 line unfolding, VEVENT
//!   extraction, VALARM trigger resolution)
//!
//! # Error Handling
//!
//! - **401/403**: surfaced as `ChimeError::Auth` so the sync loop can
//!   degrade the user instead of hammering the server
//! - **Timeouts / connection failures**: `ChimeError::Network`, retried on
//!   the next poll tick
//! - **Unparseable multistatus bodies**: `ChimeError::Protocol`

pub mod client;
pub mod ics;

pub use client::CaldavClient;
