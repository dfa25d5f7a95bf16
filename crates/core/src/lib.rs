//! # Chime Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) for the calendar source, the state
//!   store, the messaging gateway and the credential cipher
//! - The three services: calendar sync, button-action handling and user
//!   lifecycle
//!
//! ## Architecture Principles
//! - Only depends on `chime-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod actions;
pub mod clock;
pub mod sync;
pub mod user;

// Infrastructure ports
pub mod calendar_ports;
pub mod crypto_ports;
pub mod messaging_ports;
pub mod store_ports;

// Re-export specific items to avoid ambiguity
pub use actions::{ActionReply, ActionRequest, ActionService};
pub use calendar_ports::{CalendarCredentials, CalendarLocator, CalendarSource, FetchedEvent};
pub use clock::{Clock, SystemClock};
pub use crypto_ports::CredentialCipher;
pub use messaging_ports::MessagingGateway;
pub use store_ports::{EventRepository, ReminderRepository, UserRepository};
pub use sync::{SyncService, TickSummary};
pub use user::UserService;
