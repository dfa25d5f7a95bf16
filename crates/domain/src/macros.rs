//! Macro for implementing string conversions for status enums
//!
//! Status values cross the SQLite boundary as lowercase text. This macro
//! keeps the three conversions (to string, to `&'static str` for parameter
//! binding, and case-insensitive parsing) in one place per enum.
//!
//! # Example
//!
//! ```rust
//! use chime_domain::impl_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum ReminderStatus {
//!     Pending,
//!     Sent,
//!     Snoozed,
//!     Dismissed,
//! }
//!
//! impl_status_conversions!(ReminderStatus {
//!     Pending => "pending",
//!     Sent => "sent",
//!     Snoozed => "snoozed",
//!     Dismissed => "dismissed",
//! });
//!
//! assert_eq!(ReminderStatus::Sent.as_str(), "sent");
//! assert_eq!("SNOOZED".parse::<ReminderStatus>().unwrap(), ReminderStatus::Snoozed);
//! ```

/// Implements `as_str`, `Display` and `FromStr` for status enums
///
/// Parsing is case-insensitive; output is always the lowercase form stored
/// in the database.
#[macro_export]
macro_rules! impl_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Stable lowercase form used for storage and wire payloads
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
