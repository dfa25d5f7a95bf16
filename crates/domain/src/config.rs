//! Application configuration structures
//!
//! Loaded by the infra config loader from `CHIME_*` environment variables
//! or a config file. Secret-bearing sections implement `Debug` by hand so
//! tokens and keys can never reach a log line through formatting.

use std::fmt;
use std::str::FromStr;

use chrono_tz::Tz;
use serde::Deserialize;

use crate::constants::{
    DEFAULT_DB_POOL_SIZE, DEFAULT_GRACE_PERIOD_SECS, DEFAULT_LEAD_TIME_SECS,
    DEFAULT_LOOKAHEAD_SECS, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_SNOOZE_SECS, DEFAULT_TIMEZONE,
    DEFAULT_WEBHOOK_BIND_ADDR,
};
use crate::errors::{ChimeError, Result};

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
    pub mattermost: MattermostConfig,
    pub webhook: WebhookConfig,
    pub security: SecurityConfig,
}

/// SQLite storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

/// CalDAV endpoint plus polling and reminder timing configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// Base URL of the CalDAV server, e.g. `https://dav.example.com`
    pub base_url: String,
    pub poll_interval_seconds: u64,
    pub lookahead_seconds: u64,
    pub lead_time_seconds: u64,
    pub snooze_seconds: u64,
    pub grace_period_seconds: u64,
    pub timezone: String,
}

/// Mattermost REST API configuration
#[derive(Clone, Deserialize)]
pub struct MattermostConfig {
    pub base_url: String,
    pub bot_token: String,
}

/// Action webhook configuration
///
/// `public_base_url` is the address Mattermost posts button callbacks to;
/// `bind_addr` is the local socket the server listens on.
#[derive(Clone, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    pub public_base_url: String,
    pub shared_secret: String,
}

/// Credential encryption configuration
#[derive(Clone, Deserialize)]
pub struct SecurityConfig {
    /// Base64-encoded 256-bit key for the credential vault
    pub credential_key: String,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            poll_interval_seconds: DEFAULT_POLL_INTERVAL_SECS,
            lookahead_seconds: DEFAULT_LOOKAHEAD_SECS,
            lead_time_seconds: DEFAULT_LEAD_TIME_SECS,
            snooze_seconds: DEFAULT_SNOOZE_SECS,
            grace_period_seconds: DEFAULT_GRACE_PERIOD_SECS,
            timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }
}

impl CalendarConfig {
    /// Parse the configured display timezone
    ///
    /// # Errors
    /// Returns `ChimeError::Config` if the zone name is not in the tz
    /// database.
    pub fn tz(&self) -> Result<Tz> {
        Tz::from_str(&self.timezone)
            .map_err(|_| ChimeError::Config(format!("Unknown timezone: {}", self.timezone)))
    }

    /// Poll interval as a std `Duration` for the scheduler
    pub const fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_seconds)
    }

    /// Lookahead window as a chrono `Duration`
    pub fn lookahead(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lookahead_seconds as i64)
    }

    /// Reminder lead time as a chrono `Duration`
    pub fn lead_time(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lead_time_seconds as i64)
    }

    /// Snooze delay as a chrono `Duration`
    pub fn snooze(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.snooze_seconds as i64)
    }

    /// Retention grace window as a chrono `Duration`
    pub fn grace_period(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.grace_period_seconds as i64)
    }
}

impl Config {
    /// Check invariants that make the configuration usable
    ///
    /// # Errors
    /// Returns `ChimeError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.database.path.is_empty() {
            return Err(ChimeError::Config("database.path must not be empty".to_string()));
        }
        if self.database.pool_size == 0 {
            return Err(ChimeError::Config("database.pool_size must be at least 1".to_string()));
        }
        if self.calendar.base_url.is_empty() {
            return Err(ChimeError::Config("calendar.base_url must not be empty".to_string()));
        }
        if self.calendar.poll_interval_seconds == 0 {
            return Err(ChimeError::Config(
                "calendar.poll_interval_seconds must be at least 1".to_string(),
            ));
        }
        self.calendar.tz()?;
        if self.mattermost.base_url.is_empty() {
            return Err(ChimeError::Config("mattermost.base_url must not be empty".to_string()));
        }
        if self.mattermost.bot_token.is_empty() {
            return Err(ChimeError::Config("mattermost.bot_token must not be empty".to_string()));
        }
        if self.webhook.public_base_url.is_empty() {
            return Err(ChimeError::Config(
                "webhook.public_base_url must not be empty".to_string(),
            ));
        }
        if self.webhook.shared_secret.is_empty() {
            return Err(ChimeError::Config("webhook.shared_secret must not be empty".to_string()));
        }
        if self.security.credential_key.is_empty() {
            return Err(ChimeError::Config(
                "security.credential_key must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for MattermostConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MattermostConfig")
            .field("base_url", &self.base_url)
            .field("bot_token", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("bind_addr", &self.bind_addr)
            .field("public_base_url", &self.public_base_url)
            .field("shared_secret", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig").field("credential_key", &"[REDACTED]").finish()
    }
}

fn default_pool_size() -> u32 {
    DEFAULT_DB_POOL_SIZE
}

fn default_bind_addr() -> String {
    DEFAULT_WEBHOOK_BIND_ADDR.to_string()
}
