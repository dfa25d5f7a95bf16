//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//! 5. Validates the result before handing it to the application
//!
//! ## Environment Variables
//! Required:
//! - `CHIME_DB_PATH`: SQLite database file path
//! - `CHIME_CALDAV_URL`: CalDAV server base URL
//! - `CHIME_MATTERMOST_URL`: Mattermost base URL
//! - `CHIME_MATTERMOST_TOKEN`: Mattermost bot account token
//! - `CHIME_WEBHOOK_PUBLIC_URL`: Public base URL button callbacks are posted to
//! - `CHIME_WEBHOOK_SECRET`: Shared secret expected in button callbacks
//! - `CHIME_CREDENTIAL_KEY`: Base64-encoded 32-byte vault key
//!
//! Optional (falling back to defaults):
//! - `CHIME_DB_POOL_SIZE`: Connection pool size
//! - `CHIME_WEBHOOK_BIND_ADDR`: Local socket the webhook server listens on
//! - `CHIME_POLL_INTERVAL_SECONDS`: Calendar poll interval
//! - `CHIME_LOOKAHEAD_SECONDS`: Sync window length
//! - `CHIME_LEAD_TIME_SECONDS`: How long before an event a reminder fires
//! - `CHIME_SNOOZE_SECONDS`: Snooze delay for the reminder button
//! - `CHIME_GRACE_PERIOD_SECONDS`: Retention window for finished records
//! - `CHIME_TIMEZONE`: Display timezone (tz database name)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./chime.json` or `./chime.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. `../../config.json` or `../../config.toml` (grandparent directory)
//! 5. Relative to executable location

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chime_domain::constants::{
    CREDENTIAL_KEY_LEN, DEFAULT_DB_POOL_SIZE, DEFAULT_GRACE_PERIOD_SECS, DEFAULT_LEAD_TIME_SECS,
    DEFAULT_LOOKAHEAD_SECS, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_SNOOZE_SECS, DEFAULT_TIMEZONE,
    DEFAULT_WEBHOOK_BIND_ADDR,
};
use chime_domain::{
    CalendarConfig, ChimeError, Config, DatabaseConfig, MattermostConfig, Result, SecurityConfig,
    WebhookConfig,
};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file. The
/// loaded configuration is validated before it is returned: the credential
/// key must be valid base64 for exactly 32 bytes, and a lookahead window
/// too short to ever contain an upcoming reminder is raised to lead time
/// plus one poll interval.
///
/// # Errors
/// Returns `ChimeError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Required fields are missing or fail validation
pub fn load() -> Result<Config> {
    // Try loading from environment first
    let mut config = match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            config
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            // Fall back to file
            load_from_file(None)?
        }
    };

    config.validate()?;
    check_credential_key(&config.security)?;
    clamp_lookahead(&mut config.calendar);

    Ok(config)
}

/// Load configuration from environment variables
///
/// All required environment variables must be present. Optional variables
/// fall back to their defaults when unset, but an unparsable value is an
/// error rather than a silent default.
///
/// # Environment Variables
/// See module documentation for the complete list.
///
/// # Errors
/// Returns `ChimeError::Config` if required variables are missing or any
/// variable has an invalid value.
pub fn load_from_env() -> Result<Config> {
    let database = DatabaseConfig {
        path: env_var("CHIME_DB_PATH")?,
        pool_size: env_u32_or("CHIME_DB_POOL_SIZE", DEFAULT_DB_POOL_SIZE)?,
    };

    let calendar = CalendarConfig {
        base_url: env_var("CHIME_CALDAV_URL")?,
        poll_interval_seconds: env_u64_or(
            "CHIME_POLL_INTERVAL_SECONDS",
            DEFAULT_POLL_INTERVAL_SECS,
        )?,
        lookahead_seconds: env_u64_or("CHIME_LOOKAHEAD_SECONDS", DEFAULT_LOOKAHEAD_SECS)?,
        lead_time_seconds: env_u64_or("CHIME_LEAD_TIME_SECONDS", DEFAULT_LEAD_TIME_SECS)?,
        snooze_seconds: env_u64_or("CHIME_SNOOZE_SECONDS", DEFAULT_SNOOZE_SECS)?,
        grace_period_seconds: env_u64_or("CHIME_GRACE_PERIOD_SECONDS", DEFAULT_GRACE_PERIOD_SECS)?,
        timezone: env_or("CHIME_TIMEZONE", DEFAULT_TIMEZONE),
    };

    let mattermost = MattermostConfig {
        base_url: env_var("CHIME_MATTERMOST_URL")?,
        bot_token: env_var("CHIME_MATTERMOST_TOKEN")?,
    };

    let webhook = WebhookConfig {
        bind_addr: env_or("CHIME_WEBHOOK_BIND_ADDR", DEFAULT_WEBHOOK_BIND_ADDR),
        public_base_url: env_var("CHIME_WEBHOOK_PUBLIC_URL")?,
        shared_secret: env_var("CHIME_WEBHOOK_SECRET")?,
    };

    let security = SecurityConfig { credential_key: env_var("CHIME_CREDENTIAL_KEY")? };

    Ok(Config { database, calendar, mattermost, webhook, security })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Arguments
/// * `path` - Optional path to config file. If `None`, uses
///   [`probe_config_paths`].
///
/// # Errors
/// Returns `ChimeError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Required fields are missing
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ChimeError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            ChimeError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| ChimeError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
///
/// # Errors
/// Returns `ChimeError::Config` if format is invalid or parsing fails.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ChimeError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ChimeError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(ChimeError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// Searches for config files in the following locations (in order):
/// 1. Current working directory (`./config.{json,toml}`,
///    `./chime.{json,toml}`)
/// 2. Parent directories (up to 2 levels)
/// 3. Relative to executable location
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    // Try current working directory
    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(vec![
            cwd.join("config.json"),
            cwd.join("config.toml"),
            cwd.join("chime.json"),
            cwd.join("chime.toml"),
            cwd.join("../config.json"),
            cwd.join("../config.toml"),
            cwd.join("../../config.json"),
            cwd.join("../../config.toml"),
        ]);
    }

    // Try relative to executable
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(vec![
                exe_dir.join("config.json"),
                exe_dir.join("config.toml"),
                exe_dir.join("chime.json"),
                exe_dir.join("chime.toml"),
            ]);
        }
    }

    // Return first existing candidate
    candidates.into_iter().find(|path| path.exists())
}

/// Require the credential key to be valid base64 for exactly 32 bytes
///
/// Catching a bad key here fails startup with a config error instead of
/// failing the first registration with a crypto error. Only the decoded
/// length is inspected; the bytes themselves are dropped immediately and
/// never logged.
fn check_credential_key(security: &SecurityConfig) -> Result<()> {
    let decoded = BASE64.decode(security.credential_key.trim()).map_err(|e| {
        ChimeError::Config(format!("security.credential_key is not valid base64: {}", e))
    })?;

    if decoded.len() != CREDENTIAL_KEY_LEN {
        return Err(ChimeError::Config(format!(
            "security.credential_key must decode to {} bytes, got {}",
            CREDENTIAL_KEY_LEN,
            decoded.len()
        )));
    }

    Ok(())
}

/// Raise the lookahead window to lead time plus one poll interval
///
/// A shorter window could close before a reminder's fire time enters it,
/// so events would never be observed early enough to remind on.
fn clamp_lookahead(calendar: &mut CalendarConfig) {
    let floor = calendar.lead_time_seconds + calendar.poll_interval_seconds;
    if calendar.lookahead_seconds < floor {
        tracing::warn!(
            lookahead_seconds = calendar.lookahead_seconds,
            raised_to = floor,
            "Configured lookahead is shorter than lead time plus one poll interval"
        );
        calendar.lookahead_seconds = floor;
    }
}

/// Get required environment variable
///
/// # Errors
/// Returns `ChimeError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| ChimeError::Config(format!("Missing required environment variable: {}", key)))
}

/// Get optional environment variable with a default
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse optional `u64` environment variable with a default
///
/// # Errors
/// Returns `ChimeError::Config` if the variable is set but not a number.
fn env_u64_or(key: &str, default: u64) -> Result<u64> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|e| ChimeError::Config(format!("Invalid value for {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}

/// Parse optional `u32` environment variable with a default
///
/// # Errors
/// Returns `ChimeError::Config` if the variable is set but not a number.
fn env_u32_or(key: &str, default: u32) -> Result<u32> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u32>()
            .map_err(|e| ChimeError::Config(format!("Invalid value for {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}
