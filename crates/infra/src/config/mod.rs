//! Configuration loading
//!
//! Environment-first loader with config-file fallback. The config structs
//! themselves live in `chime-domain`; this module only knows how to find,
//! parse and validate them.

pub mod loader;

pub use loader::{load, load_from_env, load_from_file, probe_config_paths};
