//! Centralized application directory paths for crax.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | App data | `~/Library/Application Support/crax/` | `~/.local/share/crax/` |
//! | Config | `~/Library/Application Support/crax/` | `~/.config/crax/` |
//!
//! # Environment Overrides
//!
//! - `CRAX_DATA_DIR`: overrides [`data_dir`]
//! - `CRAX_CONFIG_DIR`: overrides [`config_dir`]

use std::path::PathBuf;

/// Application data root directory.
///
/// Holds the learned keyword log. Resolves to `dirs::data_dir()/crax/` by
/// default. Override with the `CRAX_DATA_DIR` environment variable.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("CRAX_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("crax"))
        .unwrap_or_else(|| PathBuf::from("/tmp/crax-data"))
}

/// Application config directory.
///
/// Resolves to `dirs::config_dir()/crax/` by default. Override with
/// the `CRAX_CONFIG_DIR` environment variable.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("CRAX_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("crax"))
        .unwrap_or_else(|| PathBuf::from("/tmp/crax-config"))
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Learned keyword log (`data_dir()/keywords.json`).
#[must_use]
pub fn keywords_file() -> PathBuf {
    data_dir().join("keywords.json")
}
