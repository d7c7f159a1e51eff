//! Settings loading with deep merge and environment variable overrides.
//!
//! Layers, lowest priority first:
//! 1. [`RollcallSettings::default()`]
//! 2. The settings file (`~/.rollcall/settings.json` unless a path is given),
//!    deep-merged over the defaults
//! 3. `ROLLCALL_*` environment variables
//!
//! Merge rules: objects merge per key, arrays and primitives replace, and
//! `null` in the file leaves the lower layer untouched.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::RollcallSettings;

/// `~/.rollcall`, falling back to `/tmp/.rollcall` without `HOME`.
pub fn rollcall_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".rollcall")
}

/// Default settings file path.
pub fn settings_path() -> PathBuf {
    rollcall_home().join("settings.json")
}

/// Load from the default path with env overrides.
pub fn load_settings() -> Result<RollcallSettings> {
    load_settings_from_path(&settings_path())
}

/// Load from a specific path with env overrides, then validate.
///
/// A missing file yields defaults; an unreadable or invalid one is an error.
pub fn load_settings_from_path(path: &Path) -> Result<RollcallSettings> {
    let defaults = serde_json::to_value(RollcallSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_owned(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_owned(),
            source,
        })?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: RollcallSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of `source` over `target`.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `ROLLCALL_*` overrides. Unparseable or out-of-range values are
/// logged and ignored.
pub fn apply_env_overrides(settings: &mut RollcallSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Same as [`apply_env_overrides`] with an injectable variable source.
pub fn apply_overrides_from(
    settings: &mut RollcallSettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = read("ROLLCALL_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read("ROLLCALL_PORT") {
        match parse_u16_range(&v, 0, u16::MAX) {
            Some(port) => settings.server.port = port,
            None => warn!(key = "ROLLCALL_PORT", value = %v, "invalid port env var, ignoring"),
        }
    }
    if let Some(v) = read("ROLLCALL_HEARTBEAT_INTERVAL_SECS") {
        match parse_u64_range(&v, 1, 3600) {
            Some(secs) => settings.server.heartbeat_interval_secs = secs,
            None => warn!(
                key = "ROLLCALL_HEARTBEAT_INTERVAL_SECS",
                value = %v,
                "invalid interval env var, ignoring"
            ),
        }
    }
    if let Some(v) = read("ROLLCALL_JWT_SECRET") {
        settings.auth.jwt_secret = v;
    }
    if let Some(v) = read("ROLLCALL_TOKEN_TTL_SECS") {
        match parse_u64_range(&v, 60, 31_536_000) {
            Some(secs) => settings.auth.token_ttl_secs = secs,
            None => warn!(key = "ROLLCALL_TOKEN_TTL_SECS", value = %v, "invalid ttl env var, ignoring"),
        }
    }
    if let Some(v) = read("ROLLCALL_DB_PATH") {
        settings.storage.db_path = PathBuf::from(v);
    }
    if let Some(v) = read("ROLLCALL_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read("ROLLCALL_LOG_FORMAT") {
        match v.parse() {
            Ok(format) => settings.logging.format = format,
            Err(e) => warn!(key = "ROLLCALL_LOG_FORMAT", error = %e, "ignoring"),
        }
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
