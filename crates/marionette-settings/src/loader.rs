//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`MarionetteSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::MarionetteSettings;

/// Resolve the default settings file path (`~/.marionette/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".marionette").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<MarionetteSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or an invalid final value is
/// an error.
pub fn load_settings_from_path(path: &Path) -> Result<MarionetteSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Defaults merged with the settings file, without env overrides.
pub fn load_file_layer(path: &Path) -> Result<MarionetteSettings> {
    let defaults = serde_json::to_value(MarionetteSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply overrides from the process environment.
pub fn apply_env_overrides(settings: &mut MarionetteSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Empty values are treated as unset. Values that fail to parse or fall out
/// of range are ignored with a warning.
pub fn apply_overrides<F>(settings: &mut MarionetteSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u16("PORT", 0, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = env.string("WS_PATH") {
        settings.server.ws_path = v;
    }
    if let Some(v) = env.string("WS_ALLOWED_ORIGINS") {
        settings.server.allowed_origins = parse_origin_list(&v);
    }
    if let Some(v) = env.u64("HEARTBEAT_INTERVAL_MS", 100, 3_600_000) {
        settings.server.heartbeat_interval_ms = v;
    }
    if let Some(v) = env.usize("MAX_PAYLOAD_BYTES", 1024, 16 * 1024 * 1024) {
        settings.server.max_payload_bytes = v;
    }
    if let Some(v) = env.string("WS_PUBLIC_URL") {
        settings.server.ws_public_url = Some(v);
    }
    if let Some(v) = env.string("PUBLIC_APP_URL") {
        settings.server.public_app_url = Some(v);
    }

    // ── Broker ──────────────────────────────────────────────────────
    if let Some(v) = env.u64("ACK_TIMEOUT_MS", 1, 3_600_000) {
        settings.broker.ack_timeout_ms = v;
    }
    if let Some(v) = env.u32("ACK_MAX_RETRIES", 0, 1_000) {
        settings.broker.ack_max_retries = v;
    }
    if let Some(v) = env.usize("COMMAND_QUEUE_SIZE", 0, 100_000) {
        settings.broker.max_queue_size = v;
    }

    // ── Auth ────────────────────────────────────────────────────────
    if let Some(v) = env.string("JWT_SECRET") {
        settings.auth.secret = Some(v);
    }
    if let Some(v) = env.u64("TOKEN_TTL_SECS", 1, 86_400) {
        settings.auth.token_ttl_secs = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.string("LOG_FORMAT") {
        settings.logging.format = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Split a comma-separated origin list, trimming blanks.
pub fn parse_origin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = self.string(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid numeric env var, ignoring");
        }
        result
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        self.u64(name, u64::from(min), u64::from(max))
            .and_then(|v| u16::try_from(v).ok())
    }

    fn u32(&self, name: &str, min: u32, max: u32) -> Option<u32> {
        self.u64(name, u64::from(min), u64::from(max))
            .and_then(|v| u32::try_from(v).ok())
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        self.u64(name, min as u64, max as u64)
            .and_then(|v| usize::try_from(v).ok())
    }
}
