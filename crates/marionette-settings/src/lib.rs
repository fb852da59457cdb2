//! # marionette-settings
//!
//! Configuration for the broker, loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`MarionetteSettings::default()`]
//! 2. **Settings file** — `~/.marionette/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `ACK_TIMEOUT_MS`, `WS_ALLOWED_ORIGINS`, ...
//!    (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
