//! Structured logging with `tracing`.
//!
//! Broker lifecycle events are emitted as `tracing` events with structured
//! fields (`session`, `id`, `action`, `attempts`, ...). This module only
//! installs the global subscriber; emitting is done through the `tracing`
//! macros directly.

use tracing_subscriber::EnvFilter;

/// Output format for the global subscriber.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Compact human-readable lines.
    #[default]
    Compact,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parse `"json"` or `"compact"` (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "compact" | "text" => Some(Self::Compact),
            _ => None,
        }
    }
}

/// Initialize the global tracing subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence over `level`. Subsequent calls are no-ops.
pub fn init_subscriber(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    // try_init fails if a global subscriber is already set
    let _ = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
