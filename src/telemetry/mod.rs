//! Process-wide tracing setup.

/// Global subscriber initialisation.
pub mod subscriber;

pub use subscriber::{TelemetryGuard, init_telemetry};

/// How log records are rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Name recorded on the startup event.
    pub service_name: String,
    /// Filter used when `RUST_LOG` is unset (e.g. "info", "solana_pg_sink=debug,warn").
    pub log_filter: String,
    pub enable_console_colors: bool,
    pub show_target: bool,
    pub show_thread_ids: bool,
}

impl TelemetryConfig {
    /// Defaults adjusted by `NO_COLOR` and `LOG_THREAD_IDS`.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| {
            lookup(key).is_some_and(|v| matches!(v.trim(), "1" | "true" | "yes"))
        };
        Self {
            enable_console_colors: lookup("NO_COLOR").is_none_or(|v| v.is_empty()),
            show_thread_ids: flag("LOG_THREAD_IDS"),
            ..Self::default()
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "solana-pg-sink".into(),
            log_filter: "info".into(),
            enable_console_colors: true,
            show_target: true,
            show_thread_ids: false,
        }
    }
}
