use super::TelemetryConfig;
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Guard that keeps the telemetry subsystem alive for the process lifetime.
pub struct TelemetryGuard {
    service_name: String,
}

impl TelemetryGuard {
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::debug!(service = %self.service_name, "Telemetry guard dropped");
    }
}

static TELEMETRY_INIT: OnceLock<bool> = OnceLock::new();

/// Initialize the global tracing subscriber (singleton, called once).
///
/// Uses `RUST_LOG` if set, otherwise falls back to `config.log_filter`.
/// Subsequent calls are no-ops; so is a call made after another subscriber
/// was installed elsewhere (e.g. by a test harness).
pub fn init_telemetry(config: TelemetryConfig) -> TelemetryGuard {
    let installed = *TELEMETRY_INIT.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

        let fmt_layer = fmt::layer()
            .with_target(config.show_target)
            .with_thread_ids(config.show_thread_ids)
            .with_ansi(config.enable_console_colors);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .is_ok()
    });

    if installed {
        tracing::debug!(service = %config.service_name, "Telemetry initialized");
    }

    TelemetryGuard {
        service_name: config.service_name,
    }
}
