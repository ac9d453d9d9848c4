//! Logging utilities (thin wrappers over tracing for progress lines)

const SILENT_VAR: &str = "SOLANA_PG_SINK_SILENT";

/// Log levels for the sink
#[derive(Clone, Copy)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
    Debug,
}

fn silenced() -> bool {
    std::env::var(SILENT_VAR).is_ok()
}

/// Logs a message
pub fn log(level: LogLevel, message: &str) {
    if silenced() {
        return;
    }

    match level {
        LogLevel::Info | LogLevel::Success => tracing::info!("{}", message),
        LogLevel::Warning => tracing::warn!("{}", message),
        LogLevel::Error => tracing::error!("{}", message),
        LogLevel::Debug => tracing::debug!("{}", message),
    }
}

/// Masks credentials in a connection URL: `api-key=` query values and the
/// password part of `user:password@host`.
#[must_use]
pub fn sanitize_url(url: &str) -> String {
    let mut sanitized = url.to_string();

    if let Some(pos) = sanitized.find("api-key=") {
        let start = pos + "api-key=".len();
        let end = sanitized[start..]
            .find('&')
            .map_or(sanitized.len(), |offset| start + offset);
        sanitized.replace_range(start..end, "[REDACTED]");
    }

    if let Some(scheme_end) = sanitized.find("://") {
        let authority_start = scheme_end + 3;
        let authority_end = sanitized[authority_start..]
            .find('/')
            .map_or(sanitized.len(), |offset| authority_start + offset);
        if let Some(at) = sanitized[authority_start..authority_end].rfind('@') {
            let userinfo_end = authority_start + at;
            if let Some(colon) = sanitized[authority_start..userinfo_end].find(':') {
                sanitized.replace_range(authority_start + colon + 1..userinfo_end, "[REDACTED]");
            }
        }
    }

    sanitized
}

/// Logs sink startup information
pub fn log_startup(mode: &str, program_ids: &[String], rpc_url: &str, database_url: &str) {
    if silenced() {
        return;
    }

    tracing::info!(
        mode = mode,
        programs = program_ids.join(","),
        rpc_url = sanitize_url(rpc_url),
        database_url = sanitize_url(database_url),
        "Solana Postgres Sink Startup"
    );
}

/// Logs a section header
pub fn log_section(title: &str) {
    tracing::info!("=== {} ===", title);
}

/// Logs batch processing summary
pub fn log_batch(processed: usize, total: usize, duration_ms: u64) {
    if silenced() {
        return;
    }
    if processed > 0 {
        tracing::info!(
            processed = processed,
            total = total,
            duration_ms = duration_ms,
            "Batch processed"
        );
    }
}

/// Logs an error with context
pub fn log_error(context: &str, error: &str) {
    tracing::error!(context = context, error = error, "Sink Error");
}
