//! Error types for sink operations.
//!
//! Every failure that can escape a unit of work (one queue entry, one backfill
//! record) is a [`SinkError`]. Callers decide between retrying, skipping, and
//! stopping through [`SinkError::class`].

use thiserror::Error;

/// Custom error type for sink operations.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Errors encountered during database operations.
    ///
    /// Whether the failure is worth retrying depends on the underlying
    /// `sqlx::Error`; see [`SinkError::class`].
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// A payload could not be decoded against its declared layout.
    ///
    /// Unknown discriminators, truncated buffers, invalid booleans or UTF-8,
    /// and unresolvable type references all land here.
    #[error("Decoding error: {0}")]
    DecodingError(String),

    /// A decoded event could not be turned into a mutation intent.
    ///
    /// Typically a required account role is missing from the bound list.
    #[error("Mapping error: {0}")]
    MappingError(String),

    /// A metadata document could not be fetched or parsed.
    ///
    /// Never escapes the resolver; it degrades to a null document.
    #[error("Resolver error: {0}")]
    ResolverError(String),

    /// Errors from the durable event queue.
    #[error("Queue error: {0}")]
    QueueError(String),

    /// Errors interacting with the Solana RPC.
    #[error("RPC error: {0}")]
    RpcError(String),

    /// Errors from the Solana RPC client.
    #[error("RPC client error: {0}")]
    RpcClientError(Box<solana_client::client_error::ClientError>),

    /// Errors related to configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Errors from environment variable operations.
    #[error("Environment variable error: {0}")]
    EnvVarError(#[from] std::env::VarError),

    /// Errors during Solana public key parsing.
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(#[from] solana_sdk::pubkey::ParsePubkeyError),

    /// An IDL document could not be loaded or parsed.
    #[error("IDL error: {0}")]
    IdlError(String),

    /// A mutation intent is structurally invalid (unknown table, no address,
    /// duplicate or unknown columns).
    #[error("Invalid mutation intent: {0}")]
    InvalidIntent(String),

    /// Generic errors for operations that don't fit other categories.
    #[error("Internal error: {0}")]
    InternalError(String),

    /// All retry attempts were exhausted on a transient error.
    #[error("Retry exhausted after {attempts} attempts: {last_error}")]
    RetryExhausted {
        /// Total number of attempts (initial call + retries).
        attempts: u32,
        /// String representation of the last error.
        last_error: String,
    },
}

/// Type alias for Results using `SinkError`.
pub type Result<T> = std::result::Result<T, SinkError>;

/// How a caller should react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Connection loss, timeouts, pool exhaustion. Retry with backoff; the
    /// unit must not be acknowledged until it resolves.
    Transient,
    /// Bad data or an invalid write. Skip the unit and log it.
    Permanent,
}

impl SinkError {
    /// Classifies this error.
    ///
    /// | Variant                      | Class     |
    /// |------------------------------|-----------|
    /// | `DatabaseError` (io, pool, tls, protocol, serialization, deadlock, statement or lock timeout, admin shutdown, class 08) | Transient |
    /// | `DatabaseError` (anything else) | Permanent |
    /// | `RpcError`, `RpcClientError`, `QueueError`, `ResolverError` | Transient |
    /// | `RetryExhausted`             | Transient |
    /// | everything else              | Permanent |
    ///
    /// `RetryExhausted` stays transient: the unit was never processed, so it
    /// must not be acknowledged.
    #[must_use]
    pub fn class(&self) -> FailureClass {
        match self {
            SinkError::DatabaseError(err) => classify_sqlx(err),
            SinkError::RpcError(_)
            | SinkError::RpcClientError(_)
            | SinkError::QueueError(_)
            | SinkError::ResolverError(_)
            | SinkError::RetryExhausted { .. } => FailureClass::Transient,
            _ => FailureClass::Permanent,
        }
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.class() == FailureClass::Transient
    }
}

fn classify_sqlx(err: &sqlx::Error) -> FailureClass {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => FailureClass::Transient,
        sqlx::Error::Database(db) => match db.code() {
            Some(code) if is_transient_sqlstate(&code) => FailureClass::Transient,
            _ => FailureClass::Permanent,
        },
        _ => FailureClass::Permanent,
    }
}

/// Serialization failure, deadlock, statement timeout, lock timeout, admin
/// shutdown, and connection exceptions.
fn is_transient_sqlstate(code: &str) -> bool {
    matches!(
        code,
        "40001" | "40P01" | "57014" | "55P03" | "57P01" | "57P02" | "57P03"
    ) || code.starts_with("08")
}

impl From<solana_client::client_error::ClientError> for SinkError {
    fn from(err: solana_client::client_error::ClientError) -> Self {
        SinkError::RpcClientError(Box::new(err))
    }
}

impl From<redis::RedisError> for SinkError {
    fn from(err: redis::RedisError) -> Self {
        SinkError::QueueError(err.to_string())
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(err: serde_json::Error) -> Self {
        SinkError::DecodingError(err.to_string())
    }
}
