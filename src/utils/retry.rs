//! Configurable retry logic for transient failures.
//!
//! This module provides:
//! - [`compute_backoff`]: exponential-backoff delay calculator with optional jitter.
//! - [`with_retry`]: runs an async operation until it succeeds, fails permanently,
//!   or the retry budget is spent.
//! - [`RetryingRpcProvider`]: decorator that wraps any [`RpcProvider`] with configurable retries.

use crate::config::RetryConfig;
use crate::utils::error::{Result, SinkError};
use crate::utils::rpc::RpcProvider;
use async_trait::async_trait;
use solana_client::rpc_response::RpcConfirmedTransactionStatusWithSignature;
use solana_sdk::{account::Account, pubkey::Pubkey};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

// ─────────────────────────────────────────────────────────────────────────────
// Backoff calculation
// ─────────────────────────────────────────────────────────────────────────────

/// Computes the delay before the next retry.
///
/// `attempt` is 1-indexed: `attempt = 1` is the delay before the first retry,
/// `attempt = 2` before the second, etc.
///
/// Formula: `delay = initial_backoff_ms * backoff_multiplier^(attempt - 1)`,
/// capped at `max_backoff_ms`, then ±25 % jitter if enabled.
#[must_use]
pub fn compute_backoff(cfg: &RetryConfig, attempt: u32) -> Duration {
    let base = cfg.initial_backoff_ms as f64
        * cfg
            .backoff_multiplier
            .powi(attempt.saturating_sub(1) as i32);
    let capped = base.min(cfg.max_backoff_ms as f64);

    let ms = if cfg.jitter {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos();
        // jitter factor in [0.75, 1.25]
        let factor = 0.75 + (nanos % 1_000_000) as f64 / 1_000_000.0 * 0.5;
        capped * factor
    } else {
        capped
    };

    Duration::from_millis(ms as u64)
}

// ─────────────────────────────────────────────────────────────────────────────
// Retry loop
// ─────────────────────────────────────────────────────────────────────────────

/// Calls `op()` repeatedly until it succeeds, the error is permanent, or
/// `max_retries` retries have failed.
///
/// Permanent errors are returned unchanged. Exhaustion yields
/// [`SinkError::RetryExhausted`] carrying the last transient error.
///
/// # Errors
///
/// See above.
pub async fn with_retry<F, Fut, T>(cfg: &RetryConfig, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;

    loop {
        let err = match op().await {
            Ok(val) => return Ok(val),
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) => err,
        };

        attempt += 1;
        if attempt > cfg.max_retries {
            return Err(SinkError::RetryExhausted {
                attempts: attempt,
                last_error: err.to_string(),
            });
        }

        let delay = compute_backoff(cfg, attempt);
        tracing::warn!(
            operation,
            attempt,
            max = cfg.max_retries,
            delay_ms = delay.as_millis(),
            error = %err,
            "Transient error, retrying"
        );
        sleep(delay).await;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RetryingRpcProvider
// ─────────────────────────────────────────────────────────────────────────────

/// A decorator that wraps any [`RpcProvider`] with configurable retry logic.
///
/// # Example
///
/// ```no_run
/// use solana_pg_sink::config::RetryConfig;
/// use solana_pg_sink::utils::retry::RetryingRpcProvider;
/// use solana_pg_sink::utils::rpc::{DefaultRpcProvider, RpcProvider};
/// use std::sync::Arc;
///
/// let raw = DefaultRpcProvider::new("http://127.0.0.1:8899");
/// let retrying = RetryingRpcProvider::new(raw, RetryConfig::default());
/// let rpc: Arc<dyn RpcProvider> = Arc::new(retrying);
/// ```
pub struct RetryingRpcProvider<P> {
    inner: P,
    config: RetryConfig,
}

impl<P: RpcProvider> RetryingRpcProvider<P> {
    /// Wraps `inner` with the given retry `config`.
    pub fn new(inner: P, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl<P: RpcProvider + Send + Sync> RpcProvider for RetryingRpcProvider<P> {
    async fn get_program_account_keys(
        &self,
        program_id: &Pubkey,
        discriminator: &[u8],
    ) -> Result<Vec<Pubkey>> {
        with_retry(&self.config, "getProgramAccounts", || {
            self.inner.get_program_account_keys(program_id, discriminator)
        })
        .await
    }

    async fn get_multiple_accounts(&self, pubkeys: &[Pubkey]) -> Result<Vec<Option<Account>>> {
        with_retry(&self.config, "getMultipleAccounts", || {
            self.inner.get_multiple_accounts(pubkeys)
        })
        .await
    }

    async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<RpcConfirmedTransactionStatusWithSignature>> {
        with_retry(&self.config, "getSignaturesForAddress", || {
            self.inner.get_signatures_for_address(address, limit)
        })
        .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    // ── helpers ───────────────────────────────────────────────────────────────

    fn no_jitter_cfg(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff_ms: 1, // keep tests fast
            backoff_multiplier: 2.0,
            max_backoff_ms: 100,
            jitter: false,
        }
    }

    // ── backoff ───────────────────────────────────────────────────────────────

    #[test]
    fn test_compute_backoff_increases() {
        let cfg = no_jitter_cfg(5);
        let d1 = compute_backoff(&cfg, 1);
        let d2 = compute_backoff(&cfg, 2);
        let d3 = compute_backoff(&cfg, 3);
        assert!(d1 < d2, "backoff should grow: {d1:?} < {d2:?}");
        assert!(d2 < d3, "backoff should grow: {d2:?} < {d3:?}");
    }

    #[test]
    fn test_compute_backoff_capped() {
        let cfg = RetryConfig {
            max_backoff_ms: 500,
            initial_backoff_ms: 100,
            backoff_multiplier: 10.0,
            jitter: false,
            ..RetryConfig::default()
        };
        let d = compute_backoff(&cfg, 4);
        assert_eq!(d.as_millis(), 500, "delay should be capped");
    }

    #[test]
    fn test_compute_backoff_jitter_bounds() {
        let cfg = RetryConfig {
            initial_backoff_ms: 1_000,
            jitter: true,
            ..RetryConfig::default()
        };
        let d = compute_backoff(&cfg, 1).as_millis();
        assert!((750..=1_250).contains(&d), "jittered delay out of range: {d}");
    }

    // ── retry loop ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_with_retry_permanent_error_returned_as_is() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&no_jitter_cfg(5), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(SinkError::InvalidIntent("bad".into())) }
        })
        .await;

        assert!(matches!(result, Err(SinkError::InvalidIntent(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retry_zero_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&no_jitter_cfg(0), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(SinkError::DatabaseError(sqlx::Error::PoolTimedOut)) }
        })
        .await;

        assert!(matches!(result, Err(SinkError::RetryExhausted { attempts: 1, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    // ── mock provider ─────────────────────────────────────────────────────────

    struct MockProvider {
        fail_count: u32,
        calls: Arc<AtomicU32>,
        permanent: bool,
    }

    #[async_trait]
    impl RpcProvider for MockProvider {
        async fn get_program_account_keys(&self, _: &Pubkey, _: &[u8]) -> Result<Vec<Pubkey>> {
            unimplemented!()
        }

        async fn get_multiple_accounts(&self, _: &[Pubkey]) -> Result<Vec<Option<Account>>> {
            unimplemented!()
        }

        async fn get_signatures_for_address(
            &self,
            _: &Pubkey,
            _: usize,
        ) -> Result<Vec<RpcConfirmedTransactionStatusWithSignature>> {
            let call_no = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.permanent {
                Err(SinkError::DecodingError("permanent".into()))
            } else if call_no <= self.fail_count {
                Err(SinkError::RpcError("transient".into()))
            } else {
                Ok(vec![])
            }
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let mock = MockProvider {
            fail_count: 2,
            calls: calls.clone(),
            permanent: false,
        };
        let retrying = RetryingRpcProvider::new(mock, no_jitter_cfg(5));
        let result = retrying
            .get_signatures_for_address(&Pubkey::default(), 1)
            .await;

        assert!(result.is_ok(), "should eventually succeed: {result:?}");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_permanent_error_no_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let mock = MockProvider {
            fail_count: 99,
            calls: calls.clone(),
            permanent: true,
        };
        let retrying = RetryingRpcProvider::new(mock, no_jitter_cfg(5));
        let result = retrying
            .get_signatures_for_address(&Pubkey::default(), 1)
            .await;

        assert!(result.is_err(), "should fail immediately");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_exhausts_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let max = 3u32;
        let mock = MockProvider {
            fail_count: 999,
            calls: calls.clone(),
            permanent: false,
        };
        let retrying = RetryingRpcProvider::new(mock, no_jitter_cfg(max));
        let result = retrying
            .get_signatures_for_address(&Pubkey::default(), 1)
            .await;

        assert!(
            matches!(result, Err(SinkError::RetryExhausted { .. })),
            "should return RetryExhausted"
        );
        // 1 initial call + max_retries retries
        assert_eq!(calls.load(Ordering::SeqCst), max + 1);
    }
}
