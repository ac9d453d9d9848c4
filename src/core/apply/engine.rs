use crate::config::RetryConfig;
use crate::core::mapper::MutationIntent;
use crate::schema::SchemaCatalog;
use crate::storage::{ApplyOutcome, MutationStore};
use crate::utils::error::{Result, SinkError};
use crate::utils::retry::with_retry;
use std::sync::Arc;

/// Single entry point for writes from both ingestion paths.
///
/// Intents are validated against the catalog, then handed to the store with
/// transient failures retried under the configured policy.
#[derive(Clone)]
pub struct ApplyEngine {
    store: Arc<dyn MutationStore>,
    catalog: Arc<SchemaCatalog>,
    retry: RetryConfig,
}

impl ApplyEngine {
    #[must_use]
    pub fn new(store: Arc<dyn MutationStore>, catalog: Arc<SchemaCatalog>, retry: RetryConfig) -> Self {
        Self {
            store,
            catalog,
            retry,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Applies one intent.
    ///
    /// # Errors
    ///
    /// - `SinkError::InvalidIntent` if the intent does not fit its table.
    /// - Permanent store errors unchanged.
    /// - `SinkError::RetryExhausted` once transient failures outlast the
    ///   retry budget.
    pub async fn apply(&self, intent: &MutationIntent) -> Result<ApplyOutcome> {
        let spec = self.catalog.table(&intent.table).ok_or_else(|| {
            SinkError::InvalidIntent(format!("Unknown table {}", intent.table))
        })?;
        intent.validate(spec)?;

        let outcome = with_retry(&self.retry, "apply", || self.store.apply(intent, spec)).await?;

        let slot = intent.slots.map(|s| s.last);
        match outcome {
            ApplyOutcome::Missing => tracing::warn!(
                table = %intent.table,
                address = %intent.address,
                event = %intent.event,
                ?slot,
                "Update target does not exist, nothing written"
            ),
            ApplyOutcome::Superseded => tracing::info!(
                table = %intent.table,
                address = %intent.address,
                event = %intent.event,
                ?slot,
                "Write superseded by a newer change"
            ),
            _ => tracing::debug!(
                table = %intent.table,
                address = %intent.address,
                event = %intent.event,
                ?slot,
                %outcome,
                "Applied"
            ),
        }

        Ok(outcome)
    }
}

impl std::fmt::Debug for ApplyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplyEngine")
            .field("tables", &self.catalog.tables().len())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
