//! Stream Consumer.
//!
//! Reads webhook payloads from the durable queue in delivery order and drives
//! each instruction through decode, map and apply. An entry is acknowledged
//! only once every instruction in it reached a terminal outcome: applied,
//! superseded, or skipped as permanently bad. Queue reads and acknowledgements
//! are retried with backoff. A transient failure that outlasts the retry
//! budget stops the consumer without acknowledging, so the entry is
//! redelivered on restart.

use crate::core::apply::{ApplyEngine, ApplyOutcome};
use crate::core::mapper::{MapContext, MapperRegistry, MetadataResolver};
use crate::core::registry::DecoderRegistry;
use crate::streams::{EventQueue, QueueEntry, WebhookInstruction, parse_payload};
use crate::utils::error::Result;
use crate::utils::logging::{LogLevel, log};
use crate::utils::retry::with_retry;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Running totals since the consumer started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub entries: u64,
    pub instructions: u64,
    pub applied: u64,
    pub superseded: u64,
    /// Updates whose target row did not exist.
    pub missing: u64,
    /// Instructions for programs with no registered IDL.
    pub ignored: u64,
    /// Instructions or entries dropped on a permanent failure.
    pub skipped: u64,
}

pub struct StreamConsumer {
    queue: Arc<dyn EventQueue>,
    decoders: Arc<DecoderRegistry>,
    mappers: Arc<MapperRegistry>,
    engine: ApplyEngine,
    resolver: Arc<dyn MetadataResolver>,
    cancellation_token: CancellationToken,
    stats: ConsumerStats,
}

impl StreamConsumer {
    #[must_use]
    pub fn new(
        queue: Arc<dyn EventQueue>,
        decoders: Arc<DecoderRegistry>,
        mappers: Arc<MapperRegistry>,
        engine: ApplyEngine,
        resolver: Arc<dyn MetadataResolver>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            queue,
            decoders,
            mappers,
            engine,
            resolver,
            cancellation_token,
            stats: ConsumerStats::default(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> ConsumerStats {
        self.stats
    }

    /// Consumes until cancelled.
    ///
    /// # Errors
    ///
    /// Returns the first transient failure that outlasts the retry budget
    /// (queue unreachable, store retries exhausted). The entry being
    /// processed stays unacknowledged.
    pub async fn run(&mut self) -> Result<ConsumerStats> {
        log(
            LogLevel::Info,
            &format!("Consuming from {}", self.queue.source_name()),
        );

        loop {
            let batch = tokio::select! {
                () = self.cancellation_token.cancelled() => {
                    log(LogLevel::Info, "Consumer cancelled, shutting down");
                    return Ok(self.stats);
                }
                batch = with_retry(self.engine.retry_config(), "queue read", || {
                    self.queue.read()
                }) => batch?,
            };

            for entry in batch {
                if self.cancellation_token.is_cancelled() {
                    return Ok(self.stats);
                }
                self.process_entry(&entry).await?;
            }
        }
    }

    /// Processes one entry and acknowledges it.
    ///
    /// # Errors
    ///
    /// Returns a transient failure without acknowledging the entry.
    #[tracing::instrument(skip_all, fields(entry = %entry.id))]
    pub async fn process_entry(&mut self, entry: &QueueEntry) -> Result<()> {
        self.stats.entries += 1;

        match parse_payload(&entry.payload) {
            Ok(transactions) => {
                for tx in &transactions {
                    for instruction in &tx.instructions {
                        self.stats.instructions += 1;
                        if let Err(e) = self.process_instruction(instruction, tx.slot).await {
                            if e.is_transient() {
                                log(
                                    LogLevel::Error,
                                    &format!("Stopping on transient failure: {e}"),
                                );
                                return Err(e);
                            }
                            self.stats.skipped += 1;
                            tracing::warn!(
                                signature = tx.signature.as_deref().unwrap_or_default(),
                                slot = ?tx.slot,
                                program = %instruction.program_id,
                                error = %e,
                                "Skipping instruction"
                            );
                        }
                    }
                }
            }
            Err(e) => {
                self.stats.skipped += 1;
                tracing::warn!(error = %e, "Skipping malformed entry");
            }
        }

        with_retry(self.engine.retry_config(), "queue acknowledge", || {
            self.queue.acknowledge(&entry.id)
        })
        .await
    }

    async fn process_instruction(
        &mut self,
        instruction: &WebhookInstruction,
        slot: Option<u64>,
    ) -> Result<()> {
        let Ok(program_id) = Pubkey::from_str(&instruction.program_id) else {
            self.stats.ignored += 1;
            tracing::debug!(program = %instruction.program_id, "Ignoring malformed program id");
            return Ok(());
        };
        if !self.decoders.is_registered(&program_id) {
            self.stats.ignored += 1;
            tracing::debug!(program = %program_id, "Ignoring unregistered program");
            return Ok(());
        }

        let data = instruction.data_bytes()?;
        let decoded = self
            .decoders
            .decode_instruction(&program_id, &data, &instruction.accounts)?;

        let ctx = MapContext {
            catalog: self.engine.catalog(),
            resolver: self.resolver.as_ref(),
            slot,
        };
        let Some(intent) = self.mappers.map(&decoded, &ctx).await? else {
            return Ok(());
        };

        match self.engine.apply(&intent).await? {
            ApplyOutcome::Superseded => self.stats.superseded += 1,
            ApplyOutcome::Missing => self.stats.missing += 1,
            outcome if outcome.is_write() => self.stats.applied += 1,
            _ => {}
        }
        Ok(())
    }
}

impl std::fmt::Debug for StreamConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConsumer")
            .field("source", &self.queue.source_name())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

