//! Backfill Reconciler.
//!
//! For every registered program and every record type it declares, the
//! reconciler lists matching account addresses, then walks them page by
//! page: fetch the accounts, derive each address's first and last slot from
//! its signature history, decode, map to an upsert and apply. Records that
//! fail to decode or map are counted and skipped; the page continues.
//!
//! Re-running is safe: upserts converge and slot bounds only widen.

use crate::config::BackfillConfig;
use crate::core::apply::ApplyEngine;
use crate::core::mapper::{MetadataResolver, SlotSpan, map_account};
use crate::core::registry::{DecoderRegistry, ProgramDecoder};
use crate::storage::ApplyOutcome;
use crate::utils::error::Result;
use crate::utils::logging::{LogLevel, log, log_batch};
use crate::utils::rpc::RpcProvider;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// `getMultipleAccounts` limit.
const MAX_ACCOUNTS_PER_REQUEST: usize = 100;

/// Counters for one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub record_types: usize,
    /// Addresses listed by the program scan.
    pub discovered: usize,
    /// Rows inserted or updated.
    pub applied: usize,
    pub superseded: usize,
    /// Accounts closed between listing and fetching.
    pub vanished: usize,
    /// Records that failed to decode or map.
    pub skipped: usize,
    /// Records rejected by the store with a permanent error.
    pub rejected: usize,
    /// Whether the run stopped early on cancellation.
    pub cancelled: bool,
}

impl BackfillReport {
    fn merge(&mut self, other: &BackfillReport) {
        self.record_types += other.record_types;
        self.discovered += other.discovered;
        self.applied += other.applied;
        self.superseded += other.superseded;
        self.vanished += other.vanished;
        self.skipped += other.skipped;
        self.rejected += other.rejected;
        self.cancelled |= other.cancelled;
    }
}

pub struct BackfillReconciler {
    rpc: Arc<dyn RpcProvider>,
    decoders: Arc<DecoderRegistry>,
    engine: ApplyEngine,
    resolver: Arc<dyn MetadataResolver>,
    config: BackfillConfig,
    cancellation_token: CancellationToken,
}

impl BackfillReconciler {
    #[must_use]
    pub fn new(
        rpc: Arc<dyn RpcProvider>,
        decoders: Arc<DecoderRegistry>,
        engine: ApplyEngine,
        resolver: Arc<dyn MetadataResolver>,
        config: BackfillConfig,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            rpc,
            decoders,
            engine,
            resolver,
            config,
            cancellation_token,
        }
    }

    /// Reconciles every record type of every registered program.
    ///
    /// # Errors
    ///
    /// Aborts on RPC failures and on store failures that outlast the retry
    /// budget. Per-record decode, mapping and permanent store failures are
    /// counted in the report instead.
    #[tracing::instrument(skip_all)]
    pub async fn run(&self) -> Result<BackfillReport> {
        let mut report = BackfillReport::default();

        let mut programs: Vec<&Pubkey> = self.decoders.program_ids().collect();
        programs.sort();

        for program_id in programs {
            let Some(decoder) = self.decoders.get(program_id) else {
                continue;
            };
            let record_types: Vec<String> =
                decoder.accounts.record_types().map(str::to_string).collect();
            for record_type in record_types {
                if self.cancellation_token.is_cancelled() {
                    report.cancelled = true;
                    return Ok(report);
                }
                if self.engine.catalog().record(&record_type).is_none() {
                    tracing::debug!(%record_type, "No table for record type, skipping");
                    continue;
                }
                let partial = self
                    .reconcile_record_type(program_id, decoder, &record_type)
                    .await?;
                report.merge(&partial);
            }
        }

        log(
            LogLevel::Success,
            &format!(
                "Backfill complete: {} applied, {} superseded, {} skipped, {} rejected",
                report.applied, report.superseded, report.skipped, report.rejected
            ),
        );
        Ok(report)
    }

    /// Reconciles one record type of one program.
    ///
    /// # Errors
    ///
    /// See [`BackfillReconciler::run`].
    #[tracing::instrument(skip(self, decoder), fields(program = %program_id))]
    pub async fn reconcile_record_type(
        &self,
        program_id: &Pubkey,
        decoder: &ProgramDecoder,
        record_type: &str,
    ) -> Result<BackfillReport> {
        let mut report = BackfillReport {
            record_types: 1,
            ..BackfillReport::default()
        };
        let Some(discriminator) = decoder.accounts.discriminator(record_type) else {
            return Ok(report);
        };

        let keys = self
            .rpc
            .get_program_account_keys(program_id, discriminator)
            .await?;
        report.discovered = keys.len();
        log(
            LogLevel::Info,
            &format!("{record_type}: {} accounts", keys.len()),
        );

        let page_size = self.config.page_size.clamp(1, MAX_ACCOUNTS_PER_REQUEST);
        let started = Instant::now();
        let mut processed = 0;
        for page in keys.chunks(page_size) {
            if self.cancellation_token.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let partial = self.reconcile_page(decoder, record_type, page).await?;
            report.merge(&BackfillReport {
                record_types: 0,
                discovered: 0,
                ..partial
            });
            processed += page.len();
            log_batch(
                processed,
                keys.len(),
                u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            );
        }

        Ok(report)
    }

    async fn reconcile_page(
        &self,
        decoder: &ProgramDecoder,
        record_type: &str,
        keys: &[Pubkey],
    ) -> Result<BackfillReport> {
        let mut report = BackfillReport::default();

        let mut accounts = self.rpc.get_multiple_accounts(keys).await?;
        if accounts.len() != keys.len() {
            tracing::warn!(
                requested = keys.len(),
                returned = accounts.len(),
                "Account fetch returned a short page, treating missing keys as closed"
            );
            accounts.resize(keys.len(), None);
        }
        let spans: Vec<Option<SlotSpan>> = stream::iter(keys)
            .map(|key| self.slot_span(key))
            .buffered(self.config.concurrency.max(1))
            .try_collect()
            .await?;

        for ((key, account), slots) in keys.iter().zip(accounts).zip(spans) {
            let address = key.to_string();
            let Some(account) = account else {
                report.vanished += 1;
                continue;
            };

            let decoded = match decoder.accounts.decode_as(record_type, &account.data) {
                Ok(decoded) => decoded,
                Err(e) => {
                    tracing::warn!(%address, %record_type, error = %e, "Skipping undecodable account");
                    report.skipped += 1;
                    continue;
                }
            };

            let intent = match map_account(
                self.engine.catalog(),
                self.resolver.as_ref(),
                &address,
                &decoded,
                slots,
            )
            .await
            {
                Ok(intent) => intent,
                Err(e) => {
                    tracing::warn!(%address, %record_type, error = %e, "Skipping unmappable account");
                    report.skipped += 1;
                    continue;
                }
            };

            match self.engine.apply(&intent).await {
                Ok(ApplyOutcome::Superseded) => report.superseded += 1,
                Ok(_) => report.applied += 1,
                Err(e) if e.is_transient() => return Err(e),
                Err(e) => {
                    tracing::error!(%address, %record_type, error = %e, "Store rejected account");
                    report.rejected += 1;
                }
            }
        }

        Ok(report)
    }

    /// First and last slot in the address's recent signature history.
    async fn slot_span(&self, address: &Pubkey) -> Result<Option<SlotSpan>> {
        let signatures = self
            .rpc
            .get_signatures_for_address(address, self.config.signature_history_limit)
            .await?;
        let first = signatures.iter().map(|s| s.slot).min();
        let last = signatures.iter().map(|s| s.slot).max();
        Ok(first.zip(last).map(|(a, b)| SlotSpan::range(a, b)))
    }
}
