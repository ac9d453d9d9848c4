//! `solana-pg-sink` - materializes Solana program accounts and instructions
//! into Postgres tables.
//!
//! Tables are derived from Anchor IDLs. Two ingestion paths keep them current:
//! a stream of webhook payloads read from a durable queue, and a backfill that
//! reconciles every existing on-chain account over RPC. Both converge on the
//! same row state no matter which runs first or how often each runs.
//!
//! # Quick Start
//!
//! ```no_run
//! use solana_pg_sink::{
//!     ApplyEngine, DecoderRegistry, MemoryStore, SchemaCatalog, SchemaSynthesizer, SinkError,
//!     load_idl_from_str,
//! };
//! use solana_sdk::pubkey::Pubkey;
//! use std::sync::Arc;
//!
//! # async fn example(idl_json: &str) -> solana_pg_sink::Result<()> {
//! let idl = Arc::new(load_idl_from_str(idl_json).map_err(|e| SinkError::IdlError(e.to_string()))?);
//! let synthesizer = SchemaSynthesizer::new("public", Vec::new());
//! let specs = synthesizer.plan(&idl);
//!
//! let store = Arc::new(MemoryStore::new());
//! synthesizer.synthesize(store.as_ref(), &specs).await?;
//!
//! let mut decoders = DecoderRegistry::new();
//! decoders.register(Pubkey::new_unique(), idl);
//!
//! let engine = ApplyEngine::new(
//!     store,
//!     Arc::new(SchemaCatalog::new(specs)?),
//!     Default::default(),
//! );
//! # let _ = (decoders, engine);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! 1. **Schema Synthesizer** - Derives one table per IDL record type and
//!    applies it additively
//! 2. **Event Decoder** - Reads Borsh-encoded accounts and instructions
//!    against the IDL
//! 3. **Mutation Mapper** - Turns decoded events and accounts into mutation
//!    intents, resolving off-chain metadata on the way
//! 4. **Apply Engine** - Executes intents idempotently, ordered by slot
//! 5. **Backfill Reconciler** - Scans on-chain accounts page by page
//! 6. **Stream Consumer** - Drains the queue with at-least-once delivery

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub use config::{SinkConfig, SinkConfigBuilder};
pub use self::core::apply::{ApplyEngine, ApplyOutcome};
pub use self::core::backfill::{BackfillReconciler, BackfillReport};
pub use self::core::consumer::{ConsumerStats, StreamConsumer};
pub use self::core::decoder::{
    AccountDecoder, DecodedAccount, DecodedInstruction, DecodedValue, FieldMap,
    InstructionDecoder,
};
pub use self::core::mapper::{
    ColumnValue, EventMapper, HttpMetadataResolver, MapContext, MapperRegistry,
    MetadataResolver, MutationIntent, MutationOp, NoopResolver, RowMapper, SlotSpan,
};
pub use self::core::registry::DecoderRegistry;
pub use schema::{SchemaCatalog, SchemaSynthesizer, SynthesisReport, TableRef, TableSpec};
pub use solana_idl_parser::{Idl, load_idl_from_path, load_idl_from_str};
pub use storage::{MemoryStore, MutationStore, PgStore, SchemaStore};
pub use streams::{EventQueue, MemoryQueue, QueueEntry, RedisStreamQueue};
pub use utils::error::{FailureClass, Result, SinkError};

// Module declarations
pub mod config;
pub mod core;
pub mod schema;
pub mod storage;
pub mod streams;
pub mod telemetry;
pub mod utils;
