pub mod apply;
pub mod backfill;
pub mod consumer;
pub mod decoder;
pub mod mapper;
pub mod registry;

pub use apply::ApplyEngine;
pub use backfill::{BackfillReconciler, BackfillReport};
pub use consumer::{ConsumerStats, StreamConsumer};
pub use registry::{DecoderRegistry, ProgramDecoder};
