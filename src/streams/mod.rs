//! Durable event queues and the webhook payload model.
//!
//! The ingress collaborator enqueues each webhook body verbatim; the Stream
//! Consumer reads entries in delivery order and acknowledges each one only
//! after it reached a terminal outcome. Delivery is at-least-once: an entry
//! read but never acknowledged is delivered again.
//!
//! The `EventQueue` trait lets the consumer run against Redis streams in
//! production and an in-memory queue in tests.

use crate::utils::error::Result;
use async_trait::async_trait;

pub mod memory;
pub mod payload;
pub mod redis_stream;

pub use memory::MemoryQueue;
pub use payload::{WebhookInstruction, WebhookTransaction, parse_payload};
pub use redis_stream::RedisStreamQueue;

/// One queue entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    /// Queue-assigned id, used to acknowledge.
    pub id: String,
    /// Verbatim payload.
    pub payload: Vec<u8>,
}

/// Interface of a durable, acknowledgeable queue.
#[async_trait]
pub trait EventQueue: Send + Sync {
    /// Appends a payload, returning the new entry's id.
    async fn enqueue(&self, payload: &[u8]) -> Result<String>;

    /// Waits for entries and returns them in delivery order.
    ///
    /// Entries delivered earlier but never acknowledged come first. Returns
    /// an empty batch when the wait times out.
    async fn read(&self) -> Result<Vec<QueueEntry>>;

    /// Marks an entry as processed; it is never delivered again.
    async fn acknowledge(&self, id: &str) -> Result<()>;

    /// Human-readable name for logging.
    fn source_name(&self) -> &str;
}
