//! Redis stream queue with a consumer group.
//!
//! Entries carry one field, `data`, holding the verbatim payload. Reads go
//! through `XREADGROUP`: on startup the consumer first drains its own pending
//! entries (delivered before a crash, never acknowledged) and then blocks
//! for new ones.

use super::{EventQueue, QueueEntry};
use crate::config::QueueConfig;
use crate::utils::error::{Result, SinkError};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamReadOptions, StreamReadReply};
use std::sync::atomic::{AtomicBool, Ordering};

const DATA_FIELD: &str = "data";

pub struct RedisStreamQueue {
    connection: MultiplexedConnection,
    config: QueueConfig,
    name: String,
    pending_drained: AtomicBool,
}

impl RedisStreamQueue {
    /// Connects and creates the consumer group (and stream) if missing.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::QueueError` if Redis is unreachable or the group
    /// cannot be created.
    pub async fn connect(config: QueueConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())?;
        let mut connection = client.get_multiplexed_async_connection().await?;

        let created: redis::RedisResult<()> = connection
            .xgroup_create_mkstream(&config.stream, &config.group, "0")
            .await;
        match created {
            Ok(()) => tracing::info!(stream = %config.stream, group = %config.group, "Created consumer group"),
            Err(e) if e.code() == Some("BUSYGROUP") => {}
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            connection,
            name: format!("redis:{}", config.stream),
            config,
            pending_drained: AtomicBool::new(false),
        })
    }

    async fn read_from(&self, id: &str, block: bool) -> Result<Vec<QueueEntry>> {
        let mut options = StreamReadOptions::default()
            .group(&self.config.group, &self.config.consumer)
            .count(self.config.read_count);
        if block {
            options = options.block(usize::try_from(self.config.block_ms).unwrap_or(usize::MAX));
        }

        let mut connection = self.connection.clone();
        let reply: Option<StreamReadReply> = connection
            .xread_options(&[self.config.stream.as_str()], &[id], &options)
            .await?;

        let mut entries = Vec::new();
        for key in reply.map(|r| r.keys).unwrap_or_default() {
            for stream_id in key.ids {
                let payload: Vec<u8> = stream_id.get(DATA_FIELD).ok_or_else(|| {
                    SinkError::QueueError(format!(
                        "Entry {} has no '{DATA_FIELD}' field",
                        stream_id.id
                    ))
                })?;
                entries.push(QueueEntry {
                    id: stream_id.id,
                    payload,
                });
            }
        }
        Ok(entries)
    }
}

#[async_trait]
impl EventQueue for RedisStreamQueue {
    async fn enqueue(&self, payload: &[u8]) -> Result<String> {
        let mut connection = self.connection.clone();
        let id: String = connection
            .xadd(&self.config.stream, "*", &[(DATA_FIELD, payload)])
            .await?;
        Ok(id)
    }

    async fn read(&self) -> Result<Vec<QueueEntry>> {
        if !self.pending_drained.load(Ordering::Acquire) {
            let pending = self.read_from("0", false).await?;
            if !pending.is_empty() {
                tracing::info!(count = pending.len(), "Redelivering pending entries");
                return Ok(pending);
            }
            self.pending_drained.store(true, Ordering::Release);
        }
        self.read_from(">", true).await
    }

    async fn acknowledge(&self, id: &str) -> Result<()> {
        let mut connection = self.connection.clone();
        let _: i64 = connection
            .xack(&self.config.stream, &self.config.group, &[id])
            .await?;
        Ok(())
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}
