//! In-process queue with consumer-group semantics.

use super::{EventQueue, QueueEntry};
use crate::utils::error::{Result, SinkError};
use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

#[derive(Debug, Default)]
struct QueueState {
    next_id: u64,
    undelivered: VecDeque<QueueEntry>,
    /// Delivered, not yet acknowledged, keyed by sequence.
    pending: BTreeMap<u64, QueueEntry>,
    acknowledged: Vec<String>,
    redeliver: bool,
    injected_failures: u32,
}

/// Queue held in memory.
///
/// Mirrors a Redis consumer group: delivered entries stay pending until
/// acknowledged, and [`MemoryQueue::redeliver_pending`] simulates a consumer
/// restart that re-reads them.
#[derive(Debug)]
pub struct MemoryQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    block: Duration,
    read_count: usize,
}

impl MemoryQueue {
    #[must_use]
    pub fn new(block: Duration, read_count: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            block,
            read_count: read_count.max(1),
        }
    }

    /// Makes the next read return every pending entry again.
    pub async fn redeliver_pending(&self) {
        self.state.lock().await.redeliver = true;
        self.notify.notify_one();
    }

    /// Makes the next `count` reads or acknowledgements fail as if the
    /// connection dropped.
    pub async fn inject_failures(&self, count: u32) {
        self.state.lock().await.injected_failures = count;
    }

    pub async fn pending_ids(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.pending.values().map(|e| e.id.clone()).collect()
    }

    pub async fn acknowledged(&self) -> Vec<String> {
        self.state.lock().await.acknowledged.clone()
    }

    /// Entries never delivered.
    pub async fn backlog(&self) -> usize {
        self.state.lock().await.undelivered.len()
    }

    async fn fail_if_injected(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.injected_failures > 0 {
            state.injected_failures -= 1;
            return Err(SinkError::QueueError("connection reset".to_string()));
        }
        Ok(())
    }

    async fn take(&self) -> Vec<QueueEntry> {
        let mut state = self.state.lock().await;
        if state.redeliver {
            state.redeliver = false;
            if !state.pending.is_empty() {
                return state.pending.values().cloned().collect();
            }
        }

        let mut batch = Vec::new();
        while batch.len() < self.read_count {
            let Some(entry) = state.undelivered.pop_front() else {
                break;
            };
            let seq = sequence(&entry.id);
            state.pending.insert(seq, entry.clone());
            batch.push(entry);
        }
        batch
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new(Duration::from_millis(50), 10)
    }
}

fn sequence(id: &str) -> u64 {
    id.split('-')
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}

#[async_trait]
impl EventQueue for MemoryQueue {
    async fn enqueue(&self, payload: &[u8]) -> Result<String> {
        let id = {
            let mut state = self.state.lock().await;
            state.next_id += 1;
            let id = format!("{}-0", state.next_id);
            state.undelivered.push_back(QueueEntry {
                id: id.clone(),
                payload: payload.to_vec(),
            });
            id
        };
        self.notify.notify_one();
        Ok(id)
    }

    async fn read(&self) -> Result<Vec<QueueEntry>> {
        self.fail_if_injected().await?;
        let batch = self.take().await;
        if !batch.is_empty() {
            return Ok(batch);
        }
        if tokio::time::timeout(self.block, self.notify.notified())
            .await
            .is_err()
        {
            return Ok(Vec::new());
        }
        Ok(self.take().await)
    }

    async fn acknowledge(&self, id: &str) -> Result<()> {
        self.fail_if_injected().await?;
        let mut state = self.state.lock().await;
        if state.pending.remove(&sequence(id)).is_some() {
            state.acknowledged.push(id.to_string());
        }
        Ok(())
    }

    fn source_name(&self) -> &str {
        "memory"
    }
}
