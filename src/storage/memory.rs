//! In-process store with the same ordering and idempotency rules as
//! [`super::PgStore`].

use super::{ApplyOutcome, MutationStore, SchemaStore};
use crate::core::apply::slots::{
    UpsertAdmission, admit_upsert, contributed, delete_is_stale, merge_created, merge_updated,
};
use crate::core::mapper::{ColumnValue, MutationIntent, MutationOp};
use crate::schema::{ColumnSpec, TableRef, TableSpec};
use crate::utils::error::{Result, SinkError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::Mutex;

/// A stored row.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRow {
    pub values: BTreeMap<String, ColumnValue>,
    pub refreshed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub slot_created_at: u64,
    pub slot_updated_at: u64,
}

impl MemoryRow {
    /// Bound value of `column`; unbound columns read as `NULL`.
    #[must_use]
    pub fn get(&self, column: &str) -> &ColumnValue {
        static NULL: ColumnValue = ColumnValue::Null;
        self.values.get(column).unwrap_or(&NULL)
    }
}

#[derive(Debug, Default)]
struct MemoryTable {
    columns: Vec<String>,
    rows: BTreeMap<String, MemoryRow>,
}

#[derive(Debug, Default)]
struct MemoryState {
    namespaces: BTreeSet<String>,
    tables: HashMap<TableRef, MemoryTable>,
    tombstones: HashMap<(TableRef, String), u64>,
    tombstones_ready: bool,
    /// Remaining applies that fail with a transient error.
    injected_failures: u32,
}

/// Store backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` applies fail as if the connection dropped.
    pub async fn inject_failures(&self, count: u32) {
        self.state.lock().await.injected_failures = count;
    }

    pub async fn row(&self, table: &TableRef, address: &str) -> Option<MemoryRow> {
        let state = self.state.lock().await;
        state.tables.get(table)?.rows.get(address).cloned()
    }

    pub async fn row_count(&self, table: &TableRef) -> usize {
        let state = self.state.lock().await;
        state.tables.get(table).map_or(0, |t| t.rows.len())
    }

    pub async fn tombstone(&self, table: &TableRef, address: &str) -> Option<u64> {
        let state = self.state.lock().await;
        state
            .tombstones
            .get(&(table.clone(), address.to_string()))
            .copied()
    }

    pub async fn namespaces(&self) -> Vec<String> {
        self.state.lock().await.namespaces.iter().cloned().collect()
    }
}

impl MemoryState {
    fn table_mut(&mut self, table: &TableRef) -> Result<&mut MemoryTable> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| SinkError::InvalidIntent(format!("Table {table} does not exist")))
    }

    fn upsert(&mut self, intent: &MutationIntent) -> Result<ApplyOutcome> {
        check_columns(self.table_mut(&intent.table)?, intent)?;
        let key = (intent.table.clone(), intent.address.clone());
        match admit_upsert(self.tombstones.get(&key).copied(), intent.slots) {
            UpsertAdmission::Superseded => return Ok(ApplyOutcome::Superseded),
            UpsertAdmission::Apply { clear_tombstone } => {
                if clear_tombstone {
                    self.tombstones.remove(&key);
                }
            }
        }

        let (first, last) = contributed(intent.slots);
        let now = Utc::now();
        let table = self.table_mut(&intent.table)?;

        match table.rows.get_mut(&intent.address) {
            Some(row) => {
                for binding in &intent.columns {
                    row.values
                        .insert(binding.column.clone(), binding.value.clone());
                }
                row.refreshed_at = now;
                row.slot_created_at = merge_created(row.slot_created_at, first);
                row.slot_updated_at = merge_updated(row.slot_updated_at, last);
                Ok(ApplyOutcome::Upserted)
            }
            None => {
                let values = intent
                    .columns
                    .iter()
                    .map(|b| (b.column.clone(), b.value.clone()))
                    .collect();
                table.rows.insert(
                    intent.address.clone(),
                    MemoryRow {
                        values,
                        refreshed_at: now,
                        created_at: now,
                        slot_created_at: first,
                        slot_updated_at: last,
                    },
                );
                Ok(ApplyOutcome::Inserted)
            }
        }
    }

    fn update(&mut self, intent: &MutationIntent) -> Result<ApplyOutcome> {
        let (_, last) = contributed(intent.slots);
        let table = self.table_mut(&intent.table)?;
        check_columns(table, intent)?;

        let Some(row) = table.rows.get_mut(&intent.address) else {
            return Ok(ApplyOutcome::Missing);
        };
        for binding in &intent.columns {
            row.values
                .insert(binding.column.clone(), binding.value.clone());
        }
        row.refreshed_at = Utc::now();
        row.slot_updated_at = merge_updated(row.slot_updated_at, last);
        Ok(ApplyOutcome::Updated)
    }

    fn delete(&mut self, intent: &MutationIntent) -> Result<ApplyOutcome> {
        let table = self.table_mut(&intent.table)?;
        let row_updated = table.rows.get(&intent.address).map(|r| r.slot_updated_at);
        if delete_is_stale(row_updated, intent.slots) {
            return Ok(ApplyOutcome::Superseded);
        }
        let removed = table.rows.remove(&intent.address).is_some();

        if let Some(span) = intent.slots {
            let entry = self
                .tombstones
                .entry((intent.table.clone(), intent.address.clone()))
                .or_insert(span.last);
            *entry = (*entry).max(span.last);
        }

        Ok(if removed {
            ApplyOutcome::Deleted
        } else {
            ApplyOutcome::Absent
        })
    }
}

fn check_columns(table: &MemoryTable, intent: &MutationIntent) -> Result<()> {
    for binding in &intent.columns {
        if !table.columns.contains(&binding.column) {
            return Err(SinkError::InvalidIntent(format!(
                "Table {} has no column '{}'",
                intent.table, binding.column
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl SchemaStore for MemoryStore {
    async fn ensure_namespace(&self, namespace: &str) -> Result<()> {
        self.state
            .lock()
            .await
            .namespaces
            .insert(namespace.to_string());
        Ok(())
    }

    async fn ensure_tombstones(&self) -> Result<()> {
        self.state.lock().await.tombstones_ready = true;
        Ok(())
    }

    async fn existing_columns(&self, table: &TableRef) -> Result<Option<Vec<String>>> {
        let state = self.state.lock().await;
        Ok(state.tables.get(table).map(|t| t.columns.clone()))
    }

    async fn create_table(&self, spec: &TableSpec) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.namespaces.contains(&spec.table.schema) {
            return Err(SinkError::InternalError(format!(
                "Namespace {} does not exist",
                spec.table.schema
            )));
        }
        state
            .tables
            .entry(spec.table.clone())
            .or_insert_with(|| MemoryTable {
                columns: spec.columns.iter().map(|c| c.name.clone()).collect(),
                rows: BTreeMap::new(),
            });
        Ok(())
    }

    async fn add_column(&self, table: &TableRef, column: &ColumnSpec) -> Result<()> {
        let mut state = self.state.lock().await;
        let table = state.table_mut(table)?;
        if !table.columns.contains(&column.name) {
            table.columns.push(column.name.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl MutationStore for MemoryStore {
    async fn apply(&self, intent: &MutationIntent, _spec: &TableSpec) -> Result<ApplyOutcome> {
        let mut state = self.state.lock().await;
        if state.injected_failures > 0 {
            state.injected_failures -= 1;
            return Err(SinkError::DatabaseError(sqlx::Error::PoolTimedOut));
        }
        if !state.tombstones_ready {
            return Err(SinkError::InternalError(
                "Tombstone table has not been created".to_string(),
            ));
        }
        match intent.op {
            MutationOp::Upsert => state.upsert(intent),
            MutationOp::Update => state.update(intent),
            MutationOp::Delete => state.delete(intent),
        }
    }
}
