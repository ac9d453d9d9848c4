//! PostgreSQL store.
//!
//! Every statement is parameterized: identifiers come from the synthesized
//! schema and are quoted, values are always bound. Each value is bound as
//! text (or a native integer/boolean) and cast to the column type in SQL.

use super::{ApplyOutcome, MutationStore, SchemaStore, TOMBSTONE_TABLE};
use crate::config::StoreConfig;
use crate::core::apply::slots::{UpsertAdmission, admit_upsert, contributed, delete_is_stale};
use crate::core::mapper::{ColumnValue, MutationIntent, MutationOp};
use crate::schema::column::ColumnType;
use crate::schema::{
    ADDRESS_COLUMN, ColumnSpec, REFRESHED_AT_COLUMN, SLOT_CREATED_AT_COLUMN,
    SLOT_UPDATED_AT_COLUMN, TableRef, TableSpec,
};
use crate::utils::error::{Result, SinkError};
use crate::utils::naming::{qualified, quote_ident};
use async_trait::async_trait;
use sqlx::QueryBuilder;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgPool, PgPoolOptions, Postgres};
use std::str::FromStr;
use std::time::Duration;

/// Database store backed by a `PostgreSQL` connection pool.
///
/// # Example
///
/// ```no_run
/// use solana_pg_sink::config::StoreConfig;
/// use solana_pg_sink::storage::PgStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = PgStore::new("postgresql://localhost/gum", &StoreConfig::default(), "public").await?;
/// store.initialize().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    bookkeeping_schema: String,
}

impl PgStore {
    /// Opens a pool against `database_url`.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::DatabaseError` if the URL is invalid or the first
    /// connection fails.
    pub async fn new(
        database_url: &str,
        config: &StoreConfig,
        bookkeeping_schema: &str,
    ) -> Result<Self> {
        let options = PgConnectOptions::from_str(database_url)?
            .options([("statement_timeout", config.statement_timeout_ms.to_string())]);
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(options)
            .await?;

        Ok(Self::from_pool(pool, bookkeeping_schema))
    }

    #[must_use]
    pub fn from_pool(pool: PgPool, bookkeeping_schema: &str) -> Self {
        Self {
            pool,
            bookkeeping_schema: bookkeeping_schema.to_string(),
        }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the bookkeeping namespace and tombstone table.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::DatabaseError` if a statement fails.
    pub async fn initialize(&self) -> Result<()> {
        self.ensure_namespace(&self.bookkeeping_schema).await?;
        self.ensure_tombstones().await
    }

    /// Closes the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn tombstones(&self) -> String {
        qualified(&self.bookkeeping_schema, TOMBSTONE_TABLE)
    }

    /// Serializes upserts and deletes of one address until the transaction
    /// ends. A tombstone row that does not exist yet cannot be locked with
    /// `FOR UPDATE`, so the address itself is locked.
    async fn lock_address(&self, conn: &mut PgConnection, intent: &MutationIntent) -> Result<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(row_lock_key(&intent.table, &intent.address))
            .execute(conn)
            .await?;
        Ok(())
    }

    async fn tombstone_slot(
        &self,
        conn: &mut PgConnection,
        intent: &MutationIntent,
    ) -> Result<Option<u64>> {
        let sql = format!(
            "SELECT slot FROM {} WHERE namespace = $1 AND table_name = $2 AND address = $3 FOR UPDATE",
            self.tombstones()
        );
        let slot = sqlx::query_scalar::<_, i64>(&sql)
            .bind(intent.table.schema.as_str())
            .bind(intent.table.table.as_str())
            .bind(intent.address.as_str())
            .fetch_optional(conn)
            .await?;
        Ok(slot.map(slot_value))
    }

    async fn clear_tombstone(&self, conn: &mut PgConnection, intent: &MutationIntent) -> Result<()> {
        let sql = format!(
            "DELETE FROM {} WHERE namespace = $1 AND table_name = $2 AND address = $3",
            self.tombstones()
        );
        sqlx::query(&sql)
            .bind(intent.table.schema.as_str())
            .bind(intent.table.table.as_str())
            .bind(intent.address.as_str())
            .execute(conn)
            .await?;
        Ok(())
    }

    async fn record_tombstone(
        &self,
        conn: &mut PgConnection,
        intent: &MutationIntent,
        slot: u64,
    ) -> Result<()> {
        let table = self.tombstones();
        let sql = format!(
            "INSERT INTO {table} AS t (namespace, table_name, address, slot) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (namespace, table_name, address) \
             DO UPDATE SET slot = GREATEST(t.slot, EXCLUDED.slot), deleted_at = NOW()"
        );
        sqlx::query(&sql)
            .bind(intent.table.schema.as_str())
            .bind(intent.table.table.as_str())
            .bind(intent.address.as_str())
            .bind(slot_param(slot))
            .execute(conn)
            .await?;
        Ok(())
    }

    async fn upsert(&self, intent: &MutationIntent, spec: &TableSpec) -> Result<ApplyOutcome> {
        let mut tx = self.pool.begin().await?;
        self.lock_address(&mut *tx, intent).await?;

        if intent.slots.is_some() {
            let tombstone = self.tombstone_slot(&mut *tx, intent).await?;
            match admit_upsert(tombstone, intent.slots) {
                UpsertAdmission::Superseded => {
                    tx.rollback().await?;
                    return Ok(ApplyOutcome::Superseded);
                }
                UpsertAdmission::Apply { clear_tombstone } => {
                    if clear_tombstone {
                        self.clear_tombstone(&mut *tx, intent).await?;
                    }
                }
            }
        }

        let (first, last) = contributed(intent.slots);
        let created = quote_ident(SLOT_CREATED_AT_COLUMN);
        let updated = quote_ident(SLOT_UPDATED_AT_COLUMN);
        let refreshed = quote_ident(REFRESHED_AT_COLUMN);

        let mut qb = QueryBuilder::<Postgres>::new("INSERT INTO ");
        qb.push(spec.table.qualified())
            .push(" AS target (")
            .push(quote_ident(ADDRESS_COLUMN));
        for binding in &intent.columns {
            qb.push(", ").push(quote_ident(&binding.column));
        }
        qb.push(format!(", {refreshed}, {created}, {updated}) VALUES ("));
        qb.push_bind(intent.address.clone());
        for binding in &intent.columns {
            qb.push(", ");
            push_value(&mut qb, &binding.value, column_type(spec, &binding.column)?);
        }
        qb.push(", NOW(), ")
            .push_bind(slot_param(first))
            .push(", ")
            .push_bind(slot_param(last))
            .push(") ON CONFLICT (")
            .push(quote_ident(ADDRESS_COLUMN))
            .push(") DO UPDATE SET ");
        for binding in &intent.columns {
            let column = quote_ident(&binding.column);
            qb.push(format!("{column} = EXCLUDED.{column}, "));
        }
        qb.push(format!(
            "{refreshed} = EXCLUDED.{refreshed}, \
             {created} = CASE \
                 WHEN EXCLUDED.{created} = 0 THEN target.{created} \
                 WHEN target.{created} = 0 THEN EXCLUDED.{created} \
                 ELSE LEAST(target.{created}, EXCLUDED.{created}) END, \
             {updated} = GREATEST(target.{updated}, EXCLUDED.{updated}) \
             RETURNING (xmax = 0) AS inserted"
        ));

        let inserted: bool = qb.build_query_scalar::<bool>().fetch_one(&mut *tx).await?;
        tx.commit().await?;

        Ok(if inserted {
            ApplyOutcome::Inserted
        } else {
            ApplyOutcome::Upserted
        })
    }

    async fn update(&self, intent: &MutationIntent, spec: &TableSpec) -> Result<ApplyOutcome> {
        let (_, last) = contributed(intent.slots);
        let updated = quote_ident(SLOT_UPDATED_AT_COLUMN);

        let mut tx = self.pool.begin().await?;
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE ");
        qb.push(spec.table.qualified()).push(" SET ");
        for binding in &intent.columns {
            qb.push(quote_ident(&binding.column)).push(" = ");
            push_value(&mut qb, &binding.value, column_type(spec, &binding.column)?);
            qb.push(", ");
        }
        qb.push(format!(
            "{} = NOW(), {updated} = GREATEST({updated}, ",
            quote_ident(REFRESHED_AT_COLUMN)
        ))
        .push_bind(slot_param(last))
        .push(") WHERE ")
        .push(quote_ident(ADDRESS_COLUMN))
        .push(" = ")
        .push_bind(intent.address.clone());

        let affected = qb.build().execute(&mut *tx).await?.rows_affected();
        tx.commit().await?;

        Ok(if affected == 0 {
            ApplyOutcome::Missing
        } else {
            ApplyOutcome::Updated
        })
    }

    async fn delete(&self, intent: &MutationIntent, spec: &TableSpec) -> Result<ApplyOutcome> {
        let mut tx = self.pool.begin().await?;
        self.lock_address(&mut *tx, intent).await?;

        let select = format!(
            "SELECT {} FROM {} WHERE {} = $1 FOR UPDATE",
            quote_ident(SLOT_UPDATED_AT_COLUMN),
            spec.table.qualified(),
            quote_ident(ADDRESS_COLUMN)
        );
        let row_updated = sqlx::query_scalar::<_, i64>(&select)
            .bind(intent.address.as_str())
            .fetch_optional(&mut *tx)
            .await?
            .map(slot_value);

        if delete_is_stale(row_updated, intent.slots) {
            tx.rollback().await?;
            return Ok(ApplyOutcome::Superseded);
        }

        if row_updated.is_some() {
            let delete = format!(
                "DELETE FROM {} WHERE {} = $1",
                spec.table.qualified(),
                quote_ident(ADDRESS_COLUMN)
            );
            sqlx::query(&delete)
                .bind(intent.address.as_str())
                .execute(&mut *tx)
                .await?;
        }
        if let Some(span) = intent.slots {
            self.record_tombstone(&mut *tx, intent, span.last).await?;
        }
        tx.commit().await?;

        Ok(if row_updated.is_some() {
            ApplyOutcome::Deleted
        } else {
            ApplyOutcome::Absent
        })
    }
}

#[async_trait]
impl SchemaStore for PgStore {
    async fn ensure_namespace(&self, namespace: &str) -> Result<()> {
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(namespace)))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn ensure_tombstones(&self) -> Result<()> {
        let sql = format!(
            r"
            CREATE TABLE IF NOT EXISTS {} (
                namespace TEXT NOT NULL,
                table_name TEXT NOT NULL,
                address TEXT NOT NULL,
                slot BIGINT NOT NULL,
                deleted_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (namespace, table_name, address)
            )
            ",
            self.tombstones()
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }

    async fn existing_columns(&self, table: &TableRef) -> Result<Option<Vec<String>>> {
        let columns = sqlx::query_scalar::<_, String>(
            r"
            SELECT column_name::TEXT
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
            ",
        )
        .bind(table.schema.as_str())
        .bind(table.table.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(if columns.is_empty() {
            None
        } else {
            Some(columns)
        })
    }

    async fn create_table(&self, spec: &TableSpec) -> Result<()> {
        sqlx::query(&spec.create_table_sql())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn add_column(&self, table: &TableRef, column: &ColumnSpec) -> Result<()> {
        let sql = format!(
            "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {}",
            table.qualified(),
            column.definition()
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl MutationStore for PgStore {
    async fn apply(&self, intent: &MutationIntent, spec: &TableSpec) -> Result<ApplyOutcome> {
        match intent.op {
            MutationOp::Upsert => self.upsert(intent, spec).await,
            MutationOp::Update => self.update(intent, spec).await,
            MutationOp::Delete => self.delete(intent, spec).await,
        }
    }
}

fn column_type<'a>(spec: &'a TableSpec, column: &str) -> Result<&'a ColumnType> {
    spec.column(column)
        .map(|c| &c.column_type)
        .ok_or_else(|| {
            SinkError::InvalidIntent(format!("Table {} has no column '{column}'", spec.table))
        })
}

/// Binds `value` followed by a cast to the column type.
fn push_value(qb: &mut QueryBuilder<'_, Postgres>, value: &ColumnValue, column_type: &ColumnType) {
    match value {
        ColumnValue::Bool(b) => {
            qb.push_bind(*b);
        }
        ColumnValue::Integer(i) => {
            qb.push_bind(*i);
        }
        ColumnValue::Array(items) => {
            let items: Vec<Option<String>> = items.iter().map(ColumnValue::to_sql_text).collect();
            qb.push_bind(items).push("::TEXT[]");
        }
        other => {
            qb.push_bind(other.to_sql_text());
        }
    }
    qb.push("::").push(column_type.sql());
}

fn slot_param(slot: u64) -> i64 {
    i64::try_from(slot).unwrap_or(i64::MAX)
}

fn slot_value(slot: i64) -> u64 {
    u64::try_from(slot).unwrap_or(0)
}

fn row_lock_key(table: &TableRef, address: &str) -> String {
    format!("{}.{}:{address}", table.schema, table.table)
}
