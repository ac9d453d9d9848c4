//! Schema synthesis: one table per IDL record type.
//!
//! [`SchemaSynthesizer::plan`] is a pure function from an IDL to a list of
//! [`TableSpec`]s. [`SchemaSynthesizer::synthesize`] brings a store in line
//! with those specs additively: missing namespaces, tables and columns are
//! created, nothing is ever dropped, renamed or retyped. Running it twice
//! against the same IDL is a no-op the second time.

pub mod column;
pub mod source;

use crate::config::{RecordTableConfig, SinkConfig};
use crate::storage::SchemaStore;
use crate::utils::error::{Result, SinkError};
use crate::utils::logging::{LogLevel, log};
use crate::utils::naming::{qualified, quote_ident, underscore};
use column::{ColumnType, ScalarType};
use solana_idl_parser::model::IdlRecordType;
use solana_idl_parser::{Idl, classify};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

pub const ADDRESS_COLUMN: &str = "address";
pub const METADATA_COLUMN: &str = "metadata";
pub const REFRESHED_AT_COLUMN: &str = "refreshed_at";
pub const CREATED_AT_COLUMN: &str = "created_at";
pub const SLOT_CREATED_AT_COLUMN: &str = "slot_created_at";
pub const SLOT_UPDATED_AT_COLUMN: &str = "slot_updated_at";

/// Field whose presence gives a record type a `metadata` column.
const METADATA_URI_COLUMN: &str = "metadata_uri";

/// A namespace-qualified table name, already normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
}

impl TableRef {
    #[must_use]
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Quoted `"schema"."table"` for SQL text.
    #[must_use]
    pub fn qualified(&self) -> String {
        qualified(&self.schema, &self.table)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// What a column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Address,
    /// A declared record field.
    Field,
    /// Document resolved from the record's metadata URI.
    Metadata,
    RefreshedAt,
    CreatedAt,
    SlotCreatedAt,
    SlotUpdatedAt,
}

impl ColumnRole {
    /// Columns a mutation intent may bind directly.
    #[must_use]
    pub fn is_bindable(self) -> bool {
        matches!(self, ColumnRole::Field | ColumnRole::Metadata)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
    pub role: ColumnRole,
    /// IDL field name for [`ColumnRole::Field`] columns.
    pub source_field: Option<String>,
    pub nullable: bool,
    pub default_sql: Option<&'static str>,
}

impl ColumnSpec {
    fn bookkeeping(
        name: &str,
        column_type: ColumnType,
        role: ColumnRole,
        nullable: bool,
        default_sql: Option<&'static str>,
    ) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            role,
            source_field: None,
            nullable,
            default_sql,
        }
    }

    /// Column definition as used in `CREATE TABLE` / `ADD COLUMN`.
    #[must_use]
    pub fn definition(&self) -> String {
        let mut sql = format!("{} {}", quote_ident(&self.name), self.column_type.sql());
        if self.role == ColumnRole::Address {
            sql.push_str(" PRIMARY KEY");
        } else if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = self.default_sql {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        sql
    }
}

/// The materialized shape of one record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub record_type: String,
    pub table: TableRef,
    pub columns: Vec<ColumnSpec>,
    /// IDL field holding the metadata URI, when the table has a `metadata`
    /// column.
    pub metadata_source: Option<String>,
}

impl TableSpec {
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column backing an IDL field.
    #[must_use]
    pub fn column_for_field(&self, field: &str) -> Option<&ColumnSpec> {
        self.columns
            .iter()
            .find(|c| c.source_field.as_deref() == Some(field))
    }

    #[must_use]
    pub fn has_metadata(&self) -> bool {
        self.column(METADATA_COLUMN).is_some()
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for this spec.
    #[must_use]
    pub fn create_table_sql(&self) -> String {
        let columns: Vec<String> = self.columns.iter().map(ColumnSpec::definition).collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.table.qualified(),
            columns.join(", ")
        )
    }
}

/// All synthesized tables, addressable by record type and by table.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    tables: Vec<TableSpec>,
    by_record: HashMap<String, usize>,
    by_table: HashMap<TableRef, usize>,
}

impl SchemaCatalog {
    /// Builds a catalog.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::ConfigError` if two record types map onto the
    /// same table or share a name.
    pub fn new(specs: Vec<TableSpec>) -> Result<Self> {
        let mut catalog = Self::default();
        catalog.extend(specs)?;
        Ok(catalog)
    }

    /// Adds specs to the catalog.
    ///
    /// # Errors
    ///
    /// Same as [`SchemaCatalog::new`].
    pub fn extend(&mut self, specs: Vec<TableSpec>) -> Result<()> {
        for spec in specs {
            if let Some(&existing) = self.by_table.get(&spec.table) {
                return Err(SinkError::ConfigError(format!(
                    "Record types '{}' and '{}' both map to table {}; configure a table override",
                    self.tables[existing].record_type, spec.record_type, spec.table
                )));
            }
            if self.by_record.contains_key(&spec.record_type) {
                return Err(SinkError::ConfigError(format!(
                    "Record type '{}' is declared by more than one IDL",
                    spec.record_type
                )));
            }
            let idx = self.tables.len();
            self.by_record.insert(spec.record_type.clone(), idx);
            self.by_table.insert(spec.table.clone(), idx);
            self.tables.push(spec);
        }
        Ok(())
    }

    #[must_use]
    pub fn record(&self, record_type: &str) -> Option<&TableSpec> {
        self.by_record.get(record_type).map(|&i| &self.tables[i])
    }

    #[must_use]
    pub fn table(&self, table: &TableRef) -> Option<&TableSpec> {
        self.by_table.get(table).map(|&i| &self.tables[i])
    }

    #[must_use]
    pub fn tables(&self) -> &[TableSpec] {
        &self.tables
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Outcome of one synthesis run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynthesisReport {
    pub namespaces: Vec<String>,
    pub tables_created: Vec<TableRef>,
    pub columns_added: Vec<(TableRef, String)>,
}

impl SynthesisReport {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.tables_created.is_empty() && self.columns_added.is_empty()
    }
}

/// Derives table specs from IDLs and applies them to a store.
#[derive(Debug, Clone)]
pub struct SchemaSynthesizer {
    record_schema: String,
    overrides: Vec<RecordTableConfig>,
}

impl SchemaSynthesizer {
    #[must_use]
    pub fn new(record_schema: impl Into<String>, overrides: Vec<RecordTableConfig>) -> Self {
        Self {
            record_schema: record_schema.into(),
            overrides,
        }
    }

    #[must_use]
    pub fn from_config(config: &SinkConfig) -> Self {
        Self::new(config.record_schema.clone(), config.tables.clone())
    }

    /// Table specs for every record type the IDL declares, in IDL order.
    #[must_use]
    pub fn plan(&self, idl: &Idl) -> Vec<TableSpec> {
        idl.accounts
            .iter()
            .map(|record| self.table_spec(idl, record))
            .collect()
    }

    fn table_ref(&self, record_type: &str) -> TableRef {
        let config = self.overrides.iter().find(|o| o.record_type == record_type);
        let schema = config
            .and_then(|c| c.schema.as_deref())
            .unwrap_or(&self.record_schema);
        let table = config
            .and_then(|c| c.table.as_deref())
            .unwrap_or(record_type);
        TableRef::new(underscore(schema), underscore(table))
    }

    /// Column set for one record type.
    ///
    /// Field columns keep IDL order between `address` and the bookkeeping
    /// columns. A field whose normalized name collides with an earlier column
    /// is skipped with a warning.
    #[must_use]
    pub fn table_spec(&self, idl: &Idl, record: &IdlRecordType) -> TableSpec {
        let table = self.table_ref(&record.name);
        let mut columns = vec![ColumnSpec::bookkeeping(
            ADDRESS_COLUMN,
            ColumnType::scalar(ScalarType::Text),
            ColumnRole::Address,
            false,
            None,
        )];
        let reserved: BTreeSet<&str> = [
            ADDRESS_COLUMN,
            METADATA_COLUMN,
            REFRESHED_AT_COLUMN,
            CREATED_AT_COLUMN,
            SLOT_CREATED_AT_COLUMN,
            SLOT_UPDATED_AT_COLUMN,
        ]
        .into_iter()
        .collect();

        let mut metadata_source = None;
        for field in idl.record_fields(record) {
            let name = underscore(&field.name);
            if reserved.contains(name.as_str()) || columns.iter().any(|c| c.name == name) {
                tracing::warn!(
                    record_type = %record.name,
                    field = %field.name,
                    column = %name,
                    "Field collides with an existing column, skipping"
                );
                continue;
            }
            if name == METADATA_URI_COLUMN {
                metadata_source = Some(field.name.clone());
            }
            columns.push(ColumnSpec {
                name,
                column_type: ColumnType::from_semantic(&classify(idl, &field.ty)),
                role: ColumnRole::Field,
                source_field: Some(field.name.clone()),
                nullable: true,
                default_sql: None,
            });
        }

        if metadata_source.is_some() {
            columns.push(ColumnSpec::bookkeeping(
                METADATA_COLUMN,
                ColumnType::scalar(ScalarType::Jsonb),
                ColumnRole::Metadata,
                true,
                None,
            ));
        }
        columns.extend([
            ColumnSpec::bookkeeping(
                REFRESHED_AT_COLUMN,
                ColumnType::scalar(ScalarType::TimestampTz),
                ColumnRole::RefreshedAt,
                true,
                None,
            ),
            ColumnSpec::bookkeeping(
                CREATED_AT_COLUMN,
                ColumnType::scalar(ScalarType::TimestampTz),
                ColumnRole::CreatedAt,
                false,
                Some("NOW()"),
            ),
            ColumnSpec::bookkeeping(
                SLOT_CREATED_AT_COLUMN,
                ColumnType::scalar(ScalarType::BigInt),
                ColumnRole::SlotCreatedAt,
                false,
                Some("0"),
            ),
            ColumnSpec::bookkeeping(
                SLOT_UPDATED_AT_COLUMN,
                ColumnType::scalar(ScalarType::BigInt),
                ColumnRole::SlotUpdatedAt,
                false,
                Some("0"),
            ),
        ]);

        TableSpec {
            record_type: record.name.clone(),
            table,
            columns,
            metadata_source,
        }
    }

    /// Brings `store` in line with `specs`, additively.
    ///
    /// # Errors
    ///
    /// Propagates store failures; a failed run can be retried safely.
    #[tracing::instrument(skip_all, fields(tables = specs.len()))]
    pub async fn synthesize(
        &self,
        store: &dyn SchemaStore,
        specs: &[TableSpec],
    ) -> Result<SynthesisReport> {
        let mut report = SynthesisReport::default();

        let namespaces: BTreeSet<&str> = specs
            .iter()
            .map(|s| s.table.schema.as_str())
            .chain(std::iter::once(self.record_schema.as_str()))
            .collect();
        for namespace in namespaces {
            store.ensure_namespace(namespace).await?;
            report.namespaces.push(namespace.to_string());
        }
        store.ensure_tombstones().await?;

        for spec in specs {
            match store.existing_columns(&spec.table).await? {
                None => {
                    store.create_table(spec).await?;
                    log(LogLevel::Success, &format!("Created table {}", spec.table));
                    report.tables_created.push(spec.table.clone());
                }
                Some(existing) => {
                    let existing: BTreeSet<String> = existing.into_iter().collect();
                    for column in spec.columns.iter().filter(|c| !existing.contains(&c.name)) {
                        store.add_column(&spec.table, column).await?;
                        log(
                            LogLevel::Info,
                            &format!("Added column {}.{}", spec.table, column.name),
                        );
                        report
                            .columns_added
                            .push((spec.table.clone(), column.name.clone()));
                    }
                }
            }
        }

        Ok(report)
    }
}
