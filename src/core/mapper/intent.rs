//! Mutation intents: explicit, ephemeral descriptions of one row write.

use crate::core::decoder::DecodedValue;
use crate::schema::column::{ColumnType, ScalarType};
use crate::schema::{TableRef, TableSpec};
use crate::utils::error::{Result, SinkError};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationOp {
    /// Insert, or update the existing row with the same address.
    Upsert,
    /// Update an existing row; an absent row is left absent.
    Update,
    /// Remove the row; an absent row is a no-op.
    Delete,
}

impl fmt::Display for MutationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MutationOp::Upsert => "upsert",
            MutationOp::Update => "update",
            MutationOp::Delete => "delete",
        })
    }
}

/// A value ready to be bound as a statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    Text(String),
    Bool(bool),
    Integer(i64),
    /// Arbitrary-precision integer in decimal notation.
    Numeric(String),
    Json(Value),
    Array(Vec<ColumnValue>),
}

impl ColumnValue {
    /// Coerces a decoded value to the representation of `column_type`.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::MappingError` when the value does not fit the
    /// column, e.g. a string bound to an `INTEGER` column.
    pub fn from_decoded(value: &DecodedValue, column_type: &ColumnType) -> Result<Self> {
        if value.is_null() {
            return Ok(ColumnValue::Null);
        }
        if column_type.array {
            let items: Vec<DecodedValue> = match value {
                DecodedValue::List(items) => items.clone(),
                DecodedValue::Bytes(bytes) => {
                    bytes.iter().map(|b| DecodedValue::UInt((*b).into())).collect()
                }
                other => return Err(mismatch(other, column_type)),
            };
            return items
                .iter()
                .map(|item| Self::from_scalar(item, column_type.scalar))
                .collect::<Result<Vec<_>>>()
                .map(ColumnValue::Array);
        }
        Self::from_scalar(value, column_type.scalar)
    }

    fn from_scalar(value: &DecodedValue, scalar: ScalarType) -> Result<Self> {
        let column_type = ColumnType::scalar(scalar);
        Ok(match (scalar, value) {
            (_, DecodedValue::Null) => ColumnValue::Null,
            (ScalarType::Jsonb, v) => ColumnValue::Json(v.to_json()),
            (ScalarType::Text, DecodedValue::String(s) | DecodedValue::Address(s)) => {
                ColumnValue::Text(s.clone())
            }
            (ScalarType::Boolean, DecodedValue::Bool(b)) => ColumnValue::Bool(*b),
            (ScalarType::Integer | ScalarType::BigInt, DecodedValue::Int(i)) => {
                ColumnValue::Integer(i64::try_from(*i).map_err(|_| mismatch(value, &column_type))?)
            }
            (ScalarType::Integer | ScalarType::BigInt, DecodedValue::UInt(u)) => {
                ColumnValue::Integer(i64::try_from(*u).map_err(|_| mismatch(value, &column_type))?)
            }
            (ScalarType::Numeric, DecodedValue::Int(i)) => ColumnValue::Numeric(i.to_string()),
            (ScalarType::Numeric, DecodedValue::UInt(u)) => ColumnValue::Numeric(u.to_string()),
            (_, other) => return Err(mismatch(other, &column_type)),
        })
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }

    /// Text form of a scalar, as Postgres would parse it. `None` for `NULL`.
    #[must_use]
    pub fn to_sql_text(&self) -> Option<String> {
        match self {
            ColumnValue::Null => None,
            ColumnValue::Text(s) | ColumnValue::Numeric(s) => Some(s.clone()),
            ColumnValue::Bool(b) => Some(b.to_string()),
            ColumnValue::Integer(i) => Some(i.to_string()),
            ColumnValue::Json(v) => Some(v.to_string()),
            ColumnValue::Array(_) => Some(self.to_json().to_string()),
        }
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            ColumnValue::Null => Value::Null,
            ColumnValue::Text(s) | ColumnValue::Numeric(s) => Value::String(s.clone()),
            ColumnValue::Bool(b) => Value::Bool(*b),
            ColumnValue::Integer(i) => Value::from(*i),
            ColumnValue::Json(v) => v.clone(),
            ColumnValue::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }
}

fn mismatch(value: &DecodedValue, column_type: &ColumnType) -> SinkError {
    SinkError::MappingError(format!(
        "Cannot store {} in a {column_type} column",
        value.to_json()
    ))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub column: String,
    pub value: ColumnValue,
}

impl Binding {
    #[must_use]
    pub fn new(column: impl Into<String>, value: ColumnValue) -> Self {
        Self {
            column: column.into(),
            value,
        }
    }
}

/// First and last source slots an intent was observed at.
///
/// Stream events carry a single slot; backfill derives a range from the
/// address history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSpan {
    pub first: u64,
    pub last: u64,
}

impl SlotSpan {
    #[must_use]
    pub fn at(slot: u64) -> Self {
        Self {
            first: slot,
            last: slot,
        }
    }

    #[must_use]
    pub fn range(a: u64, b: u64) -> Self {
        Self {
            first: a.min(b),
            last: a.max(b),
        }
    }
}

/// One row-level write.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationIntent {
    pub table: TableRef,
    pub op: MutationOp,
    pub address: String,
    pub columns: Vec<Binding>,
    /// Ordering key; `None` when the originating slot is unknown.
    pub slots: Option<SlotSpan>,
    /// Event or record type that produced the intent.
    pub event: String,
}

impl MutationIntent {
    #[must_use]
    pub fn new(table: TableRef, op: MutationOp, address: impl Into<String>) -> Self {
        Self {
            table,
            op,
            address: address.into(),
            columns: Vec::new(),
            slots: None,
            event: String::new(),
        }
    }

    #[must_use]
    pub fn with_slots(mut self, slots: Option<SlotSpan>) -> Self {
        self.slots = slots;
        self
    }

    #[must_use]
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = event.into();
        self
    }

    pub fn bind(&mut self, column: impl Into<String>, value: ColumnValue) {
        self.columns.push(Binding::new(column, value));
    }

    #[must_use]
    pub fn binding(&self, column: &str) -> Option<&ColumnValue> {
        self.columns
            .iter()
            .find(|b| b.column == column)
            .map(|b| &b.value)
    }

    /// Checks the intent against the table it targets.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::InvalidIntent` for an empty address, a column the
    /// table lacks or that is not bindable, a duplicate binding, or a delete
    /// carrying bindings.
    pub fn validate(&self, spec: &TableSpec) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(SinkError::InvalidIntent(format!(
                "{} on {} has an empty address",
                self.op, self.table
            )));
        }
        if spec.table != self.table {
            return Err(SinkError::InvalidIntent(format!(
                "Intent targets {} but was checked against {}",
                self.table, spec.table
            )));
        }
        if self.op == MutationOp::Delete && !self.columns.is_empty() {
            return Err(SinkError::InvalidIntent(format!(
                "delete on {} carries column bindings",
                self.table
            )));
        }

        let mut seen = HashSet::new();
        for binding in &self.columns {
            let column = spec.column(&binding.column).ok_or_else(|| {
                SinkError::InvalidIntent(format!(
                    "Table {} has no column '{}'",
                    self.table, binding.column
                ))
            })?;
            if !column.role.is_bindable() {
                return Err(SinkError::InvalidIntent(format!(
                    "Column '{}' of {} is managed by the sink",
                    binding.column, self.table
                )));
            }
            if !seen.insert(binding.column.as_str()) {
                return Err(SinkError::InvalidIntent(format!(
                    "Column '{}' bound twice",
                    binding.column
                )));
            }
        }
        Ok(())
    }
}
