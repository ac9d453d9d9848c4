//! Declarative row handlers.
//!
//! Most events touch exactly one row: the address comes from one account
//! role, and columns come from other roles, arguments or constants. A
//! [`RowMapper`] describes that shape; the catalogue in `gum.rs` is a list of
//! them.

use super::intent::{ColumnValue, MutationIntent, MutationOp, SlotSpan};
use super::registry::{EventMapper, MapContext};
use super::resolver::MetadataResolver;
use crate::core::decoder::{DecodedInstruction, DecodedValue, FieldMap};
use crate::schema::{METADATA_COLUMN, TableSpec};
use crate::utils::error::{Result, SinkError};
use async_trait::async_trait;
use solana_idl_parser::comparison_key;

/// Binds a decoded value to `column`, coerced to the column's type.
///
/// # Errors
///
/// Returns `SinkError::MappingError` if the table has no such column or the
/// value does not fit it.
pub fn bind_decoded(
    intent: &mut MutationIntent,
    spec: &TableSpec,
    column: &str,
    value: &DecodedValue,
) -> Result<()> {
    let column_spec = spec.column(column).ok_or_else(|| {
        SinkError::MappingError(format!("Table {} has no column '{column}'", spec.table))
    })?;
    let value = ColumnValue::from_decoded(value, &column_spec.column_type)
        .map_err(|e| SinkError::MappingError(format!("{}.{column}: {e}", spec.table)))?;
    intent.bind(column, value);
    Ok(())
}

/// Resolves `uri` and binds the document to the `metadata` column.
///
/// An empty URI or a failed resolution binds `NULL`.
pub async fn bind_metadata(
    intent: &mut MutationIntent,
    resolver: &dyn MetadataResolver,
    uri: Option<&str>,
) {
    let document = match uri.map(str::trim).filter(|u| !u.is_empty()) {
        Some(uri) => resolver.resolve(uri).await,
        None => None,
    };
    intent.bind(
        METADATA_COLUMN,
        document.map_or(ColumnValue::Null, ColumnValue::Json),
    );
}

/// Argument lookup tolerant of naming style.
fn lookup_arg<'a>(args: &'a FieldMap, name: &str) -> Option<&'a DecodedValue> {
    args.get(name).or_else(|| {
        let key = comparison_key(name);
        args.iter()
            .find(|(n, _)| comparison_key(n) == key)
            .map(|(_, v)| v)
    })
}

/// One-row handler built from role, argument and constant bindings.
#[derive(Debug, Clone)]
pub struct RowMapper {
    record_type: String,
    op: MutationOp,
    address_role: String,
    roles: Vec<(String, String)>,
    args: Vec<(String, String)>,
    constants: Vec<(String, DecodedValue)>,
}

impl RowMapper {
    fn new(op: MutationOp, record_type: &str, address_role: &str) -> Self {
        Self {
            record_type: record_type.to_string(),
            op,
            address_role: address_role.to_string(),
            roles: Vec::new(),
            args: Vec::new(),
            constants: Vec::new(),
        }
    }

    #[must_use]
    pub fn upsert(record_type: &str, address_role: &str) -> Self {
        Self::new(MutationOp::Upsert, record_type, address_role)
    }

    #[must_use]
    pub fn update(record_type: &str, address_role: &str) -> Self {
        Self::new(MutationOp::Update, record_type, address_role)
    }

    #[must_use]
    pub fn delete(record_type: &str, address_role: &str) -> Self {
        Self::new(MutationOp::Delete, record_type, address_role)
    }

    /// Binds the address of account `role` to `column`.
    #[must_use]
    pub fn role(mut self, role: &str, column: &str) -> Self {
        self.roles.push((role.to_string(), column.to_string()));
        self
    }

    /// Binds instruction argument `arg` to `column`.
    #[must_use]
    pub fn arg(mut self, arg: &str, column: &str) -> Self {
        self.args.push((arg.to_string(), column.to_string()));
        self
    }

    /// Binds a fixed value to `column`.
    #[must_use]
    pub fn constant(mut self, column: &str, value: DecodedValue) -> Self {
        self.constants.push((column.to_string(), value));
        self
    }

    #[must_use]
    pub fn op(&self) -> MutationOp {
        self.op
    }

    #[must_use]
    pub fn record_type(&self) -> &str {
        &self.record_type
    }
}

#[async_trait]
impl EventMapper for RowMapper {
    async fn map(
        &self,
        instruction: &DecodedInstruction,
        ctx: &MapContext<'_>,
    ) -> Result<Option<MutationIntent>> {
        let spec = ctx.catalog.record(&self.record_type).ok_or_else(|| {
            SinkError::MappingError(format!(
                "No table for record type '{}' (event '{}')",
                self.record_type, instruction.name
            ))
        })?;
        let address = instruction.accounts.require(&self.address_role)?;
        let mut intent = MutationIntent::new(spec.table.clone(), self.op, address)
            .with_slots(ctx.slot.map(SlotSpan::at))
            .with_event(instruction.name.clone());

        if self.op == MutationOp::Delete {
            return Ok(Some(intent));
        }

        for (role, column) in &self.roles {
            let bound = instruction.accounts.require(role)?;
            bind_decoded(&mut intent, spec, column, &DecodedValue::Address(bound.to_string()))?;
        }

        let metadata_column = spec
            .metadata_source
            .as_deref()
            .and_then(|field| spec.column_for_field(field))
            .map(|c| c.name.as_str());
        let mut metadata_uri = None;
        for (arg, column) in &self.args {
            let value = lookup_arg(&instruction.args, arg).ok_or_else(|| {
                SinkError::MappingError(format!(
                    "Event '{}' has no argument '{arg}'",
                    instruction.name
                ))
            })?;
            bind_decoded(&mut intent, spec, column, value)?;
            if metadata_column == Some(column.as_str()) {
                metadata_uri = Some(value.as_str().unwrap_or_default());
            }
        }

        for (column, value) in &self.constants {
            bind_decoded(&mut intent, spec, column, value)?;
        }

        if spec.has_metadata() && metadata_uri.is_some() {
            bind_metadata(&mut intent, ctx.resolver, metadata_uri).await;
        }

        Ok(Some(intent))
    }
}
