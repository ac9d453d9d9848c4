//! Decoded account records → upsert intents (backfill path).

use super::handlers::{bind_decoded, bind_metadata};
use super::intent::{MutationIntent, MutationOp, SlotSpan};
use super::resolver::MetadataResolver;
use crate::core::decoder::DecodedAccount;
use crate::schema::SchemaCatalog;
use crate::utils::error::{Result, SinkError};

/// Builds the upsert for one account snapshot.
///
/// Every decoded field with a backing column is bound; fields whose column
/// was skipped at synthesis time are ignored. Records declaring a metadata
/// URI get the resolved document (or `NULL`).
///
/// # Errors
///
/// Returns `SinkError::MappingError` if the record type has no table or a
/// field value does not fit its column.
pub async fn map_account(
    catalog: &SchemaCatalog,
    resolver: &dyn MetadataResolver,
    address: &str,
    account: &DecodedAccount,
    slots: Option<SlotSpan>,
) -> Result<MutationIntent> {
    let spec = catalog.record(&account.record_type).ok_or_else(|| {
        SinkError::MappingError(format!(
            "No table for record type '{}'",
            account.record_type
        ))
    })?;

    let mut intent = MutationIntent::new(spec.table.clone(), MutationOp::Upsert, address)
        .with_slots(slots)
        .with_event(account.record_type.clone());

    for (field, value) in account.fields.iter() {
        if let Some(column) = spec.column_for_field(field) {
            let column = column.name.clone();
            bind_decoded(&mut intent, spec, &column, value)?;
        }
    }

    if spec.has_metadata() {
        let uri = spec
            .metadata_source
            .as_deref()
            .and_then(|field| account.fields.get(field))
            .and_then(|v| v.as_str());
        bind_metadata(&mut intent, resolver, uri).await;
    }

    Ok(intent)
}
