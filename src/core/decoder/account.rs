use super::borsh_reader::BorshReader;
use super::value::FieldMap;
use crate::utils::error::{Result, SinkError};
use solana_idl_parser::Idl;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;

/// A record decoded from raw account data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAccount {
    pub record_type: String,
    pub fields: FieldMap,
}

#[derive(Debug, Clone)]
struct RecordLayout {
    name: String,
    discriminator: Vec<u8>,
}

/// Decodes account data for one program by discriminator lookup.
#[derive(Debug, Clone)]
pub struct AccountDecoder {
    program_id: Pubkey,
    idl: Arc<Idl>,
    records: Vec<RecordLayout>,
}

impl AccountDecoder {
    #[must_use]
    pub fn new(program_id: Pubkey, idl: Arc<Idl>) -> Self {
        let records = idl
            .accounts
            .iter()
            .map(|record| RecordLayout {
                name: record.name.clone(),
                discriminator: record.discriminator_bytes(),
            })
            .collect();
        Self {
            program_id,
            idl,
            records,
        }
    }

    #[must_use]
    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    /// Discriminator of a record type, if the IDL declares it.
    #[must_use]
    pub fn discriminator(&self, record_type: &str) -> Option<&[u8]> {
        self.records
            .iter()
            .find(|r| r.name == record_type)
            .map(|r| r.discriminator.as_slice())
    }

    pub fn record_types(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.name.as_str())
    }

    /// Decodes `data`, choosing the record type from its prefix.
    ///
    /// Trailing bytes after the declared fields are ignored; accounts are
    /// commonly allocated larger than their contents.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::DecodingError` for an unknown discriminator or a
    /// malformed body.
    pub fn decode(&self, data: &[u8]) -> Result<DecodedAccount> {
        let record = self
            .records
            .iter()
            .find(|r| !r.discriminator.is_empty() && data.starts_with(&r.discriminator))
            .ok_or_else(|| {
                SinkError::DecodingError(format!(
                    "Unknown account discriminator {:?} for program {}",
                    &data[..data.len().min(8)],
                    self.program_id
                ))
            })?;
        self.decode_body(record, data)
    }

    /// Decodes `data` as a specific record type.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::DecodingError` if the record type is unknown, the
    /// prefix does not match, or the body is malformed.
    pub fn decode_as(&self, record_type: &str, data: &[u8]) -> Result<DecodedAccount> {
        let record = self
            .records
            .iter()
            .find(|r| r.name == record_type)
            .ok_or_else(|| {
                SinkError::DecodingError(format!("Unknown record type '{record_type}'"))
            })?;
        if !data.starts_with(&record.discriminator) {
            return Err(SinkError::DecodingError(format!(
                "Account data is not a '{record_type}' record"
            )));
        }
        self.decode_body(record, data)
    }

    fn decode_body(&self, record: &RecordLayout, data: &[u8]) -> Result<DecodedAccount> {
        let declared = self.idl.find_record(&record.name).ok_or_else(|| {
            SinkError::InternalError(format!("Record type '{}' vanished from IDL", record.name))
        })?;
        let mut reader = BorshReader::new(&self.idl, &data[record.discriminator.len()..]);
        let fields = reader
            .read_fields(self.idl.record_fields(declared))
            .map_err(|e| match e {
                SinkError::DecodingError(msg) => {
                    SinkError::DecodingError(format!("{}: {msg}", record.name))
                }
                other => other,
            })?;
        Ok(DecodedAccount {
            record_type: record.name.clone(),
            fields,
        })
    }
}
