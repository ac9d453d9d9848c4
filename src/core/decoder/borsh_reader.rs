//! Schema-driven Borsh decoding.
//!
//! Layouts come from the IDL at runtime, so values are read field by field
//! with `borsh` doing the primitive work. Length prefixes are checked against
//! the remaining input before anything is allocated.

use super::value::{DecodedValue, FieldMap};
use crate::utils::error::{Result, SinkError};
use borsh::BorshDeserialize;
use solana_idl_parser::model::{IdlEnumFields, IdlField, IdlTypeDefKind};
use solana_idl_parser::{Idl, IntegerKind, SemanticType, classify};
use solana_sdk::pubkey::Pubkey;

/// Nesting limit for structs, enums and collections.
pub const MAX_DEPTH: usize = 32;

pub struct BorshReader<'a> {
    idl: &'a Idl,
    buf: &'a [u8],
    total: usize,
}

impl<'a> BorshReader<'a> {
    #[must_use]
    pub fn new(idl: &'a Idl, data: &'a [u8]) -> Self {
        Self {
            idl,
            buf: data,
            total: data.len(),
        }
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn offset(&self) -> usize {
        self.total - self.buf.len()
    }

    fn read<T: BorshDeserialize>(&mut self, what: &str) -> Result<T> {
        let offset = self.offset();
        T::deserialize(&mut self.buf)
            .map_err(|e| SinkError::DecodingError(format!("{what} at offset {offset}: {e}")))
    }

    /// Reads a sequence of named fields.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::DecodingError` on truncated or malformed input.
    pub fn read_fields(&mut self, fields: &[IdlField]) -> Result<FieldMap> {
        self.read_fields_at(fields, 0)
    }

    fn read_fields_at(&mut self, fields: &[IdlField], depth: usize) -> Result<FieldMap> {
        let mut map = FieldMap::new();
        for field in fields {
            let ty = classify(self.idl, &field.ty);
            let value = self.read_value(&ty, depth).map_err(|e| match e {
                SinkError::DecodingError(msg) => {
                    SinkError::DecodingError(format!("field '{}': {msg}", field.name))
                }
                other => other,
            })?;
            map.push(field.name.clone(), value);
        }
        Ok(map)
    }

    /// Reads one value of the given type.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::DecodingError` on truncated or malformed input,
    /// unknown types, or nesting deeper than [`MAX_DEPTH`].
    pub fn read_value(&mut self, ty: &SemanticType, depth: usize) -> Result<DecodedValue> {
        if depth > MAX_DEPTH {
            return Err(SinkError::DecodingError(format!(
                "nesting deeper than {MAX_DEPTH}"
            )));
        }

        Ok(match ty {
            SemanticType::String => DecodedValue::String(self.read::<String>("string")?),
            SemanticType::Address => {
                let bytes = self.read::<[u8; 32]>("public key")?;
                DecodedValue::Address(Pubkey::new_from_array(bytes).to_string())
            }
            SemanticType::Bytes => DecodedValue::Bytes(self.read::<Vec<u8>>("bytes")?),
            SemanticType::Bool => DecodedValue::Bool(self.read::<bool>("bool")?),
            SemanticType::Integer(kind) => self.read_integer(*kind)?,
            SemanticType::FixedArray(inner, len) => {
                self.check_collection(inner, *len)?;
                DecodedValue::List(self.read_items(inner, *len, depth)?)
            }
            SemanticType::List(inner) => {
                let len = self.read::<u32>("vec length")? as usize;
                self.check_collection(inner, len)?;
                DecodedValue::List(self.read_items(inner, len, depth)?)
            }
            SemanticType::Optional(inner) => match self.read::<u8>("option tag")? {
                0 => DecodedValue::Null,
                1 => self.read_value(inner, depth + 1)?,
                tag => {
                    return Err(SinkError::DecodingError(format!(
                        "invalid option tag {tag} at offset {}",
                        self.offset() - 1
                    )));
                }
            },
            SemanticType::COptional(inner) => match self.read::<u32>("coption tag")? {
                0 => DecodedValue::Null,
                1 => self.read_value(inner, depth + 1)?,
                tag => {
                    return Err(SinkError::DecodingError(format!(
                        "invalid coption tag {tag} at offset {}",
                        self.offset() - 4
                    )));
                }
            },
            SemanticType::Composite(name) => self.read_defined(name, depth)?,
            SemanticType::Unknown(name) => {
                return Err(SinkError::DecodingError(format!("unsupported type '{name}'")));
            }
        })
    }

    fn read_integer(&mut self, kind: IntegerKind) -> Result<DecodedValue> {
        Ok(match kind {
            IntegerKind::I8 => DecodedValue::Int(self.read::<i8>("i8")?.into()),
            IntegerKind::U8 => DecodedValue::UInt(self.read::<u8>("u8")?.into()),
            IntegerKind::I16 => DecodedValue::Int(self.read::<i16>("i16")?.into()),
            IntegerKind::U16 => DecodedValue::UInt(self.read::<u16>("u16")?.into()),
            IntegerKind::I32 => DecodedValue::Int(self.read::<i32>("i32")?.into()),
            IntegerKind::U32 => DecodedValue::UInt(self.read::<u32>("u32")?.into()),
            IntegerKind::I64 => DecodedValue::Int(self.read::<i64>("i64")?.into()),
            IntegerKind::U64 => DecodedValue::UInt(self.read::<u64>("u64")?.into()),
            IntegerKind::I128 => DecodedValue::Int(self.read::<i128>("i128")?),
            IntegerKind::U128 => DecodedValue::UInt(self.read::<u128>("u128")?),
        })
    }

    /// Rejects collections that cannot fit in the remaining input.
    fn check_collection(&self, item: &SemanticType, len: usize) -> Result<()> {
        let needed = len.saturating_mul(min_encoded_size(item).max(1));
        if needed > self.remaining() {
            return Err(SinkError::DecodingError(format!(
                "collection of {len} items at offset {} exceeds remaining {} bytes",
                self.offset(),
                self.remaining()
            )));
        }
        Ok(())
    }

    fn read_items(
        &mut self,
        item: &SemanticType,
        len: usize,
        depth: usize,
    ) -> Result<Vec<DecodedValue>> {
        (0..len).map(|_| self.read_value(item, depth + 1)).collect()
    }

    fn read_defined(&mut self, name: &str, depth: usize) -> Result<DecodedValue> {
        let idl = self.idl;
        let def = idl
            .find_type(name)
            .ok_or_else(|| SinkError::DecodingError(format!("undefined type '{name}'")))?;

        match def.ty.kind {
            IdlTypeDefKind::Struct => Ok(DecodedValue::Struct(
                self.read_fields_at(&def.ty.fields, depth + 1)?,
            )),
            IdlTypeDefKind::Enum => {
                let index = self.read::<u8>("enum variant")?;
                let variant = def.ty.variants.get(usize::from(index)).ok_or_else(|| {
                    SinkError::DecodingError(format!(
                        "variant {index} out of range for enum '{name}'"
                    ))
                })?;
                let fields = match &variant.fields {
                    None => None,
                    Some(IdlEnumFields::Named(fields)) if fields.is_empty() => None,
                    Some(IdlEnumFields::Named(fields)) => Some(Box::new(DecodedValue::Struct(
                        self.read_fields_at(fields, depth + 1)?,
                    ))),
                    Some(IdlEnumFields::Tuple(types)) => {
                        let items = types
                            .iter()
                            .map(|ty| self.read_value(&classify(idl, ty), depth + 1))
                            .collect::<Result<Vec<_>>>()?;
                        Some(Box::new(DecodedValue::List(items)))
                    }
                };
                Ok(DecodedValue::Enum {
                    variant: variant.name.clone(),
                    fields,
                })
            }
            IdlTypeDefKind::Alias => Err(SinkError::DecodingError(format!(
                "unresolvable alias '{name}'"
            ))),
        }
    }
}

/// Smallest number of bytes a value of `ty` can occupy.
fn min_encoded_size(ty: &SemanticType) -> usize {
    match ty {
        SemanticType::String | SemanticType::Bytes | SemanticType::List(_) => 4,
        SemanticType::Address => 32,
        SemanticType::Bool | SemanticType::Optional(_) => 1,
        SemanticType::COptional(_) => 4,
        SemanticType::Integer(kind) => kind.width(),
        SemanticType::FixedArray(inner, len) => min_encoded_size(inner).saturating_mul(*len),
        SemanticType::Composite(_) | SemanticType::Unknown(_) => 0,
    }
}
