//! Semantic classification of IDL type references.
//!
//! The raw [`IdlType`] tree mirrors the JSON. Consumers (decoders, schema
//! synthesis) want a closed set of shapes instead, with `defined` aliases
//! already followed.

use crate::model::{Idl, IdlComplexType, IdlType, IdlTypeDefKind};

/// Alias chains longer than this are treated as unresolvable.
const MAX_ALIAS_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegerKind {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    I128,
    U128,
}

impl IntegerKind {
    /// Encoded width in bytes.
    #[must_use]
    pub fn width(self) -> usize {
        match self {
            IntegerKind::I8 | IntegerKind::U8 => 1,
            IntegerKind::I16 | IntegerKind::U16 => 2,
            IntegerKind::I32 | IntegerKind::U32 => 4,
            IntegerKind::I64 | IntegerKind::U64 => 8,
            IntegerKind::I128 | IntegerKind::U128 => 16,
        }
    }

    #[must_use]
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            IntegerKind::I8 | IntegerKind::I16 | IntegerKind::I32 | IntegerKind::I64 | IntegerKind::I128
        )
    }

    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "i8" => IntegerKind::I8,
            "u8" => IntegerKind::U8,
            "i16" => IntegerKind::I16,
            "u16" => IntegerKind::U16,
            "i32" => IntegerKind::I32,
            "u32" => IntegerKind::U32,
            "i64" => IntegerKind::I64,
            "u64" => IntegerKind::U64,
            "i128" => IntegerKind::I128,
            "u128" => IntegerKind::U128,
            _ => return None,
        })
    }
}

/// The closed set of shapes a field can take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticType {
    String,
    /// A 32-byte public key, rendered base-58.
    Address,
    /// Length-prefixed raw bytes.
    Bytes,
    Bool,
    Integer(IntegerKind),
    FixedArray(Box<SemanticType>, usize),
    List(Box<SemanticType>),
    /// Borsh option, 1-byte tag.
    Optional(Box<SemanticType>),
    /// C-style option, 4-byte tag.
    COptional(Box<SemanticType>),
    /// A struct or enum from the `types` section.
    Composite(String),
    /// A type name this model does not recognize.
    Unknown(String),
}

impl SemanticType {
    /// Scalars that map onto a single column value.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            SemanticType::String | SemanticType::Address | SemanticType::Bool | SemanticType::Integer(_)
        )
    }

    /// Strips any number of option wrappers.
    #[must_use]
    pub fn unwrap_optional(&self) -> &SemanticType {
        match self {
            SemanticType::Optional(inner) | SemanticType::COptional(inner) => inner.unwrap_optional(),
            other => other,
        }
    }
}

/// Classifies a type reference, following `kind: "type"` aliases through the
/// IDL's `types` section.
#[must_use]
pub fn classify(idl: &Idl, ty: &IdlType) -> SemanticType {
    classify_at(idl, ty, 0)
}

fn classify_at(idl: &Idl, ty: &IdlType, depth: usize) -> SemanticType {
    match ty {
        IdlType::Primitive(name) => classify_primitive(name),
        IdlType::Complex(complex) => match complex {
            IdlComplexType::Option(inner) => {
                SemanticType::Optional(Box::new(classify_at(idl, inner, depth)))
            }
            IdlComplexType::COption(inner) => {
                SemanticType::COptional(Box::new(classify_at(idl, inner, depth)))
            }
            IdlComplexType::Vec(inner) => SemanticType::List(Box::new(classify_at(idl, inner, depth))),
            IdlComplexType::Array(inner, len) => {
                SemanticType::FixedArray(Box::new(classify_at(idl, inner, depth)), *len)
            }
            IdlComplexType::Defined(reference) => {
                let name = reference.name();
                match idl.find_type(name) {
                    Some(def) if def.ty.kind == IdlTypeDefKind::Alias => match &def.ty.value {
                        Some(target) if depth < MAX_ALIAS_DEPTH => classify_at(idl, target, depth + 1),
                        _ => SemanticType::Unknown(name.to_string()),
                    },
                    Some(_) => SemanticType::Composite(name.to_string()),
                    None => SemanticType::Unknown(name.to_string()),
                }
            }
        },
    }
}

fn classify_primitive(name: &str) -> SemanticType {
    match name {
        "string" => SemanticType::String,
        "publicKey" | "pubkey" => SemanticType::Address,
        "bytes" => SemanticType::Bytes,
        "bool" => SemanticType::Bool,
        other => IntegerKind::parse(other)
            .map(SemanticType::Integer)
            .unwrap_or_else(|| SemanticType::Unknown(other.to_string())),
    }
}
