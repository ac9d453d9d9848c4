//! Deterministic mapping from semantic field types to column types.

use solana_idl_parser::{IntegerKind, SemanticType};
use std::fmt;

/// Element type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Text,
    Integer,
    BigInt,
    Numeric,
    Boolean,
    Jsonb,
    TimestampTz,
}

impl ScalarType {
    #[must_use]
    pub fn sql(self) -> &'static str {
        match self {
            ScalarType::Text => "TEXT",
            ScalarType::Integer => "INTEGER",
            ScalarType::BigInt => "BIGINT",
            ScalarType::Numeric => "NUMERIC",
            ScalarType::Boolean => "BOOLEAN",
            ScalarType::Jsonb => "JSONB",
            ScalarType::TimestampTz => "TIMESTAMPTZ",
        }
    }

    fn for_integer(kind: IntegerKind) -> Self {
        match kind {
            IntegerKind::I8
            | IntegerKind::U8
            | IntegerKind::I16
            | IntegerKind::U16
            | IntegerKind::I32 => ScalarType::Integer,
            IntegerKind::U32 => ScalarType::BigInt,
            IntegerKind::I64 | IntegerKind::U64 | IntegerKind::I128 | IntegerKind::U128 => {
                ScalarType::Numeric
            }
        }
    }

    /// Column type of a primitive, `None` for anything structured.
    fn for_primitive(ty: &SemanticType) -> Option<Self> {
        match ty {
            SemanticType::String | SemanticType::Address => Some(ScalarType::Text),
            SemanticType::Bool => Some(ScalarType::Boolean),
            SemanticType::Integer(kind) => Some(Self::for_integer(*kind)),
            _ => None,
        }
    }
}

/// A column type: a scalar, or a one-dimensional array of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnType {
    pub scalar: ScalarType,
    pub array: bool,
}

impl ColumnType {
    #[must_use]
    pub const fn scalar(scalar: ScalarType) -> Self {
        Self {
            scalar,
            array: false,
        }
    }

    #[must_use]
    pub const fn array_of(scalar: ScalarType) -> Self {
        Self { scalar, array: true }
    }

    /// Maps a field type to its column type.
    ///
    /// Options collapse to their inner type (the column is nullable). Arrays
    /// and lists of primitives become typed arrays, lists of anything else
    /// become `JSONB[]`, and everything unrecognized falls back to `JSONB`.
    #[must_use]
    pub fn from_semantic(ty: &SemanticType) -> Self {
        let ty = ty.unwrap_optional();
        if let Some(scalar) = ScalarType::for_primitive(ty) {
            return Self::scalar(scalar);
        }
        match ty {
            SemanticType::FixedArray(inner, _) => match ScalarType::for_primitive(inner) {
                Some(scalar) => Self::array_of(scalar),
                None => Self::scalar(ScalarType::Jsonb),
            },
            SemanticType::List(inner) => match ScalarType::for_primitive(inner) {
                Some(scalar) => Self::array_of(scalar),
                None => Self::array_of(ScalarType::Jsonb),
            },
            _ => Self::scalar(ScalarType::Jsonb),
        }
    }

    /// SQL spelling, e.g. `INTEGER[]`.
    #[must_use]
    pub fn sql(&self) -> String {
        if self.array {
            format!("{}[]", self.scalar.sql())
        } else {
            self.scalar.sql().to_string()
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(kind: IntegerKind) -> SemanticType {
        SemanticType::Integer(kind)
    }

    #[test]
    fn test_integer_widths() {
        assert_eq!(ColumnType::from_semantic(&int(IntegerKind::U8)).sql(), "INTEGER");
        assert_eq!(ColumnType::from_semantic(&int(IntegerKind::I32)).sql(), "INTEGER");
        assert_eq!(ColumnType::from_semantic(&int(IntegerKind::U32)).sql(), "BIGINT");
        assert_eq!(ColumnType::from_semantic(&int(IntegerKind::U64)).sql(), "NUMERIC");
        assert_eq!(ColumnType::from_semantic(&int(IntegerKind::I128)).sql(), "NUMERIC");
    }

    #[test]
    fn test_text_and_bool() {
        assert_eq!(ColumnType::from_semantic(&SemanticType::String).sql(), "TEXT");
        assert_eq!(ColumnType::from_semantic(&SemanticType::Address).sql(), "TEXT");
        assert_eq!(ColumnType::from_semantic(&SemanticType::Bool).sql(), "BOOLEAN");
    }

    #[test]
    fn test_collections() {
        let hash = SemanticType::FixedArray(Box::new(int(IntegerKind::U8)), 32);
        assert_eq!(ColumnType::from_semantic(&hash).sql(), "INTEGER[]");

        let keys = SemanticType::List(Box::new(SemanticType::Address));
        assert_eq!(ColumnType::from_semantic(&keys).sql(), "TEXT[]");

        let nested = SemanticType::List(Box::new(SemanticType::Composite("Tag".into())));
        assert_eq!(ColumnType::from_semantic(&nested).sql(), "JSONB[]");

        let matrix = SemanticType::FixedArray(
            Box::new(SemanticType::FixedArray(Box::new(int(IntegerKind::U8)), 2)),
            2,
        );
        assert_eq!(ColumnType::from_semantic(&matrix).sql(), "JSONB");
    }

    #[test]
    fn test_option_collapses_and_fallbacks() {
        let reply_to = SemanticType::Optional(Box::new(SemanticType::Address));
        assert_eq!(ColumnType::from_semantic(&reply_to).sql(), "TEXT");

        assert_eq!(
            ColumnType::from_semantic(&SemanticType::Composite("ReactionType".into())).sql(),
            "JSONB"
        );
        assert_eq!(ColumnType::from_semantic(&SemanticType::Bytes).sql(), "JSONB");
        assert_eq!(ColumnType::from_semantic(&SemanticType::Unknown("f64".into())).sql(), "JSONB");
    }
}
