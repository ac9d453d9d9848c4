//! Decoded payload values.

use serde_json::{Map, Value, json};

/// A value decoded from a Borsh payload against its IDL type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedValue {
    Null,
    Bool(bool),
    Int(i128),
    UInt(u128),
    String(String),
    /// Base-58 public key.
    Address(String),
    Bytes(Vec<u8>),
    List(Vec<DecodedValue>),
    Struct(FieldMap),
    Enum {
        variant: String,
        fields: Option<Box<DecodedValue>>,
    },
}

impl DecodedValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, DecodedValue::Null)
    }

    /// Text content of strings and addresses.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DecodedValue::String(s) | DecodedValue::Address(s) => Some(s),
            _ => None,
        }
    }

    /// JSON rendering.
    ///
    /// Integers that fit 64 bits are JSON numbers, wider ones decimal strings.
    /// Enums render as `{"Variant": fields}` with `{}` for unit variants.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            DecodedValue::Null => Value::Null,
            DecodedValue::Bool(b) => Value::Bool(*b),
            DecodedValue::Int(i) => i64::try_from(*i).map_or_else(|_| json!(i.to_string()), |v| json!(v)),
            DecodedValue::UInt(u) => u64::try_from(*u).map_or_else(|_| json!(u.to_string()), |v| json!(v)),
            DecodedValue::String(s) | DecodedValue::Address(s) => Value::String(s.clone()),
            DecodedValue::Bytes(bytes) => Value::Array(bytes.iter().map(|b| json!(b)).collect()),
            DecodedValue::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            DecodedValue::Struct(fields) => fields.to_json(),
            DecodedValue::Enum { variant, fields } => {
                let inner = fields
                    .as_ref()
                    .map_or_else(|| Value::Object(Map::new()), |f| f.to_json());
                let mut map = Map::new();
                map.insert(variant.clone(), inner);
                Value::Object(map)
            }
        }
    }
}

/// Named values in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap(Vec<(String, DecodedValue)>);

impl FieldMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: DecodedValue) {
        self.0.push((name.into(), value));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DecodedValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DecodedValue)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect(),
        )
    }
}

impl FromIterator<(String, DecodedValue)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (String, DecodedValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wide_integers_render_as_strings() {
        assert_eq!(DecodedValue::UInt(42).to_json(), json!(42));
        assert_eq!(DecodedValue::Int(-7).to_json(), json!(-7));
        assert_eq!(
            DecodedValue::UInt(u128::from(u64::MAX) + 1).to_json(),
            json!("18446744073709551616")
        );
    }

    #[test]
    fn test_enum_rendering() {
        let unit = DecodedValue::Enum {
            variant: "Like".into(),
            fields: None,
        };
        assert_eq!(unit.to_json(), json!({"Like": {}}));

        let mut fields = FieldMap::new();
        fields.push("emoji", DecodedValue::String("🔥".into()));
        let named = DecodedValue::Enum {
            variant: "Custom".into(),
            fields: Some(Box::new(DecodedValue::Struct(fields))),
        };
        assert_eq!(named.to_json(), json!({"Custom": {"emoji": "🔥"}}));
    }

    #[test]
    fn test_field_map_lookup() {
        let map: FieldMap = vec![
            ("a".to_string(), DecodedValue::Bool(true)),
            ("b".to_string(), DecodedValue::Null),
        ]
        .into_iter()
        .collect();
        assert_eq!(map.get("a"), Some(&DecodedValue::Bool(true)));
        assert!(map.get("c").is_none());
        assert_eq!(map.len(), 2);
        assert_eq!(map.to_json(), json!({"a": true, "b": null}));
    }
}
