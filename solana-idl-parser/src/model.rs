use serde::{Deserialize, Serialize};

/// An Anchor IDL document.
///
/// Both the legacy layout (`accounts[].type.fields`, `publicKey`) and the
/// newer layout (`accounts[]` referencing `types[]`, `pubkey`, explicit
/// discriminators) deserialize into this model. `recordTypes` is accepted as
/// an alias for `accounts`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Idl {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub metadata: Option<IdlMetadata>,
    #[serde(default)]
    pub instructions: Vec<IdlInstruction>,
    #[serde(default, alias = "recordTypes")]
    pub accounts: Vec<IdlRecordType>,
    #[serde(default)]
    pub types: Vec<IdlTypeDef>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdlMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdlInstruction {
    pub name: String,
    #[serde(default)]
    pub discriminator: Option<Vec<u8>>,
    #[serde(default)]
    pub accounts: Vec<IdlAccountItem>,
    #[serde(default)]
    pub args: Vec<IdlField>,
}

/// An entry of an instruction's account list.
///
/// Groups must be tried first: a group also carries a `name`, so the single
/// variant would otherwise swallow it.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum IdlAccountItem {
    Group(IdlAccountGroup),
    Single(IdlInstructionAccount),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdlInstructionAccount {
    pub name: String,
    #[serde(default, alias = "writable")]
    pub is_mut: bool,
    #[serde(default, alias = "signer")]
    pub is_signer: bool,
    #[serde(default, alias = "optional")]
    pub is_optional: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdlAccountGroup {
    pub name: String,
    pub accounts: Vec<IdlAccountItem>,
}

/// A declared account (record) type.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdlRecordType {
    pub name: String,
    #[serde(default)]
    pub discriminator: Option<Vec<u8>>,
    #[serde(default)]
    pub fields: Vec<IdlField>,
    #[serde(default, rename = "type")]
    pub ty: Option<IdlTypeDefBody>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdlField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: IdlType,
}

/// A named entry of the IDL `types` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdlTypeDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: IdlTypeDefBody,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdlTypeDefBody {
    #[serde(default)]
    pub kind: IdlTypeDefKind,
    #[serde(default)]
    pub fields: Vec<IdlField>,
    #[serde(default)]
    pub variants: Vec<IdlEnumVariant>,
    /// Target of a `kind: "type"` alias.
    #[serde(default, alias = "alias")]
    pub value: Option<IdlType>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdlTypeDefKind {
    #[default]
    Struct,
    Enum,
    #[serde(rename = "type")]
    Alias,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdlEnumVariant {
    pub name: String,
    #[serde(default)]
    pub fields: Option<IdlEnumFields>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum IdlEnumFields {
    Named(Vec<IdlField>),
    Tuple(Vec<IdlType>),
}

/// A type reference as it appears on a field or argument.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum IdlType {
    Primitive(String),
    Complex(IdlComplexType),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IdlComplexType {
    Defined(IdlDefinedRef),
    Option(Box<IdlType>),
    #[serde(rename = "coption")]
    COption(Box<IdlType>),
    Vec(Box<IdlType>),
    Array(Box<IdlType>, usize),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum IdlDefinedRef {
    Name(String),
    Named { name: String },
}

impl IdlDefinedRef {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            IdlDefinedRef::Name(name) | IdlDefinedRef::Named { name } => name,
        }
    }
}

impl Idl {
    /// Looks up a named type definition.
    #[must_use]
    pub fn find_type(&self, name: &str) -> Option<&IdlTypeDef> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Looks up a declared record type by name.
    #[must_use]
    pub fn find_record(&self, name: &str) -> Option<&IdlRecordType> {
        self.accounts.iter().find(|a| a.name == name)
    }

    /// Returns the fields of a record type.
    ///
    /// Inline definitions win; otherwise the record is resolved through the
    /// `types` section (newer IDLs only list name + discriminator under
    /// `accounts`).
    #[must_use]
    pub fn record_fields<'a>(&'a self, record: &'a IdlRecordType) -> &'a [IdlField] {
        if let Some(body) = &record.ty {
            return &body.fields;
        }
        if !record.fields.is_empty() {
            return &record.fields;
        }
        self.find_type(&record.name)
            .map(|t| t.ty.fields.as_slice())
            .unwrap_or_default()
    }

    /// Program address, from the top level or the metadata block.
    #[must_use]
    pub fn program_address(&self) -> Option<&str> {
        self.address
            .as_deref()
            .or_else(|| self.metadata.as_ref().and_then(|m| m.address.as_deref()))
    }
}

impl IdlInstruction {
    /// Account role names in positional order, with groups flattened
    /// depth-first.
    #[must_use]
    pub fn flat_account_names(&self) -> Vec<&str> {
        fn walk<'a>(items: &'a [IdlAccountItem], out: &mut Vec<&'a str>) {
            for item in items {
                match item {
                    IdlAccountItem::Single(account) => out.push(&account.name),
                    IdlAccountItem::Group(group) => walk(&group.accounts, out),
                }
            }
        }

        let mut names = Vec::new();
        walk(&self.accounts, &mut names);
        names
    }
}
