use super::borsh_reader::BorshReader;
use super::value::FieldMap;
use crate::utils::error::{Result, SinkError};
use solana_idl_parser::{Idl, comparison_key};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;

/// Account addresses bound to the role names of an instruction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundAccounts(Vec<(String, String)>);

impl BoundAccounts {
    pub fn push(&mut self, role: impl Into<String>, address: impl Into<String>) {
        self.0.push((role.into(), address.into()));
    }

    /// Address bound to `role`. Matching ignores case, spaces and
    /// underscores, so `"Reply To"`, `"replyTo"` and `"reply_to"` are the
    /// same role.
    #[must_use]
    pub fn get(&self, role: &str) -> Option<&str> {
        let key = comparison_key(role);
        self.0
            .iter()
            .find(|(name, _)| comparison_key(name) == key)
            .map(|(_, address)| address.as_str())
    }

    /// Like [`BoundAccounts::get`], failing when the role is absent.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::MappingError` if no address is bound to `role`.
    pub fn require(&self, role: &str) -> Result<&str> {
        self.get(role)
            .ok_or_else(|| SinkError::MappingError(format!("Missing account role '{role}'")))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(r, a)| (r.as_str(), a.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// An instruction decoded into its name, arguments and account roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedInstruction {
    pub program_id: Pubkey,
    pub name: String,
    pub args: FieldMap,
    pub accounts: BoundAccounts,
}

#[derive(Debug, Clone)]
struct InstructionLayout {
    name: String,
    discriminator: Vec<u8>,
}

/// Decodes instruction data for one program.
#[derive(Debug, Clone)]
pub struct InstructionDecoder {
    program_id: Pubkey,
    idl: Arc<Idl>,
    instructions: Vec<InstructionLayout>,
}

impl InstructionDecoder {
    #[must_use]
    pub fn new(program_id: Pubkey, idl: Arc<Idl>) -> Self {
        let instructions = idl
            .instructions
            .iter()
            .map(|ix| InstructionLayout {
                name: ix.name.clone(),
                discriminator: ix.discriminator_bytes(),
            })
            .collect();
        Self {
            program_id,
            idl,
            instructions,
        }
    }

    #[must_use]
    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    /// Decodes instruction `data` and binds `accounts` positionally to the
    /// declared roles.
    ///
    /// Extra trailing accounts are ignored. Missing roles are simply absent
    /// from the result; handlers that need them fail at mapping time.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::DecodingError` for an unknown discriminator, a
    /// malformed argument payload, or an account that is not a valid address.
    pub fn decode(&self, data: &[u8], accounts: &[String]) -> Result<DecodedInstruction> {
        let layout = self
            .instructions
            .iter()
            .find(|ix| !ix.discriminator.is_empty() && data.starts_with(&ix.discriminator))
            .ok_or_else(|| {
                SinkError::DecodingError(format!(
                    "Unknown instruction discriminator {:?} for program {}",
                    &data[..data.len().min(8)],
                    self.program_id
                ))
            })?;
        let declared = self
            .idl
            .instructions
            .iter()
            .find(|ix| ix.name == layout.name)
            .ok_or_else(|| {
                SinkError::InternalError(format!("Instruction '{}' vanished from IDL", layout.name))
            })?;

        let mut reader = BorshReader::new(&self.idl, &data[layout.discriminator.len()..]);
        let args = reader.read_fields(&declared.args).map_err(|e| match e {
            SinkError::DecodingError(msg) => {
                SinkError::DecodingError(format!("{}: {msg}", layout.name))
            }
            other => other,
        })?;

        let mut bound = BoundAccounts::default();
        for (role, address) in declared.flat_account_names().into_iter().zip(accounts) {
            Pubkey::from_str(address).map_err(|e| {
                SinkError::DecodingError(format!(
                    "{}: account '{role}' is not a valid address ({address}): {e}",
                    layout.name
                ))
            })?;
            bound.push(role, address.clone());
        }

        Ok(DecodedInstruction {
            program_id: self.program_id,
            name: layout.name.clone(),
            args,
            accounts: bound,
        })
    }
}
