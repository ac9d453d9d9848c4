//! Decoder registry keyed by program ID.

use crate::core::decoder::{AccountDecoder, DecodedAccount, DecodedInstruction, InstructionDecoder};
use crate::utils::error::{Result, SinkError};
use solana_idl_parser::Idl;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::sync::Arc;

/// Both decoders of one program, sharing its IDL.
#[derive(Debug, Clone)]
pub struct ProgramDecoder {
    pub idl: Arc<Idl>,
    pub accounts: AccountDecoder,
    pub instructions: InstructionDecoder,
}

impl ProgramDecoder {
    #[must_use]
    pub fn new(program_id: Pubkey, idl: Arc<Idl>) -> Self {
        Self {
            accounts: AccountDecoder::new(program_id, Arc::clone(&idl)),
            instructions: InstructionDecoder::new(program_id, Arc::clone(&idl)),
            idl,
        }
    }
}

/// Registry of program decoders.
#[derive(Debug, Clone, Default)]
pub struct DecoderRegistry {
    decoders: HashMap<Pubkey, ProgramDecoder>,
}

impl DecoderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the IDL of `program_id`, replacing any previous one.
    pub fn register(&mut self, program_id: Pubkey, idl: Arc<Idl>) {
        self.decoders
            .insert(program_id, ProgramDecoder::new(program_id, idl));
    }

    #[must_use]
    pub fn get(&self, program_id: &Pubkey) -> Option<&ProgramDecoder> {
        self.decoders.get(program_id)
    }

    #[must_use]
    pub fn is_registered(&self, program_id: &Pubkey) -> bool {
        self.decoders.contains_key(program_id)
    }

    pub fn program_ids(&self) -> impl Iterator<Item = &Pubkey> {
        self.decoders.keys()
    }

    fn require(&self, program_id: &Pubkey) -> Result<&ProgramDecoder> {
        self.decoders.get(program_id).ok_or_else(|| {
            SinkError::DecodingError(format!("No IDL registered for program {program_id}"))
        })
    }

    /// Decodes an account owned by `program_id`.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::DecodingError` if the program is unknown or the
    /// data does not decode.
    pub fn decode_account(&self, program_id: &Pubkey, data: &[u8]) -> Result<DecodedAccount> {
        self.require(program_id)?.accounts.decode(data)
    }

    /// Decodes an instruction addressed to `program_id`.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::DecodingError` if the program is unknown or the
    /// data does not decode.
    pub fn decode_instruction(
        &self,
        program_id: &Pubkey,
        data: &[u8],
        accounts: &[String],
    ) -> Result<DecodedInstruction> {
        self.require(program_id)?.instructions.decode(data, accounts)
    }
}
