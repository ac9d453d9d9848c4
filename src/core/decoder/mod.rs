//! IDL-driven decoding of account data and instruction payloads.
//!
//! Payloads are an 8-byte discriminator followed by the Borsh encoding of
//! the record fields or instruction arguments. Layouts are read from the IDL
//! at runtime, so no program-specific Rust types are generated.

pub mod account;
pub mod borsh_reader;
pub mod instruction;
pub mod value;

pub use account::{AccountDecoder, DecodedAccount};
pub use borsh_reader::{BorshReader, MAX_DEPTH};
pub use instruction::{BoundAccounts, DecodedInstruction, InstructionDecoder};
pub use value::{DecodedValue, FieldMap};
