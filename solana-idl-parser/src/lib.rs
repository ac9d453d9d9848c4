//! Anchor IDL model, discriminators and semantic type classification.
//!
//! The sink derives everything it knows about a program from its IDL: the
//! tables it materializes, the binary layouts it decodes, and the 8-byte
//! prefixes that tell record and instruction payloads apart.

pub mod model;
pub mod naming;
pub mod semantic;

pub use model::Idl;
pub use naming::{comparison_key, underscore};
pub use semantic::{classify, IntegerKind, SemanticType};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Length of a derived Anchor discriminator.
pub const DISCRIMINATOR_LEN: usize = 8;

/// Parses an IDL document from JSON text.
///
/// # Errors
///
/// Returns an error if the text is not a valid IDL document.
pub fn load_idl_from_str(json: &str) -> Result<Idl> {
    serde_json::from_str(json).map_err(|e| anyhow::anyhow!("Failed to parse IDL JSON: {}", e))
}

/// Reads and parses an IDL document from disk.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not parse.
///
/// # Example
///
/// ```no_run
/// use std::path::PathBuf;
/// use solana_idl_parser::load_idl_from_path;
///
/// # fn main() -> anyhow::Result<()> {
/// let idl = load_idl_from_path(&PathBuf::from("idl/gum.json"))?;
/// println!("{} record types", idl.accounts.len());
/// # Ok(())
/// # }
/// ```
pub fn load_idl_from_path(path: &Path) -> Result<Idl> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read IDL file at {:?}", path))?;
    load_idl_from_str(&content)
}

fn sighash(preimage: &str) -> [u8; DISCRIMINATOR_LEN] {
    let hash = Sha256::digest(preimage.as_bytes());
    let mut discriminator = [0u8; DISCRIMINATOR_LEN];
    discriminator.copy_from_slice(&hash[..DISCRIMINATOR_LEN]);
    discriminator
}

/// `sha256("account:<Name>")[..8]`.
#[must_use]
pub fn account_discriminator(name: &str) -> [u8; DISCRIMINATOR_LEN] {
    sighash(&format!("account:{name}"))
}

/// `sha256("global:<snake_name>")[..8]`.
#[must_use]
pub fn instruction_discriminator(name: &str) -> [u8; DISCRIMINATOR_LEN] {
    sighash(&format!("global:{}", underscore(name)))
}

impl model::IdlRecordType {
    /// The explicit IDL discriminator, or the derived one.
    #[must_use]
    pub fn discriminator_bytes(&self) -> Vec<u8> {
        self.discriminator
            .clone()
            .unwrap_or_else(|| account_discriminator(&self.name).to_vec())
    }
}

impl model::IdlInstruction {
    /// The explicit IDL discriminator, or the derived one.
    #[must_use]
    pub fn discriminator_bytes(&self) -> Vec<u8> {
        self.discriminator
            .clone()
            .unwrap_or_else(|| instruction_discriminator(&self.name).to_vec())
    }
}
