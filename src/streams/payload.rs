//! Webhook payload model.
//!
//! A queue entry holds one webhook body: a JSON array of transactions, each
//! listing its top-level instructions with base-58 data and account keys.

use crate::utils::error::{Result, SinkError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookTransaction {
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub slot: Option<u64>,
    #[serde(default)]
    pub instructions: Vec<WebhookInstruction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookInstruction {
    pub program_id: String,
    /// Base-58 instruction data.
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(default)]
    pub inner_instructions: Vec<WebhookInstruction>,
}

impl WebhookInstruction {
    /// Raw instruction bytes.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::DecodingError` if `data` is not valid base-58.
    pub fn data_bytes(&self) -> Result<Vec<u8>> {
        bs58::decode(&self.data)
            .into_vec()
            .map_err(|e| SinkError::DecodingError(format!("Instruction data is not base-58: {e}")))
    }
}

/// Parses a queue payload.
///
/// A single transaction object is accepted as a one-element batch.
///
/// # Errors
///
/// Returns `SinkError::DecodingError` if the payload is not a transaction
/// array or object.
pub fn parse_payload(payload: &[u8]) -> Result<Vec<WebhookTransaction>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Body {
        Batch(Vec<WebhookTransaction>),
        Single(WebhookTransaction),
    }

    match serde_json::from_slice::<Body>(payload) {
        Ok(Body::Batch(transactions)) => Ok(transactions),
        Ok(Body::Single(transaction)) => Ok(vec![transaction]),
        Err(e) => Err(SinkError::DecodingError(format!("Invalid webhook payload: {e}"))),
    }
}
