//! Shared fixtures: a trimmed Gum IDL and payload builders.

#![allow(dead_code)]

use borsh::BorshSerialize;
use serde_json::{Value, json};
use solana_idl_parser::{Idl, account_discriminator, instruction_discriminator, load_idl_from_str};
use solana_pg_sink::config::RetryConfig;
use solana_pg_sink::core::mapper::gum::{GUM_PROGRAM_ID, register_defaults};
use solana_pg_sink::{
    ApplyEngine, DecoderRegistry, MapperRegistry, MemoryStore, SchemaCatalog, SchemaSynthesizer,
    TableRef,
};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;

pub const GUM_IDL: &str = r#"{
    "version": "0.1.0",
    "name": "gpl_core",
    "instructions": [
        {
            "name": "createPost",
            "accounts": [
                {"name": "post", "isMut": true, "isSigner": false},
                {"name": "profile", "isMut": false, "isSigner": false},
                {"name": "authority", "isMut": true, "isSigner": true},
                {"name": "systemProgram", "isMut": false, "isSigner": false}
            ],
            "args": [
                {"name": "metadataUri", "type": "string"},
                {"name": "randomHash", "type": {"array": ["u8", 32]}}
            ]
        },
        {
            "name": "updatePost",
            "accounts": [
                {"name": "post", "isMut": true, "isSigner": false},
                {"name": "profile", "isMut": false, "isSigner": false},
                {"name": "authority", "isMut": true, "isSigner": true}
            ],
            "args": [{"name": "metadataUri", "type": "string"}]
        },
        {
            "name": "deletePost",
            "accounts": [
                {"name": "post", "isMut": true, "isSigner": false},
                {"name": "profile", "isMut": false, "isSigner": false},
                {"name": "authority", "isMut": true, "isSigner": true}
            ],
            "args": []
        },
        {
            "name": "createConnection",
            "accounts": [
                {"name": "connection", "isMut": true, "isSigner": false},
                {"name": "fromProfile", "isMut": false, "isSigner": false},
                {"name": "toProfile", "isMut": false, "isSigner": false},
                {"name": "authority", "isMut": true, "isSigner": true}
            ],
            "args": []
        },
        {
            "name": "createIssuer",
            "accounts": [
                {"name": "issuer", "isMut": true, "isSigner": false},
                {"name": "authority", "isMut": true, "isSigner": true}
            ],
            "args": []
        },
        {
            "name": "verifyIssuer",
            "accounts": [
                {"name": "issuer", "isMut": true, "isSigner": false},
                {"name": "authority", "isMut": false, "isSigner": true}
            ],
            "args": []
        }
    ],
    "accounts": [
        {
            "name": "Post",
            "type": {
                "kind": "struct",
                "fields": [
                    {"name": "profile", "type": "publicKey"},
                    {"name": "metadataUri", "type": "string"},
                    {"name": "randomHash", "type": {"array": ["u8", 32]}},
                    {"name": "replyTo", "type": {"option": "publicKey"}}
                ]
            }
        },
        {
            "name": "Connection",
            "type": {
                "kind": "struct",
                "fields": [
                    {"name": "fromProfile", "type": "publicKey"},
                    {"name": "toProfile", "type": "publicKey"}
                ]
            }
        },
        {
            "name": "Issuer",
            "type": {
                "kind": "struct",
                "fields": [
                    {"name": "authority", "type": "publicKey"},
                    {"name": "verified", "type": "bool"}
                ]
            }
        }
    ],
    "types": []
}"#;

pub fn gum_idl() -> Arc<Idl> {
    Arc::new(load_idl_from_str(GUM_IDL).unwrap())
}

pub fn program_id() -> Pubkey {
    Pubkey::from_str(GUM_PROGRAM_ID).unwrap()
}

/// Retry policy that gives up quickly.
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 2,
        initial_backoff_ms: 1,
        backoff_multiplier: 1.0,
        max_backoff_ms: 1,
        jitter: false,
    }
}

pub fn decoders() -> DecoderRegistry {
    let mut decoders = DecoderRegistry::new();
    decoders.register(program_id(), gum_idl());
    decoders
}

pub fn mappers() -> MapperRegistry {
    let mut mappers = MapperRegistry::new();
    register_defaults(&mut mappers);
    mappers
}

/// A synthesized in-memory sink for the fixture IDL.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub catalog: Arc<SchemaCatalog>,
    pub engine: ApplyEngine,
}

impl Harness {
    pub async fn new() -> Self {
        let synthesizer = SchemaSynthesizer::new("public", Vec::new());
        let specs = synthesizer.plan(&gum_idl());
        let store = Arc::new(MemoryStore::new());
        synthesizer.synthesize(store.as_ref(), &specs).await.unwrap();
        let catalog = Arc::new(SchemaCatalog::new(specs).unwrap());
        let engine = ApplyEngine::new(store.clone(), Arc::clone(&catalog), fast_retry());
        Self {
            store,
            catalog,
            engine,
        }
    }

    pub fn table(&self, record_type: &str) -> TableRef {
        self.catalog.record(record_type).unwrap().table.clone()
    }
}

/// Discriminator followed by the Borsh encoding of `body`.
pub fn with_discriminator(discriminator: [u8; 8], body: &impl BorshSerialize) -> Vec<u8> {
    let mut data = discriminator.to_vec();
    data.extend(borsh::to_vec(body).unwrap());
    data
}

pub fn post_account(profile: &Pubkey, uri: &str, hash: [u8; 32], reply_to: Option<Pubkey>) -> Vec<u8> {
    with_discriminator(
        account_discriminator("Post"),
        &(
            profile.to_bytes(),
            uri.to_string(),
            hash,
            reply_to.map(|p| p.to_bytes()),
        ),
    )
}

pub fn connection_account(from: &Pubkey, to: &Pubkey) -> Vec<u8> {
    with_discriminator(
        account_discriminator("Connection"),
        &(from.to_bytes(), to.to_bytes()),
    )
}

pub fn create_post_data(uri: &str, hash: [u8; 32]) -> Vec<u8> {
    with_discriminator(
        instruction_discriminator("createPost"),
        &(uri.to_string(), hash),
    )
}

pub fn update_post_data(uri: &str) -> Vec<u8> {
    with_discriminator(instruction_discriminator("updatePost"), &uri.to_string())
}

pub fn no_args_data(instruction: &str) -> Vec<u8> {
    instruction_discriminator(instruction).to_vec()
}

pub fn account_list(keys: &[Pubkey]) -> Vec<String> {
    keys.iter().map(ToString::to_string).collect()
}

/// One webhook instruction entry.
pub fn instruction_json(program: &Pubkey, data: &[u8], accounts: &[Pubkey]) -> Value {
    json!({
        "programId": program.to_string(),
        "data": bs58::encode(data).into_string(),
        "accounts": account_list(accounts),
        "innerInstructions": []
    })
}

/// A one-transaction webhook body.
pub fn webhook(slot: u64, instructions: Vec<Value>) -> Vec<u8> {
    serde_json::to_vec(&json!([{
        "signature": format!("sig-{slot}"),
        "slot": slot,
        "instructions": instructions
    }]))
    .unwrap()
}
