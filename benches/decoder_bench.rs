use criterion::{Criterion, black_box, criterion_group, criterion_main};
use solana_idl_parser::{account_discriminator, instruction_discriminator, load_idl_from_str};
use solana_pg_sink::DecoderRegistry;
use solana_pg_sink::streams::parse_payload;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;

const IDL: &str = r#"{
    "version": "0.1.0",
    "name": "gpl_core",
    "instructions": [
        {
            "name": "createPost",
            "accounts": [
                {"name": "post", "isMut": true, "isSigner": false},
                {"name": "profile", "isMut": false, "isSigner": false},
                {"name": "authority", "isMut": true, "isSigner": true}
            ],
            "args": [
                {"name": "metadataUri", "type": "string"},
                {"name": "randomHash", "type": {"array": ["u8", 32]}}
            ]
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
        }
    ],
    "types": []
}"#;

fn decoder_benchmark(c: &mut Criterion) {
    let program_id = Pubkey::new_unique();
    let mut registry = DecoderRegistry::new();
    registry.register(program_id, Arc::new(load_idl_from_str(IDL).unwrap()));

    let uri = "https://arweave.net/0123456789abcdef0123456789abcdef".to_string();
    let mut account = account_discriminator("Post").to_vec();
    account.extend(
        borsh::to_vec(&(
            Pubkey::new_unique().to_bytes(),
            uri.clone(),
            [7u8; 32],
            Some(Pubkey::new_unique().to_bytes()),
        ))
        .unwrap(),
    );

    let mut instruction = instruction_discriminator("createPost").to_vec();
    instruction.extend(borsh::to_vec(&(uri, [7u8; 32])).unwrap());
    let accounts: Vec<String> = (0..3).map(|_| Pubkey::new_unique().to_string()).collect();

    c.bench_function("decode_post_account", |b| {
        b.iter(|| registry.decode_account(black_box(&program_id), black_box(&account)))
    });

    c.bench_function("decode_create_post", |b| {
        b.iter(|| {
            registry.decode_instruction(
                black_box(&program_id),
                black_box(&instruction),
                black_box(&accounts),
            )
        })
    });

    let payload = serde_json::to_vec(&serde_json::json!([{
        "signature": "sig",
        "slot": 245_000_000u64,
        "instructions": [{
            "programId": program_id.to_string(),
            "data": bs58::encode(&instruction).into_string(),
            "accounts": accounts,
            "innerInstructions": []
        }]
    }]))
    .unwrap();

    c.bench_function("parse_webhook_payload", |b| {
        b.iter(|| parse_payload(black_box(&payload)))
    });
}

criterion_group!(benches, decoder_benchmark);
criterion_main!(benches);
