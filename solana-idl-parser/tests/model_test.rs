use solana_idl_parser::model::{IdlAccountItem, IdlComplexType, IdlType};
use solana_idl_parser::{
    account_discriminator, classify, instruction_discriminator, load_idl_from_path,
    load_idl_from_str, IntegerKind, SemanticType,
};
use std::io::Write;

const LEGACY_IDL: &str = r#"{
    "version": "0.1.0",
    "name": "gpl_core",
    "instructions": [
        {
            "name": "createPost",
            "accounts": [
                {"name": "post", "isMut": true, "isSigner": false},
                {
                    "name": "owner",
                    "accounts": [
                        {"name": "profile", "isMut": false, "isSigner": false},
                        {"name": "authority", "isMut": false, "isSigner": true}
                    ]
                },
                {"name": "systemProgram", "isMut": false, "isSigner": false}
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

const NEW_IDL: &str = r#"{
    "address": "CDDMdCAWB5AXgvEy7XJRggAu37QPG1b9aJXndZoPUkkm",
    "metadata": {"name": "gpl_core", "version": "0.2.0"},
    "instructions": [
        {
            "name": "verify_issuer",
            "discriminator": [1, 2, 3, 4, 5, 6, 7, 8],
            "accounts": [{"name": "issuer", "writable": true}],
            "args": []
        }
    ],
    "recordTypes": [
        {"name": "Issuer", "discriminator": [9, 9, 9, 9, 9, 9, 9, 9]}
    ],
    "types": [
        {
            "name": "Issuer",
            "type": {
                "kind": "struct",
                "fields": [
                    {"name": "authority", "type": "pubkey"},
                    {"name": "verified", "type": "bool"},
                    {"name": "tags", "type": {"vec": {"defined": {"name": "Tag"}}}}
                ]
            }
        },
        {
            "name": "Tag",
            "type": {"kind": "enum", "variants": [{"name": "Gold"}, {"name": "Custom", "fields": ["string"]}]}
        }
    ]
}"#;

#[test]
fn test_parse_legacy_layout() {
    let idl = load_idl_from_str(LEGACY_IDL).unwrap();
    assert_eq!(idl.name, "gpl_core");
    assert_eq!(idl.accounts.len(), 1);

    let post = idl.find_record("Post").unwrap();
    let fields = idl.record_fields(post);
    assert_eq!(fields.len(), 4);
    assert_eq!(fields[0].ty, IdlType::Primitive("publicKey".to_string()));
    assert!(matches!(
        &fields[2].ty,
        IdlType::Complex(IdlComplexType::Array(_, 32))
    ));
}

#[test]
fn test_nested_account_groups_flatten_in_order() {
    let idl = load_idl_from_str(LEGACY_IDL).unwrap();
    let ix = &idl.instructions[0];
    assert!(matches!(ix.accounts[1], IdlAccountItem::Group(_)));
    assert_eq!(
        ix.flat_account_names(),
        vec!["post", "profile", "authority", "systemProgram"]
    );
}

#[test]
fn test_parse_new_layout_resolves_through_types() {
    let idl = load_idl_from_str(NEW_IDL).unwrap();
    assert_eq!(idl.program_address(), Some("CDDMdCAWB5AXgvEy7XJRggAu37QPG1b9aJXndZoPUkkm"));

    let issuer = idl.find_record("Issuer").unwrap();
    let fields = idl.record_fields(issuer);
    assert_eq!(fields.len(), 3);
    assert_eq!(classify(&idl, &fields[0].ty), SemanticType::Address);
    assert_eq!(
        classify(&idl, &fields[2].ty),
        SemanticType::List(Box::new(SemanticType::Composite("Tag".to_string())))
    );
}

#[test]
fn test_derived_discriminators() {
    let idl = load_idl_from_str(LEGACY_IDL).unwrap();
    let post = idl.find_record("Post").unwrap();
    assert_eq!(post.discriminator_bytes(), account_discriminator("Post").to_vec());
    assert_eq!(
        idl.instructions[0].discriminator_bytes(),
        instruction_discriminator("create_post").to_vec()
    );
    assert_eq!(instruction_discriminator("createPost"), instruction_discriminator("create_post"));
    assert_ne!(account_discriminator("Post"), account_discriminator("Profile"));
}

#[test]
fn test_explicit_discriminators_override() {
    let idl = load_idl_from_str(NEW_IDL).unwrap();
    assert_eq!(idl.accounts[0].discriminator_bytes(), vec![9; 8]);
    assert_eq!(idl.instructions[0].discriminator_bytes(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
}

#[test]
fn test_fixed_array_classification() {
    let idl = load_idl_from_str(LEGACY_IDL).unwrap();
    let arg = &idl.instructions[0].args[1];
    assert_eq!(
        classify(&idl, &arg.ty),
        SemanticType::FixedArray(Box::new(SemanticType::Integer(IntegerKind::U8)), 32)
    );
}

#[test]
fn test_load_from_path() {
    let path = std::env::temp_dir().join(format!("idl-model-test-{}.json", std::process::id()));
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(LEGACY_IDL.as_bytes()).unwrap();

    let idl = load_idl_from_path(&path).unwrap();
    assert_eq!(idl.instructions.len(), 1);

    std::fs::remove_file(&path).unwrap();
    assert!(load_idl_from_path(&path).is_err());
}

#[test]
fn test_invalid_json_is_error() {
    let err = load_idl_from_str("{not json").unwrap_err();
    assert!(err.to_string().contains("Failed to parse IDL JSON"));
}
