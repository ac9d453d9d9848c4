//! Handlers for the Gum social-graph and name-service programs.

use super::handlers::RowMapper;
use super::registry::MapperRegistry;
use crate::core::decoder::DecodedValue;
use crate::utils::error::Result;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// Gum social-graph program.
pub const GUM_PROGRAM_ID: &str = "6MhUAJtKdJx3RDCffUsJsQm8xy9YhhywjEmMYrxRc5j6";
/// Gum name-service program.
pub const NAME_SERVICE_PROGRAM_ID: &str = "5kWEYrdyryq3jGP5sUcKwTySzxr3dHzWFBVA3vkt6Nj5";

/// # Errors
///
/// Never fails for the built-in constants; kept fallible for symmetry with
/// user-supplied ids.
pub fn gum_program_id() -> Result<Pubkey> {
    Ok(Pubkey::from_str(GUM_PROGRAM_ID)?)
}

/// # Errors
///
/// See [`gum_program_id`].
pub fn name_service_program_id() -> Result<Pubkey> {
    Ok(Pubkey::from_str(NAME_SERVICE_PROGRAM_ID)?)
}

/// Registers the built-in event catalogue.
pub fn register_defaults(registry: &mut MapperRegistry) {
    // posts
    registry.register(
        "createPost",
        RowMapper::upsert("Post", "Post")
            .role("Profile", "profile")
            .arg("metadataUri", "metadata_uri")
            .arg("randomHash", "random_hash"),
    );
    registry.register(
        "updatePost",
        RowMapper::update("Post", "Post").arg("metadataUri", "metadata_uri"),
    );
    registry.register("deletePost", RowMapper::delete("Post", "Post"));
    registry.register(
        "createComment",
        RowMapper::update("Post", "Post").role("Reply To", "reply_to"),
    );

    // profiles
    registry.register(
        "createProfile",
        RowMapper::upsert("Profile", "Profile")
            .role("Authority", "authority")
            .role("Screen Name", "screen_name")
            .arg("metadataUri", "metadata_uri")
            .arg("randomHash", "random_hash"),
    );
    registry.register(
        "updateProfile",
        RowMapper::update("Profile", "Profile").arg("metadataUri", "metadata_uri"),
    );
    registry.register("deleteProfile", RowMapper::delete("Profile", "Profile"));

    // graph
    registry.register(
        "createConnection",
        RowMapper::upsert("Connection", "Connection")
            .role("From Profile", "from_profile")
            .role("To Profile", "to_profile"),
    );
    registry.register(
        "deleteConnection",
        RowMapper::delete("Connection", "Connection"),
    );
    registry.register(
        "createReaction",
        RowMapper::upsert("Reaction", "Reaction")
            .role("From Profile", "from_profile")
            .role("To Post", "to_post")
            .arg("reactionType", "reaction_type"),
    );
    registry.register("deleteReaction", RowMapper::delete("Reaction", "Reaction"));

    // name service
    registry.register(
        "createNameRecord",
        RowMapper::upsert("NameRecord", "Name Record")
            .role("Domain", "domain")
            .role("Authority", "authority")
            .arg("name", "name"),
    );
    registry.register(
        "transferNameRecord",
        RowMapper::update("NameRecord", "Name Record").role("New Authority", "authority"),
    );
    registry.register(
        "createTld",
        RowMapper::upsert("NameRecord", "Name Record")
            .role("Authority", "authority")
            .role("Domain", "domain")
            .arg("name", "name"),
    );

    // badges
    registry.register(
        "createBadge",
        RowMapper::upsert("Badge", "Badge")
            .role("Issuer", "issuer")
            .role("Schema", "schema")
            .role("Holder", "holder")
            .role("Update Authority", "update_authority")
            .arg("metadataUri", "metadata_uri"),
    );
    registry.register(
        "updateBadge",
        RowMapper::update("Badge", "Badge").arg("metadataUri", "metadata_uri"),
    );
    registry.register("deleteBadge", RowMapper::delete("Badge", "Badge"));
    registry.register(
        "createSchema",
        RowMapper::upsert("Schema", "Schema")
            .role("Authority", "authority")
            .arg("metadataUri", "metadata_uri")
            .arg("randomHash", "random_hash"),
    );
    registry.register(
        "updateSchema",
        RowMapper::update("Schema", "Schema").arg("metadataUri", "metadata_uri"),
    );
    registry.register("deleteSchema", RowMapper::delete("Schema", "Schema"));
    registry.register(
        "createIssuer",
        RowMapper::upsert("Issuer", "Issuer")
            .role("Authority", "authority")
            .constant("verified", DecodedValue::Bool(false)),
    );
    registry.register(
        "verifyIssuer",
        RowMapper::update("Issuer", "Issuer").constant("verified", DecodedValue::Bool(true)),
    );
    registry.register("deleteIssuer", RowMapper::delete("Issuer", "Issuer"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_is_complete() {
        let mut registry = MapperRegistry::new();
        register_defaults(&mut registry);
        assert_eq!(registry.len(), 23);
        for event in [
            "createPost",
            "update_post",
            "createComment",
            "transferNameRecord",
            "createTld",
            "verifyIssuer",
        ] {
            assert!(registry.contains(event), "{event} missing");
        }
    }

    #[test]
    fn test_program_ids_parse() {
        assert!(gum_program_id().is_ok());
        assert!(name_service_program_id().is_ok());
    }
}
