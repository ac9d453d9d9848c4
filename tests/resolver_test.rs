use serde_json::json;
use solana_pg_sink::config::ResolverConfig;
use solana_pg_sink::{HttpMetadataResolver, MetadataResolver};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn resolver(gateway: Option<String>) -> HttpMetadataResolver {
    HttpMetadataResolver::new(&ResolverConfig {
        timeout_ms: 500,
        gateway_url: gateway,
    })
    .unwrap()
}

#[tokio::test]
async fn test_gateway_uri_is_rewritten() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/getCredentialsById"))
        .and(query_param("credentialId", "cred-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"badge": "early"})))
        .expect(1)
        .mount(&server)
        .await;

    let resolved = resolver(Some(server.uri()))
        .resolve("gateway://credentials/cred-42")
        .await;
    assert_eq!(resolved, Some(json!({"badge": "early"})));
}

#[tokio::test]
async fn test_invalid_json_resolves_to_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let uri = format!("{}/meta.json", server.uri());
    assert_eq!(resolver(None).resolve(&uri).await, None);
}

#[tokio::test]
async fn test_timeout_resolves_to_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(std::time::Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let uri = format!("{}/slow.json", server.uri());
    assert_eq!(resolver(None).resolve(&uri).await, None);
}

#[tokio::test]
async fn test_unsupported_schemes_are_not_fetched() {
    let resolver = resolver(None);
    assert_eq!(resolver.resolve("ipfs://bafy").await, None);
    assert_eq!(resolver.resolve("gateway://credentials/1").await, None);
}
