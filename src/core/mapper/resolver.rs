//! Best-effort resolution of metadata documents referenced by URI.

use crate::config::ResolverConfig;
use crate::utils::error::{Result, SinkError};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

const GATEWAY_SCHEME: &str = "gateway://";

/// Resolves a metadata URI to a JSON document.
///
/// Resolution never fails the caller: any problem yields `None` and the row
/// is written with a null document.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    async fn resolve(&self, uri: &str) -> Option<Value>;
}

/// Resolver that never fetches anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopResolver;

#[async_trait]
impl MetadataResolver for NoopResolver {
    async fn resolve(&self, _uri: &str) -> Option<Value> {
        None
    }
}

/// HTTP(S) resolver with a bounded timeout and `gateway://` support.
#[derive(Debug, Clone)]
pub struct HttpMetadataResolver {
    client: reqwest::Client,
    gateway_url: Option<String>,
}

impl HttpMetadataResolver {
    /// # Errors
    ///
    /// Returns `SinkError::ConfigError` if the HTTP client cannot be built.
    pub fn new(config: &ResolverConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| SinkError::ConfigError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            gateway_url: config
                .gateway_url
                .as_ref()
                .map(|url| url.trim_end_matches('/').to_string()),
        })
    }

    /// Location actually fetched for `uri`, if it is resolvable at all.
    ///
    /// `gateway://.../<id>` maps to
    /// `<gateway>/getCredentialsById?credentialId=<id>`.
    #[must_use]
    pub fn target_url(&self, uri: &str) -> Option<String> {
        let uri = uri.trim();
        if let Some(rest) = uri.strip_prefix(GATEWAY_SCHEME) {
            let gateway = self.gateway_url.as_deref()?;
            let credential_id = rest.rsplit('/').next().filter(|id| !id.is_empty())?;
            return Some(format!(
                "{gateway}/getCredentialsById?credentialId={credential_id}"
            ));
        }
        if uri.starts_with("http://") || uri.starts_with("https://") {
            return Some(uri.to_string());
        }
        None
    }

    async fn fetch(&self, url: &str) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| SinkError::ResolverError(format!("GET {url}: {e}")))?;
        response
            .json::<Value>()
            .await
            .map_err(|e| SinkError::ResolverError(format!("Invalid JSON from {url}: {e}")))
    }
}

#[async_trait]
impl MetadataResolver for HttpMetadataResolver {
    async fn resolve(&self, uri: &str) -> Option<Value> {
        let Some(url) = self.target_url(uri) else {
            tracing::debug!(uri, "Metadata URI is not resolvable");
            return None;
        };
        match self.fetch(&url).await {
            Ok(document) => Some(document),
            Err(e) => {
                tracing::warn!(uri, error = %e, "Failed to resolve metadata");
                None
            }
        }
    }
}
