//! Where an IDL document comes from.

use crate::utils::error::{Result, SinkError};
use solana_idl_parser::{Idl, load_idl_from_path, load_idl_from_str};
use std::path::PathBuf;

/// A static file or a document fetched over HTTP once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdlSource {
    Path(PathBuf),
    Url(String),
}

impl IdlSource {
    /// `http://` and `https://` locations are URLs, everything else a path.
    #[must_use]
    pub fn parse(location: &str) -> Self {
        let location = location.trim();
        if location.starts_with("http://") || location.starts_with("https://") {
            IdlSource::Url(location.to_string())
        } else {
            IdlSource::Path(PathBuf::from(location))
        }
    }

    /// Loads and parses the document.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::IdlError` if the document cannot be read, fetched,
    /// or parsed.
    pub async fn load(&self, client: &reqwest::Client) -> Result<Idl> {
        match self {
            IdlSource::Path(path) => {
                load_idl_from_path(path).map_err(|e| SinkError::IdlError(format!("{e:#}")))
            }
            IdlSource::Url(url) => {
                let response = client
                    .get(url)
                    .send()
                    .await
                    .and_then(reqwest::Response::error_for_status)
                    .map_err(|e| SinkError::IdlError(format!("Failed to fetch IDL from {url}: {e}")))?;
                let body = response
                    .text()
                    .await
                    .map_err(|e| SinkError::IdlError(format!("Failed to read IDL from {url}: {e}")))?;
                load_idl_from_str(&body).map_err(|e| SinkError::IdlError(format!("{e:#}")))
            }
        }
    }
}
