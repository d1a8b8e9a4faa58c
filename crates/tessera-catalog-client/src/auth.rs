//! Credential handling for catalog requests.

use reqwest::RequestBuilder;

/// Credentials attached to every catalog request.
///
/// Held in memory only; nothing here persists or rotates tokens.
#[derive(Debug, Clone)]
pub enum CatalogCredentials {
    /// Raw API key sent in the `Authorization` header.
    ApiKey { key: String },
    /// OAuth-style bearer token.
    Bearer { token: String },
}

impl CatalogCredentials {
    /// Apply the credentials to an outgoing request.
    #[must_use]
    pub fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        match self {
            CatalogCredentials::ApiKey { key } => builder.header("Authorization", key),
            CatalogCredentials::Bearer { token } => builder.bearer_auth(token),
        }
    }
}
