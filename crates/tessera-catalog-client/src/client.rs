//! Catalog membership HTTP client (reqwest-based).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tessera_core::{OrgId, Role, UserId};

use crate::api::CatalogApi;
use crate::auth::CatalogCredentials;
use crate::error::{CatalogError, CatalogResult};
use crate::types::{MemberList, Membership};

/// Request body for creating a member.
#[derive(Debug, Serialize)]
struct CreateMemberRequest<'a> {
    user: UserId,
    capacity: &'a Role,
}

/// Request body for changing a member's capacity.
#[derive(Debug, Serialize)]
struct UpdateMemberRequest<'a> {
    capacity: &'a Role,
}

/// Error body the catalog returns alongside non-2xx statuses.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// HTTP client for the catalog's membership endpoints.
///
/// Wraps `reqwest::Client` with credential handling, a per-request
/// timeout, and status-code mapping onto [`CatalogError`].
#[derive(Debug, Clone)]
pub struct CatalogClient {
    /// Base URL of the catalog API (e.g. "<https://catalog.example.com/api/v1>").
    base_url: String,
    credentials: CatalogCredentials,
    http_client: Client,
}

impl CatalogClient {
    /// Create a new catalog client.
    pub fn new(
        base_url: impl Into<String>,
        credentials: CatalogCredentials,
        timeout: Duration,
    ) -> CatalogResult<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tessera-catalog-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CatalogError::InvalidConfig {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        // Normalize base URL: strip trailing slash.
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            base_url,
            credentials,
            http_client,
        })
    }

    /// Create a client with a pre-built `reqwest::Client` (for testing).
    #[must_use]
    pub fn with_http_client(
        base_url: impl Into<String>,
        credentials: CatalogCredentials,
        http_client: Client,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            credentials,
            http_client,
        }
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn members_url(&self, org: &OrgId) -> String {
        format!("{}/orgs/{}/members", self.base_url, org)
    }

    fn member_url(&self, org: &OrgId, user: UserId) -> String {
        format!("{}/orgs/{}/members/{}", self.base_url, org, user)
    }

    // ── Response handling ─────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: Response,
        resource: &str,
    ) -> CatalogResult<T> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| CatalogError::Serialization {
                    message: e.to_string(),
                });
        }
        Err(Self::error_for(response, resource).await)
    }

    async fn handle_empty_response(
        &self,
        response: Response,
        resource: &str,
    ) -> CatalogResult<()> {
        let status = response.status();
        if status == StatusCode::NO_CONTENT || status.is_success() {
            return Ok(());
        }
        Err(Self::error_for(response, resource).await)
    }

    /// Map a non-2xx response onto the error taxonomy.
    async fn error_for(response: Response, resource: &str) -> CatalogError {
        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED => CatalogError::AuthFailed,
            StatusCode::FORBIDDEN => CatalogError::PermissionDenied {
                message: Self::body_message(response).await,
            },
            StatusCode::NOT_FOUND => CatalogError::NotFound {
                resource: resource.to_string(),
            },
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_secs = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok());
                CatalogError::RateLimited { retry_after_secs }
            }
            _ => CatalogError::Api {
                status: status.as_u16(),
                message: Self::body_message(response).await,
            },
        }
    }

    /// Best-effort extraction of a human-readable message from an error
    /// body; falls back to the raw text.
    async fn body_message(response: Response) -> String {
        let text = response.text().await.unwrap_or_default();
        serde_json::from_str::<ApiErrorBody>(&text)
            .ok()
            .and_then(|body| body.message)
            .unwrap_or(text)
    }
}

#[async_trait]
impl CatalogApi for CatalogClient {
    async fn list_members(&self, org: &OrgId) -> CatalogResult<Vec<Membership>> {
        let url = self.members_url(org);
        debug!(org = %org, "Catalog GET {url}");
        let builder = self.http_client.get(&url);
        let response = self.credentials.apply(builder).send().await?;
        let list: MemberList = self
            .handle_response(response, &format!("organization {org}"))
            .await?;
        Ok(list.members)
    }

    async fn add_member(
        &self,
        org: &OrgId,
        user: UserId,
        capacity: &Role,
    ) -> CatalogResult<Membership> {
        let url = self.members_url(org);
        debug!(org = %org, user = %user, capacity = %capacity, "Catalog POST {url}");
        let builder = self
            .http_client
            .post(&url)
            .json(&CreateMemberRequest { user, capacity });
        let response = self.credentials.apply(builder).send().await?;
        self.handle_response(response, &format!("organization {org}"))
            .await
    }

    async fn update_member(
        &self,
        org: &OrgId,
        user: UserId,
        capacity: &Role,
    ) -> CatalogResult<Membership> {
        let url = self.member_url(org, user);
        debug!(org = %org, user = %user, capacity = %capacity, "Catalog PUT {url}");
        let builder = self
            .http_client
            .put(&url)
            .json(&UpdateMemberRequest { capacity });
        let response = self.credentials.apply(builder).send().await?;
        self.handle_response(response, &format!("member {user} of organization {org}"))
            .await
    }

    async fn remove_member(&self, org: &OrgId, user: UserId) -> CatalogResult<()> {
        let url = self.member_url(org, user);
        debug!(org = %org, user = %user, "Catalog DELETE {url}");
        let builder = self.http_client.delete(&url);
        let response = self.credentials.apply(builder).send().await?;
        self.handle_empty_response(response, &format!("member {user} of organization {org}"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(base_url: &str) -> CatalogClient {
        CatalogClient::with_http_client(
            base_url,
            CatalogCredentials::ApiKey { key: "k".into() },
            Client::new(),
        )
    }

    #[test]
    fn test_base_url_normalized() {
        let client = test_client("http://catalog.local/api/");
        assert_eq!(client.base_url(), "http://catalog.local/api");
    }

    #[test]
    fn test_member_urls() {
        let client = test_client("http://catalog.local");
        let org = OrgId::new("org-1");
        let user: UserId = "550e8400-e29b-41d4-a716-446655440000".parse().unwrap();

        assert_eq!(
            client.members_url(&org),
            "http://catalog.local/orgs/org-1/members"
        );
        assert_eq!(
            client.member_url(&org, user),
            "http://catalog.local/orgs/org-1/members/550e8400-e29b-41d4-a716-446655440000"
        );
    }
}
