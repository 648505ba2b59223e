//! The loaded identity provider client.
//!
//! [`IdentityClient`] is the capability handed out by
//! [`ProviderBootstrap`](super::ProviderBootstrap): it knows the provider's
//! endpoints and can build the consent URL, fetch the user profile for a
//! token and revoke a token.

use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::error::{ProviderError, ProviderResult};

use super::tokens::UserProfile;

/// Endpoints taken from the provider's OpenID discovery document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdentityEndpoints {
    /// Where the browser is sent for consent.
    pub authorization_endpoint: String,
    /// Returns the profile for a bearer token.
    pub userinfo_endpoint: String,
    /// Accepts `token=<token>` to revoke it.
    pub revocation_endpoint: String,
}

/// Profile as the user-info endpoint returns it.
#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    sub: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

impl From<UserInfoResponse> for UserProfile {
    fn from(info: UserInfoResponse) -> Self {
        Self {
            id: info.sub,
            display_name: info.name,
            email: info.email,
            avatar_url: info.picture,
        }
    }
}

/// A ready-to-use identity provider client.
#[derive(Debug, Clone)]
pub struct IdentityClient {
    endpoints: IdentityEndpoints,
    http_client: reqwest::Client,
}

impl IdentityClient {
    /// Creates a client for the given endpoints.
    pub fn new(endpoints: IdentityEndpoints, http_client: reqwest::Client) -> Self {
        Self {
            endpoints,
            http_client,
        }
    }

    /// Returns the endpoints this client talks to.
    pub fn endpoints(&self) -> &IdentityEndpoints {
        &self.endpoints
    }

    /// Builds the implicit-grant consent URL.
    pub fn authorization_url(
        &self,
        client_id: &str,
        scopes: &[String],
        redirect_uri: &str,
        state: &str,
    ) -> ProviderResult<Url> {
        let mut url = Url::parse(&self.endpoints.authorization_endpoint).map_err(|e| {
            ProviderError::configuration(format!("invalid authorization endpoint: {}", e))
                .with_source(e)
        })?;
        url.query_pairs_mut()
            .append_pair("client_id", client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "token")
            .append_pair("scope", &scopes.join(" "))
            .append_pair("state", state)
            .append_pair("include_granted_scopes", "true");
        Ok(url)
    }

    /// Fetches the profile of the user the token was issued to.
    ///
    /// A non-success status is an authentication failure carrying that
    /// status.
    pub async fn fetch_user_info(&self, access_token: &str) -> ProviderResult<UserProfile> {
        let response = self
            .http_client
            .get(&self.endpoints.userinfo_endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                ProviderError::network(format!("user info request failed: {}", e)).with_source(e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ProviderError::network(format!("failed to read response: {}", e)).with_source(e)
        })?;

        if !status.is_success() {
            return Err(ProviderError::authentication(format!(
                "user info request rejected ({}): {}",
                status, body
            ))
            .with_status(status.as_u16()));
        }

        let info: UserInfoResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("invalid user info response: {}", e))
                .with_source(e)
        })?;

        debug!("fetched profile for user {}", info.sub);
        Ok(info.into())
    }

    /// Revokes the token at the provider.
    pub async fn revoke(&self, access_token: &str) -> ProviderResult<()> {
        let response = self
            .http_client
            .post(&self.endpoints.revocation_endpoint)
            .form(&[("token", access_token)])
            .send()
            .await
            .map_err(|e| {
                ProviderError::network(format!("revocation request failed: {}", e)).with_source(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::remote(
                status.as_u16(),
                format!("token revocation failed ({})", status),
            ));
        }

        info!("revoked access token");
        Ok(())
    }
}
