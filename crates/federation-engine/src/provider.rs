//! Geoportal identity provider client.

use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;

/// Identity attributes returned by the provider after a code exchange.
///
/// Any of the optional attributes may be absent: personal accounts carry no
/// organization, and some accounts expose no email.
#[derive(Debug, Clone)]
pub struct ProviderIdentity {
    /// Provider username
    pub username: String,
    /// Account email, when exposed
    pub email: Option<String>,
    /// Provider organization id; absent for personal accounts
    pub org_id: Option<String>,
    /// Provider organization display name / short code
    pub org_name: Option<String>,
    /// Display name, when exposed
    pub full_name: Option<String>,
}

impl ProviderIdentity {
    /// Salt material for the credential bridge: email, else the provider
    /// organization id, else the username itself. Total over any provider
    /// account shape.
    pub fn salt_material(&self) -> &str {
        self.email
            .as_deref()
            .or(self.org_id.as_deref())
            .unwrap_or(&self.username)
    }
}

/// Exchanges a verified authorization code for the provider identity.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn exchange_code(&self, code: &str) -> AuthResult<ProviderIdentity>;
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct SelfUser {
    username: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default, rename = "fullName")]
    full_name: Option<String>,
}

/// Shape of the provider's portal-self document: the organization id and
/// name at the top level, the signed-in user nested.
#[derive(Deserialize)]
struct SelfResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    user: SelfUser,
}

/// HTTP client for the provider's token and self endpoints.
pub struct HttpProviderClient {
    http_client: reqwest::Client,
    token_url: String,
    self_url: String,
    client_id: String,
    redirect_uri: String,
}

impl HttpProviderClient {
    pub fn new(
        token_url: impl Into<String>,
        self_url: impl Into<String>,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            token_url: token_url.into(),
            self_url: self_url.into(),
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
        }
    }

    async fn exchange_token(&self, code: &str) -> AuthResult<String> {
        tracing::debug!("Exchanging authorization code");

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(status = %status, "Code exchange failed");
            return Err(AuthError::OAuthProtocol(format!(
                "code exchange failed with status {}",
                status
            )));
        }

        let token: TokenResponse = response.json().await?;
        if let Some(error) = token.error {
            let description = token.error_description.unwrap_or_default();
            return Err(AuthError::OAuthProtocol(format!(
                "provider rejected code exchange: {} {}",
                error, description
            )));
        }
        token.access_token.ok_or_else(|| {
            AuthError::OAuthProtocol("token response carried no access token".to_string())
        })
    }

    async fn fetch_identity(&self, access_token: &str) -> AuthResult<ProviderIdentity> {
        let url = format!("{}?f=json", self.self_url);

        let response = self
            .http_client
            .get(&url)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(status = %status, "Identity fetch failed");
            return Err(AuthError::OAuthProtocol(format!(
                "identity fetch failed with status {}",
                status
            )));
        }

        let data: SelfResponse = response.json().await?;
        Ok(ProviderIdentity {
            username: data.user.username,
            email: data.user.email,
            org_id: data.id,
            org_name: data.name,
            full_name: data.user.full_name,
        })
    }
}

#[async_trait]
impl IdentityProvider for HttpProviderClient {
    async fn exchange_code(&self, code: &str) -> AuthResult<ProviderIdentity> {
        let access_token = self.exchange_token(code).await?;
        let identity = self.fetch_identity(&access_token).await?;
        tracing::info!(
            username = %identity.username,
            org_id = ?identity.org_id,
            "Provider identity resolved"
        );
        Ok(identity)
    }
}

/// Static provider double mapping codes to identities. Used by tests and
/// local development.
#[derive(Default)]
pub struct StaticProvider {
    identities: Mutex<HashMap<String, ProviderIdentity>>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an identity the given code will exchange into.
    pub fn insert(&self, code: &str, identity: ProviderIdentity) {
        self.identities
            .lock()
            .unwrap()
            .insert(code.to_string(), identity);
    }
}

#[async_trait]
impl IdentityProvider for StaticProvider {
    async fn exchange_code(&self, code: &str) -> AuthResult<ProviderIdentity> {
        self.identities
            .lock()
            .unwrap()
            .get(code)
            .cloned()
            .ok_or_else(|| AuthError::OAuthProtocol("unknown authorization code".to_string()))
    }
}
