//! Password-based auth backend client.
//!
//! The backend has no native federation support; the credential bridge
//! (see `bridge`) turns provider sign-ins into ordinary email+password
//! calls against it.

use crate::AuthError;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::watch;

/// An authenticated identity in the auth backend, independent of which
/// external provider (if any) was used to obtain it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Immutable uid assigned by the backend
    pub uid: String,
    /// Email the credential was established under
    pub email: String,
}

/// Errors from the auth backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The email already has a credential. The provisioner maps this to an
    /// identity conflict before any document writes.
    #[error("email is already registered")]
    EmailTaken,

    /// Wrong email/secret pair
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Any other backend rejection
    #[error("auth backend error ({status}): {summary}")]
    Api { status: u16, summary: String },

    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<BackendError> for AuthError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::EmailTaken => {
                AuthError::IdentityConflict("email is already registered; sign in instead".into())
            }
            other => AuthError::Backend(other.to_string()),
        }
    }
}

/// Operations consumed from the auth backend.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Create a principal with an email+secret credential.
    async fn create_principal(&self, email: &str, secret: &str)
        -> Result<Principal, BackendError>;

    /// Sign in with an existing credential.
    async fn sign_in(&self, email: &str, secret: &str) -> Result<Principal, BackendError>;

    /// Subscribe to principal-change notifications. Fires on every
    /// successful create/sign-in, independently of any flow that caused it.
    fn subscribe(&self) -> watch::Receiver<Option<Principal>>;
}

#[derive(Deserialize)]
struct BackendUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// Response shape shared by the signup and password-grant endpoints. Depending
/// on backend settings the user object arrives nested or at the top level.
#[derive(Deserialize)]
struct CredentialResponse {
    #[serde(default)]
    user: Option<BackendUser>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

impl CredentialResponse {
    fn into_principal(self, fallback_email: &str) -> Option<Principal> {
        let (uid, email) = match self.user {
            Some(user) => (user.id, user.email),
            None => (self.id?, self.email),
        };
        Some(Principal {
            uid,
            email: email.unwrap_or_else(|| fallback_email.to_string()),
        })
    }
}

/// REST client for a GoTrue-style auth backend.
pub struct HttpAuthBackend {
    http_client: reqwest::Client,
    api_url: String,
    publishable_key: String,
    principal_tx: watch::Sender<Option<Principal>>,
}

impl HttpAuthBackend {
    /// Create a new auth backend client.
    pub fn new(api_url: impl Into<String>, publishable_key: impl Into<String>) -> Self {
        let (principal_tx, _) = watch::channel(None);
        Self {
            http_client: reqwest::Client::new(),
            api_url: api_url.into(),
            publishable_key: publishable_key.into(),
            principal_tx,
        }
    }

    async fn credential_call(
        &self,
        url: &str,
        email: &str,
        secret: &str,
        conflict_is_email_taken: bool,
    ) -> Result<Principal, BackendError> {
        let response = self
            .http_client
            .post(url)
            .header("apikey", &self.publishable_key)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({
                "email": email,
                "password": secret,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let lowered = body.to_ascii_lowercase();
            if conflict_is_email_taken
                && (status.as_u16() == 422 || status.as_u16() == 400)
                && lowered.contains("already registered")
            {
                return Err(BackendError::EmailTaken);
            }
            if status.as_u16() == 400 && lowered.contains("invalid") {
                return Err(BackendError::InvalidCredentials);
            }
            tracing::error!(status = %status, "Auth backend call failed");
            return Err(BackendError::Api {
                status: status.as_u16(),
                summary: format!("len={}", body.len()),
            });
        }

        let data: CredentialResponse = response.json().await?;
        let principal = data.into_principal(email).ok_or(BackendError::Api {
            status: status.as_u16(),
            summary: "response carried no user id".to_string(),
        })?;

        // The notification fires as a consequence of the credential call,
        // but subscribers are scheduled independently of the caller.
        let _ = self.principal_tx.send(Some(principal.clone()));
        Ok(principal)
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn create_principal(
        &self,
        email: &str,
        secret: &str,
    ) -> Result<Principal, BackendError> {
        let url = format!("{}/auth/v1/signup", self.api_url);
        tracing::debug!(email, "Creating principal");
        self.credential_call(&url, email, secret, true).await
    }

    async fn sign_in(&self, email: &str, secret: &str) -> Result<Principal, BackendError> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.api_url);
        tracing::debug!(email, "Signing in principal");
        self.credential_call(&url, email, secret, false).await
    }

    fn subscribe(&self) -> watch::Receiver<Option<Principal>> {
        self.principal_tx.subscribe()
    }
}

/// In-memory auth backend keyed by email. Used by tests and local
/// development; mirrors the watch-notification behavior of the HTTP client.
pub struct MemoryAuthBackend {
    credentials: Mutex<HashMap<String, StoredCredential>>,
    principal_tx: watch::Sender<Option<Principal>>,
}

struct StoredCredential {
    uid: String,
    secret: String,
}

impl Default for MemoryAuthBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAuthBackend {
    pub fn new() -> Self {
        let (principal_tx, _) = watch::channel(None);
        Self {
            credentials: Mutex::new(HashMap::new()),
            principal_tx,
        }
    }

    /// Number of registered credentials. Test helper.
    pub fn credential_count(&self) -> usize {
        self.credentials.lock().unwrap().len()
    }
}

#[async_trait]
impl AuthBackend for MemoryAuthBackend {
    async fn create_principal(
        &self,
        email: &str,
        secret: &str,
    ) -> Result<Principal, BackendError> {
        let mut creds = self.credentials.lock().unwrap();
        if creds.contains_key(email) {
            return Err(BackendError::EmailTaken);
        }
        let uid = uuid::Uuid::new_v4().to_string();
        creds.insert(
            email.to_string(),
            StoredCredential {
                uid: uid.clone(),
                secret: secret.to_string(),
            },
        );
        drop(creds);

        let principal = Principal {
            uid,
            email: email.to_string(),
        };
        let _ = self.principal_tx.send(Some(principal.clone()));
        Ok(principal)
    }

    async fn sign_in(&self, email: &str, secret: &str) -> Result<Principal, BackendError> {
        let creds = self.credentials.lock().unwrap();
        let stored = creds.get(email).ok_or(BackendError::InvalidCredentials)?;
        if stored.secret != secret {
            return Err(BackendError::InvalidCredentials);
        }
        let principal = Principal {
            uid: stored.uid.clone(),
            email: email.to_string(),
        };
        drop(creds);

        let _ = self.principal_tx.send(Some(principal.clone()));
        Ok(principal)
    }

    fn subscribe(&self) -> watch::Receiver<Option<Principal>> {
        self.principal_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_create_then_sign_in() {
        let backend = MemoryAuthBackend::new();

        let created = backend
            .create_principal("jdoe@acme.gov", "secret-1")
            .await
            .unwrap();
        let signed_in = backend.sign_in("jdoe@acme.gov", "secret-1").await.unwrap();
        assert_eq!(created.uid, signed_in.uid);
    }

    #[tokio::test]
    async fn test_memory_backend_email_taken() {
        let backend = MemoryAuthBackend::new();
        backend
            .create_principal("jdoe@acme.gov", "secret-1")
            .await
            .unwrap();

        let result = backend.create_principal("jdoe@acme.gov", "other").await;
        assert!(matches!(result, Err(BackendError::EmailTaken)));
        assert_eq!(backend.credential_count(), 1);
    }

    #[tokio::test]
    async fn test_memory_backend_wrong_secret() {
        let backend = MemoryAuthBackend::new();
        backend
            .create_principal("jdoe@acme.gov", "secret-1")
            .await
            .unwrap();

        let result = backend.sign_in("jdoe@acme.gov", "wrong").await;
        assert!(matches!(result, Err(BackendError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_subscribe_sees_sign_in() {
        let backend = MemoryAuthBackend::new();
        let mut rx = backend.subscribe();
        assert!(rx.borrow().is_none());

        backend
            .create_principal("jdoe@acme.gov", "secret-1")
            .await
            .unwrap();

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_ref().unwrap().email, "jdoe@acme.gov");
    }

    #[test]
    fn test_email_taken_maps_to_identity_conflict() {
        let err: AuthError = BackendError::EmailTaken.into();
        assert!(matches!(err, AuthError::IdentityConflict(_)));

        let err: AuthError = BackendError::InvalidCredentials.into();
        assert!(matches!(err, AuthError::Backend(_)));
    }

    #[test]
    fn test_credential_response_shapes() {
        let nested: CredentialResponse = serde_json::from_str(
            r#"{"access_token":"t","user":{"id":"uid-1","email":"a@b.gov"}}"#,
        )
        .unwrap();
        let p = nested.into_principal("fallback@x").unwrap();
        assert_eq!(p.uid, "uid-1");
        assert_eq!(p.email, "a@b.gov");

        let flat: CredentialResponse =
            serde_json::from_str(r#"{"id":"uid-2"}"#).unwrap();
        let p = flat.into_principal("fallback@x").unwrap();
        assert_eq!(p.uid, "uid-2");
        assert_eq!(p.email, "fallback@x");

        let empty: CredentialResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(empty.into_principal("fallback@x").is_none());
    }
}
