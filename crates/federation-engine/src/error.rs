//! Error taxonomy for the federation engine.

use thiserror::Error;

/// Error type for federation and provisioning operations.
///
/// "No admin record" is deliberately not here: it surfaces as the
/// `AccessDenied` session state, an expected user-facing outcome.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Missing/invalid state token or a provider-reported error. Fatal;
    /// the user must restart the flow.
    #[error("OAuth protocol error: {0}")]
    OAuthProtocol(String),

    /// Tenant already provisioned, email already registered, or a personal
    /// account attempted signup. Fatal for this attempt.
    #[error("Identity conflict: {0}")]
    IdentityConflict(String),

    /// Credential created but one or more of the tenant documents failed to
    /// write. Committed writes are not rolled back.
    #[error("Provisioning partially failed (unwritten: {failed:?}): {message}")]
    ProvisioningPartial {
        failed: Vec<&'static str>,
        message: String,
    },

    /// Auth backend rejection other than an email conflict
    #[error("Auth backend error: {0}")]
    Backend(String),

    /// Local flow-state store failure
    #[error("Storage error: {0}")]
    Storage(#[from] portal_storage::StorageError),

    /// Document store failure
    #[error("Directory error: {0}")]
    Directory(#[from] portal_directory::DirectoryError),

    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed payload
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (loopback listener)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for federation operations.
pub type AuthResult<T> = Result<T, AuthError>;
