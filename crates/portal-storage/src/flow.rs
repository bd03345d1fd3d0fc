//! High-level API for the sign-in flow state.

use crate::{LocalStore, StorageKeys, StorageResult};

/// Which branch the user chose before redirecting to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    SignIn,
    SignUp,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::SignIn => "signin",
            AuthMode::SignUp => "signup",
        }
    }

    /// Parse a stored mode string. Unknown values fall back to sign-in,
    /// the branch that cannot create documents.
    pub fn from_str_lossy(value: &str) -> Self {
        match value {
            "signup" => AuthMode::SignUp,
            _ => AuthMode::SignIn,
        }
    }
}

/// Typed wrapper over a [`LocalStore`] for the flow-state keys.
///
/// The provisioning signal flags are the only coordination between the
/// independently-scheduled session resolver and the tenant provisioner:
/// a one-bit mailbox, not a lock.
pub struct FlowStore {
    store: Box<dyn LocalStore>,
}

impl FlowStore {
    /// Create a flow store over the given backend.
    pub fn new(store: Box<dyn LocalStore>) -> Self {
        Self { store }
    }

    // ==========================================
    // Anti-forgery token
    // ==========================================

    /// Persist the anti-forgery token before navigating to the provider.
    pub fn stash_state_token(&self, token: &str) -> StorageResult<()> {
        self.store.set(StorageKeys::OAUTH_STATE_TOKEN, token)
    }

    /// Read and delete the persisted token. Single use: a second call
    /// returns `None`, so a replayed callback can never re-verify.
    pub fn take_state_token(&self) -> StorageResult<Option<String>> {
        self.store.take(StorageKeys::OAUTH_STATE_TOKEN)
    }

    // ==========================================
    // Recorded mode
    // ==========================================

    /// Record which branch the flow should take when the callback returns.
    pub fn record_mode(&self, mode: AuthMode) -> StorageResult<()> {
        self.store.set(StorageKeys::OAUTH_MODE, mode.as_str())
    }

    /// Read and clear the recorded mode. Missing or unknown values read as
    /// sign-in.
    pub fn take_mode(&self) -> StorageResult<AuthMode> {
        Ok(self
            .store
            .take(StorageKeys::OAUTH_MODE)?
            .map(|v| AuthMode::from_str_lossy(&v))
            .unwrap_or(AuthMode::SignIn))
    }

    // ==========================================
    // Provisioning signal
    // ==========================================

    /// Set immediately before any provisioning write begins.
    pub fn mark_signup_in_flight(&self) -> StorageResult<()> {
        tracing::debug!("Marking signup in flight");
        self.store.set(StorageKeys::SIGNUP_IN_FLIGHT, "true")
    }

    /// Cleared on provisioning completion or failure.
    pub fn clear_signup_in_flight(&self) -> StorageResult<()> {
        tracing::debug!("Clearing signup in-flight flag");
        self.store.delete(StorageKeys::SIGNUP_IN_FLIGHT)?;
        Ok(())
    }

    /// Is a signup currently (or abandonedly) in flight?
    pub fn signup_in_flight(&self) -> StorageResult<bool> {
        self.store.has(StorageKeys::SIGNUP_IN_FLIGHT)
    }

    /// Set on overall provisioning success.
    pub fn mark_signup_completed(&self) -> StorageResult<()> {
        self.store.set(StorageKeys::SIGNUP_COMPLETED, "true")
    }

    /// Consume the just-completed flag. Read once by the dashboard to show
    /// the first-run welcome state.
    pub fn take_signup_completed(&self) -> StorageResult<bool> {
        Ok(self.store.take(StorageKeys::SIGNUP_COMPLETED)?.is_some())
    }

    // ==========================================
    // Deep-link signup
    // ==========================================

    /// Stash the provider org a deep link already selected upstream.
    pub fn stash_pending_provider_org(&self, org_id: &str) -> StorageResult<()> {
        self.store.set(StorageKeys::PENDING_PROVIDER_ORG, org_id)
    }

    /// Read and clear the stashed provider org, if any.
    pub fn take_pending_provider_org(&self) -> StorageResult<Option<String>> {
        self.store.take(StorageKeys::PENDING_PROVIDER_ORG)
    }

    /// Clear every flow-state key. Used by logout.
    pub fn clear_all(&self) -> StorageResult<()> {
        for key in [
            StorageKeys::OAUTH_STATE_TOKEN,
            StorageKeys::OAUTH_MODE,
            StorageKeys::SIGNUP_IN_FLIGHT,
            StorageKeys::SIGNUP_COMPLETED,
            StorageKeys::PENDING_PROVIDER_ORG,
        ] {
            self.store.delete(key)?;
        }
        Ok(())
    }
}
