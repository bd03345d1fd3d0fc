//! Session coordination: callback completion and session resolution.

use crate::{
    bridge::{derive_secret, derived_email},
    callback::{verify_callback, CallbackParams},
    AuthBackend, AuthError, AuthResult, IdentityProvider, Principal, ProvisionedTenant,
    RoleResolver, SessionState, TenantProvisioner,
};
use portal_directory::DirectoryStore;
use portal_storage::{AuthMode, FlowStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// How a completed callback settled.
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    /// A new tenant was provisioned; the principal is its first org admin
    SignedUp(ProvisionedTenant),
    /// An existing credential signed in
    SignedIn(Principal),
}

/// Drives a provider callback through verification, the credential bridge,
/// and either the provisioner or the sign-in branch; then resolves the
/// session the same way the independently-firing resolver would.
pub struct SessionCoordinator {
    flow: Arc<FlowStore>,
    backend: Arc<dyn AuthBackend>,
    provider: Arc<dyn IdentityProvider>,
    provisioner: TenantProvisioner,
    resolver: RoleResolver,
}

impl SessionCoordinator {
    pub fn new(
        flow: Arc<FlowStore>,
        directory: Arc<dyn DirectoryStore>,
        backend: Arc<dyn AuthBackend>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        let provisioner =
            TenantProvisioner::new(directory.clone(), backend.clone(), flow.clone());
        let resolver = RoleResolver::new(directory, flow.clone());
        Self {
            flow,
            backend,
            provider,
            provisioner,
            resolver,
        }
    }

    /// Shorten the resolver's race-recovery delay. Tests use this.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.resolver = self.resolver.with_retry_delay(delay);
        self
    }

    /// Complete a provider callback.
    ///
    /// Verification happens before any credential exchange; the branch is
    /// the mode recorded at redirect time.
    pub async fn complete_callback(&self, params: &CallbackParams) -> AuthResult<SessionOutcome> {
        let verified = verify_callback(params, &self.flow)?;
        let identity = self.provider.exchange_code(&verified.code).await?;

        match verified.mode {
            AuthMode::SignUp => {
                let tenant = self.provisioner.provision(&identity).await?;
                Ok(SessionOutcome::SignedUp(tenant))
            }
            AuthMode::SignIn => {
                // Repeat the derivation: determinism is what makes the
                // bridged credential work without re-provisioning.
                let secret = derive_secret(&identity.username, identity.salt_material());
                let email = derived_email(&identity);
                let principal = self
                    .backend
                    .sign_in(&email, &secret)
                    .await
                    .map_err(AuthError::from)?;
                info!(uid = %principal.uid, "Bridged sign-in succeeded");
                Ok(SessionOutcome::SignedIn(principal))
            }
        }
    }

    /// Resolve the current session from the backend's principal
    /// notification.
    pub async fn resolve_session(&self) -> AuthResult<SessionState> {
        let mut rx = self.backend.subscribe();
        self.resolver.resolve(&mut rx).await
    }

    /// Consume the first-run welcome flag. True exactly once after a
    /// completed signup.
    pub fn take_first_run_welcome(&self) -> AuthResult<bool> {
        Ok(self.flow.take_signup_completed()?)
    }
}
