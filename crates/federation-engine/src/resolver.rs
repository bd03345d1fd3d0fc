//! Session resolver: settles an authenticated principal into a role.

use crate::{AuthResult, Principal};
use portal_directory::{AdminRecord, AdminRole, DirectoryStore, Organization, OrganizationWatch};
use portal_storage::FlowStore;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Fixed delay before the single admin-record re-read. Long enough in
/// practice for the provisioner's concurrent writes to have landed.
pub const RECORD_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Where a session has settled.
///
/// `AccessDenied` is an expected user-facing outcome, not an error: it is
/// how "no admin record" surfaces.
pub enum SessionState {
    /// Nothing known yet; the principal notification has not fired
    Loading,
    /// The backend reported no signed-in principal
    Unauthenticated,
    /// A principal is known but its role is not yet resolved
    PrincipalKnown(Principal),
    /// System-wide administrator
    SuperAdmin { admin: AdminRecord },
    /// Single-organization administrator with a live view of the org
    OrgAdmin {
        admin: AdminRecord,
        organization: Organization,
        org_watch: OrganizationWatch,
    },
    /// No (usable) admin record for this principal
    AccessDenied,
}

impl SessionState {
    /// Stable label for logs and status output.
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Loading => "loading",
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::PrincipalKnown(_) => "principal_known",
            SessionState::SuperAdmin { .. } => "super_admin",
            SessionState::OrgAdmin { .. } => "org_admin",
            SessionState::AccessDenied => "access_denied",
        }
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Resolves principals against the admin-record collection.
///
/// Runs independently of the provisioner: the principal notification can
/// fire while the tenant writes are still in flight. The provisioning
/// signal flag is the only coordination between the two, and it buys exactly
/// one delayed re-read: race recovery, not a retry loop.
pub struct RoleResolver {
    directory: Arc<dyn DirectoryStore>,
    flow: Arc<FlowStore>,
    retry_delay: Duration,
}

impl RoleResolver {
    pub fn new(directory: Arc<dyn DirectoryStore>, flow: Arc<FlowStore>) -> Self {
        Self {
            directory,
            flow,
            retry_delay: RECORD_RETRY_DELAY,
        }
    }

    /// Override the re-read delay. Tests shorten it.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Resolve from the current value of the principal notification.
    pub async fn resolve(
        &self,
        principal_rx: &mut watch::Receiver<Option<Principal>>,
    ) -> AuthResult<SessionState> {
        let current = principal_rx.borrow_and_update().clone();
        let observed = match current {
            None => SessionState::Unauthenticated,
            Some(principal) => SessionState::PrincipalKnown(principal),
        };
        match observed {
            SessionState::PrincipalKnown(principal) => self.resolve_principal(&principal).await,
            other => Ok(other),
        }
    }

    /// Wait (bounded) for the first principal notification, then resolve.
    ///
    /// Returns `Loading` when the notification never fired within the wait:
    /// nothing is known yet, not even "signed out".
    pub async fn wait_and_resolve(
        &self,
        principal_rx: &mut watch::Receiver<Option<Principal>>,
        wait: Duration,
    ) -> AuthResult<SessionState> {
        if principal_rx.borrow().is_none() {
            match tokio::time::timeout(wait, principal_rx.changed()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) | Err(_) => return Ok(SessionState::Loading),
            }
        }
        self.resolve(principal_rx).await
    }

    /// Settle a known principal into `SuperAdmin`, `OrgAdmin`, or
    /// `AccessDenied`.
    pub async fn resolve_principal(&self, principal: &Principal) -> AuthResult<SessionState> {
        let mut record = self.directory.get_admin_record(&principal.uid).await?;

        if record.is_none() {
            if self.flow.signup_in_flight()? {
                // The provisioner may still be mid-flight; its admin-record
                // write races this read. One fixed delay, one re-read.
                debug!(uid = %principal.uid, "No admin record, signup in flight; re-reading once");
                tokio::time::sleep(self.retry_delay).await;
                record = self.directory.get_admin_record(&principal.uid).await?;
            } else {
                info!(uid = %principal.uid, "No admin record and no signup in flight");
                return Ok(SessionState::AccessDenied);
            }
        }

        let Some(record) = record else {
            info!(uid = %principal.uid, "No admin record after re-read");
            return Ok(SessionState::AccessDenied);
        };

        if record.disabled {
            info!(uid = %principal.uid, "Admin record is disabled");
            return Ok(SessionState::AccessDenied);
        }
        if !record.is_role_consistent() {
            warn!(uid = %principal.uid, role = ?record.role, "Inconsistent admin record");
            return Ok(SessionState::AccessDenied);
        }

        match record.role {
            AdminRole::SuperAdmin => Ok(SessionState::SuperAdmin { admin: record }),
            AdminRole::OrgAdmin => {
                // is_role_consistent guarantees the id is present
                let org_id = record
                    .organization_id
                    .clone()
                    .unwrap_or_default();
                let org_watch = self.directory.watch_organization(&org_id).await?;
                let organization = org_watch.borrow().clone();
                match organization {
                    Some(organization) => Ok(SessionState::OrgAdmin {
                        admin: record,
                        organization,
                        org_watch,
                    }),
                    None => {
                        warn!(uid = %record.uid, org = %org_id, "Admin record references a missing organization");
                        Ok(SessionState::AccessDenied)
                    }
                }
            }
        }
    }
}
