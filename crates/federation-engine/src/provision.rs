//! Tenant provisioning: organization + user profile + admin record.

use crate::{
    bridge::{derive_secret, derived_email},
    AuthBackend, AuthError, AuthResult, BackendError, Principal, ProviderIdentity,
};
use portal_directory::{AdminRecord, AdminRole, DirectoryStore, Organization, UserProfile};
use portal_storage::FlowStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Upper bound on generated tenant slugs.
pub const SLUG_MAX_LEN: usize = 40;

/// Outcome of a successful provisioning run.
#[derive(Debug, Clone)]
pub struct ProvisionedTenant {
    /// Principal created for the first org admin
    pub principal: Principal,
    /// Slug of the new organization
    pub organization_id: String,
}

/// Creates the organization/user/admin triad for a first-time signup.
pub struct TenantProvisioner {
    directory: Arc<dyn DirectoryStore>,
    backend: Arc<dyn AuthBackend>,
    flow: Arc<FlowStore>,
}

impl TenantProvisioner {
    pub fn new(
        directory: Arc<dyn DirectoryStore>,
        backend: Arc<dyn AuthBackend>,
        flow: Arc<FlowStore>,
    ) -> Self {
        Self {
            directory,
            backend,
            flow,
        }
    }

    /// Provision a new tenant for a verified signup callback.
    ///
    /// Fails before any write when the identity has no organization or the
    /// provider org is already bound to a tenant. The three document writes
    /// are dispatched concurrently with no transaction; on partial failure
    /// the committed writes stay in place and the error names the rest.
    pub async fn provision(&self, identity: &ProviderIdentity) -> AuthResult<ProvisionedTenant> {
        // Personal accounts cannot create a tenant
        let org_id = identity.org_id.as_deref().ok_or_else(|| {
            AuthError::IdentityConflict(
                "this provider account has no organization; personal accounts cannot create a tenant"
                    .to_string(),
            )
        })?;

        // Deep-link signups stash the target org before the redirect; a
        // mismatch means the user switched provider accounts mid-flow.
        if let Some(pending) = self.flow.take_pending_provider_org()? {
            if pending != org_id {
                warn!(
                    expected = %pending,
                    actual = %org_id,
                    "Deep-link signup landed on a different provider org"
                );
            }
        }

        // Tenant-collision guard. Check-then-act: two tabs can pass this
        // simultaneously, and the worst outcome is a duplicate tenant a
        // super admin can merge.
        if let Some(existing) = self
            .directory
            .find_organization_by_provider_org(org_id)
            .await?
        {
            return Err(AuthError::IdentityConflict(format!(
                "organization \"{}\" is already provisioned for this provider org; sign in instead",
                existing.name
            )));
        }

        let secret = derive_secret(&identity.username, identity.salt_material());
        let email = derived_email(identity);

        let slug = self.generate_slug(identity, org_id).await?;

        self.flow.mark_signup_in_flight()?;

        let principal = match self.backend.create_principal(&email, &secret).await {
            Ok(principal) => principal,
            Err(err) => {
                self.flow.clear_signup_in_flight()?;
                return Err(match err {
                    BackendError::EmailTaken => AuthError::IdentityConflict(format!(
                        "{} already has an account; sign in instead",
                        email
                    )),
                    other => other.into(),
                });
            }
        };

        let now = chrono::Utc::now().to_rfc3339();
        let profile = UserProfile {
            uid: principal.uid.clone(),
            email: principal.email.clone(),
            display_name: identity.full_name.clone(),
            created_at: now.clone(),
        };
        let organization = Organization {
            id: slug.clone(),
            name: identity
                .org_name
                .clone()
                .unwrap_or_else(|| org_id.to_string()),
            provider_org_id: Some(org_id.to_string()),
            notifications: Vec::new(),
            created_at: now,
        };
        let admin = AdminRecord {
            uid: principal.uid.clone(),
            email: principal.email.clone(),
            role: AdminRole::OrgAdmin,
            organization_id: Some(slug.clone()),
            disabled: false,
        };

        // Unordered concurrent dispatch, not a transaction
        let (profile_res, org_res, admin_res) = tokio::join!(
            self.directory.put_user_profile(&profile),
            self.directory.put_organization(&organization),
            self.directory.put_admin_record(&admin),
        );

        let mut failed: Vec<&'static str> = Vec::new();
        let mut first_error = None;
        for (collection, result) in [
            ("user_profiles", profile_res),
            ("organizations", org_res),
            ("admin_records", admin_res),
        ] {
            if let Err(e) = result {
                failed.push(collection);
                first_error.get_or_insert(e);
            }
        }

        if !failed.is_empty() {
            self.flow.clear_signup_in_flight()?;
            let committed: Vec<&str> = ["user_profiles", "organizations", "admin_records"]
                .into_iter()
                .filter(|c| !failed.contains(c))
                .collect();
            warn!(
                uid = %principal.uid,
                ?failed,
                ?committed,
                "Tenant writes partially failed; committed documents left in place"
            );
            return Err(AuthError::ProvisioningPartial {
                failed,
                message: first_error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown write failure".to_string()),
            });
        }

        self.flow.clear_signup_in_flight()?;
        self.flow.mark_signup_completed()?;

        info!(
            org = %slug,
            uid = %principal.uid,
            "Tenant provisioned"
        );

        Ok(ProvisionedTenant {
            principal,
            organization_id: slug,
        })
    }

    /// Candidate slug from the provider org name, disambiguated against
    /// existing organizations with a time-derived suffix.
    async fn generate_slug(&self, identity: &ProviderIdentity, org_id: &str) -> AuthResult<String> {
        let base = sanitize_slug(identity.org_name.as_deref().unwrap_or(org_id));
        if !self.directory.organization_exists(&base).await? {
            return Ok(base);
        }
        let suffix = base36(chrono::Utc::now().timestamp() as u64);
        Ok(format!("{}-{}", base, suffix))
    }
}

/// Lowercase and sanitize a display name to a `[a-z0-9-]` slug.
///
/// Non-alphanumeric runs collapse to a single hyphen; the result is trimmed
/// and bounded to [`SLUG_MAX_LEN`]. An input with no usable characters
/// yields `"org"`.
pub fn sanitize_slug(name: &str) -> String {
    let mut slug = String::new();
    let mut last_was_hyphen = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
        if slug.len() >= SLUG_MAX_LEN {
            break;
        }
    }
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() {
        "org".to_string()
    } else {
        slug
    }
}

fn base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ASCII")
}
