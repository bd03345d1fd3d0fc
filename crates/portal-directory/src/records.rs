//! Record types for the portal's document-store collections.

use serde::{Deserialize, Serialize};

/// Admin role carried on an [`AdminRecord`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    SuperAdmin,
    OrgAdmin,
}

/// Admin record, keyed by principal uid. Exactly one per uid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminRecord {
    /// Principal uid (document key)
    pub uid: String,
    /// Email at the time the record was created
    pub email: String,
    /// Admin role
    pub role: AdminRole,
    /// Tenant slug; present if and only if `role` is `org_admin`
    #[serde(default)]
    pub organization_id: Option<String>,
    /// Disabled records resolve to access denied without deletion
    #[serde(default)]
    pub disabled: bool,
}

impl AdminRecord {
    /// `organization_id` must be present iff the role is `org_admin`.
    pub fn is_role_consistent(&self) -> bool {
        match self.role {
            AdminRole::OrgAdmin => self.organization_id.is_some(),
            AdminRole::SuperAdmin => self.organization_id.is_none(),
        }
    }
}

/// A notification rule carried on an organization.
///
/// The scheduling domain model (cadence, lag, field display) lives in the
/// admin CRUD screens; the portal only carries the documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
}

/// Organization (tenant) document, keyed by its URL-stable slug.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    /// Tenant slug (document key), generated once at provisioning time
    pub id: String,
    /// Display name
    pub name: String,
    /// Provider organization this tenant was provisioned from. At most one
    /// organization may carry a given value.
    #[serde(default)]
    pub provider_org_id: Option<String>,
    /// Notification rules administered by the out-of-scope CRUD screens
    #[serde(default)]
    pub notifications: Vec<NotificationRule>,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
}

/// User profile document, keyed by principal uid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// Principal uid (document key)
    pub uid: String,
    /// Email from the auth backend
    pub email: String,
    /// Display name, when the provider supplied one
    #[serde(default)]
    pub display_name: Option<String>,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
}
