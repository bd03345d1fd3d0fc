//! Directory store trait definitions.

use crate::{AdminRecord, DirectoryResult, Organization, UserProfile};
use async_trait::async_trait;
use tokio::sync::watch;

/// Live view of one organization document.
///
/// The receiver holds `None` until the first read lands, then the latest
/// version of the document; later edits (by a super admin acting as org
/// admin, or by the org itself) are pushed to existing receivers.
pub type OrganizationWatch = watch::Receiver<Option<Organization>>;

/// Access to the portal's document-store collections.
///
/// The provisioner writes all three collections; the resolver reads admin
/// records and organizations.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Read the admin record for a principal uid, if any.
    async fn get_admin_record(&self, uid: &str) -> DirectoryResult<Option<AdminRecord>>;

    /// Create or replace an admin record.
    async fn put_admin_record(&self, record: &AdminRecord) -> DirectoryResult<()>;

    /// Find the organization already bound to a provider org id, if any.
    /// This is the tenant-collision guard.
    async fn find_organization_by_provider_org(
        &self,
        provider_org_id: &str,
    ) -> DirectoryResult<Option<Organization>>;

    /// Read an organization by tenant slug.
    async fn get_organization(&self, id: &str) -> DirectoryResult<Option<Organization>>;

    /// Does an organization with this slug exist?
    async fn organization_exists(&self, id: &str) -> DirectoryResult<bool> {
        Ok(self.get_organization(id).await?.is_some())
    }

    /// Create or replace an organization.
    async fn put_organization(&self, organization: &Organization) -> DirectoryResult<()>;

    /// Create or replace a user profile.
    async fn put_user_profile(&self, profile: &UserProfile) -> DirectoryResult<()>;

    /// Subscribe to an organization document. Unlike [`get_organization`],
    /// the returned receiver observes later writes.
    ///
    /// [`get_organization`]: DirectoryStore::get_organization
    async fn watch_organization(&self, id: &str) -> DirectoryResult<OrganizationWatch>;
}
