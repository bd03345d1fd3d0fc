//! In-memory directory store.

use crate::{
    AdminRecord, DirectoryResult, DirectoryStore, Organization, OrganizationWatch, UserProfile,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::watch;

/// In-memory implementation of [`DirectoryStore`].
///
/// Public (not test-gated): tests across the workspace and local development
/// run against it. Organization watchers are plain watch channels updated
/// synchronously on every write.
#[derive(Default)]
pub struct MemoryDirectoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    admin_records: HashMap<String, AdminRecord>,
    organizations: HashMap<String, Organization>,
    profiles: HashMap<String, UserProfile>,
    org_watchers: HashMap<String, watch::Sender<Option<Organization>>>,
}

impl MemoryDirectoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of organizations currently stored. Test helper.
    pub fn organization_count(&self) -> usize {
        self.inner.lock().unwrap().organizations.len()
    }

    /// Number of admin records currently stored. Test helper.
    pub fn admin_record_count(&self) -> usize {
        self.inner.lock().unwrap().admin_records.len()
    }

    /// Number of user profiles currently stored. Test helper.
    pub fn user_profile_count(&self) -> usize {
        self.inner.lock().unwrap().profiles.len()
    }
}

#[async_trait]
impl DirectoryStore for MemoryDirectoryStore {
    async fn get_admin_record(&self, uid: &str) -> DirectoryResult<Option<AdminRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.admin_records.get(uid).cloned())
    }

    async fn put_admin_record(&self, record: &AdminRecord) -> DirectoryResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .admin_records
            .insert(record.uid.clone(), record.clone());
        Ok(())
    }

    async fn find_organization_by_provider_org(
        &self,
        provider_org_id: &str,
    ) -> DirectoryResult<Option<Organization>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .organizations
            .values()
            .find(|org| org.provider_org_id.as_deref() == Some(provider_org_id))
            .cloned())
    }

    async fn get_organization(&self, id: &str) -> DirectoryResult<Option<Organization>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.organizations.get(id).cloned())
    }

    async fn put_organization(&self, organization: &Organization) -> DirectoryResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .organizations
            .insert(organization.id.clone(), organization.clone());
        if let Some(tx) = inner.org_watchers.get(&organization.id) {
            let _ = tx.send(Some(organization.clone()));
        }
        Ok(())
    }

    async fn put_user_profile(&self, profile: &UserProfile) -> DirectoryResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.profiles.insert(profile.uid.clone(), profile.clone());
        Ok(())
    }

    async fn watch_organization(&self, id: &str) -> DirectoryResult<OrganizationWatch> {
        let mut inner = self.inner.lock().unwrap();
        let current = inner.organizations.get(id).cloned();
        let rx = match inner.org_watchers.get(id) {
            Some(tx) => {
                // Make sure late subscribers see the current document
                let _ = tx.send(current);
                tx.subscribe()
            }
            None => {
                let (tx, rx) = watch::channel(current);
                inner.org_watchers.insert(id.to_string(), tx);
                rx
            }
        };
        Ok(rx)
    }
}
