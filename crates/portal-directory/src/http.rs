//! PostgREST-style HTTP directory store.

use crate::{
    AdminRecord, DirectoryError, DirectoryResult, DirectoryStore, Organization, OrganizationWatch,
    UserProfile,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tokio::sync::watch;

/// Poll interval for the live organization subscription. The REST API has no
/// push channel, so the watch is fed by polling.
const ORG_WATCH_POLL_INTERVAL: Duration = Duration::from_secs(5);

fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// REST client over the document store.
///
/// Collections are exposed PostgREST-style: equality filters in the query
/// string, upserts via `Prefer: resolution=merge-duplicates`.
#[derive(Clone)]
pub struct HttpDirectoryStore {
    http_client: reqwest::Client,
    api_url: String,
    publishable_key: String,
}

impl HttpDirectoryStore {
    /// Create a new directory client.
    ///
    /// # Arguments
    /// * `api_url` - The document store base URL
    /// * `publishable_key` - The public API key sent with every request
    pub fn new(api_url: impl Into<String>, publishable_key: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_url: api_url.into(),
            publishable_key: publishable_key.into(),
        }
    }

    /// Build the REST API URL for a collection.
    fn rest_url(&self, collection: &str) -> String {
        format!("{}/rest/v1/{}", self.api_url, collection)
    }

    async fn fetch_one<T: DeserializeOwned>(
        &self,
        collection: &str,
        filter: &str,
    ) -> DirectoryResult<Option<T>> {
        let url = format!("{}?{}&limit=1", self.rest_url(collection), filter);

        tracing::debug!(collection, filter, "Fetching document");

        let response = self
            .http_client
            .get(&url)
            .header("apikey", &self.publishable_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let summary = summarize_response_body(&body);
            tracing::error!(status = %status, body_summary = %summary, collection, "Fetch failed");
            return Err(DirectoryError::Api {
                status: status.as_u16(),
                summary,
            });
        }

        let mut rows: Vec<T> = response.json().await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.remove(0))
        })
    }

    async fn upsert<T: Serialize>(&self, collection: &str, document: &T) -> DirectoryResult<()> {
        let url = self.rest_url(collection);

        tracing::debug!(collection, "Upserting document");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.publishable_key)
            .header("Content-Type", "application/json")
            .header("Prefer", "resolution=merge-duplicates")
            .json(document)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let summary = summarize_response_body(&body);
            tracing::error!(status = %status, body_summary = %summary, collection, "Upsert failed");
            return Err(DirectoryError::Api {
                status: status.as_u16(),
                summary,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl DirectoryStore for HttpDirectoryStore {
    async fn get_admin_record(&self, uid: &str) -> DirectoryResult<Option<AdminRecord>> {
        self.fetch_one("admin_records", &format!("uid=eq.{}", uid))
            .await
    }

    async fn put_admin_record(&self, record: &AdminRecord) -> DirectoryResult<()> {
        self.upsert("admin_records", record).await
    }

    async fn find_organization_by_provider_org(
        &self,
        provider_org_id: &str,
    ) -> DirectoryResult<Option<Organization>> {
        self.fetch_one(
            "organizations",
            &format!("provider_org_id=eq.{}", provider_org_id),
        )
        .await
    }

    async fn get_organization(&self, id: &str) -> DirectoryResult<Option<Organization>> {
        self.fetch_one("organizations", &format!("id=eq.{}", id))
            .await
    }

    async fn put_organization(&self, organization: &Organization) -> DirectoryResult<()> {
        self.upsert("organizations", organization).await
    }

    async fn put_user_profile(&self, profile: &UserProfile) -> DirectoryResult<()> {
        self.upsert("user_profiles", profile).await
    }

    async fn watch_organization(&self, id: &str) -> DirectoryResult<OrganizationWatch> {
        let current = self.get_organization(id).await?;
        let (tx, rx) = watch::channel(current);

        let client = self.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(ORG_WATCH_POLL_INTERVAL).await;
                match client.get_organization(&id).await {
                    Ok(latest) => {
                        // send_if_modified avoids waking receivers on identical polls
                        let sent = tx.send_if_modified(|slot| {
                            let changed = !same_org(slot.as_ref(), latest.as_ref());
                            if changed {
                                *slot = latest.clone();
                            }
                            changed
                        });
                        if sent {
                            tracing::debug!(org = %id, "Organization document changed");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(org = %id, "Organization poll failed: {}", e);
                    }
                }
                if tx.is_closed() {
                    break;
                }
            }
        });

        Ok(rx)
    }
}

fn same_org(a: Option<&Organization>, b: Option<&Organization>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            serde_json::to_value(a).ok() == serde_json::to_value(b).ok()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = HttpDirectoryStore::new("https://directory.test", "test-key");
        assert_eq!(client.api_url, "https://directory.test");
        assert_eq!(client.publishable_key, "test-key");
    }

    #[test]
    fn test_rest_url() {
        let client = HttpDirectoryStore::new("https://directory.test", "test-key");
        assert_eq!(
            client.rest_url("admin_records"),
            "https://directory.test/rest/v1/admin_records"
        );
    }

    #[test]
    fn test_summarize_response_body_is_stable() {
        let a = summarize_response_body("body");
        let b = summarize_response_body("body");
        assert_eq!(a, b);
        assert!(a.starts_with("len=4,"));
    }

    #[test]
    fn test_same_org() {
        let org = Organization {
            id: "acme".to_string(),
            name: "Acme".to_string(),
            provider_org_id: None,
            notifications: Vec::new(),
            created_at: "2025-01-01T00:00:00Z".to_string(),
        };
        assert!(same_org(None, None));
        assert!(same_org(Some(&org), Some(&org.clone())));
        assert!(!same_org(Some(&org), None));

        let mut renamed = org.clone();
        renamed.name = "Acme County".to_string();
        assert!(!same_org(Some(&org), Some(&renamed)));
    }
}
