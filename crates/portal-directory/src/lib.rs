//! Document-store records and clients for the Tidewatch portal.
//!
//! This crate provides:
//! - The record types the portal reads and writes: admin records keyed by
//!   principal uid, organizations keyed by tenant slug, user profiles
//! - The [`DirectoryStore`] trait, including a live organization
//!   subscription used by the session resolver
//! - [`HttpDirectoryStore`]: a PostgREST-style REST client
//! - [`MemoryDirectoryStore`]: an in-memory implementation for tests and
//!   local development

mod http;
mod memory;
mod records;
mod store;

pub use http::HttpDirectoryStore;
pub use memory::MemoryDirectoryStore;
pub use records::{AdminRecord, AdminRole, NotificationRule, Organization, UserProfile};
pub use store::{DirectoryStore, OrganizationWatch};

use thiserror::Error;

/// Error type for directory operations.
#[derive(Error, Debug)]
pub enum DirectoryError {
    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store rejected the request
    #[error("Directory API error ({status}): {summary}")]
    Api { status: u16, summary: String },

    /// Malformed record payload
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;
