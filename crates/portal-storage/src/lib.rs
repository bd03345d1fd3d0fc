//! Local ephemeral storage for the Tidewatch portal client.
//!
//! The sign-in flow keeps a handful of device-local keys:
//! - [`MemoryStore`]: process-local, used by tests and embedded callers
//! - [`FileStore`]: a JSON file under the portal base directory, surviving
//!   process restarts
//!
//! Values stored here are ephemeral flow state (anti-forgery token, recorded
//! auth mode, provisioning signal flags). They are never synced to a server.

mod file;
mod flow;
mod keys;
mod memory;
mod traits;

pub use file::FileStore;
pub use flow::{AuthMode, FlowStore};
pub use keys::StorageKeys;
pub use memory::MemoryStore;
pub use traits::LocalStore;

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific storage error
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Key not found
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
