//! Core types, configuration, and utilities for the Tidewatch portal client.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_AUTH_URL, DEFAULT_CALLBACK_PORT, DEFAULT_DIRECTORY_URL, DEFAULT_LOG_LEVEL,
    DEFAULT_PROVIDER_AUTHORIZE_URL, DEFAULT_PROVIDER_CLIENT_ID,
};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
pub use paths::Paths;
