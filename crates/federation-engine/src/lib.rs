//! Identity federation and tenant provisioning for the Tidewatch portal.
//!
//! This crate provides:
//! - OAuth redirect initiation with anti-forgery state tokens
//! - Callback parsing, CSRF verification, and a loopback callback listener
//! - The credential bridge deriving a stable password-equivalent secret from
//!   provider identity attributes
//! - First-time tenant provisioning (organization + profile + admin record)
//! - The session resolver that settles every authenticated principal into
//!   super admin, org admin, or access denied

mod backend;
mod bridge;
mod callback;
mod error;
mod provider;
mod provision;
mod redirect;
mod resolver;
mod session;

pub use backend::{AuthBackend, BackendError, HttpAuthBackend, MemoryAuthBackend, Principal};
pub use bridge::{derive_secret, derived_email};
pub use callback::{verify_callback, CallbackListener, CallbackParams, VerifiedCallback};
pub use error::{AuthError, AuthResult};
pub use provider::{HttpProviderClient, IdentityProvider, ProviderIdentity, StaticProvider};
pub use provision::{sanitize_slug, ProvisionedTenant, TenantProvisioner, SLUG_MAX_LEN};
pub use redirect::RedirectInitiator;
pub use resolver::{RoleResolver, SessionState, RECORD_RETRY_DELAY};
pub use session::{SessionCoordinator, SessionOutcome};

pub use portal_storage::AuthMode;
