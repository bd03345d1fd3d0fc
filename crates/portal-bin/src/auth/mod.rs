//! Auth command handlers.

pub mod login;
pub mod logout;
pub mod status;

use federation_engine::{
    AuthBackend, HttpAuthBackend, HttpProviderClient, IdentityProvider, SessionCoordinator,
    SessionState,
};
use portal_config::{Config, Paths};
use portal_directory::{DirectoryStore, HttpDirectoryStore};
use portal_storage::{FileStore, FlowStore};
use std::sync::Arc;

/// Wire the flow store, backends, and coordinator from configuration.
pub(crate) fn build_coordinator(
    config: &Config,
    paths: &Paths,
) -> (Arc<FlowStore>, SessionCoordinator) {
    let flow = Arc::new(FlowStore::new(Box::new(FileStore::new(
        paths.flow_state_file(),
    ))));

    let directory: Arc<dyn DirectoryStore> = Arc::new(HttpDirectoryStore::new(
        config.directory_url.clone(),
        config.auth_publishable_key.clone(),
    ));
    let backend: Arc<dyn AuthBackend> = Arc::new(HttpAuthBackend::new(
        config.auth_url.clone(),
        config.auth_publishable_key.clone(),
    ));
    let provider: Arc<dyn IdentityProvider> = Arc::new(HttpProviderClient::new(
        config.provider_token_url.clone(),
        config.provider_self_url.clone(),
        config.provider_client_id.clone(),
        config.redirect_uri(),
    ));

    let coordinator =
        SessionCoordinator::new(flow.clone(), directory, backend, provider);
    (flow, coordinator)
}

/// Render a resolved session for the terminal.
pub(crate) fn render_session(state: &SessionState) {
    match state {
        SessionState::SuperAdmin { admin } => {
            println!("Signed in as {} (system administrator)", admin.email);
        }
        SessionState::OrgAdmin {
            admin,
            organization,
            ..
        } => {
            println!(
                "Signed in as {} (administrator of {})",
                admin.email, organization.name
            );
        }
        SessionState::AccessDenied => {
            println!("This account has no admin access. If you believe it should, contact your organization's administrator.");
        }
        SessionState::Unauthenticated => {
            println!("Not signed in.");
        }
        SessionState::Loading | SessionState::PrincipalKnown(_) => {
            println!("Session still resolving; try again.");
        }
    }
}
