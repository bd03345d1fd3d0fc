//! Redirect initiator: builds the outbound authorization request.

use crate::AuthResult;
use portal_storage::{AuthMode, FlowStore};
use rand::{distributions::Alphanumeric, Rng};
use std::sync::Arc;
use url::Url;

/// Length of the anti-forgery state token.
const STATE_TOKEN_LEN: usize = 32;

/// Builds authorization-request URLs and persists the flow state the
/// callback verifier will need.
pub struct RedirectInitiator {
    flow: Arc<FlowStore>,
    authorize_url: Url,
    client_id: String,
    redirect_uri: String,
}

impl RedirectInitiator {
    pub fn new(
        flow: Arc<FlowStore>,
        authorize_url: Url,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            flow,
            authorize_url,
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
        }
    }

    /// Construct the authorization URL for the given mode.
    ///
    /// A fresh anti-forgery token is generated and persisted along with the
    /// mode; navigation is the caller's side, this page load ends here.
    /// `client_id_override` supports tenants registered under their own
    /// provider application.
    pub fn begin(&self, mode: AuthMode, client_id_override: Option<&str>) -> AuthResult<Url> {
        let token = generate_state_token();
        self.flow.stash_state_token(&token)?;
        self.flow.record_mode(mode)?;

        let client_id = client_id_override.unwrap_or(&self.client_id);

        let mut url = self.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("state", &token)
            .append_pair("portal_mode", mode.as_str());

        tracing::debug!(mode = mode.as_str(), "Authorization request prepared");
        Ok(url)
    }

    /// Deep-link signup: a target tenant was already selected upstream.
    /// Stashes the provider org alongside the usual flow state.
    pub fn begin_signup_for_org(&self, provider_org_id: &str) -> AuthResult<Url> {
        self.flow.stash_pending_provider_org(provider_org_id)?;
        self.begin(AuthMode::SignUp, None)
    }
}

fn generate_state_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_TOKEN_LEN)
        .map(char::from)
        .collect()
}
