//! Login handler: redirect, callback, completion, resolution.

use crate::auth::{build_coordinator, render_session};
use federation_engine::{AuthMode, CallbackListener, RedirectInitiator, SessionOutcome};
use portal_config::{Config, Paths};
use tracing::info;

pub async fn run(config: &Config, paths: &Paths, signup: bool) -> anyhow::Result<()> {
    paths.ensure_dirs()?;
    let (flow, coordinator) = build_coordinator(config, paths);

    let initiator = RedirectInitiator::new(
        flow,
        config.provider_authorize_url()?,
        config.provider_client_id.clone(),
        config.redirect_uri(),
    );

    let mode = if signup {
        AuthMode::SignUp
    } else {
        AuthMode::SignIn
    };
    let authorize_url = initiator.begin(mode, None)?;

    println!("Open this URL in your browser to continue:");
    println!();
    println!("  {}", authorize_url);
    println!();

    let listener = CallbackListener::with_default_timeout(config.callback_port);
    let params = listener.wait_for_callback().await?;

    let outcome = coordinator.complete_callback(&params).await?;
    match &outcome {
        SessionOutcome::SignedUp(tenant) => {
            info!(org = %tenant.organization_id, "Tenant provisioned");
        }
        SessionOutcome::SignedIn(principal) => {
            info!(uid = %principal.uid, "Signed in");
        }
    }

    let session = coordinator.resolve_session().await?;
    render_session(&session);

    if coordinator.take_first_run_welcome()? {
        println!();
        println!("Welcome to Tidewatch! Your organization is ready. Head to the dashboard to set up your first notification.");
    }

    Ok(())
}
