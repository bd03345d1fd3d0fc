//! Status handler: stored flow state and resolved session.

use crate::auth::{build_coordinator, render_session};
use portal_config::{Config, Paths};

pub async fn run(config: &Config, paths: &Paths) -> anyhow::Result<()> {
    let (flow, coordinator) = build_coordinator(config, paths);

    let session = coordinator.resolve_session().await?;
    render_session(&session);

    if flow.signup_in_flight()? {
        println!("A signup is still marked in flight; if it was interrupted, run `tidewatch-portal login --signup` again.");
    }

    Ok(())
}
