//! Logout handler: clears the stored flow state.

use portal_config::Paths;
use portal_storage::{FileStore, FlowStore, LocalStore};
use tracing::info;

pub fn run(paths: &Paths) -> anyhow::Result<()> {
    let store: Box<dyn LocalStore> = Box::new(FileStore::new(paths.flow_state_file()));
    let flow = FlowStore::new(store);
    flow.clear_all()?;

    info!("Flow state cleared");
    println!("Signed out.");
    Ok(())
}
