//! Command implementations.

mod export;
mod info;
mod run;
mod standings;
mod validate;

use std::path::Path;

use contracts::{EventId, RaceBlueprint, ResultStore, Roster};
use store::AnyStore;
use tracing::info;

use crate::error::{CliError, Result};

pub use export::run_export;
pub use info::run_info;
pub use run::run_pipeline;
pub use standings::run_standings;
pub use validate::run_validate;

/// Load and validate a blueprint, applying an event override
pub(crate) fn load_blueprint(path: &Path, event: Option<EventId>) -> Result<RaceBlueprint> {
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()));
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(path)
        .map_err(|e| CliError::config_load(path.display().to_string(), e))?;

    if let Some(event_id) = event {
        info!(event_id, "Overriding event from CLI");
        blueprint.event.event_id = event_id;
    }

    Ok(blueprint)
}

/// Open the configured store and read the event roster
pub(crate) async fn open_roster(blueprint: &RaceBlueprint) -> Result<(AnyStore, Roster)> {
    let store = AnyStore::from_blueprint(blueprint)
        .await
        .map_err(CliError::store)?;
    let roster = store
        .load_roster(blueprint.event.event_id)
        .await
        .map_err(CliError::store)?;

    info!(
        store = store.name(),
        event_id = roster.event.event_id,
        cars = roster.cars.len(),
        results = roster.results.len(),
        "Roster loaded"
    );
    Ok((store, roster))
}
