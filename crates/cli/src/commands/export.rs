//! `export` command implementation.

use std::fs::File;
use std::io::{self, BufWriter};

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::ExportArgs;
use crate::error::CliError;

use super::{load_blueprint, open_roster};

/// Execute the `export` command
pub async fn run_export(args: &ExportArgs) -> Result<()> {
    let blueprint = load_blueprint(&args.config, args.event)?;
    let (_store, roster) = open_roster(&blueprint).await?;

    let rows = match args.output {
        Some(ref path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(CliError::from)?;
            }
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            store::export_csv(&roster, BufWriter::new(file))
                .with_context(|| format!("Failed to write {}", path.display()))?
        }
        None => store::export_csv(&roster, io::stdout().lock())
            .context("Failed to write results to stdout")?,
    };

    info!(
        event_id = roster.event.event_id,
        rows,
        output = ?args.output,
        "Results exported"
    );
    Ok(())
}
