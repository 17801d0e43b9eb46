//! `standings` command implementation.

use anyhow::{Context, Result};
use contracts::Standing;
use scoring::compute_standings;
use tracing::info;

use crate::cli::StandingsArgs;

use super::{load_blueprint, open_roster};

/// Execute the `standings` command
pub async fn run_standings(args: &StandingsArgs) -> Result<()> {
    let blueprint = load_blueprint(&args.config, args.event)?;
    let (_store, roster) = open_roster(&blueprint).await?;

    let standings = compute_standings(&roster.cars, &roster.results);
    info!(
        event_id = roster.event.event_id,
        ranked = standings.len(),
        "Standings computed"
    );

    if args.json {
        let json =
            serde_json::to_string_pretty(&standings).context("Failed to serialize standings")?;
        println!("{}", json);
    } else {
        println!("\n🏆 {} (event {})\n", roster.event.name, roster.event.event_id);
        print!("{}", format_table(&standings));
    }

    Ok(())
}

fn format_table(standings: &[Standing]) -> String {
    if standings.is_empty() {
        return "   No finishing results yet\n".to_string();
    }

    let mut out = format!("{:>5}  {:<24} {:>8} {:>8}\n", "Place", "Car", "Best", "Delta");
    for s in standings {
        let name = match s.nickname {
            Some(ref nick) => format!("{} \"{}\"", s.car_name, nick),
            None => s.car_name.clone(),
        };
        out.push_str(&format!(
            "{:>5}  {:<24} {:>8.4} {:>8.4}\n",
            s.place, name, s.time, s.delta_time
        ));
    }
    out
}
