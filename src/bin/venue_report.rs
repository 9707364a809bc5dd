use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use chrono::Utc;

use mnp_strategist::event_log::{NormalizeParams, normalize_matches};
use mnp_strategist::league_config::{self, LeagueConfig};
use mnp_strategist::machine_stats::{
    MachineTable, TableContext, build_machine_table, default_column_specs,
};
use mnp_strategist::match_corpus;

const DEFAULT_OWN_TEAM: &str = "The Wrecking Crew";
const DEFAULT_CONFIG: &str = "league_config.json";
const VALUE_FLAGS: &[&str] = &["--seasons", "--own-team", "--config"];

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env");
    env_logger::init();

    let args = env::args().skip(1).collect::<Vec<_>>();
    let positionals = positional_args(&args);
    let (archive, team, venue) = match positionals.as_slice() {
        [archive, team, venue] => (PathBuf::from(archive), team.clone(), venue.clone()),
        [team, venue] => {
            let root = opt_env("MNP_ARCHIVE_DIR")
                .ok_or_else(|| anyhow!("no archive dir given and MNP_ARCHIVE_DIR is unset"))?;
            (PathBuf::from(root), team.clone(), venue.clone())
        }
        _ => {
            return Err(anyhow!(
                "usage: venue_report <archive-dir> <team> <venue> \
                 [--seasons 20-21] [--own-team NAME] [--config PATH] [--json]"
            ));
        }
    };

    let own_team = flag_value(&args, "--own-team")
        .or_else(|| opt_env("MNP_TEAM"))
        .unwrap_or_else(|| DEFAULT_OWN_TEAM.to_string());
    let seasons = match flag_value(&args, "--seasons") {
        Some(raw) => league_config::parse_seasons(&raw)?,
        None => Vec::new(),
    };
    let config_path = flag_value(&args, "--config")
        .or_else(|| opt_env("MNP_CONFIG"))
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let as_json = args.iter().any(|a| a == "--json");

    let config = LeagueConfig::load(Path::new(&config_path));
    let matches = match_corpus::load_archive(&archive, &seasons)?;

    let aliases = config.aliases();
    let limits = config.limits();
    let rosters = config.roster_index();
    let venue_lists = config.venue_lists();
    let included = venue_lists.included(&venue).to_vec();
    let excluded = venue_lists.excluded(&venue).to_vec();

    let log = normalize_matches(
        &matches,
        &NormalizeParams {
            team: &team,
            twc_team: &own_team,
            venue: &venue,
            aliases: &aliases,
            score_limits: &limits,
            rosters: &rosters,
            included_machines: &included,
            excluded_machines: &excluded,
            selected_seasons: &seasons,
        },
    );

    let ctx = TableContext {
        team: &team,
        twc_team: &own_team,
        venue: &venue,
    };
    let table = build_machine_table(
        &log.events,
        &log.recent_machines,
        &ctx,
        &default_column_specs(),
    );

    if as_json {
        println!("{}", serde_json::to_string_pretty(&table)?);
        return Ok(());
    }

    println!("Machine report: {team} vs {own_team} at {venue}");
    println!(
        "Generated {} | {} events | {} machines",
        Utc::now().format("%Y-%m-%d %H:%M UTC"),
        log.events.len(),
        table.rows.len()
    );
    println!();
    print_table(&table);
    Ok(())
}

fn print_table(table: &MachineTable) {
    if table.rows.is_empty() {
        println!("no machines to report");
        return;
    }

    let mut widths: Vec<usize> = table.columns.iter().map(|c| c.len()).collect();
    let mut rendered: Vec<Vec<String>> = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let mut cells = Vec::with_capacity(table.columns.len());
        cells.push(row.display_machine());
        for cell in &row.cells {
            cells.push(cell.to_string());
        }
        for (i, cell) in cells.iter().enumerate() {
            if cell.len() > widths[i] {
                widths[i] = cell.len();
            }
        }
        rendered.push(cells);
    }

    let header = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| pad(name, widths[i], i == 0))
        .collect::<Vec<_>>()
        .join("  ");
    println!("{header}");
    println!(
        "{}",
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  ")
    );
    for cells in rendered {
        let line = cells
            .iter()
            .enumerate()
            .map(|(i, cell)| pad(cell, widths[i], i == 0))
            .collect::<Vec<_>>()
            .join("  ");
        println!("{line}");
    }
}

// Machine names flush left, numbers flush right.
fn pad(text: &str, width: usize, left: bool) -> String {
    if left {
        format!("{text:<width$}")
    } else {
        format!("{text:>width$}")
    }
}

fn positional_args(args: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg.starts_with("--") {
            skip_next = VALUE_FLAGS.contains(&arg.as_str());
            continue;
        }
        out.push(arg.clone());
    }
    out
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(flag).and_then(|rest| rest.strip_prefix('=')) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

fn opt_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .and_then(|val| if val.trim().is_empty() { None } else { Some(val) })
}
