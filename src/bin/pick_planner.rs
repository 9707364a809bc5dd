use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rayon::prelude::*;

use mnp_strategist::advantage::{
    AdvantageLevel, AdvantageParams, MatchupAnalysis, analyze_matchup,
};
use mnp_strategist::assignment::{
    AssignmentOutcome, AssignmentPlan, MatchFormat, plan_assignments,
};
use mnp_strategist::event_log::{NormalizeParams, normalize_matches};
use mnp_strategist::league_config::{self, LeagueConfig, RosterIndex};
use mnp_strategist::machine_names::title_case;
use mnp_strategist::match_corpus::{self, RawMatch};
use mnp_strategist::synthetic::SyntheticLeague;

const DEFAULT_OWN_TEAM: &str = "The Wrecking Crew";
const DEFAULT_CONFIG: &str = "league_config.json";
const DEMO_OPPONENT: &str = "Death Save Society";
const DEMO_VENUE: &str = "Georgetown Pizza and Arcade";
const VALUE_FLAGS: &[&str] = &[
    "--seasons",
    "--own-team",
    "--config",
    "--format",
    "--machines",
    "--players",
];

const USAGE: &str = "usage: pick_planner <archive-dir> <opponent> <venue> \
    [--seasons 20-21] [--own-team NAME] [--format singles|doubles] \
    [--machines N] [--players a,b,c] [--roster] [--scan] [--demo] \
    [--config PATH] [--json]\n\
    with --scan the opponent argument is dropped; with --demo no archive is read";

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env");
    env_logger::init();

    let args = env::args().skip(1).collect::<Vec<_>>();
    let demo = has_flag(&args, "--demo");
    let scan = has_flag(&args, "--scan");
    let as_json = has_flag(&args, "--json");
    let roster_only = has_flag(&args, "--roster");

    let own_team = flag_value(&args, "--own-team")
        .or_else(|| opt_env("MNP_TEAM"))
        .unwrap_or_else(|| DEFAULT_OWN_TEAM.to_string());
    let seasons = match flag_value(&args, "--seasons") {
        Some(raw) => league_config::parse_seasons(&raw)?,
        None => Vec::new(),
    };
    let format = match flag_value(&args, "--format").as_deref() {
        None | Some("singles") => MatchFormat::Singles,
        Some("doubles") => MatchFormat::Doubles,
        Some(other) => {
            return Err(anyhow!("unknown format {other:?}, expected singles or doubles"));
        }
    };
    let requested = match flag_value(&args, "--machines") {
        Some(raw) => raw
            .parse::<usize>()
            .with_context(|| format!("invalid --machines {raw:?}"))?,
        None => match format {
            MatchFormat::Singles => 4,
            MatchFormat::Doubles => 2,
        },
    };

    let positionals = positional_args(&args);
    let (matches, config, opponent, venue) = if demo {
        let matches = SyntheticLeague::default().generate();
        let config = demo_config(&matches);
        let (opponent, venue) = match (scan, positionals.as_slice()) {
            (true, []) => (String::new(), DEMO_VENUE.to_string()),
            (true, [venue]) => (String::new(), venue.clone()),
            (false, []) => (DEMO_OPPONENT.to_string(), DEMO_VENUE.to_string()),
            (false, [opponent]) => (opponent.clone(), DEMO_VENUE.to_string()),
            (false, [opponent, venue]) => (opponent.clone(), venue.clone()),
            _ => return Err(anyhow!(USAGE)),
        };
        (matches, config, opponent, venue)
    } else {
        let (archive, opponent, venue) = match (scan, positionals.as_slice()) {
            (true, [archive, venue]) => (PathBuf::from(archive), String::new(), venue.clone()),
            (true, [venue]) => (env_archive()?, String::new(), venue.clone()),
            (false, [archive, opponent, venue]) => {
                (PathBuf::from(archive), opponent.clone(), venue.clone())
            }
            (false, [opponent, venue]) => (env_archive()?, opponent.clone(), venue.clone()),
            _ => return Err(anyhow!(USAGE)),
        };
        let config_path = flag_value(&args, "--config")
            .or_else(|| opt_env("MNP_CONFIG"))
            .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
        let config = LeagueConfig::load(Path::new(&config_path));
        let matches = match_corpus::load_archive(&archive, &seasons)?;
        (matches, config, opponent, venue)
    };

    let aliases = config.aliases();
    let limits = config.limits();
    let rosters = config.roster_index();
    let venue_lists = config.venue_lists();
    let included = venue_lists.included(&venue).to_vec();
    let excluded = venue_lists.excluded(&venue).to_vec();

    let log = normalize_matches(
        &matches,
        &NormalizeParams {
            team: &opponent,
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
    let available = resolve_available(&args, roster_only, &rosters, &own_team)?;

    // AdvantageParams is Copy over shared refs; per-opponent calls swap
    // only the opponent field in.
    let base = AdvantageParams {
        team: &own_team,
        opponent: "",
        venue: &venue,
        selected_seasons: &seasons,
        team_venue_specific: true,
        opponent_venue_specific: true,
        included_machines: &included,
        excluded_machines: &excluded,
        rosters: &rosters,
        aliases: &aliases,
    };
    let stamp = Utc::now().format("%Y-%m-%d %H:%M UTC").to_string();

    if scan {
        let opponents = opponents_at_venue(&matches, &venue, &own_team);
        if opponents.is_empty() {
            return Err(anyhow!("no opponents found at {venue}"));
        }
        let mut results: Vec<MatchupSummary> = opponents
            .par_iter()
            .map(|opp| {
                let params = AdvantageParams {
                    opponent: opp.as_str(),
                    ..base
                };
                let analysis = analyze_matchup(&log.events, &params);
                let plan = plan_assignments(&analysis, &available, format, requested);
                MatchupSummary::new(opp.clone(), &analysis, plan)
            })
            .collect();
        results.sort_by(|a, b| {
            b.planned_total
                .partial_cmp(&a.planned_total)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        if as_json {
            let body = serde_json::json!({
                "generated": &stamp,
                "own_team": &own_team,
                "venue": &venue,
                "matchups": results.iter().map(MatchupSummary::to_json).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
            return Ok(());
        }

        println!("Matchup scan for {own_team} at {venue}");
        println!("Generated {stamp} | {} opponents | {} events", results.len(), log.events.len());
        println!();
        for summary in &results {
            println!(
                "{:<28} edge for us {:>2}  against {:>2}  planned total {:>+8.1}",
                summary.opponent, summary.edge_for, summary.edge_against, summary.planned_total
            );
        }
        return Ok(());
    }

    let params = AdvantageParams {
        opponent: opponent.as_str(),
        ..base
    };
    let analysis = analyze_matchup(&log.events, &params);
    let plan = plan_assignments(&analysis, &available, format, requested);

    if as_json {
        let body = serde_json::json!({
            "generated": stamp,
            "own_team": &own_team,
            "opponent": &opponent,
            "venue": &venue,
            "records": &analysis.records,
            "plan": &plan,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!("Matchup: {own_team} vs {opponent} at {venue}");
    println!(
        "Generated {stamp} | {} events | {} machines | pool of {}",
        log.events.len(),
        analysis.records.len(),
        available.len()
    );
    println!();
    print_board(&analysis);
    println!();
    print_plan(&plan);
    Ok(())
}

struct MatchupSummary {
    opponent: String,
    edge_for: usize,
    edge_against: usize,
    planned_total: f64,
    plan: AssignmentPlan,
}

impl MatchupSummary {
    fn new(opponent: String, analysis: &MatchupAnalysis, plan: AssignmentPlan) -> Self {
        let edge_for = analysis
            .records
            .iter()
            .filter(|r| matches!(r.level, AdvantageLevel::StrongTeam | AdvantageLevel::Team))
            .count();
        let edge_against = analysis
            .records
            .iter()
            .filter(|r| {
                matches!(
                    r.level,
                    AdvantageLevel::StrongOpponent | AdvantageLevel::Opponent
                )
            })
            .count();
        let planned_total = plan.picks.iter().map(|p| p.score).sum();
        Self {
            opponent,
            edge_for,
            edge_against,
            planned_total,
            plan,
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "opponent": &self.opponent,
            "edge_for": self.edge_for,
            "edge_against": self.edge_against,
            "planned_total": self.planned_total,
            "plan": &self.plan,
        })
    }
}

fn print_board(analysis: &MatchupAnalysis) {
    println!(
        "{:<26} {:<26} {:>8} {:>7} {:>7} {:>7}  {}",
        "Machine", "Advantage", "Score", "Us %", "Them %", "Plays", "Top players"
    );
    for r in &analysis.records {
        let us = r
            .team_average
            .map(|_| format!("{:.1}", r.team_pct_of_venue))
            .unwrap_or_else(|| "-".to_string());
        let them = r
            .opponent_average
            .map(|_| format!("{:.1}", r.opponent_pct_of_venue))
            .unwrap_or_else(|| "-".to_string());
        let top = r
            .top_team_players
            .iter()
            .take(2)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "{:<26} {:<26} {:>+8.1} {:>7} {:>7} {:>3}/{:<3}  {top}",
            title_case(&r.machine),
            r.level.to_string(),
            r.composite_score,
            us,
            them,
            r.team_plays,
            r.opponent_plays
        );
    }
}

fn print_plan(plan: &AssignmentPlan) {
    let label = match plan.format {
        MatchFormat::Singles => "Singles",
        MatchFormat::Doubles => "Doubles",
    };
    match plan.outcome {
        AssignmentOutcome::Complete => {}
        AssignmentOutcome::InsufficientPlayers => {
            println!(
                "{label} plan: not enough players for {} machines (need {})",
                plan.requested,
                2 * plan.requested
            );
            return;
        }
        AssignmentOutcome::InsufficientMachines => {
            println!(
                "{label} plan: fewer than {} machines on the board",
                plan.requested
            );
            return;
        }
    }
    if plan.picks.is_empty() {
        println!("{label} plan: nothing to assign");
        return;
    }

    println!("{label} plan ({} of {} requested):", plan.picks.len(), plan.requested);
    for (i, pick) in plan.picks.iter().enumerate() {
        println!(
            "  {}. {:<26} {:<44} {:>+7.1}",
            i + 1,
            title_case(&pick.machine),
            pick.players.join(" + "),
            pick.score
        );
    }
}

fn demo_config(matches: &[RawMatch]) -> LeagueConfig {
    LeagueConfig {
        team_abbreviations: match_corpus::team_abbreviations(matches),
        rosters: match_corpus::team_rosters(matches),
        ..LeagueConfig::default()
    }
}

// Pool of players the plan may use: explicit --players, optionally
// narrowed to the configured roster, else the roster itself.
fn resolve_available(
    args: &[String],
    roster_only: bool,
    rosters: &RosterIndex,
    own_team: &str,
) -> Result<Vec<String>> {
    let roster = rosters
        .abbr_for(own_team)
        .and_then(|abbr| rosters.roster_for_abbr(abbr));

    if let Some(raw) = flag_value(args, "--players") {
        let mut players: Vec<String> = raw
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if roster_only {
            let Some(roster) = roster else {
                return Err(anyhow!("--roster set but no roster configured for {own_team}"));
            };
            players.retain(|p| {
                let keep = roster.contains(p);
                if !keep {
                    log::warn!("{p} is not on the {own_team} roster, dropped from the pool");
                }
                keep
            });
        }
        if players.is_empty() {
            return Err(anyhow!("no usable players in --players"));
        }
        return Ok(players);
    }

    match roster {
        Some(set) if !set.is_empty() => {
            let mut players: Vec<String> = set.iter().cloned().collect();
            players.sort();
            Ok(players)
        }
        _ => Err(anyhow!(
            "no player pool: pass --players a,b,c or configure a roster for {own_team}"
        )),
    }
}

fn opponents_at_venue(matches: &[RawMatch], venue: &str, own_team: &str) -> Vec<String> {
    let mut set = HashSet::new();
    for m in matches {
        if m.venue.trim() == venue {
            set.insert(m.home.name.trim().to_string());
            set.insert(m.away.name.trim().to_string());
        }
    }
    set.remove(own_team);
    let mut out: Vec<String> = set.into_iter().collect();
    out.sort();
    out
}

fn env_archive() -> Result<PathBuf> {
    opt_env("MNP_ARCHIVE_DIR")
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("no archive dir given and MNP_ARCHIVE_DIR is unset"))
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
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
