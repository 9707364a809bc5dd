use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::event_log::MatchEvent;
use crate::league_config::{RosterIndex, season_range};
use crate::machine_names::MachineAliases;
use crate::machine_stats::{EventFilter, dedup_match_rounds, filter_events};

// Composite blend: statistical edge dominates, bench experience nudges.
const STAT_WEIGHT: f64 = 0.7;
const EXPERIENCE_WEIGHT: f64 = 0.3;
const EXPERIENCE_FULL_PLAYS: f64 = 5.0;
const EXPERIENCE_SCALE: f64 = 20.0;
const ADVANTAGE_THRESHOLD: f64 = 20.0;

#[derive(Debug, Clone, Copy)]
pub struct AdvantageParams<'a> {
    pub team: &'a str,
    pub opponent: &'a str,
    pub venue: &'a str,
    pub selected_seasons: &'a [u32],
    pub team_venue_specific: bool,
    pub opponent_venue_specific: bool,
    pub included_machines: &'a [String],
    pub excluded_machines: &'a [String],
    pub rosters: &'a RosterIndex,
    pub aliases: &'a MachineAliases,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerMachineLine {
    pub scores: Vec<f64>,
    pub average_score: f64,
    /// 0 when the venue has no baseline for the machine.
    pub pct_of_venue: f64,
    pub plays: usize,
    /// 1-based position among teammates on this machine.
    pub rank_on_team: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PlayerMachineStats {
    pub machines: HashMap<String, PlayerMachineLine>,
    pub overall_average_pct_of_venue: f64,
    pub total_games: usize,
    /// Distinct board machines with at least one recorded game.
    pub experience_breadth: usize,
}

/// Strong levels mean one side has never recorded a game on the machine;
/// the plain levels grade a head-to-head gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AdvantageLevel {
    StrongTeam,
    Team,
    SlightOrNone,
    Opponent,
    StrongOpponent,
    Neutral,
    Unknown,
}

impl fmt::Display for AdvantageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AdvantageLevel::StrongTeam => "Strong TWC Advantage",
            AdvantageLevel::Team => "TWC Advantage",
            AdvantageLevel::SlightOrNone => "Slight/No Advantage",
            AdvantageLevel::Opponent => "Opponent Advantage",
            AdvantageLevel::StrongOpponent => "Strong Opponent Advantage",
            AdvantageLevel::Neutral => "Neutral",
            AdvantageLevel::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdvantageRecord {
    pub machine: String,
    pub venue_average: Option<f64>,
    pub team_average: Option<f64>,
    pub opponent_average: Option<f64>,
    pub team_pct_of_venue: f64,
    pub opponent_pct_of_venue: f64,
    pub statistical_advantage: Option<f64>,
    pub team_plays: usize,
    pub opponent_plays: usize,
    pub experience_advantage: i64,
    pub team_player_count: usize,
    pub opponent_player_count: usize,
    pub player_coverage_advantage: i64,
    pub top_team_players: Vec<String>,
    pub level: AdvantageLevel,
    pub composite_score: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchupAnalysis {
    // sorted by composite score, best machines for the team first
    pub records: Vec<AdvantageRecord>,
    pub team_players: HashMap<String, PlayerMachineStats>,
}

pub fn analyze_matchup(events: &[MatchEvent], params: &AdvantageParams<'_>) -> MatchupAnalysis {
    let venue = params.venue.trim();
    let season_window = season_range(params.selected_seasons);

    let venue_rows = filter_events(
        events,
        &EventFilter {
            team: None,
            seasons: season_window,
            venue: Some(venue),
            roster_only: false,
        },
    );
    let team_rows = side_rows(events, params.team, params.team_venue_specific, venue, season_window);
    let opponent_rows = side_rows(
        events,
        params.opponent,
        params.opponent_venue_specific,
        venue,
        season_window,
    );

    // With no season selection the universe keys on the venue's own newest
    // season, not the corpus-wide one.
    let latest_season = params
        .selected_seasons
        .iter()
        .copied()
        .max()
        .or_else(|| venue_rows.iter().map(|ev| ev.season).max());

    let machines = machine_universe(&venue_rows, latest_season, params);
    let venue_averages = per_machine_average(&venue_rows);

    let mut team_players = seed_roster_players(params);
    accumulate_player_lines(&mut team_players, &team_rows, &machines, &venue_averages);
    let rankings = rank_players_per_machine(&mut team_players);

    let opponent_averages = per_machine_average(&opponent_rows);

    let mut records = Vec::with_capacity(machines.len());
    for machine in &machines {
        let venue_average = venue_averages.get(machine).copied();

        let team_average = team_machine_average(&team_players, machine);
        let opponent_average = opponent_averages.get(machine).copied();
        let team_pct = pct_of_venue(team_average, venue_average);
        let opponent_pct = pct_of_venue(opponent_average, venue_average);

        let team_plays = machine_plays(&team_rows, machine);
        let opponent_plays = machine_plays(&opponent_rows, machine);
        let experience_advantage = team_plays as i64 - opponent_plays as i64;

        let ranked = rankings.get(machine.as_str());
        let team_player_count = ranked.map(|r| r.len()).unwrap_or(0);
        let opponent_player_count = distinct_players(&opponent_rows, machine);
        let top_team_players = ranked
            .map(|r| r.iter().take(3).cloned().collect())
            .unwrap_or_default();

        let (level, composite_score, statistical_advantage) =
            composite(team_pct, opponent_pct, experience_advantage);

        records.push(AdvantageRecord {
            machine: machine.clone(),
            venue_average,
            team_average,
            opponent_average,
            team_pct_of_venue: team_pct,
            opponent_pct_of_venue: opponent_pct,
            statistical_advantage,
            team_plays,
            opponent_plays,
            experience_advantage,
            team_player_count,
            opponent_player_count,
            player_coverage_advantage: team_player_count as i64 - opponent_player_count as i64,
            top_team_players,
            level,
            composite_score,
        });
    }

    records.sort_by(|a, b| {
        b.composite_score
            .partial_cmp(&a.composite_score)
            .unwrap_or(Ordering::Equal)
    });

    MatchupAnalysis {
        records,
        team_players,
    }
}

fn side_rows<'a>(
    events: &'a [MatchEvent],
    team: &str,
    venue_specific: bool,
    venue: &str,
    seasons: Option<(u32, u32)>,
) -> Vec<&'a MatchEvent> {
    filter_events(
        events,
        &EventFilter {
            team: Some(team),
            seasons,
            venue: venue_specific.then_some(venue),
            roster_only: false,
        },
    )
}

// Machines on the floor in the newest season in play, adjusted by the
// include and exclude lists. Sorted.
fn machine_universe(
    venue_rows: &[&MatchEvent],
    latest_season: Option<u32>,
    params: &AdvantageParams<'_>,
) -> Vec<String> {
    let mut set: HashSet<String> = venue_rows
        .iter()
        .filter(|ev| Some(ev.season) == latest_season)
        .map(|ev| ev.machine.clone())
        .collect();
    for included in params.aliases.standardize_set(params.included_machines) {
        if !included.is_empty() {
            set.insert(included);
        }
    }
    for excluded in params.aliases.standardize_set(params.excluded_machines) {
        set.remove(&excluded);
    }
    let mut machines: Vec<String> = set.into_iter().collect();
    machines.sort();
    machines
}

fn per_machine_average(rows: &[&MatchEvent]) -> HashMap<String, f64> {
    let mut sums: HashMap<&str, (f64, usize)> = HashMap::new();
    for ev in rows {
        let entry = sums.entry(ev.machine.as_str()).or_insert((0.0, 0));
        entry.0 += ev.score;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(machine, (sum, n))| (machine.to_string(), sum / n as f64))
        .collect()
}

// Roster players start with empty stats so the assignment layer sees the
// whole bench, not only players with recorded games.
fn seed_roster_players(params: &AdvantageParams<'_>) -> HashMap<String, PlayerMachineStats> {
    let mut out = HashMap::new();
    if let Some(abbr) = params.rosters.abbr_for(params.team.trim())
        && let Some(roster) = params.rosters.roster_for_abbr(abbr)
    {
        for name in roster {
            out.insert(name.clone(), PlayerMachineStats::default());
        }
    }
    out
}

// Machine lines, breadth, and the overall pct stay inside the board's
// machine universe; total games counts every row the player put up.
fn accumulate_player_lines(
    players: &mut HashMap<String, PlayerMachineStats>,
    team_rows: &[&MatchEvent],
    machines: &[String],
    venue_averages: &HashMap<String, f64>,
) {
    let universe: HashSet<&str> = machines.iter().map(String::as_str).collect();
    let mut totals: HashMap<String, usize> = HashMap::new();
    let mut scores: HashMap<(String, String), Vec<f64>> = HashMap::new();
    for ev in team_rows {
        *totals.entry(ev.player.clone()).or_default() += 1;
        if !universe.contains(ev.machine.as_str()) {
            continue;
        }
        scores
            .entry((ev.player.clone(), ev.machine.clone()))
            .or_default()
            .push(ev.score);
    }

    for ((player, machine), machine_scores) in scores {
        let plays = machine_scores.len();
        let average_score = machine_scores.iter().sum::<f64>() / plays as f64;
        let pct_of_venue = match venue_averages.get(&machine) {
            Some(&venue_avg) if venue_avg > 0.0 => 100.0 * average_score / venue_avg,
            _ => 0.0,
        };
        players.entry(player).or_default().machines.insert(
            machine,
            PlayerMachineLine {
                scores: machine_scores,
                average_score,
                pct_of_venue,
                plays,
                rank_on_team: None,
            },
        );
    }

    for (player, games) in totals {
        players.entry(player).or_default().total_games = games;
    }
    for stats in players.values_mut() {
        stats.experience_breadth = stats.machines.len();
        stats.overall_average_pct_of_venue = if stats.machines.is_empty() {
            0.0
        } else {
            stats.machines.values().map(|l| l.pct_of_venue).sum::<f64>()
                / stats.machines.len() as f64
        };
    }
}

// Returns the full per-machine ranking, best first, and writes the
// 1-based rank back into each player line.
fn rank_players_per_machine(
    players: &mut HashMap<String, PlayerMachineStats>,
) -> HashMap<String, Vec<String>> {
    let mut per_machine: HashMap<String, Vec<(String, f64)>> = HashMap::new();
    for (player, stats) in players.iter() {
        for (machine, line) in &stats.machines {
            per_machine
                .entry(machine.clone())
                .or_default()
                .push((player.clone(), line.pct_of_venue));
        }
    }

    let mut rankings = HashMap::new();
    for (machine, mut entries) in per_machine {
        entries.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        for (i, (player, _)) in entries.iter().enumerate() {
            if let Some(stats) = players.get_mut(player)
                && let Some(line) = stats.machines.get_mut(&machine)
            {
                line.rank_on_team = Some(i + 1);
            }
        }
        rankings.insert(machine, entries.into_iter().map(|(p, _)| p).collect());
    }
    rankings
}

// Plays-weighted mean of the player averages, which equals the plain
// mean over the side's rows on the machine.
fn team_machine_average(
    players: &HashMap<String, PlayerMachineStats>,
    machine: &str,
) -> Option<f64> {
    let mut total_score = 0.0;
    let mut total_plays = 0usize;
    for stats in players.values() {
        if let Some(line) = stats.machines.get(machine) {
            total_score += line.average_score * line.plays as f64;
            total_plays += line.plays;
        }
    }
    (total_plays > 0).then(|| total_score / total_plays as f64)
}

fn pct_of_venue(average: Option<f64>, venue_average: Option<f64>) -> f64 {
    match (average, venue_average) {
        (Some(avg), Some(venue)) if venue > 0.0 => 100.0 * avg / venue,
        _ => 0.0,
    }
}

fn machine_plays(rows: &[&MatchEvent], machine: &str) -> usize {
    let machine_rows: Vec<&MatchEvent> = rows
        .iter()
        .copied()
        .filter(|ev| ev.machine == machine)
        .collect();
    dedup_match_rounds(&machine_rows).len()
}

fn distinct_players(rows: &[&MatchEvent], machine: &str) -> usize {
    rows.iter()
        .filter(|ev| ev.machine == machine)
        .map(|ev| ev.player.as_str())
        .collect::<HashSet<_>>()
        .len()
}

// A side with no venue-relative number is treated as absent; one-sided
// machines pin the score to the extremes.
fn composite(team_pct: f64, opponent_pct: f64, experience_advantage: i64) -> (AdvantageLevel, f64, Option<f64>) {
    if team_pct > 0.0 && opponent_pct == 0.0 {
        return (AdvantageLevel::StrongTeam, 100.0, None);
    }
    if opponent_pct > 0.0 && team_pct == 0.0 {
        return (AdvantageLevel::StrongOpponent, -100.0, None);
    }
    if team_pct == 0.0 && opponent_pct == 0.0 {
        return (AdvantageLevel::Neutral, 0.0, None);
    }
    if team_pct > 0.0 && opponent_pct > 0.0 {
        let stat = team_pct - opponent_pct;
        let experience_term = (experience_advantage as f64 / EXPERIENCE_FULL_PLAYS
            * EXPERIENCE_SCALE)
            .clamp(-100.0, 100.0);
        let score = (STAT_WEIGHT * stat + EXPERIENCE_WEIGHT * experience_term).clamp(-100.0, 100.0);
        let level = if stat > ADVANTAGE_THRESHOLD {
            AdvantageLevel::Team
        } else if stat < -ADVANTAGE_THRESHOLD {
            AdvantageLevel::Opponent
        } else {
            AdvantageLevel::SlightOrNone
        };
        return (level, score, Some(stat));
    }
    (AdvantageLevel::Unknown, 0.0, None)
}
