use std::cmp::Ordering;
use std::collections::HashSet;

use pathfinding::kuhn_munkres::kuhn_munkres_min;
use pathfinding::matrix::Matrix;
use serde::Serialize;

use crate::advantage::{AdvantageRecord, MatchupAnalysis, PlayerMachineStats};

// Confidence ramps up over the first few plays on a machine.
const CONFIDENCE_FULL_PLAYS: f64 = 3.0;
// Discounts when one side of the estimate is missing.
const NO_EXPERIENCE_FACTOR: f64 = 0.3;
const UNKNOWN_OPPONENT_FACTOR: f64 = 0.5;
// Hungarian weights are milli-units so they stay ordered integers.
const SCORE_SCALE: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchFormat {
    Singles,
    Doubles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssignmentOutcome {
    Complete,
    InsufficientPlayers,
    InsufficientMachines,
}

#[derive(Debug, Clone, Serialize)]
pub struct MachinePick {
    pub machine: String,
    /// One player in singles, the pair in doubles.
    pub players: Vec<String>,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssignmentPlan {
    pub format: MatchFormat,
    pub requested: usize,
    /// Best picks first. Empty when a doubles capacity check fails.
    pub picks: Vec<MachinePick>,
    pub outcome: AssignmentOutcome,
}

#[derive(Debug, Clone)]
pub struct ScoreGrid {
    pub players: Vec<String>,
    pub machines: Vec<String>,
    scores: Vec<Vec<f64>>,
}

impl ScoreGrid {
    pub fn new(players: Vec<String>, machines: Vec<String>, scores: Vec<Vec<f64>>) -> Self {
        debug_assert_eq!(scores.len(), players.len());
        debug_assert!(scores.iter().all(|row| row.len() == machines.len()));
        Self {
            players,
            machines,
            scores,
        }
    }

    pub fn score(&self, player: usize, machine: usize) -> f64 {
        self.scores[player][machine]
    }

    pub fn score_by_name(&self, player: &str, machine: &str) -> Option<f64> {
        let pi = self.players.iter().position(|p| p == player)?;
        let mi = self.machines.iter().position(|m| m == machine)?;
        Some(self.scores[pi][mi])
    }
}

pub fn score_available_players(analysis: &MatchupAnalysis, available: &[String]) -> ScoreGrid {
    let mut players = Vec::new();
    let mut seen = HashSet::new();
    for raw in available {
        let name = raw.trim();
        if !name.is_empty() && seen.insert(name.to_string()) {
            players.push(name.to_string());
        }
    }

    let machines: Vec<String> = analysis.records.iter().map(|r| r.machine.clone()).collect();
    let empty = PlayerMachineStats::default();
    let scores = players
        .iter()
        .map(|player| {
            let stats = analysis.team_players.get(player).unwrap_or(&empty);
            analysis
                .records
                .iter()
                .map(|record| player_machine_score(stats, record))
                .collect()
        })
        .collect();

    ScoreGrid::new(players, machines, scores)
}

pub fn player_machine_score(stats: &PlayerMachineStats, record: &AdvantageRecord) -> f64 {
    let opponent_pct = record.opponent_pct_of_venue;
    if let Some(line) = stats.machines.get(&record.machine) {
        let advantage = if opponent_pct > 0.0 {
            line.pct_of_venue - opponent_pct
        } else {
            line.pct_of_venue * UNKNOWN_OPPONENT_FACTOR
        };
        let confidence = (line.plays as f64 / CONFIDENCE_FULL_PLAYS).min(1.0);
        return advantage * confidence;
    }
    if stats.overall_average_pct_of_venue > 0.0 {
        let advantage = if opponent_pct > 0.0 {
            stats.overall_average_pct_of_venue - opponent_pct
        } else {
            0.0
        };
        return advantage * NO_EXPERIENCE_FACTOR;
    }
    0.0
}

pub fn plan_assignments(
    analysis: &MatchupAnalysis,
    available: &[String],
    format: MatchFormat,
    requested: usize,
) -> AssignmentPlan {
    let grid = score_available_players(analysis, available);
    match format {
        MatchFormat::Singles => optimize_singles(&grid, requested),
        MatchFormat::Doubles => optimize_doubles(&grid, requested),
    }
}

// The full matching over every available player and machine is solved
// first; the best `requested` pairings are kept.
pub fn optimize_singles(grid: &ScoreGrid, requested: usize) -> AssignmentPlan {
    let n = requested.min(grid.machines.len()).min(grid.players.len());
    if n == 0 {
        return AssignmentPlan {
            format: MatchFormat::Singles,
            requested,
            picks: Vec::new(),
            outcome: AssignmentOutcome::Complete,
        };
    }

    // kuhn_munkres needs rows <= columns; orient by the smaller side.
    let players_as_rows = grid.players.len() <= grid.machines.len();
    let (rows, cols) = if players_as_rows {
        (grid.players.len(), grid.machines.len())
    } else {
        (grid.machines.len(), grid.players.len())
    };
    let costs = Matrix::from_fn(rows, cols, |(i, j)| {
        let score = if players_as_rows {
            grid.score(i, j)
        } else {
            grid.score(j, i)
        };
        let milli = (score * SCORE_SCALE).round() as i64;
        -milli
    });
    let (_, assignments) = kuhn_munkres_min(&costs);

    let mut picks: Vec<MachinePick> = assignments
        .iter()
        .enumerate()
        .map(|(row, &col)| {
            let (player, machine) = if players_as_rows { (row, col) } else { (col, row) };
            MachinePick {
                machine: grid.machines[machine].clone(),
                players: vec![grid.players[player].clone()],
                score: grid.score(player, machine),
            }
        })
        .collect();
    sort_picks(&mut picks);
    picks.truncate(n);

    AssignmentPlan {
        format: MatchFormat::Singles,
        requested,
        picks,
        outcome: AssignmentOutcome::Complete,
    }
}

/// Pair strength rewards the weaker partner as much as the average, so
/// lopsided pairs rank below balanced ones with the same total.
pub fn optimize_doubles(grid: &ScoreGrid, requested: usize) -> AssignmentPlan {
    let plan = |picks, outcome| AssignmentPlan {
        format: MatchFormat::Doubles,
        requested,
        picks,
        outcome,
    };
    if requested == 0 {
        return plan(Vec::new(), AssignmentOutcome::Complete);
    }
    if grid.players.len() < 2 * requested {
        return plan(Vec::new(), AssignmentOutcome::InsufficientPlayers);
    }
    if grid.machines.len() < requested {
        return plan(Vec::new(), AssignmentOutcome::InsufficientMachines);
    }

    struct Candidate {
        score: f64,
        machine: usize,
        first: usize,
        second: usize,
    }

    let mut candidates = Vec::new();
    for first in 0..grid.players.len() {
        for second in (first + 1)..grid.players.len() {
            for machine in 0..grid.machines.len() {
                let a = grid.score(first, machine);
                let b = grid.score(second, machine);
                let score = 0.5 * (a + b) + 0.5 * a.min(b);
                candidates.push(Candidate {
                    score,
                    machine,
                    first,
                    second,
                });
            }
        }
    }
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| grid.machines[a.machine].cmp(&grid.machines[b.machine]))
            .then_with(|| grid.players[a.first].cmp(&grid.players[b.first]))
            .then_with(|| grid.players[a.second].cmp(&grid.players[b.second]))
    });

    let mut used_players = HashSet::new();
    let mut used_machines = HashSet::new();
    let mut picks = Vec::with_capacity(requested);
    for c in &candidates {
        if picks.len() == requested {
            break;
        }
        if used_machines.contains(&c.machine)
            || used_players.contains(&c.first)
            || used_players.contains(&c.second)
        {
            continue;
        }
        used_machines.insert(c.machine);
        used_players.insert(c.first);
        used_players.insert(c.second);
        picks.push(MachinePick {
            machine: grid.machines[c.machine].clone(),
            players: vec![
                grid.players[c.first].clone(),
                grid.players[c.second].clone(),
            ],
            score: c.score,
        });
    }

    plan(picks, AssignmentOutcome::Complete)
}

fn sort_picks(picks: &mut [MachinePick]) {
    picks.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.machine.cmp(&b.machine))
    });
}
