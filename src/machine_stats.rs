use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::event_log::MatchEvent;
use crate::machine_names::title_case;

pub const DEFAULT_SEASON_RANGE: (u32, u32) = (1, 9999);

#[derive(Debug, Clone, Copy, Default)]
pub struct EventFilter<'a> {
    pub team: Option<&'a str>,
    pub seasons: Option<(u32, u32)>,
    pub venue: Option<&'a str>,
    /// Only meaningful together with a team filter.
    pub roster_only: bool,
}

pub fn filter_events<'a>(events: &'a [MatchEvent], filter: &EventFilter<'_>) -> Vec<&'a MatchEvent> {
    let team = filter.team.map(|t| t.trim().to_lowercase());
    let venue = filter.venue.map(|v| v.trim());
    events
        .iter()
        .filter(|ev| {
            if let Some(team) = &team {
                if ev.team.trim().to_lowercase() != *team {
                    return false;
                }
                if filter.roster_only && !ev.is_roster_player {
                    return false;
                }
            }
            if let Some((start, end)) = filter.seasons
                && (ev.season < start || ev.season > end)
            {
                return false;
            }
            if let Some(venue) = venue
                && ev.venue.trim() != venue
            {
                return false;
            }
            true
        })
        .collect()
}

/// "Team" columns describe the scouted opponent, "TWC" columns our own side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatSide {
    Team,
    Twc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PopsScope {
    All,
    Picking,
    Responding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnRecipe {
    Average(StatSide),
    HighestScore(StatSide),
    VenueAverage,
    // derived from the realized Average and Venue Average cells
    PctOfVenue(StatSide),
    TimesPlayed(StatSide),
    TimesPicked(StatSide),
    Pops(StatSide, PopsScope),
}

impl ColumnRecipe {
    pub fn side(&self) -> Option<StatSide> {
        match self {
            ColumnRecipe::Average(side)
            | ColumnRecipe::HighestScore(side)
            | ColumnRecipe::PctOfVenue(side)
            | ColumnRecipe::TimesPlayed(side)
            | ColumnRecipe::TimesPicked(side)
            | ColumnRecipe::Pops(side, _) => Some(*side),
            ColumnRecipe::VenueAverage => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    pub recipe: ColumnRecipe,
    pub include: bool,
    pub seasons: (u32, u32),
    pub venue_specific: bool,
}

impl ColumnSpec {
    pub fn new(name: &str, recipe: ColumnRecipe) -> Self {
        Self {
            name: name.to_string(),
            recipe,
            include: true,
            seasons: DEFAULT_SEASON_RANGE,
            venue_specific: true,
        }
    }
}

static DEFAULT_COLUMNS: Lazy<Vec<ColumnSpec>> = Lazy::new(|| {
    vec![
        ColumnSpec::new("Team Average", ColumnRecipe::Average(StatSide::Team)),
        ColumnSpec::new("TWC Average", ColumnRecipe::Average(StatSide::Twc)),
        ColumnSpec::new("Venue Average", ColumnRecipe::VenueAverage),
        ColumnSpec::new("Team Highest Score", ColumnRecipe::HighestScore(StatSide::Team)),
        ColumnSpec::new("% of V. Avg.", ColumnRecipe::PctOfVenue(StatSide::Team)),
        ColumnSpec::new("TWC % V. Avg.", ColumnRecipe::PctOfVenue(StatSide::Twc)),
        ColumnSpec::new("Times Played", ColumnRecipe::TimesPlayed(StatSide::Team)),
        ColumnSpec::new("TWC Times Played", ColumnRecipe::TimesPlayed(StatSide::Twc)),
        ColumnSpec::new("Times Picked", ColumnRecipe::TimesPicked(StatSide::Team)),
        ColumnSpec::new("TWC Times Picked", ColumnRecipe::TimesPicked(StatSide::Twc)),
        ColumnSpec::new("POPS", ColumnRecipe::Pops(StatSide::Team, PopsScope::All)),
        ColumnSpec::new("TWC POPS", ColumnRecipe::Pops(StatSide::Twc, PopsScope::All)),
        ColumnSpec::new("POPS Picking", ColumnRecipe::Pops(StatSide::Team, PopsScope::Picking)),
        ColumnSpec::new("TWC POPS Picking", ColumnRecipe::Pops(StatSide::Twc, PopsScope::Picking)),
        ColumnSpec::new("POPS Responding", ColumnRecipe::Pops(StatSide::Team, PopsScope::Responding)),
        ColumnSpec::new("TWC POPS Responding", ColumnRecipe::Pops(StatSide::Twc, PopsScope::Responding)),
    ]
});

pub fn default_column_specs() -> Vec<ColumnSpec> {
    DEFAULT_COLUMNS.clone()
}

/// Missing data stays typed; only `Display` turns it into "N/A".
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum StatValue {
    Average(f64),
    Highest(f64),
    Count(u64),
    Percent(f64),
    Missing,
}

impl StatValue {
    pub fn value(&self) -> Option<f64> {
        match self {
            StatValue::Average(v) | StatValue::Highest(v) | StatValue::Percent(v) => Some(*v),
            StatValue::Count(n) => Some(*n as f64),
            StatValue::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, StatValue::Missing)
    }
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Average(v) => write!(f, "{}", grouped(*v, 2)),
            StatValue::Highest(v) => write!(f, "{}", grouped(*v, 0)),
            StatValue::Count(n) => write!(f, "{}", grouped(*n as f64, 0)),
            StatValue::Percent(v) => write!(f, "{v:.2}%"),
            StatValue::Missing => write!(f, "N/A"),
        }
    }
}

/// TWC cell minus Team cell. One-sided data stays distinguishable:
/// `TeamMissing` renders "+", `TwcMissing` renders "-".
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Comparison {
    Diff(f64),
    TeamMissing,
    TwcMissing,
    Unknown,
}

impl Comparison {
    pub fn of(team: StatValue, twc: StatValue) -> Self {
        match (team.value(), twc.value()) {
            (Some(t), Some(w)) => Comparison::Diff(w - t),
            (Some(_), None) => Comparison::TwcMissing,
            (None, Some(_)) => Comparison::TeamMissing,
            (None, None) => Comparison::Unknown,
        }
    }

    // Ascending order: our exclusive machines first, then diffs biggest
    // first, then machines only the opponent knows, then no data.
    fn sort_key(&self) -> (u8, f64) {
        match self {
            Comparison::TeamMissing => (0, 0.0),
            Comparison::Diff(d) => (1, -d),
            Comparison::TwcMissing => (2, 0.0),
            Comparison::Unknown => (3, 0.0),
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparison::Diff(d) => write!(f, "{d:.2}"),
            Comparison::TeamMissing => write!(f, "+"),
            Comparison::TwcMissing => write!(f, "-"),
            Comparison::Unknown => write!(f, "N/A"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Cell {
    Stat(StatValue),
    Compare(Comparison),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Stat(v) => v.fmt(f),
            Cell::Compare(c) => c.fmt(f),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MachineRow {
    pub machine: String,
    /// Aligned with `MachineTable::columns` minus the machine column.
    pub cells: Vec<Cell>,
}

impl MachineRow {
    pub fn display_machine(&self) -> String {
        title_case(&self.machine)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MachineTable {
    pub columns: Vec<String>,
    pub rows: Vec<MachineRow>,
}

impl MachineTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cell(&self, machine: &str, column: &str) -> Option<Cell> {
        let col = self.column_index(column)?.checked_sub(1)?;
        let row = self.rows.iter().find(|r| r.machine == machine)?;
        row.cells.get(col).copied()
    }

    pub fn stat(&self, machine: &str, column: &str) -> Option<StatValue> {
        match self.cell(machine, column)? {
            Cell::Stat(v) => Some(v),
            Cell::Compare(_) => None,
        }
    }

    pub fn comparison(&self, machine: &str, column: &str) -> Option<Comparison> {
        match self.cell(machine, column)? {
            Cell::Compare(c) => Some(c),
            Cell::Stat(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TableContext<'a> {
    pub team: &'a str,
    pub twc_team: &'a str,
    pub venue: &'a str,
}

// Comparison columns appear only where both of their operands are enabled.
pub fn build_machine_table(
    events: &[MatchEvent],
    machines: &[String],
    ctx: &TableContext<'_>,
    specs: &[ColumnSpec],
) -> MachineTable {
    let enabled: Vec<&ColumnSpec> = specs.iter().filter(|s| s.include).collect();

    let mut machine_list: Vec<String> = machines.to_vec();
    machine_list.sort();
    machine_list.dedup();
    let machine_index: HashMap<&str, usize> = machine_list
        .iter()
        .enumerate()
        .map(|(i, m)| (m.as_str(), i))
        .collect();
    let n = machine_list.len();

    let mut per_column: Vec<Vec<StatValue>> = enabled
        .iter()
        .map(|spec| column_values(events, n, &machine_index, spec, ctx))
        .collect();
    fill_deferred_ratios(&enabled, &mut per_column, n);

    let pct_team = position(&enabled, ColumnRecipe::PctOfVenue(StatSide::Team));
    let pct_twc = position(&enabled, ColumnRecipe::PctOfVenue(StatSide::Twc));
    let pops_team = position(&enabled, ColumnRecipe::Pops(StatSide::Team, PopsScope::All));
    let pops_twc = position(&enabled, ColumnRecipe::Pops(StatSide::Twc, PopsScope::All));
    let pct_cmp = pct_team.zip(pct_twc);
    let pops_cmp = pops_team.zip(pops_twc);

    let mut columns = Vec::with_capacity(enabled.len() + 3);
    columns.push("Machine".to_string());
    if pct_cmp.is_some() {
        columns.push("% Comparison".to_string());
    }
    columns.extend(enabled.iter().map(|s| s.name.clone()));
    if pops_cmp.is_some() {
        columns.push("POPS Comparison".to_string());
    }

    let mut rows = Vec::with_capacity(n);
    for (mi, machine) in machine_list.iter().enumerate() {
        let mut cells = Vec::with_capacity(enabled.len() + 2);
        if let Some((t, w)) = pct_cmp {
            cells.push(Cell::Compare(Comparison::of(
                per_column[t][mi],
                per_column[w][mi],
            )));
        }
        for col in &per_column {
            cells.push(Cell::Stat(col[mi]));
        }
        if let Some((t, w)) = pops_cmp {
            cells.push(Cell::Compare(Comparison::of(
                per_column[t][mi],
                per_column[w][mi],
            )));
        }
        rows.push(MachineRow {
            machine: machine.clone(),
            cells,
        });
    }

    let mut table = MachineTable { columns, rows };
    sort_rows(&mut table);
    log::debug!(
        "machine table: {} machines x {} columns from {} events",
        table.rows.len(),
        table.columns.len(),
        events.len()
    );
    table
}

fn position(enabled: &[&ColumnSpec], recipe: ColumnRecipe) -> Option<usize> {
    enabled.iter().position(|s| s.recipe == recipe)
}

fn column_values(
    events: &[MatchEvent],
    n: usize,
    machine_index: &HashMap<&str, usize>,
    spec: &ColumnSpec,
    ctx: &TableContext<'_>,
) -> Vec<StatValue> {
    if matches!(spec.recipe, ColumnRecipe::PctOfVenue(_)) {
        return vec![StatValue::Missing; n];
    }

    let filter = match spec.recipe.side() {
        None => EventFilter {
            team: None,
            seasons: Some(spec.seasons),
            venue: Some(ctx.venue),
            roster_only: false,
        },
        Some(side) => EventFilter {
            team: Some(match side {
                StatSide::Team => ctx.team,
                StatSide::Twc => ctx.twc_team,
            }),
            seasons: Some(spec.seasons),
            venue: spec.venue_specific.then_some(ctx.venue),
            roster_only: true,
        },
    };

    let mut groups: Vec<Vec<&MatchEvent>> = vec![Vec::new(); n];
    for ev in filter_events(events, &filter) {
        if let Some(&i) = machine_index.get(ev.machine.as_str()) {
            groups[i].push(ev);
        }
    }
    groups
        .iter()
        .map(|rows| stat_from_rows(spec.recipe, rows))
        .collect()
}

fn stat_from_rows(recipe: ColumnRecipe, rows: &[&MatchEvent]) -> StatValue {
    match recipe {
        ColumnRecipe::Average(_) | ColumnRecipe::VenueAverage => mean_score(rows),
        ColumnRecipe::HighestScore(_) => rows
            .iter()
            .map(|ev| ev.score)
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
            .map(StatValue::Highest)
            .unwrap_or(StatValue::Missing),
        ColumnRecipe::TimesPlayed(_) => StatValue::Count(dedup_match_rounds(rows).len() as u64),
        ColumnRecipe::TimesPicked(side) => {
            let picked = dedup_match_rounds(rows)
                .iter()
                .filter(|ev| pick_flag(ev, side))
                .count();
            StatValue::Count(picked as u64)
        }
        ColumnRecipe::Pops(side, scope) => pops(rows, side, scope),
        ColumnRecipe::PctOfVenue(_) => StatValue::Missing,
    }
}

fn mean_score(rows: &[&MatchEvent]) -> StatValue {
    if rows.is_empty() {
        return StatValue::Missing;
    }
    let sum: f64 = rows.iter().map(|ev| ev.score).sum();
    StatValue::Average(sum / rows.len() as f64)
}

/// A game contributes once per (match, round) to play counts and POPS,
/// whichever of the side's players appears first in the rows.
pub(crate) fn dedup_match_rounds<'a>(rows: &[&'a MatchEvent]) -> Vec<&'a MatchEvent> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for ev in rows {
        if seen.insert((ev.match_id.as_str(), ev.round)) {
            out.push(*ev);
        }
    }
    out
}

fn pick_flag(ev: &MatchEvent, side: StatSide) -> bool {
    match side {
        StatSide::Team => ev.is_pick,
        StatSide::Twc => ev.is_pick_twc,
    }
}

// Percentage Of Points Scored: share of the round points at stake that
// went to the side's team, over deduplicated rounds.
fn pops(rows: &[&MatchEvent], side: StatSide, scope: PopsScope) -> StatValue {
    let rounds = dedup_match_rounds(rows);
    let scoped: Vec<&MatchEvent> = rounds
        .into_iter()
        .filter(|ev| match scope {
            PopsScope::All => true,
            PopsScope::Picking => pick_flag(ev, side),
            PopsScope::Responding => !pick_flag(ev, side),
        })
        .collect();
    let at_stake: f64 = scoped.iter().map(|ev| ev.round_points).sum();
    if at_stake <= 0.0 {
        return StatValue::Missing;
    }
    let earned: f64 = scoped.iter().map(|ev| ev.team_points).sum();
    StatValue::Percent(100.0 * earned / at_stake)
}

fn fill_deferred_ratios(enabled: &[&ColumnSpec], per_column: &mut [Vec<StatValue>], n: usize) {
    let avg_team = position(enabled, ColumnRecipe::Average(StatSide::Team));
    let avg_twc = position(enabled, ColumnRecipe::Average(StatSide::Twc));
    let venue = position(enabled, ColumnRecipe::VenueAverage);

    for ci in 0..enabled.len() {
        let ColumnRecipe::PctOfVenue(side) = enabled[ci].recipe else {
            continue;
        };
        let avg_col = match side {
            StatSide::Team => avg_team,
            StatSide::Twc => avg_twc,
        };
        for mi in 0..n {
            let avg = avg_col.and_then(|c| per_column[c][mi].value());
            let venue_avg = venue.and_then(|c| per_column[c][mi].value());
            per_column[ci][mi] = match (avg, venue_avg) {
                (Some(a), Some(v)) if v > 0.0 => StatValue::Percent(100.0 * a / v),
                _ => StatValue::Missing,
            };
        }
    }
}

// Lead with the machines where the matchup tilts our way.
fn sort_rows(table: &mut MachineTable) {
    let cmp_col = table
        .column_index("% Comparison")
        .or_else(|| table.column_index("POPS Comparison"));
    if let Some(col) = cmp_col {
        let ci = col - 1;
        table.rows.sort_by(|a, b| {
            let ka = comparison_key(&a.cells[ci]);
            let kb = comparison_key(&b.cells[ci]);
            ka.0.cmp(&kb.0)
                .then_with(|| ka.1.partial_cmp(&kb.1).unwrap_or(Ordering::Equal))
        });
        return;
    }

    for name in ["% of V. Avg.", "Team Average", "Venue Average", "TWC Average"] {
        if let Some(col) = table.column_index(name) {
            let ci = col - 1;
            table.rows.sort_by(|a, b| {
                desc_missing_last(stat_value(&a.cells[ci]), stat_value(&b.cells[ci]))
            });
            return;
        }
    }
    table.rows.sort_by(|a, b| a.machine.cmp(&b.machine));
}

fn comparison_key(cell: &Cell) -> (u8, f64) {
    match cell {
        Cell::Compare(c) => c.sort_key(),
        Cell::Stat(_) => Comparison::Unknown.sort_key(),
    }
}

fn stat_value(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Stat(v) => v.value(),
        Cell::Compare(_) => None,
    }
}

fn desc_missing_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn grouped(value: f64, decimals: usize) -> String {
    let formatted = format!("{value:.decimals$}");
    let (sign, digits) = match formatted.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", formatted.as_str()),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };
    let mut out = String::with_capacity(formatted.len() + int_part.len() / 3);
    out.push_str(sign);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}
