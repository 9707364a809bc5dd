use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::league_config::{RosterIndex, ScoreLimits};
use crate::machine_names::MachineAliases;
use crate::match_corpus::{RawMatch, Side};

/// Rounds 1 and 4 are doubles; away picks rounds 1 and 3, home 2 and 4.
pub const DOUBLES_ROUNDS: [u32; 2] = [1, 4];
pub const AWAY_PICK_ROUNDS: [u32; 2] = [1, 3];
pub const HOME_PICK_ROUNDS: [u32; 2] = [2, 4];

pub const DOUBLES_ROUND_POINTS: f64 = 5.0;
pub const SINGLES_ROUND_POINTS: f64 = 3.0;

// A single player cannot earn more than these in one game.
const DOUBLES_SLOT_POINT_MAX: f64 = 2.5;
const SINGLES_SLOT_POINT_MAX: f64 = 3.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchEvent {
    pub season: u32,
    pub venue: String,
    pub match_id: String,
    pub round: u32,
    pub game_number: u32,
    pub machine: String,
    pub team: String,
    pub player: String,
    pub score: f64,
    pub is_roster_player: bool,
    pub is_pick: bool,
    pub is_pick_twc: bool,
    pub team_points: f64,
    pub round_points: f64,
    pub is_doubles: bool,
}

/// `team` is the scouted team, `twc_team` the analyst's own team.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeParams<'a> {
    pub team: &'a str,
    pub twc_team: &'a str,
    pub venue: &'a str,
    pub aliases: &'a MachineAliases,
    pub score_limits: &'a ScoreLimits,
    pub rosters: &'a RosterIndex,
    pub included_machines: &'a [String],
    pub excluded_machines: &'a [String],
    pub selected_seasons: &'a [u32],
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedLog {
    pub events: Vec<MatchEvent>,
    /// Venue machines in the newest selected season, sorted.
    pub recent_machines: Vec<String>,
}

/// Data defects never abort the pass: a bad row drops that event alone,
/// and point totals above the per-game maximum are logged and kept.
pub fn normalize_matches(matches: &[RawMatch], params: &NormalizeParams<'_>) -> NormalizedLog {
    let team = params.team.trim();
    let twc_team = params.twc_team.trim();
    let venue = params.venue.trim();

    let excluded = params.aliases.standardize_set(params.excluded_machines);
    let mut recent: HashSet<String> = params.aliases.standardize_set(params.included_machines);
    recent.retain(|m| !m.is_empty());

    // The venue lineup is tracked for the newest season the caller asked
    // about, falling back to the newest season in the corpus.
    let latest_season = params
        .selected_seasons
        .iter()
        .copied()
        .max()
        .or_else(|| matches.iter().map(|m| m.season).max());

    let mut events = Vec::new();
    for m in matches {
        let team_picks = pick_rounds(team, m);
        let twc_picks = pick_rounds(twc_team, m);

        for round in &m.rounds {
            let is_doubles = DOUBLES_ROUNDS.contains(&round.number);
            let round_points = if is_doubles {
                DOUBLES_ROUND_POINTS
            } else {
                SINGLES_ROUND_POINTS
            };

            for game in &round.games {
                let machine = params.aliases.standardize(&game.machine);
                if machine.is_empty() {
                    continue;
                }

                if Some(m.season) == latest_season
                    && m.venue.trim() == venue
                    && !excluded.contains(&machine)
                {
                    recent.insert(machine.clone());
                }

                if !game.done {
                    continue;
                }

                warn_on_point_anomalies(m, round.number, game.number, is_doubles, game);

                for slot in &game.slots {
                    if slot.player.is_empty() || slot.score == 0.0 {
                        continue;
                    }
                    if params.score_limits.exceeds(&machine, slot.score) {
                        log::debug!(
                            "match {} round {}: dropping {} score {} on {machine}, over cap",
                            m.key,
                            round.number,
                            slot.player,
                            slot.score
                        );
                        continue;
                    }
                    let Some(side) = m.player_side(&slot.player) else {
                        log::warn!(
                            "match {} round {}: player key {} not in either lineup",
                            m.key,
                            round.number,
                            slot.player
                        );
                        continue;
                    };

                    let player_team = m.team(side).name.trim().to_string();
                    let team_points = match side {
                        Side::Home => game.home_points,
                        Side::Away => game.away_points,
                    };
                    let player = m.player_name(&slot.player);
                    let is_roster_player = params.rosters.is_roster_player(&player, &player_team);

                    events.push(MatchEvent {
                        season: m.season,
                        venue: m.venue.clone(),
                        match_id: m.key.clone(),
                        round: round.number,
                        game_number: game.number,
                        machine: machine.clone(),
                        team: player_team,
                        player,
                        score: slot.score,
                        is_roster_player,
                        is_pick: team_picks.contains(&round.number),
                        is_pick_twc: twc_picks.contains(&round.number),
                        team_points,
                        round_points,
                        is_doubles,
                    });
                }
            }
        }
    }

    let mut recent_machines: Vec<String> = recent.into_iter().collect();
    recent_machines.sort();
    NormalizedLog {
        events,
        recent_machines,
    }
}

// A team not playing in a match picks nothing there.
fn pick_rounds(team: &str, m: &RawMatch) -> &'static [u32] {
    if !team.is_empty() && m.home.name.trim() == team {
        &HOME_PICK_ROUNDS
    } else if !team.is_empty() && m.away.name.trim() == team {
        &AWAY_PICK_ROUNDS
    } else {
        &[]
    }
}

fn warn_on_point_anomalies(
    m: &RawMatch,
    round: u32,
    game_number: u32,
    is_doubles: bool,
    game: &crate::match_corpus::RawGame,
) {
    let cap = if is_doubles {
        DOUBLES_SLOT_POINT_MAX
    } else {
        SINGLES_SLOT_POINT_MAX
    };
    for (i, slot) in game.slots.iter().enumerate() {
        let slot_in_play = is_doubles || i < 2;
        if slot_in_play && slot.points > cap {
            log::warn!(
                "match {} round {round} game {game_number}: slot {} carries {} points, cap {cap}",
                m.key,
                i + 1,
                slot.points
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::league_config::{RosterIndex, ScoreLimits};
    use crate::machine_names::MachineAliases;
    use crate::match_corpus::{RawGame, RawMatch, RawPlayer, RawRound, RawSlot, RawTeam};
    use std::collections::HashMap;

    fn slot(player: &str, score: f64) -> RawSlot {
        RawSlot {
            player: player.to_string(),
            score,
            points: 0.0,
        }
    }

    fn team(name: &str, key: &str, players: &[(&str, &str)]) -> RawTeam {
        RawTeam {
            name: name.to_string(),
            key: key.to_string(),
            lineup: players
                .iter()
                .map(|(name, key)| RawPlayer {
                    name: name.to_string(),
                    key: key.to_string(),
                })
                .collect(),
        }
    }

    fn game(number: u32, machine: &str, done: bool, slots: [RawSlot; 4]) -> RawGame {
        RawGame {
            number,
            machine: machine.to_string(),
            done,
            slots,
            home_points: 2.0,
            away_points: 3.0,
        }
    }

    fn stub_match(key: &str, venue: &str, rounds: Vec<RawRound>) -> RawMatch {
        let season = key.split('-').nth(1).unwrap().parse().unwrap();
        RawMatch {
            key: key.to_string(),
            season,
            venue: venue.to_string(),
            home: team("Slippery Slopes", "SSS", &[("Carol Chen", "cchen")]),
            away: team("The Wrecking Crew", "TWC", &[("Alice Adams", "aadams")]),
            rounds,
        }
    }

    fn four_round_match(key: &str, venue: &str) -> RawMatch {
        let rounds = (1..=4)
            .map(|n| RawRound {
                number: n,
                games: vec![game(
                    1,
                    "Pulp Fiction",
                    true,
                    [
                        slot("aadams", 5_000_000.0),
                        slot("cchen", 3_000_000.0),
                        RawSlot::default(),
                        RawSlot::default(),
                    ],
                )],
            })
            .collect();
        stub_match(key, venue, rounds)
    }

    fn base_params<'a>(
        aliases: &'a MachineAliases,
        limits: &'a ScoreLimits,
        rosters: &'a RosterIndex,
    ) -> NormalizeParams<'a> {
        NormalizeParams {
            team: "Slippery Slopes",
            twc_team: "The Wrecking Crew",
            venue: "Georgetown Pizza and Arcade",
            aliases,
            score_limits: limits,
            rosters,
            included_machines: &[],
            excluded_machines: &[],
            selected_seasons: &[],
        }
    }

    #[test]
    fn pick_flags_follow_home_away_rounds() {
        let aliases = MachineAliases::default();
        let limits = ScoreLimits::default();
        let rosters = RosterIndex::default();
        let params = base_params(&aliases, &limits, &rosters);

        let m = four_round_match("mnp-21-1-TWC-SSS", "Georgetown Pizza and Arcade");
        let log = normalize_matches(&[m], &params);

        // Home (the scouted team) picks rounds 2 and 4; away picks 1 and 3.
        for ev in &log.events {
            assert_eq!(ev.is_pick, ev.round == 2 || ev.round == 4, "round {}", ev.round);
            assert_eq!(ev.is_pick_twc, ev.round == 1 || ev.round == 3);
            assert_eq!(ev.is_doubles, ev.round == 1 || ev.round == 4);
            let expected = if ev.is_doubles { 5.0 } else { 3.0 };
            assert_eq!(ev.round_points, expected);
            assert!(ev.score > 0.0);
        }
    }

    #[test]
    fn absent_team_picks_nothing() {
        let aliases = MachineAliases::default();
        let limits = ScoreLimits::default();
        let rosters = RosterIndex::default();
        let mut params = base_params(&aliases, &limits, &rosters);
        params.team = "Some Other Team";

        let m = four_round_match("mnp-21-1-TWC-SSS", "Georgetown Pizza and Arcade");
        let log = normalize_matches(&[m], &params);
        assert!(!log.events.is_empty());
        assert!(log.events.iter().all(|ev| !ev.is_pick));
        assert!(log.events.iter().any(|ev| ev.is_pick_twc));
    }

    #[test]
    fn incomplete_and_empty_rows_are_dropped() {
        let aliases = MachineAliases::default();
        let limits = ScoreLimits::default();
        let rosters = RosterIndex::default();
        let params = base_params(&aliases, &limits, &rosters);

        let rounds = vec![RawRound {
            number: 2,
            games: vec![
                game(1, "Godzilla", false, [slot("aadams", 1.0), RawSlot::default(), RawSlot::default(), RawSlot::default()]),
                game(2, "", true, [slot("aadams", 1.0), RawSlot::default(), RawSlot::default(), RawSlot::default()]),
                game(
                    3,
                    "Cleopatra",
                    true,
                    [
                        slot("aadams", 0.0),
                        slot("", 9.0),
                        slot("stranger", 5.0),
                        slot("cchen", 7.0),
                    ],
                ),
            ],
        }];
        let m = stub_match("mnp-21-1-TWC-SSS", "Georgetown Pizza and Arcade", rounds);
        let log = normalize_matches(&[m], &params);

        // Only the known player with a nonzero score on a finished, named
        // machine survives.
        assert_eq!(log.events.len(), 1);
        assert_eq!(log.events[0].player, "Carol Chen");
        assert_eq!(log.events[0].machine, "cleopatra");
        assert_eq!(log.events[0].team, "Slippery Slopes");
        assert_eq!(log.events[0].team_points, 2.0);
    }

    #[test]
    fn score_caps_drop_only_the_offending_slot() {
        let aliases = MachineAliases::default();
        let mut caps = HashMap::new();
        caps.insert("cleopatra".to_string(), 1_000_000.0);
        let limits = ScoreLimits::new(caps);
        let rosters = RosterIndex::default();
        let params = base_params(&aliases, &limits, &rosters);

        let rounds = vec![RawRound {
            number: 3,
            games: vec![game(
                1,
                "Cleopatra",
                true,
                [
                    slot("aadams", 2_000_000.0),
                    slot("cchen", 900_000.0),
                    RawSlot::default(),
                    RawSlot::default(),
                ],
            )],
        }];
        let m = stub_match("mnp-21-1-TWC-SSS", "Georgetown Pizza and Arcade", rounds);
        let log = normalize_matches(&[m], &params);
        assert_eq!(log.events.len(), 1);
        assert_eq!(log.events[0].player, "Carol Chen");
    }

    #[test]
    fn roster_flag_uses_abbreviation_mapping() {
        let aliases = MachineAliases::default();
        let limits = ScoreLimits::default();
        let mut rosters_map = HashMap::new();
        rosters_map.insert(
            "TWC".to_string(),
            ["Alice Adams".to_string()].into_iter().collect(),
        );
        let mut abbrs = HashMap::new();
        abbrs.insert("The Wrecking Crew".to_string(), "TWC".to_string());
        let rosters = RosterIndex {
            rosters: rosters_map,
            abbreviations: abbrs,
        };
        let params = base_params(&aliases, &limits, &rosters);

        let m = four_round_match("mnp-21-1-TWC-SSS", "Georgetown Pizza and Arcade");
        let log = normalize_matches(&[m], &params);
        for ev in &log.events {
            assert_eq!(ev.is_roster_player, ev.player == "Alice Adams");
        }
    }

    #[test]
    fn recent_machines_track_newest_selected_season_at_venue() {
        let aliases = MachineAliases::default();
        let limits = ScoreLimits::default();
        let rosters = RosterIndex::default();
        let mut params = base_params(&aliases, &limits, &rosters);
        let included = vec!["Halloween".to_string()];
        let excluded = vec!["Pulp Fiction".to_string()];
        params.included_machines = &included;
        params.excluded_machines = &excluded;
        params.selected_seasons = &[20, 21];

        let old = four_round_match("mnp-20-1-TWC-SSS", "Georgetown Pizza and Arcade");
        let elsewhere = four_round_match("mnp-21-2-TWC-SSS", "Another Cafe");
        let mut current = four_round_match("mnp-21-3-TWC-SSS", "Georgetown Pizza and Arcade");
        // Not-yet-finished games still prove the machine is on the floor.
        current.rounds[0].games[0].machine = "Godzilla".to_string();
        current.rounds[0].games[0].done = false;

        let log = normalize_matches(&[old, elsewhere, current], &params);
        assert_eq!(log.recent_machines, vec!["godzilla", "halloween"]);
    }

    #[test]
    fn recent_machines_fall_back_to_corpus_max_season() {
        let aliases = MachineAliases::default();
        let limits = ScoreLimits::default();
        let rosters = RosterIndex::default();
        let params = base_params(&aliases, &limits, &rosters);

        let old = four_round_match("mnp-20-1-TWC-SSS", "Georgetown Pizza and Arcade");
        let mut current = four_round_match("mnp-21-3-TWC-SSS", "Georgetown Pizza and Arcade");
        current.rounds[0].games[0].machine = "Godzilla".to_string();

        let log = normalize_matches(&[old, current], &params);
        assert_eq!(log.recent_machines, vec!["godzilla", "pulp fiction"]);
    }

    #[test]
    fn machines_are_standardized_in_events() {
        let aliases = MachineAliases::from_pairs([("pulp fiction le", "pulp fiction")]);
        let limits = ScoreLimits::default();
        let rosters = RosterIndex::default();
        let params = base_params(&aliases, &limits, &rosters);

        let mut m = four_round_match("mnp-21-1-TWC-SSS", "Georgetown Pizza and Arcade");
        m.rounds[0].games[0].machine = "  Pulp Fiction LE ".to_string();
        let log = normalize_matches(&[m], &params);
        assert!(log.events.iter().all(|ev| ev.machine == ev.machine.to_lowercase()));
        assert!(log.events.iter().any(|ev| ev.machine == "pulp fiction"));
    }
}
