use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use mnp_strategist::advantage::{
    AdvantageLevel, AdvantageParams, MatchupAnalysis, analyze_matchup,
};
use mnp_strategist::assignment::{AssignmentOutcome, MatchFormat, plan_assignments};
use mnp_strategist::event_log::{NormalizeParams, NormalizedLog, normalize_matches};
use mnp_strategist::league_config::{RosterIndex, ScoreLimits};
use mnp_strategist::machine_names::MachineAliases;
use mnp_strategist::match_corpus::{self, RawMatch, parse_match_json};
use mnp_strategist::synthetic::SyntheticLeague;

const VENUE: &str = "Georgetown Pizza and Arcade";
const OWN: &str = "The Wrecking Crew";
const OPPONENT: &str = "Slippery Slopes";

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn fixture_matches() -> Vec<RawMatch> {
    ["mnp-21-7-TWC-SSS.json", "mnp-21-8-DSS-SSS.json"]
        .iter()
        .map(|name| parse_match_json(&read_fixture(name)).expect("fixture should parse"))
        .collect()
}

fn league_rosters() -> RosterIndex {
    let mut rosters = HashMap::new();
    rosters.insert(
        "SSS".to_string(),
        ["Carol Chen", "Dan Diaz", "Erin Evans", "Frank Ford"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    rosters.insert(
        "TWC".to_string(),
        ["Alice Adams", "Bob Burns", "Grace Gray", "Hank Hale"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    let mut abbreviations = HashMap::new();
    abbreviations.insert(OPPONENT.to_string(), "SSS".to_string());
    abbreviations.insert(OWN.to_string(), "TWC".to_string());
    RosterIndex {
        rosters,
        abbreviations,
    }
}

fn normalize(matches: &[RawMatch], rosters: &RosterIndex) -> NormalizedLog {
    let aliases = MachineAliases::default();
    let limits = ScoreLimits::default();
    normalize_matches(
        matches,
        &NormalizeParams {
            team: OPPONENT,
            twc_team: OWN,
            venue: VENUE,
            aliases: &aliases,
            score_limits: &limits,
            rosters,
            included_machines: &[],
            excluded_machines: &[],
            selected_seasons: &[21],
        },
    )
}

fn fixture_analysis() -> MatchupAnalysis {
    let matches = fixture_matches();
    let rosters = league_rosters();
    let log = normalize(&matches, &rosters);
    let aliases = MachineAliases::default();
    analyze_matchup(
        &log.events,
        &AdvantageParams {
            team: OWN,
            opponent: OPPONENT,
            venue: VENUE,
            selected_seasons: &[21],
            team_venue_specific: true,
            opponent_venue_specific: true,
            included_machines: &[],
            excluded_machines: &[],
            rosters: &rosters,
            aliases: &aliases,
        },
    )
}

fn approx(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() < 0.01
}

#[test]
fn matchup_board_ranks_machines_by_composite() {
    let analysis = fixture_analysis();

    // Halloween never finished a game, so only two machines have data.
    let machines: Vec<&str> = analysis.records.iter().map(|r| r.machine.as_str()).collect();
    assert_eq!(machines, vec!["pulp fiction", "godzilla"]);

    let pulp = &analysis.records[0];
    assert!(approx(pulp.team_pct_of_venue, 145.45));
    assert!(approx(pulp.opponent_pct_of_venue, 72.73));
    assert!(approx(pulp.statistical_advantage.unwrap(), 72.73));
    assert_eq!(pulp.team_plays, 2);
    assert_eq!(pulp.opponent_plays, 3);
    assert_eq!(pulp.experience_advantage, -1);
    assert!(approx(pulp.venue_average.unwrap(), 3_437_500.0));
    // Both sides have played it, so the edge reads plain, not strong.
    assert_eq!(pulp.level, AdvantageLevel::Team);
    assert_eq!(pulp.level.to_string(), "TWC Advantage");
    // 0.7 * 72.7273 statistical minus 1.2 experience penalty.
    assert!(approx(pulp.composite_score, 49.71));
    assert_eq!(
        pulp.top_team_players,
        vec!["Alice Adams", "Hank Hale", "Bob Burns"]
    );

    let godzilla = &analysis.records[1];
    assert_eq!(godzilla.level, AdvantageLevel::SlightOrNone);
    assert!(approx(godzilla.composite_score, 6.8));
    assert_eq!(godzilla.top_team_players, vec!["Grace Gray"]);
}

#[test]
fn player_stats_feed_the_planner() {
    let analysis = fixture_analysis();

    let alice = analysis
        .team_players
        .get("Alice Adams")
        .expect("Alice should have stats");
    let line = alice
        .machines
        .get("pulp fiction")
        .expect("Alice should have a Pulp Fiction line");
    assert_eq!(line.plays, 1);
    assert!(approx(line.pct_of_venue, 174.55));
    assert_eq!(line.rank_on_team, Some(1));
    assert!(approx(alice.overall_average_pct_of_venue, 174.55));
}

#[test]
fn singles_plan_maximizes_total_advantage() {
    let analysis = fixture_analysis();
    let available: Vec<String> = ["Alice Adams", "Bob Burns", "Grace Gray", "Hank Hale"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let plan = plan_assignments(&analysis, &available, MatchFormat::Singles, 2);

    assert_eq!(plan.outcome, AssignmentOutcome::Complete);
    assert_eq!(plan.picks.len(), 2);

    // Alice is best on both machines; the optimizer gives her Pulp
    // Fiction and hands Godzilla to Hank rather than doubling up.
    assert_eq!(plan.picks[0].machine, "pulp fiction");
    assert_eq!(plan.picks[0].players, vec!["Alice Adams"]);
    assert!(approx(plan.picks[0].score, 33.94));
    assert_eq!(plan.picks[1].machine, "godzilla");
    assert_eq!(plan.picks[1].players, vec!["Hank Hale"]);
    assert!(approx(plan.picks[1].score, 16.21));
}

#[test]
fn doubles_plan_pairs_best_two() {
    let analysis = fixture_analysis();
    let available: Vec<String> = ["Alice Adams", "Bob Burns", "Grace Gray", "Hank Hale"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let plan = plan_assignments(&analysis, &available, MatchFormat::Doubles, 1);
    assert_eq!(plan.outcome, AssignmentOutcome::Complete);
    assert_eq!(plan.picks.len(), 1);
    assert_eq!(plan.picks[0].machine, "pulp fiction");
    assert_eq!(plan.picks[0].players, vec!["Alice Adams", "Hank Hale"]);
    assert!(approx(plan.picks[0].score, 41.21));

    // Three doubles games needs six players; four are available.
    let short = plan_assignments(&analysis, &available, MatchFormat::Doubles, 3);
    assert_eq!(short.outcome, AssignmentOutcome::InsufficientPlayers);
    assert!(short.picks.is_empty());
}

#[test]
fn synthetic_league_plans_hold_assignment_invariants() {
    let league = SyntheticLeague::default();
    let matches = league.generate();
    let rosters = RosterIndex {
        rosters: match_corpus::team_rosters(&matches),
        abbreviations: match_corpus::team_abbreviations(&matches),
    };
    let aliases = MachineAliases::default();
    let limits = ScoreLimits::default();
    let log = normalize_matches(
        &matches,
        &NormalizeParams {
            team: "Death Save Society",
            twc_team: OWN,
            venue: VENUE,
            aliases: &aliases,
            score_limits: &limits,
            rosters: &rosters,
            included_machines: &[],
            excluded_machines: &[],
            selected_seasons: &[],
        },
    );
    assert!(!log.events.is_empty());
    assert!(!log.recent_machines.is_empty());

    let analysis = analyze_matchup(
        &log.events,
        &AdvantageParams {
            team: OWN,
            opponent: "Death Save Society",
            venue: VENUE,
            selected_seasons: &[],
            team_venue_specific: true,
            opponent_venue_specific: true,
            included_machines: &[],
            excluded_machines: &[],
            rosters: &rosters,
            aliases: &aliases,
        },
    );
    assert!(!analysis.records.is_empty());
    for pair in analysis.records.windows(2) {
        assert!(pair[0].composite_score >= pair[1].composite_score);
    }
    for record in &analysis.records {
        assert!(record.composite_score.is_finite());
        assert!((-100.0..=100.0).contains(&record.composite_score));
    }

    let abbr = rosters
        .abbreviations
        .get(OWN)
        .expect("own team should have an abbreviation");
    let mut available: Vec<String> = rosters
        .rosters
        .get(abbr)
        .expect("own team should have a roster")
        .iter()
        .cloned()
        .collect();
    available.sort();

    let singles = plan_assignments(&analysis, &available, MatchFormat::Singles, 4);
    assert_eq!(singles.outcome, AssignmentOutcome::Complete);
    assert_eq!(
        singles.picks.len(),
        4usize.min(analysis.records.len()).min(available.len())
    );
    let mut machines: Vec<&str> = singles.picks.iter().map(|p| p.machine.as_str()).collect();
    machines.sort_unstable();
    machines.dedup();
    assert_eq!(machines.len(), singles.picks.len());
    let mut players: Vec<&str> = singles
        .picks
        .iter()
        .flat_map(|p| p.players.iter().map(String::as_str))
        .collect();
    players.sort_unstable();
    players.dedup();
    assert_eq!(players.len(), singles.picks.len());

    let doubles = plan_assignments(&analysis, &available, MatchFormat::Doubles, 2);
    match doubles.outcome {
        AssignmentOutcome::Complete => {
            assert_eq!(doubles.picks.len(), 2);
            let mut names: Vec<&str> = doubles
                .picks
                .iter()
                .flat_map(|p| p.players.iter().map(String::as_str))
                .collect();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), 4);
        }
        AssignmentOutcome::InsufficientMachines => {
            assert!(analysis.records.len() < 2);
        }
        AssignmentOutcome::InsufficientPlayers => {
            panic!("six rostered players should cover two doubles games");
        }
    }
}
