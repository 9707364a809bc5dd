use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct RawMatch {
    pub key: String,
    pub season: u32,
    pub venue: String,
    pub home: RawTeam,
    pub away: RawTeam,
    pub rounds: Vec<RawRound>,
}

#[derive(Debug, Clone)]
pub struct RawTeam {
    pub name: String,
    pub key: String,
    pub lineup: Vec<RawPlayer>,
}

#[derive(Debug, Clone)]
pub struct RawPlayer {
    pub name: String,
    pub key: String,
}

#[derive(Debug, Clone)]
pub struct RawRound {
    pub number: u32,
    pub games: Vec<RawGame>,
}

/// Up to four player slots; unused slots keep an empty key and zero score.
#[derive(Debug, Clone)]
pub struct RawGame {
    pub number: u32,
    pub machine: String,
    pub done: bool,
    pub slots: [RawSlot; 4],
    pub home_points: f64,
    pub away_points: f64,
}

#[derive(Debug, Clone, Default)]
pub struct RawSlot {
    pub player: String,
    pub score: f64,
    pub points: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Home,
    Away,
}

impl RawMatch {
    pub fn team(&self, side: Side) -> &RawTeam {
        match side {
            Side::Home => &self.home,
            Side::Away => &self.away,
        }
    }

    /// Which lineup a player key appears in, home side checked first.
    pub fn player_side(&self, key: &str) -> Option<Side> {
        if self.home.lineup.iter().any(|p| p.key == key) {
            return Some(Side::Home);
        }
        if self.away.lineup.iter().any(|p| p.key == key) {
            return Some(Side::Away);
        }
        None
    }

    pub fn player_name(&self, key: &str) -> String {
        self.home
            .lineup
            .iter()
            .chain(self.away.lineup.iter())
            .find(|p| p.key == key)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| key.to_string())
    }

    pub fn has_team(&self, team_name: &str) -> bool {
        let team_name = team_name.trim();
        self.home.name.trim() == team_name || self.away.name.trim() == team_name
    }
}

/// Malformed rounds, games and slots drop individually; only a match
/// missing its identity fields is rejected outright.
pub fn parse_match(v: &Value) -> Option<RawMatch> {
    let key = v.get("key")?.as_str()?.trim().to_string();
    let season = season_from_key(&key)?;
    let venue = v
        .get("venue")
        .and_then(|venue| venue.get("name"))
        .and_then(|name| name.as_str())?
        .trim()
        .to_string();
    let home = parse_team(v.get("home")?)?;
    let away = parse_team(v.get("away")?)?;

    let mut rounds = Vec::new();
    if let Some(raw_rounds) = v.get("rounds").and_then(|r| r.as_array()) {
        for raw_round in raw_rounds {
            let Some(number) = raw_round.get("n").and_then(as_u32_any) else {
                continue;
            };
            let mut games = Vec::new();
            if let Some(raw_games) = raw_round.get("games").and_then(|g| g.as_array()) {
                for raw_game in raw_games {
                    if let Some(game) = parse_game(raw_game) {
                        games.push(game);
                    }
                }
            }
            rounds.push(RawRound { number, games });
        }
    }

    Some(RawMatch {
        key,
        season,
        venue,
        home,
        away,
        rounds,
    })
}

pub fn parse_match_json(raw: &str) -> Result<RawMatch> {
    let value = serde_json::from_str::<Value>(raw.trim()).context("invalid match json")?;
    parse_match(&value).ok_or_else(|| anyhow!("match json missing identity fields"))
}

fn parse_team(v: &Value) -> Option<RawTeam> {
    let name = v.get("name")?.as_str()?.trim().to_string();
    let key = v
        .get("key")
        .and_then(|k| k.as_str())
        .unwrap_or_default()
        .trim()
        .to_string();
    let lineup = v
        .get("lineup")
        .and_then(|l| l.as_array())
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let player_key = entry.get("key")?.as_str()?.trim().to_string();
                    let player_name = entry
                        .get("name")
                        .and_then(|n| n.as_str())
                        .unwrap_or(&player_key)
                        .trim()
                        .to_string();
                    Some(RawPlayer {
                        name: player_name,
                        key: player_key,
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    Some(RawTeam { name, key, lineup })
}

fn parse_game(v: &Value) -> Option<RawGame> {
    let number = v.get("n").and_then(as_u32_any)?;
    let machine = v
        .get("machine")
        .and_then(|m| m.as_str())
        .unwrap_or_default()
        .to_string();
    let done = v.get("done").and_then(|d| d.as_bool()).unwrap_or(false);

    let mut slots: [RawSlot; 4] = Default::default();
    for (i, slot) in slots.iter_mut().enumerate() {
        let n = i + 1;
        slot.player = v
            .get(format!("player_{n}"))
            .and_then(|p| p.as_str())
            .unwrap_or_default()
            .trim()
            .to_string();
        slot.score = v
            .get(format!("score_{n}"))
            .and_then(as_f64_any)
            .unwrap_or(0.0);
        slot.points = v
            .get(format!("points_{n}"))
            .and_then(as_f64_any)
            .unwrap_or(0.0);
    }

    Some(RawGame {
        number,
        machine,
        done,
        slots,
        home_points: v.get("home_points").and_then(as_f64_any).unwrap_or(0.0),
        away_points: v.get("away_points").and_then(as_f64_any).unwrap_or(0.0),
    })
}

// Match keys look like mnp-21-7-TWC-SSS; the second token is the season.
fn season_from_key(key: &str) -> Option<u32> {
    key.split('-').nth(1)?.trim().parse::<u32>().ok()
}

fn as_u32_any(v: &Value) -> Option<u32> {
    if let Some(n) = v.as_u64() {
        return u32::try_from(n).ok();
    }
    v.as_str()?.trim().parse::<u32>().ok()
}

fn as_f64_any(v: &Value) -> Option<f64> {
    if let Some(n) = v.as_f64() {
        return Some(n);
    }
    v.as_str()?.trim().parse::<f64>().ok()
}

/// With no seasons requested every `season-*` directory present loads.
/// Unreadable files are logged and skipped.
pub fn load_archive(root: &Path, seasons: &[u32]) -> Result<Vec<RawMatch>> {
    let season_dirs = if seasons.is_empty() {
        discover_season_dirs(root)?
    } else {
        seasons
            .iter()
            .map(|s| root.join(format!("season-{s}")))
            .collect()
    };

    let mut matches = Vec::new();
    for dir in &season_dirs {
        let matches_dir = dir.join("matches");
        if !matches_dir.is_dir() {
            log::warn!("no matches directory under {}", dir.display());
            continue;
        }
        let mut files = Vec::new();
        collect_json_files(&matches_dir, &mut files)?;
        files.sort();
        for file in files {
            match load_match_file(&file) {
                Ok(m) => matches.push(m),
                Err(err) => log::warn!("skipping {}: {err}", file.display()),
            }
        }
    }

    if matches.is_empty() {
        return Err(anyhow!("no matches loaded from {}", root.display()));
    }
    log::info!(
        "loaded {} matches across {} season dirs from {}",
        matches.len(),
        season_dirs.len(),
        root.display()
    );
    Ok(matches)
}

fn load_match_file(path: &Path) -> Result<RawMatch> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("read match file {}", path.display()))?;
    parse_match_json(&raw)
}

fn discover_season_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(root).with_context(|| format!("read archive root {}", root.display()))?;
    let mut dirs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if path.is_dir() && name.starts_with("season-") {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn collect_json_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_json_files(&path, out)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("json") {
            out.push(path);
        }
    }
    Ok(())
}

pub fn team_abbreviations(matches: &[RawMatch]) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for m in matches {
        for team in [&m.home, &m.away] {
            if !team.name.is_empty() && !team.key.is_empty() {
                out.insert(team.name.clone(), team.key.clone());
            }
        }
    }
    out
}

/// Lineup-derived stand-in for a real roster table.
pub fn team_rosters(matches: &[RawMatch]) -> HashMap<String, HashSet<String>> {
    let mut out: HashMap<String, HashSet<String>> = HashMap::new();
    for m in matches {
        for team in [&m.home, &m.away] {
            if team.key.is_empty() {
                continue;
            }
            let roster = out.entry(team.key.clone()).or_default();
            for player in &team.lineup {
                roster.insert(player.name.clone());
            }
        }
    }
    out
}

pub fn venues(matches: &[RawMatch]) -> Vec<String> {
    let set: HashSet<&str> = matches.iter().map(|m| m.venue.as_str()).collect();
    let mut out: Vec<String> = set.into_iter().map(|s| s.to_string()).collect();
    out.sort();
    out
}

pub fn team_names(matches: &[RawMatch]) -> Vec<String> {
    let mut set = HashSet::new();
    for m in matches {
        set.insert(m.home.name.clone());
        set.insert(m.away.name.clone());
    }
    let mut out: Vec<String> = set.into_iter().collect();
    out.sort();
    out
}

pub fn seasons_present(matches: &[RawMatch]) -> Vec<u32> {
    let set: HashSet<u32> = matches.iter().map(|m| m.season).collect();
    let mut out: Vec<u32> = set.into_iter().collect();
    out.sort_unstable();
    out
}

pub fn max_season(matches: &[RawMatch]) -> Option<u32> {
    matches.iter().map(|m| m.season).max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn match_value() -> Value {
        json!({
            "key": "mnp-21-7-TWC-SSS",
            "venue": {"name": "Georgetown Pizza and Arcade", "key": "GPA"},
            "home": {
                "name": "Slippery Slopes",
                "key": "SSS",
                "lineup": [
                    {"name": "Carol Chen", "key": "cchen"},
                    {"name": "Dan Diaz", "key": "ddiaz"}
                ]
            },
            "away": {
                "name": "The Wrecking Crew",
                "key": "TWC",
                "lineup": [
                    {"name": "Alice Adams", "key": "aadams"},
                    {"name": "Bob Burns", "key": "bburns"}
                ]
            },
            "rounds": [
                {"n": 1, "games": [
                    {"n": 1, "machine": "Pulp Fiction", "done": true,
                     "player_1": "aadams", "score_1": 5_000_000,
                     "player_2": "cchen", "score_2": 3_000_000,
                     "points_1": 2.5, "points_2": 0,
                     "home_points": 0, "away_points": 5}
                ]},
                {"n": 2, "games": [
                    {"n": 7, "machine": "Godzilla", "done": false}
                ]}
            ]
        })
    }

    #[test]
    fn parses_full_match() {
        let m = parse_match(&match_value()).unwrap();
        assert_eq!(m.key, "mnp-21-7-TWC-SSS");
        assert_eq!(m.season, 21);
        assert_eq!(m.venue, "Georgetown Pizza and Arcade");
        assert_eq!(m.home.key, "SSS");
        assert_eq!(m.away.lineup.len(), 2);
        assert_eq!(m.rounds.len(), 2);

        let game = &m.rounds[0].games[0];
        assert_eq!(game.machine, "Pulp Fiction");
        assert!(game.done);
        assert_eq!(game.slots[0].player, "aadams");
        assert_eq!(game.slots[0].score, 5_000_000.0);
        assert_eq!(game.slots[0].points, 2.5);
        assert_eq!(game.slots[2].player, "");
        assert_eq!(game.away_points, 5.0);
    }

    #[test]
    fn season_comes_from_second_key_token() {
        assert_eq!(season_from_key("mnp-21-7-TWC-SSS"), Some(21));
        assert_eq!(season_from_key("mnp-9-1-AAA-BBB"), Some(9));
        assert_eq!(season_from_key("badkey"), None);
        assert_eq!(season_from_key("mnp-x-1-AAA-BBB"), None);
    }

    #[test]
    fn missing_identity_fields_reject_match() {
        let mut v = match_value();
        v.as_object_mut().unwrap().remove("venue");
        assert!(parse_match(&v).is_none());
        assert!(parse_match_json("{}").is_err());
    }

    #[test]
    fn lineup_lookups() {
        let m = parse_match(&match_value()).unwrap();
        assert_eq!(m.player_side("aadams"), Some(Side::Away));
        assert_eq!(m.player_side("cchen"), Some(Side::Home));
        assert_eq!(m.player_side("nobody"), None);
        assert_eq!(m.player_name("bburns"), "Bob Burns");
        assert_eq!(m.player_name("ghost"), "ghost");
    }

    #[test]
    fn corpus_enumerations() {
        let m = parse_match(&match_value()).unwrap();
        let corpus = vec![m];
        let abbrs = team_abbreviations(&corpus);
        assert_eq!(abbrs.get("The Wrecking Crew").map(String::as_str), Some("TWC"));
        assert_eq!(abbrs.get("Slippery Slopes").map(String::as_str), Some("SSS"));
        assert_eq!(venues(&corpus), vec!["Georgetown Pizza and Arcade"]);
        assert_eq!(seasons_present(&corpus), vec![21]);
        assert_eq!(max_season(&corpus), Some(21));

        let rosters = team_rosters(&corpus);
        assert!(rosters["TWC"].contains("Alice Adams"));
        assert!(rosters["SSS"].contains("Dan Diaz"));
    }
}
