use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::machine_names::MachineAliases;

/// Per-machine score caps, keyed by standardized machine name. A score
/// above the cap is dropped from analysis entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreLimits {
    limits: HashMap<String, f64>,
}

impl ScoreLimits {
    pub fn new(limits: HashMap<String, f64>) -> Self {
        Self { limits }
    }

    pub fn cap_for(&self, machine: &str) -> Option<f64> {
        self.limits.get(machine).copied()
    }

    pub fn exceeds(&self, machine: &str, score: f64) -> bool {
        self.cap_for(machine).is_some_and(|cap| score > cap)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VenueMachines {
    #[serde(default)]
    pub included: Vec<String>,
    #[serde(default)]
    pub excluded: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VenueMachineLists {
    venues: HashMap<String, VenueMachines>,
}

impl VenueMachineLists {
    pub fn new(venues: HashMap<String, VenueMachines>) -> Self {
        Self { venues }
    }

    pub fn included(&self, venue: &str) -> &[String] {
        self.venues
            .get(venue.trim())
            .map(|v| v.included.as_slice())
            .unwrap_or(&[])
    }

    pub fn excluded(&self, venue: &str) -> &[String] {
        self.venues
            .get(venue.trim())
            .map(|v| v.excluded.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RosterIndex {
    #[serde(default)]
    pub rosters: HashMap<String, HashSet<String>>,
    #[serde(default)]
    pub abbreviations: HashMap<String, String>,
}

impl RosterIndex {
    /// Any missing link in name -> abbreviation -> roster yields false.
    pub fn is_roster_player(&self, player: &str, team_full_name: &str) -> bool {
        let Some(abbr) = self.abbreviations.get(team_full_name) else {
            return false;
        };
        let Some(roster) = self.rosters.get(abbr) else {
            return false;
        };
        roster.contains(player)
    }

    pub fn roster_for_abbr(&self, abbr: &str) -> Option<&HashSet<String>> {
        self.rosters.get(abbr)
    }

    pub fn abbr_for(&self, team_full_name: &str) -> Option<&str> {
        self.abbreviations.get(team_full_name).map(|s| s.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeagueConfig {
    #[serde(default)]
    pub machine_aliases: HashMap<String, String>,
    #[serde(default)]
    pub score_limits: HashMap<String, f64>,
    #[serde(default)]
    pub venue_machines: HashMap<String, VenueMachines>,
    #[serde(default)]
    pub rosters: HashMap<String, HashSet<String>>,
    #[serde(default)]
    pub team_abbreviations: HashMap<String, String>,
}

impl LeagueConfig {
    // Missing or unreadable snapshots degrade to the empty default.
    pub fn load(path: &Path) -> Self {
        let Ok(raw) = fs::read_to_string(path) else {
            log::warn!("league config {} not readable, using defaults", path.display());
            return Self::default();
        };
        match serde_json::from_str::<Self>(&raw) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!("league config {}: {err}, using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self).context("serialize league config")?;
        fs::write(&tmp, json).context("write league config")?;
        fs::rename(&tmp, path).context("swap league config")?;
        Ok(())
    }

    pub fn aliases(&self) -> MachineAliases {
        MachineAliases::new(self.machine_aliases.clone())
    }

    pub fn limits(&self) -> ScoreLimits {
        let aliases = self.aliases();
        let limits = self
            .score_limits
            .iter()
            .map(|(machine, cap)| (aliases.standardize(machine), *cap))
            .collect();
        ScoreLimits::new(limits)
    }

    pub fn venue_lists(&self) -> VenueMachineLists {
        VenueMachineLists::new(self.venue_machines.clone())
    }

    pub fn roster_index(&self) -> RosterIndex {
        RosterIndex {
            rosters: self.rosters.clone(),
            abbreviations: self.team_abbreviations.clone(),
        }
    }
}

/// Accepts a range "20-21", a list "14,16,19", or a single season "19".
pub fn parse_seasons(raw: &str) -> Result<Vec<u32>> {
    let raw = raw.trim();
    if let Some((start, end)) = raw.split_once('-') {
        let start: u32 = start
            .trim()
            .parse()
            .with_context(|| format!("invalid season range start in {raw:?}"))?;
        let end: u32 = end
            .trim()
            .parse()
            .with_context(|| format!("invalid season range end in {raw:?}"))?;
        if start > end {
            return Err(anyhow!("season range {raw:?} runs backwards"));
        }
        return Ok((start..=end).collect());
    }
    if raw.contains(',') {
        return raw
            .split(',')
            .map(|s| {
                s.trim()
                    .parse::<u32>()
                    .with_context(|| format!("invalid season {s:?} in {raw:?}"))
            })
            .collect();
    }
    Ok(vec![
        raw.parse::<u32>()
            .with_context(|| format!("invalid season {raw:?}"))?,
    ])
}

pub fn season_range(seasons: &[u32]) -> Option<(u32, u32)> {
    let min = seasons.iter().copied().min()?;
    let max = seasons.iter().copied().max()?;
    Some((min, max))
}
