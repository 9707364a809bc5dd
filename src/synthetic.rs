use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::match_corpus::{RawGame, RawMatch, RawPlayer, RawRound, RawSlot, RawTeam};

/// Seeded archive-shaped corpus, identical on every run.
#[derive(Debug, Clone)]
pub struct SyntheticLeague {
    pub seed: u64,
    pub seasons: Vec<u32>,
    pub weeks_per_season: u32,
    pub team_count: usize,
    pub players_per_team: usize,
    pub machines_per_venue: usize,
}

impl Default for SyntheticLeague {
    fn default() -> Self {
        Self {
            seed: 7,
            seasons: vec![20, 21],
            weeks_per_season: 8,
            team_count: 6,
            players_per_team: 10,
            machines_per_venue: 8,
        }
    }
}

struct TeamSeed {
    name: String,
    key: String,
    venue: String,
    roster: Vec<RawPlayer>,
    skills: Vec<f64>,
}

struct MachineSeed {
    name: String,
    // Typical score magnitude; real machines differ by orders of magnitude.
    base: f64,
}

impl SyntheticLeague {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    pub fn generate(&self) -> Vec<RawMatch> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let machines = seed_machines(&mut rng);
        let teams = self.seed_teams(&mut rng);
        // Two teams per match; an odd count would leave someone idle.
        let n = (teams.len() / 2) * 2;
        if n < 2 {
            return Vec::new();
        }

        let mut matches = Vec::new();
        for &season in &self.seasons {
            let mut order: Vec<usize> = (0..n).collect();
            for week in 1..=self.weeks_per_season {
                for i in 0..n / 2 {
                    let (a, b) = (order[i], order[n - 1 - i]);
                    let (home, away) = if week % 2 == 0 { (a, b) } else { (b, a) };
                    matches.push(self.build_match(
                        season,
                        week,
                        &teams[home],
                        &teams[away],
                        &machines,
                        home,
                        &mut rng,
                    ));
                }
                // Circle-method rotation: team 0 stays put.
                order[1..].rotate_left(1);
            }
        }
        matches
    }

    fn seed_teams(&self, rng: &mut StdRng) -> Vec<TeamSeed> {
        let count = self.team_count.clamp(2, TEAM_NAMES.len());
        (0..count)
            .map(|t| {
                let name = TEAM_NAMES[t].to_string();
                let key = abbreviate(&name);
                let venue = VENUE_NAMES[t % VENUE_NAMES.len()].to_string();
                let size = self.players_per_team.max(8);
                let mut roster = Vec::with_capacity(size);
                let mut skills = Vec::with_capacity(size);
                for p in 0..size {
                    let first = FIRST_NAMES[(t + p) % FIRST_NAMES.len()];
                    let last = LAST_NAMES[(t * 3 + p) % LAST_NAMES.len()];
                    let initial = first
                        .chars()
                        .next()
                        .map(|c| c.to_ascii_lowercase())
                        .unwrap_or('x');
                    roster.push(RawPlayer {
                        name: format!("{first} {last}"),
                        key: format!("{initial}{}{t}", last.to_lowercase()),
                    });
                    skills.push(rng.gen_range(0.55..1.45));
                }
                TeamSeed {
                    name,
                    key,
                    venue,
                    roster,
                    skills,
                }
            })
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn build_match(
        &self,
        season: u32,
        week: u32,
        home: &TeamSeed,
        away: &TeamSeed,
        machines: &[MachineSeed],
        home_index: usize,
        rng: &mut StdRng,
    ) -> RawMatch {
        let key = format!("mnp-{season}-{week}-{}-{}", away.key, home.key);
        let home_lineup = pick_lineup(home, week);
        let away_lineup = pick_lineup(away, week);
        let venue_machines = venue_window(machines, home_index, self.machines_per_venue);

        let mut used = Vec::new();
        let mut rounds = Vec::new();
        for number in 1..=4u32 {
            let doubles = number == 1 || number == 4;
            let game_count: usize = if doubles { 2 } else { 4 };
            // Rounds 1 and 2 field the front half of the lineup, 3 and 4
            // the back half.
            let offset = if number <= 2 { 0 } else { 4 };
            let mut games = Vec::new();
            for g in 0..game_count {
                let machine = pick_machine(&venue_machines, &mut used, rng);
                let game = if doubles {
                    let hp = [&home_lineup[offset + 2 * g], &home_lineup[offset + 2 * g + 1]];
                    let ap = [&away_lineup[offset + 2 * g], &away_lineup[offset + 2 * g + 1]];
                    build_doubles_game(g as u32 + 1, machine, hp, ap, home, away, rng)
                } else {
                    build_singles_game(
                        g as u32 + 1,
                        machine,
                        &home_lineup[offset + g],
                        &away_lineup[offset + g],
                        home,
                        away,
                        rng,
                    )
                };
                games.push(game);
            }
            rounds.push(RawRound { number, games });
        }

        RawMatch {
            key,
            season,
            venue: home.venue.clone(),
            home: RawTeam {
                name: home.name.clone(),
                key: home.key.clone(),
                lineup: home_lineup,
            },
            away: RawTeam {
                name: away.name.clone(),
                key: away.key.clone(),
                lineup: away_lineup,
            },
            rounds,
        }
    }
}

fn seed_machines(rng: &mut StdRng) -> Vec<MachineSeed> {
    MACHINE_NAMES
        .iter()
        .map(|name| MachineSeed {
            name: name.to_string(),
            base: rng.gen_range(4.0..60.0) * 1_000_000.0,
        })
        .collect()
}

// Each venue carries an overlapping window of the machine pool.
fn venue_window<'a>(
    machines: &'a [MachineSeed],
    venue_index: usize,
    width: usize,
) -> Vec<&'a MachineSeed> {
    let width = width.clamp(4, machines.len());
    (0..width)
        .map(|i| &machines[(venue_index * 2 + i) % machines.len()])
        .collect()
}

fn pick_lineup(team: &TeamSeed, week: u32) -> Vec<RawPlayer> {
    let start = (week as usize * 3) % team.roster.len();
    (0..8)
        .map(|i| team.roster[(start + i) % team.roster.len()].clone())
        .collect()
}

fn pick_machine(
    venue_machines: &[&MachineSeed],
    used: &mut Vec<String>,
    rng: &mut StdRng,
) -> (String, f64) {
    for _ in 0..8 {
        let m = venue_machines[rng.gen_range(0..venue_machines.len())];
        if !used.contains(&m.name) {
            used.push(m.name.clone());
            return (m.name.clone(), m.base);
        }
    }
    let m = venue_machines[rng.gen_range(0..venue_machines.len())];
    (m.name.clone(), m.base)
}

fn roll_score(base: f64, skill: f64, rng: &mut StdRng) -> f64 {
    let raw = base * skill * rng.gen_range(0.35..1.9);
    (raw / 10.0).round() * 10.0
}

fn skill_of(team: &TeamSeed, player: &RawPlayer) -> f64 {
    team.roster
        .iter()
        .position(|p| p.key == player.key)
        .map(|i| team.skills[i])
        .unwrap_or(1.0)
}

// Doubles slots alternate home/away; the four scores split 5 points
// as 2.5 / 1.5 / 1.0 / 0.0 by rank.
fn build_doubles_game(
    number: u32,
    (machine, base): (String, f64),
    home_players: [&RawPlayer; 2],
    away_players: [&RawPlayer; 2],
    home: &TeamSeed,
    away: &TeamSeed,
    rng: &mut StdRng,
) -> RawGame {
    let mut slots: [RawSlot; 4] = Default::default();
    let order = [
        (home_players[0], home),
        (away_players[0], away),
        (home_players[1], home),
        (away_players[1], away),
    ];
    for (slot, (player, team)) in slots.iter_mut().zip(order.iter()) {
        slot.player = player.key.clone();
        slot.score = roll_score(base, skill_of(team, player), rng);
    }
    award_points(&mut slots, &[2.5, 1.5, 1.0, 0.0]);
    finish_game(number, machine, slots, rng)
}

fn build_singles_game(
    number: u32,
    (machine, base): (String, f64),
    home_player: &RawPlayer,
    away_player: &RawPlayer,
    home: &TeamSeed,
    away: &TeamSeed,
    rng: &mut StdRng,
) -> RawGame {
    let mut slots: [RawSlot; 4] = Default::default();
    slots[0].player = home_player.key.clone();
    slots[0].score = roll_score(base, skill_of(home, home_player), rng);
    slots[1].player = away_player.key.clone();
    slots[1].score = roll_score(base, skill_of(away, away_player), rng);
    award_points(&mut slots, &[2.0, 1.0]);
    finish_game(number, machine, slots, rng)
}

fn award_points(slots: &mut [RawSlot; 4], ladder: &[f64]) {
    let mut ranked: Vec<usize> = (0..slots.len())
        .filter(|&i| !slots[i].player.is_empty())
        .collect();
    ranked.sort_by(|&a, &b| {
        slots[b]
            .score
            .partial_cmp(&slots[a].score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for (rank, &slot) in ranked.iter().enumerate() {
        slots[slot].points = ladder.get(rank).copied().unwrap_or(0.0);
    }
}

fn finish_game(number: u32, machine: String, mut slots: [RawSlot; 4], rng: &mut StdRng) -> RawGame {
    let done = rng.gen_bool(0.96);
    if !done {
        // In-progress games have scores on the glass but no points yet.
        for slot in &mut slots {
            slot.points = 0.0;
        }
    }
    // Home fills the odd slot numbers, away the even ones.
    let home_points = if done {
        slots[0].points + slots[2].points
    } else {
        0.0
    };
    let away_points = if done {
        slots[1].points + slots[3].points
    } else {
        0.0
    };
    RawGame {
        number,
        machine,
        done,
        slots,
        home_points,
        away_points,
    }
}

fn abbreviate(name: &str) -> String {
    let mut abbr = String::new();
    for part in name.split_whitespace() {
        if let Some(ch) = part.chars().next() {
            abbr.push(ch);
        }
        if abbr.len() >= 3 {
            break;
        }
    }
    if abbr.len() >= 2 {
        abbr.to_uppercase()
    } else {
        name.trim().chars().take(3).collect::<String>().to_uppercase()
    }
}

const TEAM_NAMES: &[&str] = &[
    "The Wrecking Crew",
    "Death Save Society",
    "Free Play Legion",
    "Nudge Patrol",
    "Special When Lit",
    "Left Flipper Club",
    "Magic Post Crew",
    "Drain Theory",
];

const VENUE_NAMES: &[&str] = &[
    "Georgetown Pizza and Arcade",
    "Add-a-Ball",
    "Olaf's Pub",
    "Jupiter Bar",
    "Raygun Lounge",
    "Coindexter's",
];

const MACHINE_NAMES: &[&str] = &[
    "Pulp Fiction",
    "Godzilla",
    "Halloween",
    "Medieval Madness",
    "Attack From Mars",
    "Twilight Zone",
    "The Addams Family",
    "Cactus Canyon",
    "Iron Maiden",
    "Jurassic Park",
    "Deadpool",
    "Monster Bash",
    "Tron",
    "White Water",
];

const FIRST_NAMES: &[&str] = &[
    "Alice", "Bob", "Carol", "Dan", "Erin", "Frank", "Grace", "Hank", "Iris", "Jack", "Kara",
    "Liam",
];

const LAST_NAMES: &[&str] = &[
    "Adams", "Burns", "Chen", "Diaz", "Evans", "Ford", "Gray", "Hale", "Ito", "Jones", "Kim",
    "Lowe",
];
