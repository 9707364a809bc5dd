//! Monday-night pinball league analysis and match planning: an archive of
//! head-to-head matches goes in, machine stat tables, matchup advantage
//! boards and player assignment plans come out.

pub mod advantage;
pub mod assignment;
pub mod event_log;
pub mod league_config;
pub mod machine_names;
pub mod machine_stats;
pub mod match_corpus;
pub mod synthetic;
