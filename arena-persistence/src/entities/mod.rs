pub mod leaderboard_entries;
pub mod players;
pub mod prelude;
pub mod questions;
pub mod seen_questions;
