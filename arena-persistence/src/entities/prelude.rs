pub use super::leaderboard_entries::Entity as LeaderboardEntries;
pub use super::players::Entity as Players;
pub use super::questions::Entity as Questions;
pub use super::seen_questions::Entity as SeenQuestions;
