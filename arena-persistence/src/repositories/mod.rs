pub mod leaderboard_repository;
pub mod player_repository;
pub mod question_repository;

pub use leaderboard_repository::{LeaderboardRepository, RankedEntry};
pub use player_repository::PlayerRepository;
pub use question_repository::QuestionRepository;
