pub mod evaluator;
pub mod interpreter;
pub mod match_state;
pub mod progression;
pub mod rewards;
pub mod scoring;

// Re-export main components
pub use evaluator::*;
pub use match_state::*;
pub use progression::*;
pub use rewards::*;
pub use scoring::*;
