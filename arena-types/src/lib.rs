pub mod errors;
pub mod evaluation;
pub mod messages;
pub mod player;
pub mod question;
pub mod session;

// Re-export all types
pub use errors::*;
pub use evaluation::*;
pub use messages::*;
pub use player::*;
pub use question::*;
pub use session::*;
