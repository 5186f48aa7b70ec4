pub mod scoreboard;
pub mod scoreboard_store;

pub use scoreboard::Scoreboard;
pub use scoreboard_store::ScoreboardStore;
