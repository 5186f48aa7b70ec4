use super::admission::AdmissionSummary;
use crate::storage::Scoreboard;
use crate::types::{GameSnapshot, SlotId};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GameOutcome {
    Won { slot: SlotId, name: String },
    /// Every participant disconnected before anyone reached the target.
    Abandoned,
    /// Stopped by the operator.
    Interrupted,
    /// A shared resource failed mid-game.
    Failed(String),
}

impl fmt::Display for GameOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameOutcome::Won { name, .. } => write!(f, "{} wins", name),
            GameOutcome::Abandoned => f.write_str("abandoned"),
            GameOutcome::Interrupted => f.write_str("interrupted"),
            GameOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Everything known about a finished session.
#[derive(Debug, Clone, Serialize)]
pub struct GameReport {
    pub game_id: Uuid,
    pub outcome: GameOutcome,
    pub snapshot: GameSnapshot,
    #[serde(skip)]
    pub scoreboard: Scoreboard,
    #[serde(skip)]
    pub admission: AdmissionSummary,
    pub scores_saved: bool,
}

impl GameReport {
    pub fn winner_name(&self) -> Option<&str> {
        match &self.outcome {
            GameOutcome::Won { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn summary_for(&self, name: &str) -> Option<ResultSummary> {
        let slot = self.snapshot.slot_by_name(name)?;
        Some(ResultSummary {
            name: name.to_string(),
            winner: self.winner_name().map(str::to_string),
            total_wins: self.scoreboard.wins(name),
            final_position: slot.position,
        })
    }

    /// One summary per seated participant, in slot order.
    pub fn summaries(&self) -> Vec<ResultSummary> {
        self.snapshot
            .seated()
            .filter_map(|slot| slot.name.as_deref())
            .filter_map(|name| self.summary_for(name))
            .collect()
    }
}

/// What a participant takes home from a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultSummary {
    pub name: String,
    pub winner: Option<String>,
    pub total_wins: u32,
    pub final_position: u32,
}

impl fmt::Display for ResultSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Game Results for {}", self.name)?;
        writeln!(f, "Winner: {}", self.winner.as_deref().unwrap_or("none"))?;
        writeln!(f, "My Total Wins: {}", self.total_wins)?;
        writeln!(f, "Final Position: R{}", self.final_position)
    }
}
