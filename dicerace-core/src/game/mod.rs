pub mod admission;
pub mod coordinator;
pub mod report;
pub mod scheduler;
pub mod worker;

pub use admission::{AdmissionManager, AdmissionSummary};
pub use coordinator::Coordinator;
pub use report::{GameOutcome, GameReport, ResultSummary};
pub use scheduler::TurnScheduler;
pub use worker::{SessionExit, SessionWorker};

use crate::journal::Journal;
use crate::state::SharedGameState;
use crate::storage::ScoreboardStore;
use std::sync::Arc;

/// Handles every game component is constructed with.
#[derive(Clone)]
pub struct GameContext {
    pub state: Arc<SharedGameState>,
    pub journal: Journal,
    pub scoreboard: Arc<ScoreboardStore>,
}

impl GameContext {
    pub fn new(
        state: Arc<SharedGameState>,
        journal: Journal,
        scoreboard: Arc<ScoreboardStore>,
    ) -> Self {
        Self {
            state,
            journal,
            scoreboard,
        }
    }

    /// Display name for a slot, for log lines.
    pub(crate) fn player_label(&self, slot: crate::types::SlotId) -> String {
        let snapshot = self.state.read_snapshot();
        match snapshot.slot(slot) {
            Some(s) => format!("Player {} ({})", slot + 1, s.display_name()),
            None => format!("Player {}", slot + 1),
        }
    }
}
