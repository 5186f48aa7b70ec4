use serde::{Deserialize, Serialize};

/// Stable seat index, `0..capacity`.
pub type SlotId = usize;

/// Session-wide lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Lobby,
    Active,
    Finished,
}

impl Phase {
    fn rank(self) -> u8 {
        match self {
            Phase::Lobby => 0,
            Phase::Active => 1,
            Phase::Finished => 2,
        }
    }

    pub fn can_advance_to(self, next: Phase) -> bool {
        next.rank() == self.rank() + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSlot {
    pub id: SlotId,
    pub name: Option<String>,
    pub position: u32,
    pub active: bool,
    /// Set when the participant's channel faulted; turns skip this slot.
    pub disconnected: bool,
    pub wins: u32,
}

impl ParticipantSlot {
    pub fn empty(id: SlotId) -> Self {
        Self {
            id,
            name: None,
            position: 0,
            active: false,
            disconnected: false,
            wins: 0,
        }
    }

    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("Slot {} (Empty)", self.id + 1),
        }
    }

    /// Whether the turn pointer may land on this slot.
    pub fn can_take_turn(&self, target: u32) -> bool {
        self.active && !self.disconnected && self.position < target
    }
}

/// Immutable copy of the session, safe to inspect outside the lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub phase: Phase,
    pub closed: bool,
    pub current_turn: SlotId,
    pub round: u32,
    pub winner: Option<SlotId>,
    pub connected: usize,
    pub min_players: usize,
    pub max_players: usize,
    pub target_score: u32,
    pub slots: Vec<ParticipantSlot>,
}

impl GameSnapshot {
    pub fn seated(&self) -> impl Iterator<Item = &ParticipantSlot> {
        self.slots.iter().filter(|slot| slot.active)
    }

    pub fn slot(&self, id: SlotId) -> Option<&ParticipantSlot> {
        self.slots.get(id)
    }

    pub fn slot_by_name(&self, name: &str) -> Option<&ParticipantSlot> {
        self.seated().find(|slot| slot.name.as_deref() == Some(name))
    }

    pub fn winner_name(&self) -> Option<&str> {
        self.winner
            .and_then(|id| self.slots.get(id))
            .and_then(|slot| slot.name.as_deref())
    }
}

/// Result of a committed roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollOutcome {
    pub slot: SlotId,
    pub delta: u32,
    pub new_position: u32,
    pub became_winner: bool,
    pub next_turn: SlotId,
    pub round: u32,
}

/// What session workers and the scheduler wait on. Published after every
/// mutation that can change who may act.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnSignal {
    pub phase: Phase,
    pub closed: bool,
    pub current_turn: SlotId,
    pub round: u32,
    /// Bumped every time the turn is handed over, even back to the same slot.
    pub serial: u64,
}

impl TurnSignal {
    pub fn is_terminal(&self) -> bool {
        self.closed || self.phase == Phase::Finished
    }

    pub fn is_turn_of(&self, slot: SlotId) -> bool {
        !self.closed && self.phase == Phase::Active && self.current_turn == slot
    }
}
