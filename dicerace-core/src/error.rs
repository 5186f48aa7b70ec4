use crate::types::SlotId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DiceError>;

#[derive(Error, Debug)]
pub enum DiceError {
    #[error("Coordination resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("Game is full ({capacity} players maximum)")]
    CapacityExceeded { capacity: usize },

    #[error("Channel fault on slot {slot}: {reason}")]
    ChannelFault { slot: SlotId, reason: String },

    #[error("Scoreboard persistence error: {0}")]
    Persistence(String),

    #[error("Game journal is closed")]
    JournalClosed,

    #[error("Invalid display name: {0}")]
    InvalidName(String),

    #[error("Display name already taken: {0}")]
    NameTaken(String),

    #[error("Game is not active")]
    GameNotActive,

    #[error("Game already started")]
    AlreadyStarted,

    #[error("Not slot {slot}'s turn (current turn: slot {current})")]
    NotYourTurn { slot: SlotId, current: SlotId },

    #[error("Slot {0} is not seated")]
    SlotNotSeated(SlotId),

    #[error("Not enough players: {connected} connected, {required} required")]
    NotEnoughPlayers { connected: usize, required: usize },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DiceError {
    pub fn resource_unavailable(msg: impl Into<String>) -> Self {
        Self::ResourceUnavailable(msg.into())
    }

    pub fn channel_fault(slot: SlotId, reason: impl Into<String>) -> Self {
        Self::ChannelFault {
            slot,
            reason: reason.into(),
        }
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn invalid_name(msg: impl Into<String>) -> Self {
        Self::InvalidName(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Faults that make the shared coordination resource unusable and must
    /// be escalated to the coordinator.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ResourceUnavailable(_))
    }
}
