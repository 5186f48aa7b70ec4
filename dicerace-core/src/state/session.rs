use crate::config::{validate_name, GameConfig};
use crate::error::{DiceError, Result};
use crate::storage::Scoreboard;
use crate::types::{GameSnapshot, ParticipantSlot, Phase, RollOutcome, SlotId, TurnSignal};

/// The session record guarded by [`super::SharedGameState`].
///
/// Every method here runs inside the single critical section, so each one
/// must leave the record consistent on every return path.
#[derive(Debug)]
pub(crate) struct GameSession {
    slots: Vec<ParticipantSlot>,
    phase: Phase,
    closed: bool,
    current_turn: SlotId,
    round: u32,
    winner: Option<SlotId>,
    connected: usize,
    min_players: usize,
    target_score: u32,
    serial: u64,
    archive: Scoreboard,
}

impl GameSession {
    pub(crate) fn new(config: &GameConfig, archive: Scoreboard) -> Self {
        Self {
            slots: (0..config.max_players).map(ParticipantSlot::empty).collect(),
            phase: Phase::Lobby,
            closed: false,
            current_turn: 0,
            round: 1,
            winner: None,
            connected: 0,
            min_players: config.min_players,
            target_score: config.target_score,
            serial: 0,
            archive,
        }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn seated_slot(&self, slot: SlotId) -> Result<&ParticipantSlot> {
        self.slots
            .get(slot)
            .filter(|s| s.active)
            .ok_or(DiceError::SlotNotSeated(slot))
    }

    fn ensure_active(&self) -> Result<()> {
        if self.closed || self.phase != Phase::Active {
            return Err(DiceError::GameNotActive);
        }
        Ok(())
    }

    pub(crate) fn seat(&mut self, name: &str) -> Result<SlotId> {
        if self.closed || self.phase == Phase::Finished {
            return Err(DiceError::GameNotActive);
        }

        validate_name(name)?;

        if self.connected >= self.capacity() {
            return Err(DiceError::CapacityExceeded {
                capacity: self.capacity(),
            });
        }

        if self.phase != Phase::Lobby {
            return Err(DiceError::AlreadyStarted);
        }

        if self
            .slots
            .iter()
            .any(|s| s.active && s.name.as_deref() == Some(name))
        {
            return Err(DiceError::NameTaken(name.to_string()));
        }

        let id = self
            .slots
            .iter()
            .position(|s| !s.active)
            .ok_or(DiceError::CapacityExceeded {
                capacity: self.capacity(),
            })?;

        self.slots[id] = ParticipantSlot {
            id,
            name: Some(name.to_string()),
            position: 0,
            active: true,
            disconnected: false,
            wins: self.archive.wins(name),
        };
        self.connected += 1;

        if !self.slots[self.current_turn].active || id < self.current_turn {
            self.current_turn = id;
        }

        Ok(id)
    }

    /// Undo a seat whose worker never started. Only legal in the lobby.
    pub(crate) fn unseat(&mut self, slot: SlotId) -> Result<()> {
        if self.phase != Phase::Lobby {
            return Err(DiceError::AlreadyStarted);
        }
        self.seated_slot(slot)?;

        self.slots[slot] = ParticipantSlot::empty(slot);
        self.connected -= 1;

        if slot == self.current_turn {
            self.current_turn = self.slots.iter().position(|s| s.active).unwrap_or(0);
        }

        Ok(())
    }

    pub(crate) fn begin(&mut self) -> Result<SlotId> {
        if self.closed {
            return Err(DiceError::GameNotActive);
        }

        if self.phase != Phase::Lobby {
            return Err(DiceError::AlreadyStarted);
        }

        if self.connected < self.min_players {
            return Err(DiceError::NotEnoughPlayers {
                connected: self.connected,
                required: self.min_players,
            });
        }

        let target = self.target_score;
        let first = self
            .slots
            .iter()
            .position(|s| s.can_take_turn(target))
            .or_else(|| self.slots.iter().position(|s| s.active))
            .ok_or(DiceError::NotEnoughPlayers {
                connected: 0,
                required: self.min_players,
            })?;

        self.transition(Phase::Active)?;
        self.current_turn = first;
        self.round = 1;
        self.serial += 1;

        if !self.slots[first].can_take_turn(target) {
            // Everyone left before the first turn.
            self.closed = true;
        }

        Ok(first)
    }

    pub(crate) fn record_roll(&mut self, slot: SlotId, delta: u32) -> Result<RollOutcome> {
        self.ensure_active()?;
        let position = self.seated_slot(slot)?.position;

        if self.current_turn != slot {
            return Err(DiceError::NotYourTurn {
                slot,
                current: self.current_turn,
            });
        }

        if position >= self.target_score {
            return Err(DiceError::GameNotActive);
        }

        let new_position = position.saturating_add(delta).min(self.target_score);
        let became_winner = new_position >= self.target_score;
        if became_winner {
            self.finish(slot)?;
        }
        self.slots[slot].position = new_position;

        let next_turn = if became_winner { slot } else { self.advance() };

        Ok(RollOutcome {
            slot,
            delta,
            new_position,
            became_winner,
            next_turn,
            round: self.round,
        })
    }

    pub(crate) fn advance_turn(&mut self) -> Result<SlotId> {
        self.ensure_active()?;
        Ok(self.advance())
    }

    /// Advance only if nobody has moved the turn since `serial` was observed.
    pub(crate) fn forfeit_turn(&mut self, serial: u64) -> Result<Option<SlotId>> {
        self.ensure_active()?;
        if self.serial != serial {
            return Ok(None);
        }
        Ok(Some(self.advance()))
    }

    /// Returns `false` when a winner was already fixed; the first winner stands.
    pub(crate) fn mark_finished(&mut self, winner: SlotId) -> Result<bool> {
        if self.phase == Phase::Finished {
            return Ok(false);
        }
        self.ensure_active()?;
        self.seated_slot(winner)?;

        self.finish(winner)?;
        Ok(true)
    }

    /// Returns `true` if the session was abandoned because nobody is left
    /// who can take a turn.
    pub(crate) fn mark_disconnected(&mut self, slot: SlotId) -> Result<bool> {
        self.seated_slot(slot)?;
        if self.slots[slot].disconnected {
            return Ok(false);
        }
        self.slots[slot].disconnected = true;
        self.serial += 1;

        if self.closed || self.phase != Phase::Active {
            return Ok(false);
        }

        let target = self.target_score;
        if !self.slots.iter().any(|s| s.can_take_turn(target)) {
            self.closed = true;
            return Ok(true);
        }

        if self.current_turn == slot {
            self.advance();
        }

        Ok(false)
    }

    /// Returns `false` if already closed.
    pub(crate) fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        self.serial += 1;
        true
    }

    /// Phases only move forward, one step at a time.
    fn transition(&mut self, next: Phase) -> Result<()> {
        if !self.phase.can_advance_to(next) {
            return Err(match self.phase {
                Phase::Lobby => DiceError::GameNotActive,
                _ => DiceError::AlreadyStarted,
            });
        }
        self.phase = next;
        Ok(())
    }

    fn finish(&mut self, winner: SlotId) -> Result<()> {
        self.transition(Phase::Finished)?;
        self.winner = Some(winner);
        self.slots[winner].wins += 1;
        self.serial += 1;
        Ok(())
    }

    /// Hand the turn to the next slot in ascending order, wrapping modulo
    /// capacity. Crossing back over the current index completes a round.
    fn advance(&mut self) -> SlotId {
        let capacity = self.capacity();
        let current = self.current_turn;
        let target = self.target_score;

        let next = (1..=capacity)
            .map(|step| (current + step) % capacity)
            .find(|&idx| self.slots[idx].can_take_turn(target));

        if let Some(next) = next {
            if next <= current {
                self.round += 1;
            }
            self.current_turn = next;
        }

        self.serial += 1;
        self.current_turn
    }

    pub(crate) fn signal(&self) -> TurnSignal {
        TurnSignal {
            phase: self.phase,
            closed: self.closed,
            current_turn: self.current_turn,
            round: self.round,
            serial: self.serial,
        }
    }

    pub(crate) fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            phase: self.phase,
            closed: self.closed,
            current_turn: self.current_turn,
            round: self.round,
            winner: self.winner,
            connected: self.connected,
            min_players: self.min_players,
            max_players: self.capacity(),
            target_score: self.target_score,
            slots: self.slots.clone(),
        }
    }

    /// Names loaded at startup, overlaid with the current roster's totals.
    pub(crate) fn scoreboard(&self) -> Scoreboard {
        let mut board = self.archive.clone();
        for slot in self.slots.iter().filter(|s| s.active) {
            if let Some(name) = &slot.name {
                board.set(name.clone(), slot.wins);
            }
        }
        board
    }
}
