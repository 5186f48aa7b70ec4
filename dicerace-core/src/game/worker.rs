use super::GameContext;
use crate::channel::{ParticipantChannel, Request, Response};
use crate::dice::DiceRoller;
use crate::error::{DiceError, Result};
use crate::types::SlotId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExit {
    /// The session finished or was closed.
    GameOver,
    /// The participant's channel faulted.
    Disconnected,
}

/// Drives one seated participant: waits for its turn, serves its roll
/// request, commits the outcome and replies.
pub struct SessionWorker {
    slot: SlotId,
    name: String,
    ctx: GameContext,
    channel: Box<dyn ParticipantChannel>,
    dice: Box<dyn DiceRoller>,
    /// A roll request that arrived after the turn was taken away. Served on
    /// the participant's next turn.
    pending: Option<Request>,
}

impl SessionWorker {
    pub fn new(
        slot: SlotId,
        name: impl Into<String>,
        ctx: GameContext,
        channel: Box<dyn ParticipantChannel>,
        dice: Box<dyn DiceRoller>,
    ) -> Self {
        Self {
            slot,
            name: name.into(),
            ctx,
            channel,
            dice,
            pending: None,
        }
    }

    pub async fn run(mut self) -> SessionExit {
        tracing::info!("Session worker for {} started in slot {}", self.name, self.slot);

        let exit = loop {
            let signal = self.ctx.state.wait_for_turn(self.slot).await;
            if signal.is_terminal() {
                break SessionExit::GameOver;
            }

            match self.take_turn().await {
                Ok(()) => {}
                Err(e @ DiceError::ChannelFault { .. }) => {
                    self.disconnect(&e);
                    break SessionExit::Disconnected;
                }
                Err(e) => {
                    // Turn moved or the game ended between wake-up and commit.
                    tracing::debug!("{} lost the turn: {}", self.name, e);
                }
            }
        };

        tracing::info!("Session worker for {} exiting ({:?})", self.name, exit);
        exit
    }

    async fn take_turn(&mut self) -> Result<()> {
        let request = match self.pending.take() {
            Some(request) => request,
            None => {
                let slot = self.slot;
                tokio::select! {
                    request = self.channel.recv() => request?,
                    _ = self.ctx.state.wait_until(|signal| !signal.is_turn_of(slot)) => {
                        tracing::debug!("Turn left slot {} before a roll arrived", slot);
                        return Ok(());
                    }
                }
            }
        };

        match request {
            Request::Roll => self.roll().await,
            Request::Other(tag) => {
                tracing::debug!("Ignoring '{}' from {}", tag, self.name);
                Ok(())
            }
        }
    }

    async fn roll(&mut self) -> Result<()> {
        let delta = self.dice.roll();

        let outcome = match self.ctx.state.record_roll(self.slot, delta) {
            Ok(outcome) => outcome,
            Err(e @ DiceError::NotYourTurn { .. }) => {
                self.pending = Some(Request::Roll);
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        // Committed: log lines, reply and persist all happen even if the
        // reply fails, the fault is reported afterwards.
        self.ctx.journal.record(format!(
            "{} rolled {} (position {})",
            self.name, delta, outcome.new_position
        ));
        tracing::debug!(
            "{} rolled {} -> {} (round {})",
            self.name,
            delta,
            outcome.new_position,
            outcome.round
        );

        let board = outcome.became_winner.then(|| self.ctx.state.scoreboard());
        if let Some(board) = &board {
            self.ctx.journal.record(format!(
                "{} reached {} (total wins: {})",
                self.name,
                outcome.new_position,
                board.wins(&self.name)
            ));
            self.ctx
                .journal
                .record(format!("Game Over! {} wins!", self.name));
        }

        let reply = self.channel.send(Response::Rolled(delta)).await;

        if let Some(board) = &board {
            self.ctx.scoreboard.persist(board).await;
        }

        reply
    }

    fn disconnect(&self, fault: &DiceError) {
        tracing::warn!("{} disconnected: {}", self.name, fault);
        self.ctx
            .journal
            .record(format!("{} disconnected: {}", self.name, fault));

        match self.ctx.state.mark_disconnected(self.slot) {
            Ok(true) => {
                tracing::warn!("Every player disconnected, abandoning game");
                self.ctx
                    .journal
                    .record("All players disconnected - game abandoned");
            }
            Ok(false) => {}
            Err(e) => tracing::warn!("Failed to mark slot {} disconnected: {}", self.slot, e),
        }
    }
}
