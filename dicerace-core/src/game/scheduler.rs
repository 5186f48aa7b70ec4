use super::GameContext;
use crate::types::{Phase, SlotId, TurnSignal};
use std::time::Duration;

/// Watches turn handovers: announces rounds, forfeits turns held past the
/// timeout and reports the winner once the session finishes. The winning
/// worker journals the game over line itself, right after its roll.
///
/// Rolls advance the turn themselves; the scheduler never races a worker
/// for a live turn because forfeits are compare-and-advance on the serial.
pub struct TurnScheduler {
    ctx: GameContext,
    turn_timeout: Option<Duration>,
}

impl TurnScheduler {
    pub fn new(ctx: GameContext, turn_timeout: Option<Duration>) -> Self {
        Self { ctx, turn_timeout }
    }

    /// Resolves with the winner, or `None` if the session was closed or
    /// abandoned first.
    pub async fn run(self) -> Option<SlotId> {
        let mut signals = self.ctx.state.subscribe();
        let mut announced_round = 0;

        loop {
            let signal = *signals.borrow_and_update();

            if signal.phase == Phase::Finished {
                self.announce_rounds(&mut announced_round, signal.round);
                return self.winner();
            }

            if signal.closed {
                tracing::info!("Scheduler stopping, session closed without a winner");
                return None;
            }

            if signal.phase == Phase::Active {
                self.announce_rounds(&mut announced_round, signal.round);
            }

            let deadline = match (signal.phase, self.turn_timeout) {
                (Phase::Active, Some(timeout)) => Some(timeout),
                _ => None,
            };

            tokio::select! {
                changed = signals.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
                _ = tokio::time::sleep(deadline.unwrap_or_default()), if deadline.is_some() => {
                    self.forfeit(signal);
                }
            }
        }
    }

    /// Signals coalesce, so several rounds may have passed since the last
    /// wake-up.
    fn announce_rounds(&self, announced: &mut u32, current: u32) {
        while *announced < current {
            *announced += 1;
            tracing::info!("Round {} begins", announced);
            self.ctx
                .journal
                .record(format!("Round {} begins", announced));
        }
    }

    fn forfeit(&self, stalled: TurnSignal) {
        let label = self.ctx.player_label(stalled.current_turn);

        match self.ctx.state.forfeit_turn(stalled.serial) {
            Ok(Some(next)) => {
                tracing::warn!("{} timed out, turn passes to slot {}", label, next);
                self.ctx.journal.record(format!(
                    "{} timed out; turn passes to {}",
                    label,
                    self.ctx.player_label(next)
                ));
            }
            Ok(None) => tracing::debug!("Turn moved before {} could be forfeited", label),
            Err(e) => tracing::debug!("Forfeit skipped: {}", e),
        }
    }

    fn winner(&self) -> Option<SlotId> {
        let snapshot = self.ctx.state.read_snapshot();
        let winner = snapshot.winner?;

        tracing::info!(
            "Game over, {} wins in round {}",
            snapshot.winner_name().unwrap_or("unknown"),
            snapshot.round
        );
        Some(winner)
    }
}
