mod session;

use crate::config::GameConfig;
use crate::error::Result;
use crate::storage::Scoreboard;
use crate::types::{GameSnapshot, RollOutcome, SlotId, TurnSignal};
use parking_lot::Mutex;
use session::GameSession;
use tokio::sync::watch;

/// Single owner of the mutable game session.
///
/// Every operation takes the lock once, mutates in memory, publishes the new
/// [`TurnSignal`] and releases. No I/O happens under the lock; callers log
/// and reply after the operation returns.
pub struct SharedGameState {
    session: Mutex<GameSession>,
    signal: watch::Sender<TurnSignal>,
}

impl SharedGameState {
    pub fn new(config: &GameConfig, archive: Scoreboard) -> Result<Self> {
        config.validate()?;

        let session = GameSession::new(config, archive);
        let (signal, _) = watch::channel(session.signal());

        Ok(Self {
            session: Mutex::new(session),
            signal,
        })
    }

    fn mutate<T>(&self, op: impl FnOnce(&mut GameSession) -> Result<T>) -> Result<T> {
        let mut session = self.session.lock();
        let result = op(&mut session);

        // Published under the lock so receivers see signals in commit order.
        let next = session.signal();
        self.signal.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });

        result
    }

    pub fn try_seat(&self, name: &str) -> Result<SlotId> {
        let slot = self.mutate(|s| s.seat(name))?;
        tracing::debug!("Seated '{}' in slot {}", name, slot);
        Ok(slot)
    }

    pub fn unseat(&self, slot: SlotId) -> Result<()> {
        self.mutate(|s| s.unseat(slot))
    }

    /// `Lobby → Active`. Returns the slot holding the first turn.
    pub fn begin(&self) -> Result<SlotId> {
        self.mutate(|s| s.begin())
    }

    pub fn read_snapshot(&self) -> GameSnapshot {
        self.session.lock().snapshot()
    }

    pub fn record_roll(&self, slot: SlotId, delta: u32) -> Result<RollOutcome> {
        self.mutate(|s| s.record_roll(slot, delta))
    }

    pub fn advance_turn(&self) -> Result<SlotId> {
        self.mutate(|s| s.advance_turn())
    }

    /// Skip the current turn if it is still the one identified by `serial`.
    pub fn forfeit_turn(&self, serial: u64) -> Result<Option<SlotId>> {
        self.mutate(|s| s.forfeit_turn(serial))
    }

    pub fn mark_finished(&self, winner: SlotId) -> Result<bool> {
        self.mutate(|s| s.mark_finished(winner))
    }

    pub fn mark_disconnected(&self, slot: SlotId) -> Result<bool> {
        self.mutate(|s| s.mark_disconnected(slot))
    }

    /// Shutdown: every waiter observes a terminal signal.
    pub fn close(&self) -> bool {
        self.mutate(|s| Ok(s.close())).unwrap_or(false)
    }

    pub fn is_closed(&self) -> bool {
        self.signal.borrow().closed
    }

    pub fn signal(&self) -> TurnSignal {
        *self.signal.borrow()
    }

    /// Closures given to the receiver's `wait_for` must not call back into
    /// this state: the lock is held while signals are published.
    pub fn subscribe(&self) -> watch::Receiver<TurnSignal> {
        self.signal.subscribe()
    }

    /// Resolve once `slot` holds the turn or the session is over.
    pub async fn wait_for_turn(&self, slot: SlotId) -> TurnSignal {
        self.wait_until(|signal| signal.is_terminal() || signal.is_turn_of(slot))
            .await
    }

    /// Resolve with the first published signal matching `pred`, starting
    /// with the current one.
    pub async fn wait_until(&self, pred: impl FnMut(&TurnSignal) -> bool) -> TurnSignal {
        let mut rx = self.subscribe();
        let result = rx.wait_for(pred).await.map(|signal| *signal);
        // The sender lives as long as `self`.
        result.unwrap_or_else(|_| self.signal())
    }

    pub fn scoreboard(&self) -> Scoreboard {
        self.session.lock().scoreboard()
    }
}
