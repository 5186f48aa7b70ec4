use super::worker::{SessionExit, SessionWorker};
use super::GameContext;
use crate::channel::{Arrival, ArrivalSource, ParticipantChannel, Response};
use crate::config::GameConfig;
use crate::dice::DiceSource;
use crate::error::{DiceError, Result};
use crate::types::{Phase, SlotId};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::{self, Instant, MissedTickBehavior};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdmissionSummary {
    pub admitted: usize,
    pub rejected: usize,
    /// How each session worker ended, in completion order.
    pub sessions: Vec<(SlotId, SessionExit)>,
}

/// Seats arriving participants and starts the game once enough are present.
///
/// Runs until the session is terminal, then waits for every worker it
/// spawned. Arrivals after the start are turned away.
pub struct AdmissionManager {
    config: GameConfig,
    ctx: GameContext,
    source: Box<dyn ArrivalSource>,
    dice: Arc<dyn DiceSource>,
    workers: JoinSet<(SlotId, SessionExit)>,
    summary: AdmissionSummary,
    quorum_since: Option<Instant>,
}

impl AdmissionManager {
    pub fn new(
        config: GameConfig,
        ctx: GameContext,
        source: Box<dyn ArrivalSource>,
        dice: Arc<dyn DiceSource>,
    ) -> Self {
        Self {
            config,
            ctx,
            source,
            dice,
            workers: JoinSet::new(),
            summary: AdmissionSummary::default(),
            quorum_since: None,
        }
    }

    /// An arrival source failure is returned as
    /// [`DiceError::ResourceUnavailable`] once the workers have been closed
    /// down and joined.
    pub async fn run(mut self) -> Result<AdmissionSummary> {
        let mut ticker = time::interval(self.config.admission_poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            "Admission open: {}-{} players, polling every {:?}",
            self.config.min_players,
            self.config.max_players,
            self.config.admission_poll
        );

        let mut failure = None;
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.ctx.state.wait_until(|signal| signal.is_terminal()) => {}
            }

            if self.ctx.state.signal().is_terminal() {
                break;
            }

            let arrivals = match self.source.poll_arrivals().await {
                Ok(arrivals) => arrivals,
                Err(e) => {
                    tracing::error!("Arrival source failed: {}", e);
                    self.ctx
                        .journal
                        .record(format!("Admission stopped: {}", e));
                    failure = Some(DiceError::resource_unavailable(format!(
                        "arrival source failed: {}",
                        e
                    )));
                    break;
                }
            };

            for arrival in arrivals {
                self.admit(arrival).await;
            }

            if self.ctx.state.signal().phase == Phase::Lobby {
                self.maybe_start();
            }
        }

        if failure.is_some() {
            self.ctx.state.close();
        }
        self.join_workers().await;

        match failure {
            Some(e) => Err(e),
            None => Ok(self.summary),
        }
    }

    async fn admit(&mut self, arrival: Arrival) {
        let Arrival { name, mut channel } = arrival;

        let slot = match self.ctx.state.try_seat(&name) {
            Ok(slot) => slot,
            Err(e) => {
                self.summary.rejected += 1;
                tracing::info!("Rejected {}: {}", name, e);
                self.ctx.journal.record(format!("Rejected {}: {}", name, e));
                if let Err(send_err) = channel.send(Response::Rejected(e.to_string())).await {
                    tracing::debug!("Could not notify {}: {}", name, send_err);
                }
                return;
            }
        };

        channel.bind(slot);
        if let Err(e) = channel.send(Response::Seated(slot)).await {
            // No worker without a reachable participant.
            if let Err(unseat_err) = self.ctx.state.unseat(slot) {
                tracing::error!("Failed to roll back slot {}: {}", slot, unseat_err);
            }
            tracing::warn!("Admission of {} rolled back: {}", name, e);
            self.ctx
                .journal
                .record(format!("Admission of {} rolled back: {}", name, e));
            return;
        }

        let snapshot = self.ctx.state.read_snapshot();
        self.summary.admitted += 1;
        self.ctx.journal.record(format!(
            "Player {} connected: {} ({}/{})",
            slot + 1,
            name,
            snapshot.connected,
            snapshot.max_players
        ));
        tracing::info!("{} seated in slot {}", name, slot);

        let dice = self.dice.dice_for(slot, self.config.dice_faces);
        let worker = SessionWorker::new(slot, name, self.ctx.clone(), channel, dice);
        self.workers.spawn(async move { (slot, worker.run().await) });
    }

    fn maybe_start(&mut self) {
        let snapshot = self.ctx.state.read_snapshot();

        let ready = if snapshot.connected >= snapshot.max_players {
            true
        } else if snapshot.connected >= snapshot.min_players {
            let since = *self.quorum_since.get_or_insert_with(Instant::now);
            since.elapsed() >= self.config.grace_period
        } else {
            self.quorum_since = None;
            false
        };

        if !ready {
            return;
        }

        match self.ctx.state.begin() {
            Ok(first) => {
                let snapshot = self.ctx.state.read_snapshot();
                tracing::info!(
                    "Game started with {} players, slot {} goes first",
                    snapshot.connected,
                    first
                );
                self.ctx.journal.record(format!(
                    "Game started - {} players connected",
                    snapshot.connected
                ));
            }
            Err(e) => tracing::debug!("Could not start game yet: {}", e),
        }
    }

    async fn join_workers(&mut self) {
        while let Some(joined) = self.workers.join_next().await {
            match joined {
                Ok(exit) => self.summary.sessions.push(exit),
                Err(e) => tracing::error!("Session worker failed: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::memory::{lobby, SeatReply};
    use crate::channel::Request;
    use crate::dice::ScriptedDice;
    use crate::game::test_support::Fixture;
    use async_trait::async_trait;
    use std::time::Duration;

    fn manager(fixture: &Fixture, source: Box<dyn ArrivalSource>) -> AdmissionManager {
        AdmissionManager::new(
            fixture.config.clone(),
            fixture.ctx.clone(),
            source,
            Arc::new(ScriptedDice::new()),
        )
    }

    fn quick(min: usize, max: usize) -> GameConfig {
        GameConfig {
            admission_poll: Duration::from_millis(10),
            grace_period: Duration::from_secs(5),
            ..GameConfig::new(min, max, 20)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_house_starts_immediately() {
        let fixture = Fixture::new(quick(2, 3)).await;
        let (door, arrivals) = lobby();
        let task = tokio::spawn(manager(&fixture, Box::new(arrivals)).run());

        let mut handles = Vec::new();
        for name in ["Alice", "Bob", "Carol"] {
            let mut handle = door.knock(name).unwrap();
            assert!(matches!(handle.await_seat().await.unwrap(), SeatReply::Seated(_)));
            handles.push(handle);
        }

        let mut signals = fixture.ctx.state.subscribe();
        signals
            .wait_for(|s| s.phase == Phase::Active)
            .await
            .unwrap();

        let mut dave = door.knock("Dave").unwrap();
        assert!(matches!(
            dave.await_seat().await.unwrap(),
            SeatReply::Rejected(_)
        ));

        fixture.ctx.state.close();
        let summary = task.await.unwrap().unwrap();
        assert_eq!(summary.admitted, 3);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.sessions.len(), 3);

        let log = fixture.log_messages().await;
        assert_eq!(log[0], "Player 1 connected: Alice (1/3)");
        assert_eq!(log[2], "Player 3 connected: Carol (3/3)");
        assert_eq!(log[3], "Game started - 3 players connected");
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_period_admits_late_arrivals() {
        let fixture = Fixture::new(quick(2, 4)).await;
        let (door, arrivals) = lobby();
        let task = tokio::spawn(manager(&fixture, Box::new(arrivals)).run());

        let mut alice = door.knock("Alice").unwrap();
        let mut bob = door.knock("Bob").unwrap();
        alice.await_seat().await.unwrap();
        bob.await_seat().await.unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fixture.ctx.state.signal().phase, Phase::Lobby);

        let mut carol = door.knock("Carol").unwrap();
        assert_eq!(carol.await_seat().await.unwrap(), SeatReply::Seated(2));

        let mut signals = fixture.ctx.state.subscribe();
        signals
            .wait_for(|s| s.phase == Phase::Active)
            .await
            .unwrap();
        assert_eq!(fixture.ctx.state.read_snapshot().connected, 3);

        fixture.ctx.state.close();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_below_minimum_keeps_waiting() {
        let fixture = Fixture::new(quick(3, 4)).await;
        let (door, arrivals) = lobby();
        let task = tokio::spawn(manager(&fixture, Box::new(arrivals)).run());

        let mut alice = door.knock("Alice").unwrap();
        alice.await_seat().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fixture.ctx.state.signal().phase, Phase::Lobby);

        fixture.ctx.state.close();
        let summary = task.await.unwrap().unwrap();
        assert_eq!(summary.admitted, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_name_rejected() {
        let fixture = Fixture::new(quick(2, 3)).await;
        let (door, arrivals) = lobby();
        let task = tokio::spawn(manager(&fixture, Box::new(arrivals)).run());

        let mut first = door.knock("Alice").unwrap();
        first.await_seat().await.unwrap();
        let mut second = door.knock("Alice").unwrap();
        match second.await_seat().await.unwrap() {
            SeatReply::Rejected(reason) => assert!(reason.contains("Alice")),
            other => panic!("expected rejection, got {:?}", other),
        }

        fixture.ctx.state.close();
        task.await.unwrap().unwrap();
    }

    struct DeadChannel;

    #[async_trait]
    impl ParticipantChannel for DeadChannel {
        async fn recv(&mut self) -> Result<Request> {
            Err(DiceError::channel_fault(0, "never opened"))
        }

        async fn send(&mut self, _response: Response) -> Result<()> {
            Err(DiceError::channel_fault(0, "never opened"))
        }

        fn bind(&mut self, _slot: SlotId) {}
    }

    struct OneShot(Option<Vec<Arrival>>);

    #[async_trait]
    impl ArrivalSource for OneShot {
        async fn poll_arrivals(&mut self) -> Result<Vec<Arrival>> {
            Ok(self.0.take().unwrap_or_default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_participant_is_rolled_back() {
        let fixture = Fixture::new(quick(1, 2)).await;
        let source = OneShot(Some(vec![Arrival {
            name: "Ghost".to_string(),
            channel: Box::new(DeadChannel),
        }]));
        let task = tokio::spawn(manager(&fixture, Box::new(source)).run());

        tokio::time::sleep(Duration::from_secs(10)).await;
        let snapshot = fixture.ctx.state.read_snapshot();
        assert_eq!(snapshot.phase, Phase::Lobby);
        assert_eq!(snapshot.connected, 0);
        assert!(snapshot.slots.iter().all(|s| !s.active));

        fixture.ctx.state.close();
        let summary = task.await.unwrap().unwrap();
        assert_eq!(summary.admitted, 0);
        assert!(summary.sessions.is_empty());

        let log = fixture.log_messages().await;
        assert!(log[0].starts_with("Admission of Ghost rolled back"));
    }

    struct Broken;

    #[async_trait]
    impl ArrivalSource for Broken {
        async fn poll_arrivals(&mut self) -> Result<Vec<Arrival>> {
            Err(DiceError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "listener gone",
            )))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_failure_escalates() {
        let fixture = Fixture::new(quick(1, 2)).await;
        let result = manager(&fixture, Box::new(Broken)).run().await;

        assert!(matches!(result, Err(DiceError::ResourceUnavailable(_))));
        assert!(fixture.ctx.state.is_closed());
    }
}
