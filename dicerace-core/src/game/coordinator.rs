use super::admission::{AdmissionManager, AdmissionSummary};
use super::report::{GameOutcome, GameReport};
use super::scheduler::TurnScheduler;
use super::GameContext;
use crate::channel::ArrivalSource;
use crate::config::GameConfig;
use crate::dice::DiceSource;
use crate::error::Result;
use crate::journal::{self, JournalGuard};
use crate::state::SharedGameState;
use crate::storage::ScoreboardStore;
use crate::types::SlotId;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinError;
use uuid::Uuid;

/// Owns one session from startup to shutdown.
///
/// Construction opens the journal and loads the scoreboard; [`Coordinator::run`]
/// starts admission and the scheduler, waits for the game to end or for the
/// shutdown future, then closes everything down in order.
pub struct Coordinator {
    id: Uuid,
    config: GameConfig,
    ctx: GameContext,
    journal_guard: JournalGuard,
}

enum Trigger {
    Scheduler(std::result::Result<Option<SlotId>, JoinError>),
    Admission(std::result::Result<Result<AdmissionSummary>, JoinError>),
    Interrupted,
}

impl Coordinator {
    /// Fails with [`crate::DiceError::ResourceUnavailable`] if the journal
    /// cannot be opened.
    pub async fn new(config: GameConfig) -> Result<Self> {
        config.validate()?;

        let (journal, journal_guard) = journal::start(&config.log_path).await?;
        let scoreboard = Arc::new(ScoreboardStore::new(&config.scores_path, journal.clone()));
        let archive = scoreboard.load_or_default().await;
        let state = Arc::new(SharedGameState::new(&config, archive)?);

        let id = Uuid::new_v4();
        journal.record("Server started - waiting for players");
        tracing::info!(
            "Game {} ready: {}-{} players, target {}",
            id,
            config.min_players,
            config.max_players,
            config.target_score
        );

        Ok(Self {
            id,
            config,
            ctx: GameContext::new(state, journal, scoreboard),
            journal_guard,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> Arc<SharedGameState> {
        self.ctx.state.clone()
    }

    pub async fn run<S, F>(
        self,
        source: S,
        dice: Arc<dyn DiceSource>,
        shutdown: F,
    ) -> Result<GameReport>
    where
        S: ArrivalSource + 'static,
        F: Future<Output = ()> + Send,
    {
        let Coordinator {
            id,
            config,
            ctx,
            journal_guard,
        } = self;

        let mut scheduler =
            tokio::spawn(TurnScheduler::new(ctx.clone(), config.turn_timeout).run());
        let mut admission = tokio::spawn(
            AdmissionManager::new(config.clone(), ctx.clone(), Box::new(source), dice).run(),
        );
        tokio::pin!(shutdown);

        let trigger = tokio::select! {
            result = &mut scheduler => Trigger::Scheduler(result),
            result = &mut admission => Trigger::Admission(result),
            _ = &mut shutdown => Trigger::Interrupted,
        };

        let interrupted = matches!(trigger, Trigger::Interrupted);
        if interrupted {
            tracing::info!("Shutdown requested");
            ctx.journal.record("Shutdown requested - closing game");
        }

        // Wakes every worker, the admission loop and the scheduler.
        ctx.state.close();

        let (winner, admission) = match trigger {
            Trigger::Scheduler(winner) => (winner, admission.await),
            Trigger::Admission(result) => (scheduler.await, result),
            Trigger::Interrupted => (scheduler.await, admission.await),
        };

        let winner = winner.unwrap_or_else(|e| {
            tracing::error!("Scheduler task failed: {}", e);
            None
        });

        let (admission, failure) = match admission {
            Ok(Ok(summary)) => (summary, None),
            Ok(Err(e)) => {
                if e.is_fatal() {
                    tracing::error!("Admission failed: {}", e);
                } else {
                    tracing::warn!("Admission stopped: {}", e);
                }
                ctx.journal.record(format!("Game aborted: {}", e));
                (AdmissionSummary::default(), Some(e.to_string()))
            }
            Err(e) => {
                tracing::error!("Admission task failed: {}", e);
                (AdmissionSummary::default(), Some(e.to_string()))
            }
        };

        let snapshot = ctx.state.read_snapshot();
        let outcome = match (winner.or(snapshot.winner), failure) {
            (Some(slot), _) => GameOutcome::Won {
                slot,
                name: snapshot.winner_name().unwrap_or_default().to_string(),
            },
            (None, Some(reason)) => GameOutcome::Failed(reason),
            (None, None) if interrupted => GameOutcome::Interrupted,
            (None, None) => GameOutcome::Abandoned,
        };

        let scoreboard = ctx.state.scoreboard();
        let scores_saved = ctx.scoreboard.persist(&scoreboard).await;

        tracing::info!("Game {} over: {}", id, outcome);
        ctx.journal.record("Server shutting down");
        drop(ctx);

        match journal_guard.shutdown().await {
            Ok(lines) => tracing::debug!("Journal closed after {} entries", lines),
            Err(e) => tracing::warn!("{}", e),
        }

        Ok(GameReport {
            game_id: id,
            outcome,
            snapshot,
            scoreboard,
            admission,
            scores_saved,
        })
    }
}
