//! Coordination core for a turn-based dice race.
//!
//! Participants are seated by the admission manager, take turns through
//! their own session worker and race to a target score. All mutable game
//! data lives in one [`SharedGameState`]; events go to an append-only
//! [`Journal`] and cumulative wins to a [`ScoreboardStore`].

pub mod channel;
pub mod config;
pub mod dice;
pub mod error;
pub mod game;
pub mod journal;
pub mod state;
pub mod storage;
pub mod types;

pub use channel::{Arrival, ArrivalSource, ParticipantChannel, Request, Response};
pub use config::{GameConfig, MAX_CAPACITY};
pub use dice::{DiceRoller, DiceSource, RandomDice, ScriptedDice};
pub use error::{DiceError, Result};
pub use game::{Coordinator, GameOutcome, GameReport, ResultSummary};
pub use journal::{Journal, JournalGuard};
pub use state::SharedGameState;
pub use storage::{Scoreboard, ScoreboardStore};
pub use types::{GameSnapshot, ParticipantSlot, Phase, SlotId};

#[cfg(test)]
mod tests {
    use super::*;
    use channel::memory::{lobby, ParticipantHandle, SeatReply};
    use futures::future::join_all;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;

    async fn play_until_closed(mut handle: ParticipantHandle) -> Vec<u32> {
        let mut rolls = Vec::new();
        if !matches!(handle.await_seat().await, Ok(SeatReply::Seated(_))) {
            return rolls;
        }
        while let Ok(value) = handle.roll().await {
            rolls.push(value);
        }
        rolls
    }

    #[tokio::test]
    async fn test_three_player_race_to_twenty() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let dir = tempdir().unwrap();
        let config = GameConfig {
            admission_poll: Duration::from_millis(10),
            turn_timeout: None,
            ..GameConfig::new(3, 3, 20)
        }
        .in_dir(dir.path());

        let coordinator = Coordinator::new(config.clone()).await.unwrap();
        let (door, arrivals) = lobby();
        let players: Vec<_> = ["Alice", "Bob", "Carol"]
            .iter()
            .map(|name| tokio::spawn(play_until_closed(door.knock(name).unwrap())))
            .collect();

        let dice = ScriptedDice::new()
            .with_script(0, vec![4, 4, 4, 4, 4])
            .with_script(1, vec![1])
            .with_script(2, vec![1]);
        let report = coordinator
            .run(arrivals, Arc::new(dice), std::future::pending())
            .await
            .unwrap();

        let rolls: Vec<Vec<u32>> = join_all(players)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(rolls[0], vec![4; 5]);
        assert_eq!(rolls[1], vec![1; 4]);
        assert_eq!(rolls[2], vec![1; 4]);

        assert_eq!(
            report.outcome,
            GameOutcome::Won {
                slot: 0,
                name: "Alice".to_string()
            }
        );
        assert_eq!(report.snapshot.phase, Phase::Finished);
        assert_eq!(report.snapshot.round, 5);
        let positions: Vec<u32> = report.snapshot.seated().map(|s| s.position).collect();
        assert_eq!(positions, vec![20, 4, 4]);
        assert_eq!(report.snapshot.slots[0].wins, 1);
        assert!(report.scores_saved);

        let summary = report.summary_for("Alice").unwrap();
        assert_eq!(summary.to_string().lines().last(), Some("Final Position: R20"));

        let table = std::fs::read_to_string(&config.scores_path).unwrap();
        let saved = Scoreboard::parse_table(&table).0;
        assert_eq!(saved.wins("Alice"), 1);
        assert_eq!(saved.wins("Bob"), 0);
        assert_eq!(saved.len(), 3);

        let log = std::fs::read_to_string(&config.log_path).unwrap();
        let messages: Vec<&str> = log
            .lines()
            .filter_map(|l| l.split_once("] ").map(|(_, m)| m))
            .collect();
        assert!(messages.contains(&"Game started - 3 players connected"));
        assert!(messages.contains(&"Round 5 begins"));
        assert!(messages.contains(&"Game Over! Alice wins!"));

        let roll_order: Vec<&str> = messages
            .iter()
            .filter(|m| m.contains(" rolled "))
            .map(|m| m.split(' ').next().unwrap_or(""))
            .collect();
        let expected: Vec<&str> = ["Alice", "Bob", "Carol"]
            .iter()
            .cycle()
            .take(13)
            .copied()
            .collect();
        assert_eq!(roll_order, expected);
    }

    #[tokio::test]
    async fn test_late_arrival_is_turned_away() {
        let dir = tempdir().unwrap();
        let config = GameConfig {
            admission_poll: Duration::from_millis(10),
            turn_timeout: None,
            ..GameConfig::new(2, 2, 6)
        }
        .in_dir(dir.path());

        let coordinator = Coordinator::new(config).await.unwrap();
        let state = coordinator.state();
        let (door, arrivals) = lobby();
        let alice = door.knock("Alice").unwrap();
        let bob = door.knock("Bob").unwrap();

        let run = tokio::spawn(coordinator.run(
            arrivals,
            Arc::new(ScriptedDice::new().with_script(0, vec![6])),
            std::future::pending(),
        ));

        let mut signals = state.subscribe();
        signals.wait_for(|s| s.phase == Phase::Active).await.unwrap();
        let mut dave = door.knock("Dave").unwrap();
        assert!(matches!(dave.await_seat().await, Ok(SeatReply::Rejected(_))));

        let players = join_all([
            tokio::spawn(play_until_closed(alice)),
            tokio::spawn(play_until_closed(bob)),
        ])
        .await;
        let report = run.await.unwrap().unwrap();

        assert_eq!(report.winner_name(), Some("Alice"));
        assert_eq!(report.admission.admitted, 2);
        assert_eq!(report.admission.rejected, 1);
        assert_eq!(players[0].as_ref().unwrap(), &vec![6]);
        assert!(players[1].as_ref().unwrap().is_empty());
    }
}
