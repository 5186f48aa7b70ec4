use crate::GameArgs;
use comfy_table::{presets::UTF8_FULL, Table};
use dicerace_core::channel::memory::{lobby, ParticipantHandle, SeatReply};
use dicerace_core::config::DEFAULT_SCORES_FILE;
use dicerace_core::{Coordinator, GameConfig, GameOutcome, GameReport, RandomDice, Scoreboard};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

fn build_config(
    data_dir: &Path,
    args: &GameArgs,
) -> Result<GameConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => GameConfig::load(path)?,
        None => GameConfig::default().in_dir(data_dir),
    };

    if let Some(min) = args.min {
        config.min_players = min;
    }
    if let Some(max) = args.max {
        config.max_players = max;
    }
    if let Some(target) = args.target {
        config.target_score = target;
    }
    if let Some(secs) = args.grace_secs {
        config.grace_period = Duration::from_secs(secs);
    }
    if let Some(secs) = args.turn_timeout_secs {
        config.turn_timeout = (secs > 0).then(|| Duration::from_secs(secs));
    }
    if args.seed.is_some() {
        config.dice_seed = args.seed;
    }

    config.validate()?;
    Ok(config)
}

/// Every name gets a seat or an explicit rejection, so fewer names than the
/// minimum would leave the lobby waiting forever.
fn check_roster(
    config: &GameConfig,
    names: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    if names.len() < config.min_players {
        return Err(format!(
            "{} player(s) given but at least {} are needed to start",
            names.len(),
            config.min_players
        )
        .into());
    }
    Ok(())
}

fn scores_path(
    data_dir: &Path,
    config: Option<&Path>,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    Ok(match config {
        Some(path) => GameConfig::load(path)?.scores_path,
        None => data_dir.join(DEFAULT_SCORES_FILE),
    })
}

/// A simulated participant: waits for a seat, then rolls whenever it can
/// until the session hangs up.
async fn simulate_player(mut handle: ParticipantHandle) -> Option<Vec<u32>> {
    match handle.await_seat().await {
        Ok(SeatReply::Seated(slot)) => {
            tracing::debug!("{} seated in slot {}", handle.name(), slot);
        }
        Ok(SeatReply::Rejected(reason)) => {
            println!("{} was turned away: {}", handle.name(), reason);
            return None;
        }
        Err(e) => {
            tracing::warn!("{} never got a seat: {}", handle.name(), e);
            return None;
        }
    }

    let mut rolls = Vec::new();
    while let Ok(value) = handle.roll().await {
        tracing::debug!("{} rolled {}", handle.name(), value);
        rolls.push(value);
    }
    Some(rolls)
}

async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

pub async fn play(
    data_dir: &Path,
    names: &[String],
    args: &GameArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(data_dir, args)?;
    check_roster(&config, names)?;
    let dice = Arc::new(RandomDice::new(config.dice_seed));

    let coordinator = Coordinator::new(config.clone()).await?;
    println!("Game ID: {}", coordinator.id());
    println!(
        "Waiting for {}-{} players, first to {} wins",
        config.min_players, config.max_players, config.target_score
    );

    let (door, arrivals) = lobby();
    let mut players = Vec::new();
    for name in names {
        let handle = door.knock(name)?;
        players.push(tokio::spawn(simulate_player(handle)));
    }

    let report = coordinator.run(arrivals, dice, interrupted()).await?;

    for (name, joined) in names.iter().zip(join_all(players).await) {
        match joined {
            Ok(Some(rolls)) => tracing::debug!("{} rolled {} times", name, rolls.len()),
            Ok(None) => {}
            Err(e) => tracing::warn!("Player task for {} failed: {}", name, e),
        }
    }

    write_results(data_dir, &report).await?;
    print_standings(&report);

    match &report.outcome {
        GameOutcome::Won { name, .. } => println!("Winner: {}", name),
        GameOutcome::Abandoned => println!("Game abandoned: every player disconnected"),
        GameOutcome::Interrupted => println!("Game interrupted"),
        GameOutcome::Failed(reason) => return Err(reason.clone().into()),
    }

    if !report.scores_saved {
        println!(
            "Warning: scores could not be saved to {}",
            config.scores_path.display()
        );
    }

    Ok(())
}

async fn write_results(
    data_dir: &Path,
    report: &GameReport,
) -> Result<(), Box<dyn std::error::Error>> {
    tokio::fs::create_dir_all(data_dir).await?;

    for summary in report.summaries() {
        let path = data_dir.join(format!("result_{}.txt", summary.name));
        tokio::fs::write(&path, summary.to_string()).await?;
        tracing::info!("Wrote {}", path.display());
    }

    Ok(())
}

fn print_standings(report: &GameReport) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Slot", "Player", "Position", "Total Wins", "Status"]);

    for slot in &report.snapshot.slots {
        let status = if !slot.active {
            "-".to_string()
        } else if report.snapshot.winner == Some(slot.id) {
            "Winner".to_string()
        } else if slot.disconnected {
            "Disconnected".to_string()
        } else {
            "Playing".to_string()
        };

        table.add_row(vec![
            (slot.id + 1).to_string(),
            slot.display_name(),
            format!("{}/{}", slot.position, report.snapshot.target_score),
            slot.wins.to_string(),
            status,
        ]);
    }

    println!("Round {}", report.snapshot.round);
    println!("{}", table);
}

pub async fn show_scores(
    data_dir: &Path,
    config: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = scores_path(data_dir, config)?;

    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            println!("No scores recorded yet");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let (board, skipped) = Scoreboard::parse_table(&content);
    if skipped > 0 {
        tracing::warn!("Skipped {} malformed rows in {}", skipped, path.display());
    }

    let mut rows: Vec<(&str, u32)> = board.iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Player", "Wins"]);
    for (name, wins) in rows {
        table.add_row(vec![name.to_string(), wins.to_string()]);
    }

    println!("{}", table);
    Ok(())
}

pub fn show_config(data_dir: &Path, args: &GameArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(data_dir, args)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
