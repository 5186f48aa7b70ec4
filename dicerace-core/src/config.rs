use crate::error::{DiceError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Hard upper bound on seats, whatever the configuration asks for.
pub const MAX_CAPACITY: usize = 8;

/// Display names must fit the scoreboard's name column.
pub const MAX_NAME_LEN: usize = 20;

pub const DEFAULT_LOG_FILE: &str = "game.log";
pub const DEFAULT_SCORES_FILE: &str = "scores.txt";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub min_players: usize,
    pub max_players: usize,
    pub target_score: u32,
    pub dice_faces: u32,
    pub admission_poll: Duration,
    pub grace_period: Duration,
    pub turn_timeout: Option<Duration>,
    pub dice_seed: Option<u64>,
    pub log_path: PathBuf,
    pub scores_path: PathBuf,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_players: 3,
            max_players: 5,
            target_score: 20,
            dice_faces: 6,
            admission_poll: Duration::from_secs(1),
            grace_period: Duration::from_secs(5),
            turn_timeout: Some(Duration::from_secs(60)),
            dice_seed: None,
            log_path: PathBuf::from(DEFAULT_LOG_FILE),
            scores_path: PathBuf::from(DEFAULT_SCORES_FILE),
        }
    }
}

impl GameConfig {
    pub fn new(min_players: usize, max_players: usize, target_score: u32) -> Self {
        Self {
            min_players,
            max_players,
            target_score,
            ..Self::default()
        }
    }

    /// Rebase the journal and scoreboard files into `dir`.
    pub fn in_dir(mut self, dir: &Path) -> Self {
        self.log_path = dir.join(DEFAULT_LOG_FILE);
        self.scores_path = dir.join(DEFAULT_SCORES_FILE);
        self
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_players == 0 {
            return Err(DiceError::config("Minimum players must be at least 1"));
        }

        if self.min_players > self.max_players {
            return Err(DiceError::config(format!(
                "Minimum players ({}) exceeds maximum ({})",
                self.min_players, self.max_players
            )));
        }

        if self.max_players > MAX_CAPACITY {
            return Err(DiceError::config(format!(
                "Maximum players cannot exceed {}",
                MAX_CAPACITY
            )));
        }

        if self.target_score == 0 {
            return Err(DiceError::config("Target score must be greater than 0"));
        }

        if self.dice_faces == 0 {
            return Err(DiceError::config("Dice must have at least one face"));
        }

        if self.admission_poll.is_zero() {
            return Err(DiceError::config("Admission poll interval cannot be zero"));
        }

        if matches!(self.turn_timeout, Some(timeout) if timeout.is_zero()) {
            return Err(DiceError::config("Turn timeout cannot be zero"));
        }

        Ok(())
    }
}

pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(DiceError::invalid_name("name cannot be empty"));
    }

    if name.trim() != name {
        return Err(DiceError::invalid_name(format!(
            "'{}' has leading or trailing whitespace",
            name
        )));
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(DiceError::invalid_name(format!(
            "'{}' is longer than {} characters",
            name, MAX_NAME_LEN
        )));
    }

    if name.contains(['|', '/', '\\']) || name.chars().any(char::is_control) {
        return Err(DiceError::invalid_name(format!(
            "'{}' contains reserved characters",
            name
        )));
    }

    Ok(())
}
