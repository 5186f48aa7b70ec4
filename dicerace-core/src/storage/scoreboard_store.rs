use crate::error::{DiceError, Result};
use crate::journal::Journal;
use crate::storage::Scoreboard;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Durable cumulative win counts, stored as a flat text table.
///
/// Loads and saves are serialized through the store's own lock, independent
/// of the game state lock.
pub struct ScoreboardStore {
    path: Mutex<PathBuf>,
    journal: Journal,
}

impl ScoreboardStore {
    pub fn new(path: &Path, journal: Journal) -> Self {
        Self {
            path: Mutex::new(path.to_path_buf()),
            journal,
        }
    }

    /// A missing file means a fresh scoreboard. Unreadable files surface as
    /// [`DiceError::Persistence`] so the caller can decide how to degrade.
    pub async fn load(&self) -> Result<Scoreboard> {
        let path = self.path.lock().await;

        let content = match tokio::fs::read_to_string(&*path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.journal.record(format!(
                    "No previous scores found at {}. Starting fresh.",
                    path.display()
                ));
                tracing::info!("No scoreboard at {}, starting fresh", path.display());
                return Ok(Scoreboard::new());
            }
            Err(e) => {
                return Err(DiceError::persistence(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let (board, skipped) = Scoreboard::parse_table(&content);
        if skipped > 0 {
            tracing::warn!(
                "Skipped {} malformed scoreboard rows in {}",
                skipped,
                path.display()
            );
            self.journal.record(format!(
                "Ignored {} malformed rows while loading scores",
                skipped
            ));
        }

        tracing::info!("Loaded {} scoreboard entries from {}", board.len(), path.display());
        Ok(board)
    }

    /// Same as [`ScoreboardStore::load`] but degrades any fault to an empty
    /// board with a logged warning.
    pub async fn load_or_default(&self) -> Scoreboard {
        match self.load().await {
            Ok(board) => board,
            Err(e) => {
                tracing::warn!("{}; starting from zero", e);
                self.journal
                    .record(format!("Could not load scores ({}); starting from zero", e));
                Scoreboard::new()
            }
        }
    }

    /// Overwrite the whole table. Written to a sibling file first and renamed
    /// into place so readers never see a half-written table.
    pub async fn save(&self, board: &Scoreboard) -> Result<()> {
        let path = self.path.lock().await;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                DiceError::persistence(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let staging = path.with_extension("tmp");
        tokio::fs::write(&staging, board.to_table())
            .await
            .map_err(|e| DiceError::persistence(format!("Failed to write scores: {}", e)))?;
        tokio::fs::rename(&staging, &*path)
            .await
            .map_err(|e| DiceError::persistence(format!("Failed to replace scores: {}", e)))?;

        tracing::info!("Scores saved to {} ({} entries)", path.display(), board.len());
        Ok(())
    }

    /// Save, reporting failure to the journal instead of the caller.
    pub async fn persist(&self, board: &Scoreboard) -> bool {
        match self.save(board).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("{}", e);
                self.journal.record(format!("Failed to save scores: {}", e));
                false
            }
        }
    }
}
