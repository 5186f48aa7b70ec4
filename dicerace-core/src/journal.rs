//! Durable game log.
//!
//! Any number of producers push entries onto an unbounded queue; a single
//! consumer task owns the log file and appends one line per entry in dequeue
//! order. Producers never wait on the file.

use crate::error::{DiceError, Result};
use chrono::{DateTime, Local};
use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// ctime-style, e.g. `Fri Oct 16 20:05:11 2026`.
const TIMESTAMP_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub message: String,
}

impl LogEntry {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            message: message.into(),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "[{}] {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.message
        )
    }
}

/// Producer handle. Cheap to clone; one per component.
#[derive(Debug, Clone)]
pub struct Journal {
    tx: mpsc::UnboundedSender<LogEntry>,
}

impl Journal {
    /// Queue an entry. If the consumer is gone the entry is dropped and the
    /// fault reported on the process's own diagnostics, never back into the
    /// journal.
    pub fn record(&self, message: impl Into<String>) {
        if let Err(e) = self.try_record(message) {
            tracing::warn!("Dropped journal entry: {}", e);
        }
    }

    pub fn try_record(&self, message: impl Into<String>) -> Result<()> {
        let entry = LogEntry::new(message);
        tracing::debug!(target: "dicerace_core::journal", "{}", entry.message);
        self.tx.send(entry).map_err(|_| DiceError::JournalClosed)
    }
}

/// Owns the consumer task. Dropping it without [`JournalGuard::shutdown`]
/// still lets the consumer drain and exit.
pub struct JournalGuard {
    close: oneshot::Sender<()>,
    handle: JoinHandle<usize>,
}

impl JournalGuard {
    /// Raise the "no more entries" signal and wait for the consumer to write
    /// out everything already queued. Returns the number of lines written.
    pub async fn shutdown(self) -> Result<usize> {
        let _ = self.close.send(());
        self.handle
            .await
            .map_err(|e| DiceError::resource_unavailable(format!("Journal task failed: {}", e)))
    }
}

/// Open (or create) the log in append mode and start its consumer.
pub async fn start(path: &Path) -> Result<(Journal, JournalGuard)> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            DiceError::resource_unavailable(format!(
                "Failed to create log directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| {
            DiceError::resource_unavailable(format!(
                "Failed to open log {}: {}",
                path.display(),
                e
            ))
        })?;

    let (tx, rx) = mpsc::unbounded_channel();
    let (close_tx, close_rx) = oneshot::channel();
    let handle = tokio::spawn(consume(file, rx, close_rx));

    tracing::debug!("Journal writing to {}", path.display());

    Ok((
        Journal { tx },
        JournalGuard {
            close: close_tx,
            handle,
        },
    ))
}

async fn consume(
    mut file: File,
    mut rx: mpsc::UnboundedReceiver<LogEntry>,
    mut close: oneshot::Receiver<()>,
) -> usize {
    let mut written = 0;

    loop {
        tokio::select! {
            biased;

            entry = rx.recv() => match entry {
                Some(entry) => written += append(&mut file, &entry).await,
                None => break,
            },
            _ = &mut close => {
                rx.close();
                while let Some(entry) = rx.recv().await {
                    written += append(&mut file, &entry).await;
                }
                break;
            }
        }
    }

    if let Err(e) = file.sync_all().await {
        tracing::warn!("Failed to sync journal: {}", e);
    }

    tracing::debug!("Journal consumer stopped after {} entries", written);
    written
}

async fn append(file: &mut File, entry: &LogEntry) -> usize {
    let mut line = entry.render();
    line.push('\n');

    let result = async {
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
    .await;

    match result {
        Ok(()) => 1,
        Err(e) => {
            tracing::error!("Failed to append journal entry: {}", e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn messages(content: &str) -> Vec<String> {
        content
            .lines()
            .map(|line| {
                let (_, message) = line.split_once("] ").expect("timestamp prefix");
                message.to_string()
            })
            .collect()
    }

    #[test]
    fn test_entry_format() {
        let entry = LogEntry::new("Player 1 connected");
        let rendered = entry.render();
        assert!(rendered.starts_with('['));
        assert!(rendered.ends_with("] Player 1 connected"));
    }

    #[tokio::test]
    async fn test_shutdown_drains_queued_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("game.log");
        let (journal, guard) = start(&path).await.unwrap();

        for i in 0..100 {
            journal.record(format!("entry {}", i));
        }

        assert_eq!(guard.shutdown().await.unwrap(), 100);

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let expected: Vec<String> = (0..100).map(|i| format!("entry {}", i)).collect();
        assert_eq!(messages(&content), expected);

        assert!(matches!(
            journal.try_record("too late"),
            Err(DiceError::JournalClosed)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_per_producer_order_preserved() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("game.log");
        let (journal, guard) = start(&path).await.unwrap();

        let mut producers = Vec::new();
        for producer in 0..4 {
            let journal = journal.clone();
            producers.push(tokio::spawn(async move {
                for seq in 0..50 {
                    journal.record(format!("p{} {}", producer, seq));
                    if seq % 7 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            }));
        }
        for producer in producers {
            producer.await.unwrap();
        }
        guard.shutdown().await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let lines = messages(&content);
        assert_eq!(lines.len(), 200);

        for producer in 0..4 {
            let prefix = format!("p{} ", producer);
            let seqs: Vec<u32> = lines
                .iter()
                .filter_map(|l| l.strip_prefix(&prefix))
                .map(|s| s.parse().unwrap())
                .collect();
            assert_eq!(seqs, (0..50).collect::<Vec<_>>());
        }
    }

    #[tokio::test]
    async fn test_appends_to_existing_log() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("game.log");

        let (journal, guard) = start(&path).await.unwrap();
        journal.record("first run");
        guard.shutdown().await.unwrap();

        let (journal, guard) = start(&path).await.unwrap();
        journal.record("second run");
        guard.shutdown().await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(messages(&content), vec!["first run", "second run"]);
    }

    #[tokio::test]
    async fn test_unwritable_location_is_resource_unavailable() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        let result = start(&blocker.join("game.log")).await;
        assert!(matches!(result, Err(DiceError::ResourceUnavailable(_))));
    }
}
