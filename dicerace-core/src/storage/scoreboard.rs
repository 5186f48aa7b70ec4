use crate::config::MAX_NAME_LEN;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;

const BORDER: &str = "======================================";
const TITLE: &str = "Dice Game Results";
const TITLE_ROW: &str = "|           Dice Game Results        |";
const NAME_HEADER: &str = "Client Name";
const SCORE_HEADER: &str = "Score";

/// Cumulative wins keyed by display name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scoreboard {
    wins: BTreeMap<String, u32>,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wins(&self, name: &str) -> u32 {
        self.wins.get(name).copied().unwrap_or(0)
    }

    pub fn set(&mut self, name: impl Into<String>, wins: u32) {
        self.wins.insert(name.into(), wins);
    }

    pub fn len(&self) -> usize {
        self.wins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wins.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.wins.iter().map(|(name, wins)| (name.as_str(), *wins))
    }

    /// Render the fixed-width results table.
    pub fn to_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", BORDER);
        let _ = writeln!(out, "{}", TITLE_ROW);
        let _ = writeln!(out, "{}", BORDER);
        let _ = writeln!(
            out,
            "| {:<width$} | {:<10} |",
            NAME_HEADER,
            SCORE_HEADER,
            width = MAX_NAME_LEN
        );
        let _ = writeln!(out, "{}", BORDER);
        for (name, wins) in self.iter() {
            let _ = writeln!(out, "| {:<width$} | {:<10} |", name, wins, width = MAX_NAME_LEN);
        }
        let _ = writeln!(out, "{}", BORDER);
        out
    }

    /// Parse a table produced by [`Scoreboard::to_table`].
    ///
    /// Border, title and header rows are skipped, as are rows whose score
    /// column does not parse. Returns the board and the number of rows
    /// that were skipped as malformed.
    pub fn parse_table(content: &str) -> (Self, usize) {
        let mut board = Self::new();
        let mut skipped = 0;

        for line in content.lines() {
            let line = line.trim_end();
            if !line.starts_with('|') {
                continue;
            }

            let cells: Vec<&str> = line
                .trim_matches('|')
                .split('|')
                .map(str::trim)
                .collect();

            match cells.as_slice() {
                [title] if *title == TITLE => {}
                [name, score] if *name == NAME_HEADER && *score == SCORE_HEADER => {}
                [name, score] if !name.is_empty() => match score.parse::<u32>() {
                    Ok(wins) => board.set(*name, wins),
                    Err(_) => skipped += 1,
                },
                _ => skipped += 1,
            }
        }

        (board, skipped)
    }
}

impl FromIterator<(String, u32)> for Scoreboard {
    fn from_iter<I: IntoIterator<Item = (String, u32)>>(iter: I) -> Self {
        Self {
            wins: iter.into_iter().collect(),
        }
    }
}
