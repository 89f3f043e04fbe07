//! Settled-event export
//!
//! Each completed session is handed to an [`ExportSink`] as plain
//! `(name, buy_in, final)` rows. [`TrackSheet`] keeps a running table with a
//! column per player and a row per event, from which totals and per-event
//! averages are derived.

use crate::{
    error::{Error, Result},
    types::Session,
};
use chrono::NaiveDate;
use parking_lot::Mutex;
use potsplit_settlement::money::round2;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One player's result in an exported event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRow {
    /// Player name
    pub name: String,

    /// Buy-in
    pub buy_in: Decimal,

    /// Final amount (zero when never submitted)
    pub final_amount: Decimal,
}

impl ExportRow {
    /// Result for the event
    pub fn net(&self) -> Decimal {
        self.final_amount - self.buy_in
    }

    /// Rows for every player in a session
    pub fn from_session(session: &Session) -> Vec<Self> {
        session
            .players
            .iter()
            .map(|p| ExportRow {
                name: p.name.clone(),
                buy_in: p.buy_in_amount,
                final_amount: p.final_amount.unwrap_or(Decimal::ZERO),
            })
            .collect()
    }
}

/// Downstream sink for settled events
pub trait ExportSink: Send + Sync + std::fmt::Debug {
    /// Append one event
    fn append(&self, date: NaiveDate, rows: &[ExportRow]) -> Result<()>;
}

/// One event row of the tracking table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRow {
    /// Event date
    pub date: NaiveDate,

    /// Result per column; `None` for players absent that night
    pub results: Vec<Option<Decimal>>,
}

/// Running results table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackSheet {
    /// Column headers, in first-seen order
    pub players: Vec<String>,

    /// One row per exported event
    pub rows: Vec<TrackRow>,
}

impl TrackSheet {
    /// Column of `name`
    pub fn column(&self, name: &str) -> Option<usize> {
        self.players.iter().position(|p| p == name)
    }

    /// Add an event, creating columns for new names
    pub fn record(&mut self, date: NaiveDate, rows: &[ExportRow]) {
        for row in rows {
            if self.column(&row.name).is_none() {
                self.players.push(row.name.clone());
            }
        }

        let mut results = vec![None; self.players.len()];
        for row in rows {
            if let Some(col) = self.column(&row.name) {
                results[col] = Some(row.net());
            }
        }

        self.rows.push(TrackRow { date, results });
    }

    /// Sum per column
    pub fn totals(&self) -> Vec<Decimal> {
        (0..self.players.len())
            .map(|col| {
                self.rows
                    .iter()
                    .filter_map(|r| r.results.get(col).copied().flatten())
                    .sum()
            })
            .collect()
    }

    /// Total per column divided by the number of events, in cents
    pub fn averages(&self) -> Vec<Decimal> {
        if self.rows.is_empty() {
            return vec![Decimal::ZERO; self.players.len()];
        }
        let events = Decimal::from(self.rows.len());
        self.totals()
            .into_iter()
            .map(|total| round2(total / events))
            .collect()
    }
}

/// Sink keeping a [`TrackSheet`] in a JSON file
#[derive(Debug)]
pub struct SheetFileSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SheetFileSink {
    /// Sink writing to `path`; the file is created on first append
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    /// Current sheet contents
    pub fn load(&self) -> Result<TrackSheet> {
        match fs::read_to_string(&self.path) {
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TrackSheet::default()),
            Err(e) => Err(e.into()),
        }
    }
}

impl ExportSink for SheetFileSink {
    fn append(&self, date: NaiveDate, rows: &[ExportRow]) -> Result<()> {
        let _guard = self.lock.lock();

        let mut sheet = self
            .load()
            .map_err(|e| Error::Export(format!("failed to read {:?}: {}", self.path, e)))?;
        sheet.record(date, rows);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&sheet)?)?;
        fs::rename(&tmp, &self.path)?;

        tracing::info!(
            path = ?self.path,
            date = %date,
            players = rows.len(),
            events = sheet.rows.len(),
            "Exported settled event"
        );
        Ok(())
    }
}
