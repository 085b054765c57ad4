//! Flat-file CSV store for market snapshots
//!
//! One file, four columns (`market, current_oi, oiCap, fetched_at_utc`),
//! fully replaced on every save. Writes go through a temp file in the same
//! directory followed by a rename, so concurrent readers never observe a
//! partially written file.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use crate::markets::types::{MarketRecord, Snapshot};

pub const CSV_HEADER: [&str; 4] = ["market", "current_oi", "oiCap", "fetched_at_utc"];

/// Store error types
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("No snapshot file at {0}")]
    NotFound(PathBuf),

    #[error("Malformed snapshot file: {0}")]
    Parse(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// CSV-backed snapshot store bound to one file path
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize a snapshot, atomically replacing any prior file
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        // Unique temp file per call; concurrent saves must never share one.
        let tmp = tempfile::NamedTempFile::new_in(&parent)?;
        {
            let mut writer = csv::Writer::from_writer(tmp.as_file());
            writer.write_record(CSV_HEADER)?;
            for record in &snapshot.records {
                writer.write_record(&[
                    record.market.clone(),
                    decimal_field(record.current_oi),
                    decimal_field(record.oi_cap),
                    record
                        .fetched_at_utc
                        .to_rfc3339_opts(SecondsFormat::Secs, true),
                ])?;
            }
            writer.flush()?;
        }
        tmp.persist(&self.path)
            .map_err(|e| StoreError::Io(e.error))?;

        debug!(
            "Saved {} markets to {}",
            snapshot.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Read the persisted snapshot back
    pub fn load(&self) -> Result<Snapshot, StoreError> {
        if !self.path.exists() {
            return Err(StoreError::NotFound(self.path.clone()));
        }

        let mut reader = csv::Reader::from_path(&self.path)?;

        let headers = reader.headers()?.clone();
        if headers.iter().ne(CSV_HEADER) {
            return Err(StoreError::Parse(format!(
                "unexpected header row: {:?}",
                headers
            )));
        }

        let mut records = Vec::new();

        for row in reader.records() {
            let row = row?;
            if row.len() < 4 {
                return Err(StoreError::Parse(format!(
                    "expected 4 columns, got {}",
                    row.len()
                )));
            }

            let fetched_at_utc = DateTime::parse_from_rfc3339(&row[3])
                .map_err(|e| StoreError::Parse(format!("bad timestamp {:?}: {}", &row[3], e)))?
                .with_timezone(&Utc);

            records.push(MarketRecord {
                market: row[0].to_string(),
                current_oi: parse_decimal_field(&row[1])?,
                oi_cap: parse_decimal_field(&row[2])?,
                fetched_at_utc,
            });
        }

        // Every row of one snapshot carries the same fetch timestamp.
        if let Some(first) = records.first() {
            if records
                .iter()
                .any(|r| r.fetched_at_utc != first.fetched_at_utc)
            {
                return Err(StoreError::Parse(
                    "inconsistent fetched_at_utc across rows".to_string(),
                ));
            }
        }

        Ok(Snapshot::new(records))
    }
}

fn decimal_field(value: Option<Decimal>) -> String {
    value.map(|d| d.to_string()).unwrap_or_default()
}

fn parse_decimal_field(raw: &str) -> Result<Option<Decimal>, StoreError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    Decimal::from_str(raw)
        .map(Some)
        .map_err(|e| StoreError::Parse(format!("bad decimal {:?}: {}", raw, e)))
}
