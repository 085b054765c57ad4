//! Type definitions for market snapshots

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fetcher error types
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Unexpected response shape: {0}")]
    Payload(String),
}

/// One market row of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRecord {
    /// Market identifier (symbol when the API provides one)
    pub market: String,

    /// Current open interest; `None` when the source fields are absent or unparseable
    pub current_oi: Option<Decimal>,

    /// Open-interest cap; `None` when absent or unparseable
    #[serde(rename = "oiCap")]
    pub oi_cap: Option<Decimal>,

    /// Fetch timestamp, identical for every record of one snapshot
    pub fetched_at_utc: DateTime<Utc>,
}

/// One complete, timestamp-consistent batch of market records.
///
/// Ordering follows the API response (or the persisted file) and is never
/// changed after construction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub records: Vec<MarketRecord>,
}

impl Snapshot {
    pub fn new(records: Vec<MarketRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Shared fetch timestamp, `None` for an empty snapshot
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.records.first().map(|r| r.fetched_at_utc)
    }
}
