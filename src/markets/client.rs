//! Reya API client and payload normalization

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, SubsecRound, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::types::{FetchError, MarketRecord, Snapshot};

/// Wrapper keys tried when the top-level payload is an object
const WRAPPER_KEYS: [&str; 4] = ["markets", "data", "marketDefinitions", "result"];

/// Keys probed, in order, for a market's display identifier
const NAME_KEYS: [&str; 4] = ["symbol", "market", "name", "id"];

/// Reya API endpoints
pub struct ReyaEndpoints {
    /// Market definitions endpoint
    pub market_definitions: String,
}

impl ReyaEndpoints {
    /// Build the endpoint set for a base URL (used by tests to point at a mock server)
    pub fn for_base(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            market_definitions: format!("{}/v2/marketDefinitions", base.trim_end_matches('/')),
        }
    }
}

impl Default for ReyaEndpoints {
    fn default() -> Self {
        let base =
            std::env::var("REYA_API_URL").unwrap_or_else(|_| "https://api.reya.xyz".to_string());
        Self::for_base(base)
    }
}

/// Reya API client
pub struct ReyaClient {
    /// HTTP client
    client: Client,

    /// API endpoints
    endpoints: ReyaEndpoints,
}

impl ReyaClient {
    /// Create a new client against the default (or env-overridden) endpoints
    pub fn new() -> Result<Self> {
        Self::with_endpoints(ReyaEndpoints::default())
    }

    /// Create a client with custom endpoints
    pub fn with_endpoints(endpoints: ReyaEndpoints) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, endpoints })
    }

    /// Fetch the complete market list and normalize it into one snapshot.
    ///
    /// Network/API failures and an unrecognizable top-level payload are fatal;
    /// per-record field anomalies degrade to `None` fields instead.
    pub async fn fetch_snapshot(&self) -> Result<Snapshot, FetchError> {
        let url = &self.endpoints.market_definitions;
        debug!("Fetching market definitions from: {}", url);

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            debug!("Reya API error - Status: {}, Body: {}", status, text);
            return Err(FetchError::Api(format!("HTTP {}: {}", status, text)));
        }

        let body = response.text().await?;
        let payload: Value = serde_json::from_str(&body)
            .map_err(|e| FetchError::Payload(format!("invalid JSON body: {}", e)))?;

        let entries = extract_market_entries(&payload)?;

        // One shared timestamp for the whole batch, captured after the call completed.
        let fetched_at = Utc::now().trunc_subsecs(0);

        let records: Vec<MarketRecord> = entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| normalize_market(entry, idx + 1, fetched_at))
            .collect();

        info!("Fetched {} markets from Reya", records.len());
        Ok(Snapshot::new(records))
    }
}

/// Normalize the top-level payload into a list of market objects.
///
/// Accepts a bare array, an object wrapping an array under a known key, or an
/// object keyed by market symbol whose values are all objects.
fn extract_market_entries(payload: &Value) -> Result<Vec<&Map<String, Value>>, FetchError> {
    if let Some(items) = payload.as_array() {
        return Ok(items.iter().filter_map(Value::as_object).collect());
    }

    if let Some(obj) = payload.as_object() {
        for key in WRAPPER_KEYS {
            if let Some(items) = obj.get(key).and_then(Value::as_array) {
                return Ok(items.iter().filter_map(Value::as_object).collect());
            }
        }

        // Some APIs return a dict keyed by market symbol.
        if !obj.is_empty() && obj.values().all(Value::is_object) {
            return Ok(obj.values().filter_map(Value::as_object).collect());
        }
    }

    Err(FetchError::Payload(
        "expected a list of markets or an object wrapping one".to_string(),
    ))
}

/// Build one record from a raw market object. `idx` is the 1-based position,
/// used only for the fallback name.
fn normalize_market(
    entry: &Map<String, Value>,
    idx: usize,
    fetched_at: DateTime<Utc>,
) -> MarketRecord {
    MarketRecord {
        market: market_name(entry, idx),
        current_oi: extract_current_oi(entry),
        oi_cap: as_decimal(entry.get("oiCap")),
        fetched_at_utc: fetched_at,
    }
}

fn market_name(entry: &Map<String, Value>, idx: usize) -> String {
    for key in NAME_KEYS {
        match entry.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return s.clone(),
            Some(Value::Number(n)) => return n.to_string(),
            _ => {}
        }
    }
    format!("market_{}", idx)
}

/// Probe `currentOi`, then `openInterest`, then the sum of `longOi` + `shortOi`
fn extract_current_oi(entry: &Map<String, Value>) -> Option<Decimal> {
    if let Some(value) = as_decimal(entry.get("currentOi")) {
        return Some(value);
    }
    if let Some(value) = as_decimal(entry.get("openInterest")) {
        return Some(value);
    }
    match (
        as_decimal(entry.get("longOi")),
        as_decimal(entry.get("shortOi")),
    ) {
        (Some(long), Some(short)) => Some(long + short),
        _ => None,
    }
}

/// Convert a JSON value to Decimal when possible (numbers and numeric strings,
/// including scientific notation)
fn as_decimal(value: Option<&Value>) -> Option<Decimal> {
    let parse = |s: &str| {
        let s = s.trim();
        Decimal::from_str(s)
            .ok()
            .or_else(|| Decimal::from_scientific(s).ok())
    };

    match value? {
        Value::Number(n) => parse(&n.to_string()),
        Value::String(s) => parse(s),
        _ => None,
    }
}
