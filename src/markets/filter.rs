//! In-memory snapshot filtering and ranking

use std::cmp::Ordering;

use rust_decimal::Decimal;

use super::types::{MarketRecord, Snapshot};

/// Optional predicates combined with AND semantics.
///
/// A record with a `None` field never satisfies a min/max bound on that field.
#[derive(Debug, Default, Clone)]
pub struct MarketFilter {
    /// Case-insensitive substring match on the market name
    pub market: Option<String>,
    pub min_oi_cap: Option<Decimal>,
    pub max_oi_cap: Option<Decimal>,
    pub min_current_oi: Option<Decimal>,
    pub max_current_oi: Option<Decimal>,
}

impl MarketFilter {
    pub fn is_empty(&self) -> bool {
        self.market.is_none()
            && self.min_oi_cap.is_none()
            && self.max_oi_cap.is_none()
            && self.min_current_oi.is_none()
            && self.max_current_oi.is_none()
    }

    pub fn matches(&self, record: &MarketRecord) -> bool {
        if let Some(needle) = &self.market {
            if !record
                .market
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }

        within_bounds(record.oi_cap, self.min_oi_cap, self.max_oi_cap)
            && within_bounds(record.current_oi, self.min_current_oi, self.max_current_oi)
    }

    /// Narrow a snapshot to the records matching every supplied predicate.
    /// Pure; ordering is preserved.
    pub fn apply(&self, snapshot: &Snapshot) -> Snapshot {
        if self.is_empty() {
            return snapshot.clone();
        }

        Snapshot::new(
            snapshot
                .records
                .iter()
                .filter(|r| self.matches(r))
                .cloned()
                .collect(),
        )
    }
}

fn within_bounds(value: Option<Decimal>, min: Option<Decimal>, max: Option<Decimal>) -> bool {
    if min.is_none() && max.is_none() {
        return true;
    }
    let Some(value) = value else {
        // A bound is present but the field is null
        return false;
    };
    if let Some(min) = min {
        if value < min {
            return false;
        }
    }
    if let Some(max) = max {
        if value > max {
            return false;
        }
    }
    true
}

/// The `n` records with the smallest `oiCap`, ascending, stable on ties.
/// Records without a numeric `oiCap` sort last.
pub fn lowest_by_oi_cap(snapshot: &Snapshot, n: usize) -> Snapshot {
    let mut records = snapshot.records.clone();
    records.sort_by(|a, b| match (a.oi_cap, b.oi_cap) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    records.truncate(n);
    Snapshot::new(records)
}
