//! Reya market data: API client, payload normalization, filtering

pub mod client;
pub mod filter;
pub mod types;

pub use client::{ReyaClient, ReyaEndpoints};
pub use filter::{lowest_by_oi_cap, MarketFilter};
pub use types::{FetchError, MarketRecord, Snapshot};
