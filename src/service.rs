//! Fetch-or-cache orchestration shared by the CLI and the HTTP layer

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::markets::client::ReyaClient;
use crate::markets::types::Snapshot;
use crate::store::CsvStore;

pub struct SnapshotService {
    client: ReyaClient,
    store: CsvStore,
}

impl SnapshotService {
    pub fn new(client: ReyaClient, store: CsvStore) -> Self {
        Self { client, store }
    }

    pub fn store(&self) -> &CsvStore {
        &self.store
    }

    /// Return the freshest available snapshot.
    ///
    /// With `prefer_refresh` a live fetch is attempted first and persisted on
    /// success; a failed fetch falls back to the cached file, and only when
    /// that is also unusable does the original fetch error surface. Without
    /// `prefer_refresh` the cached file is served, fetching (and saving) only
    /// when no usable cache exists. This is the only place a fetch error is
    /// swallowed.
    pub async fn get_snapshot(&self, prefer_refresh: bool) -> Result<Snapshot> {
        if prefer_refresh {
            match self.client.fetch_snapshot().await {
                Ok(snapshot) => {
                    self.store
                        .save(&snapshot)
                        .context("Failed to persist fetched snapshot")?;
                    Ok(snapshot)
                }
                Err(fetch_err) => match self.store.load() {
                    Ok(snapshot) => {
                        warn!(
                            "Live fetch failed ({}); serving cached snapshot from {}",
                            fetch_err,
                            self.store.path().display()
                        );
                        Ok(snapshot)
                    }
                    Err(load_err) => {
                        warn!("No usable cached snapshot either: {}", load_err);
                        Err(fetch_err)
                            .context("Live fetch failed and no cached snapshot is available")
                    }
                },
            }
        } else {
            match self.store.load() {
                Ok(snapshot) => Ok(snapshot),
                Err(load_err) => {
                    info!("Cache unavailable ({}); fetching live data", load_err);
                    let snapshot = self
                        .client
                        .fetch_snapshot()
                        .await
                        .context("Failed to fetch market data")?;
                    self.store
                        .save(&snapshot)
                        .context("Failed to persist fetched snapshot")?;
                    Ok(snapshot)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markets::client::{ReyaClient, ReyaEndpoints};
    use serde_json::json;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn markets_body() -> serde_json::Value {
        json!({
            "markets": [
                {"symbol": "BTC-PERP", "oiCap": "5000", "currentOi": "100"},
                {"symbol": "ETH-PERP", "oiCap": "1000", "currentOi": "200"},
            ]
        })
    }

    async fn service_for(server: &MockServer, store: CsvStore) -> SnapshotService {
        let client = ReyaClient::with_endpoints(ReyaEndpoints::for_base(server.uri())).unwrap();
        SnapshotService::new(client, store)
    }

    #[tokio::test]
    async fn refresh_fetches_and_persists() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/marketDefinitions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(markets_body()))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("snap.csv"));
        let service = service_for(&server, store.clone()).await;

        let snapshot = service.get_snapshot(true).await.unwrap();
        assert_eq!(snapshot.len(), 2);
        // Persisted copy matches what was returned
        assert_eq!(store.load().unwrap(), snapshot);
    }

    #[tokio::test]
    async fn failed_refresh_falls_back_to_cache_unmodified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/marketDefinitions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(markets_body()))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/marketDefinitions"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("snap.csv"));
        let service = service_for(&server, store).await;

        let first = service.get_snapshot(true).await.unwrap();
        let second = service.get_snapshot(true).await.unwrap();
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn surfaces_fetch_error_when_both_fail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/marketDefinitions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("snap.csv"));
        let service = service_for(&server, store).await;

        let err = service.get_snapshot(true).await.unwrap_err();
        let chain = format!("{:#}", err);
        assert!(chain.contains("HTTP 503"), "unexpected chain: {}", chain);
    }

    #[tokio::test]
    async fn corrupt_cache_is_replaced_by_live_fetch_without_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/marketDefinitions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(markets_body()))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("snap.csv");
        std::fs::write(
            &csv_path,
            "market,current_oi,oiCap,fetched_at_utc\nBTC,not-a-number,5000,2025-06-01T12:00:00Z\n",
        )
        .unwrap();

        let store = CsvStore::new(&csv_path);
        let service = service_for(&server, store.clone()).await;

        // Cache-first path: the malformed file falls through to a live fetch.
        let snapshot = service.get_snapshot(false).await.unwrap();
        assert_eq!(snapshot.len(), 2);
        // The fetched snapshot replaced the corrupt file on disk.
        assert_eq!(store.load().unwrap(), snapshot);
    }

    #[tokio::test]
    async fn no_refresh_serves_cache_without_touching_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/marketDefinitions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(markets_body()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("snap.csv"));
        let service = service_for(&server, store).await;

        // First call has no cache yet and fetches (and saves).
        let first = service.get_snapshot(false).await.unwrap();
        // Second call is served purely from disk; expect(1) verifies it.
        let second = service.get_snapshot(false).await.unwrap();
        assert_eq!(second, first);
    }
}
