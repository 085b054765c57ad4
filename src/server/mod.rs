//! Minimal HTTP surface: an HTML table at `/` and JSON at `/api/markets`

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::markets::filter::MarketFilter;
use crate::markets::types::{MarketRecord, Snapshot};
use crate::service::SnapshotService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SnapshotService>,
}

/// Query parameters shared by `/` and `/api/markets`.
///
/// Numeric bounds arrive as strings and are parsed explicitly so a malformed
/// value becomes a 400 instead of a silently ignored predicate.
#[derive(Debug, Default, Deserialize)]
pub struct MarketsQuery {
    pub refresh: Option<String>,
    pub market: Option<String>,
    pub min_oi_cap: Option<String>,
    pub max_oi_cap: Option<String>,
    pub min_current_oi: Option<String>,
    pub max_current_oi: Option<String>,
}

impl MarketsQuery {
    pub fn prefer_refresh(&self) -> bool {
        matches!(self.refresh.as_deref(), Some("1") | Some("true"))
    }

    pub fn to_filter(&self) -> Result<MarketFilter, ApiError> {
        Ok(MarketFilter {
            market: self
                .market
                .clone()
                .filter(|needle| !needle.trim().is_empty()),
            min_oi_cap: parse_bound("min_oi_cap", &self.min_oi_cap)?,
            max_oi_cap: parse_bound("max_oi_cap", &self.max_oi_cap)?,
            min_current_oi: parse_bound("min_current_oi", &self.min_current_oi)?,
            max_current_oi: parse_bound("max_current_oi", &self.max_current_oi)?,
        })
    }
}

fn parse_bound(name: &str, raw: &Option<String>) -> Result<Option<Decimal>, ApiError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => Decimal::from_str(s)
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("{} is not a number: {:?}", name, s))),
    }
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unavailable(String),
}

impl ApiError {
    fn status_and_message(self) -> (StatusCode, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unavailable(msg) => (StatusCode::BAD_GATEWAY, msg),
        }
    }

    /// HTML rendition for the `/` route
    fn into_page(self) -> Response {
        let (status, msg) = self.status_and_message();
        (status, Html(render_error_page(&msg))).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = self.status_and_message();
        (status, Json(json!({ "error": msg }))).into_response()
    }
}

async fn api_markets(
    State(state): State<AppState>,
    Query(query): Query<MarketsQuery>,
) -> Result<Json<Vec<MarketRecord>>, ApiError> {
    let filter = query.to_filter()?;
    let snapshot = state
        .service
        .get_snapshot(query.prefer_refresh())
        .await
        .map_err(|e| ApiError::Unavailable(format!("{:#}", e)))?;

    Ok(Json(filter.apply(&snapshot).records))
}

async fn index(State(state): State<AppState>, Query(query): Query<MarketsQuery>) -> Response {
    let filter = match query.to_filter() {
        Ok(filter) => filter,
        Err(err) => return err.into_page(),
    };

    let snapshot = match state.service.get_snapshot(query.prefer_refresh()).await {
        Ok(snapshot) => snapshot,
        Err(e) => return ApiError::Unavailable(format!("{:#}", e)).into_page(),
    };

    let filtered = filter.apply(&snapshot);
    Html(render_page(&filtered, &query)).into_response()
}

pub async fn serve(host: &str, port: u16, service: Arc<SnapshotService>) -> Result<()> {
    let state = AppState { service };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(index))
        .route("/api/markets", get(api_markets))
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", host, port);
    info!("Serving OI snapshot on http://{}", addr);
    info!("  Table: GET http://{}/  (?refresh=1 forces a live fetch)", addr);
    info!("  JSON:  GET http://{}/api/markets", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    axum::serve(listener, app).await.context("HTTP server error")?;
    Ok(())
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn render_page(snapshot: &Snapshot, query: &MarketsQuery) -> String {
    let mut page = String::new();
    page.push_str(
        "<!doctype html><html><head><meta charset=\"utf-8\">\
         <title>Reya OI caps</title>\
         <style>body{font-family:sans-serif;margin:2em}table{border-collapse:collapse}\
         td,th{border:1px solid #999;padding:4px 10px;text-align:right}\
         td:first-child,th:first-child{text-align:left}</style>\
         </head><body><h1>Reya OI caps</h1>",
    );

    if let Some(ts) = snapshot.fetched_at() {
        page.push_str(&format!(
            "<p>{} markets, fetched at {} — <a href=\"/?refresh=1\">refresh</a></p>",
            snapshot.len(),
            ts.format("%Y-%m-%d %H:%M:%S UTC")
        ));
    } else {
        page.push_str("<p>No markets matched.</p>");
    }

    page.push_str("<form method=\"get\" action=\"/\">");
    for (name, value) in [
        ("market", &query.market),
        ("min_oi_cap", &query.min_oi_cap),
        ("max_oi_cap", &query.max_oi_cap),
        ("min_current_oi", &query.min_current_oi),
        ("max_current_oi", &query.max_current_oi),
    ] {
        page.push_str(&format!(
            "<label>{0} <input name=\"{0}\" value=\"{1}\"></label> ",
            name,
            escape_html(value.as_deref().unwrap_or(""))
        ));
    }
    page.push_str("<button type=\"submit\">Filter</button></form>");

    page.push_str("<table><tr><th>Market</th><th>Current OI</th><th>OI cap</th></tr>");
    for record in &snapshot.records {
        page.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&record.market),
            record
                .current_oi
                .map(|d| d.to_string())
                .unwrap_or_else(|| "—".to_string()),
            record
                .oi_cap
                .map(|d| d.to_string())
                .unwrap_or_else(|| "—".to_string()),
        ));
    }
    page.push_str("</table></body></html>");
    page
}

fn render_error_page(message: &str) -> String {
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\">\
         <title>Reya OI caps</title></head><body>\
         <h1>Snapshot unavailable</h1><p>{}</p>\
         <p><a href=\"/\">Try the cached view</a></p></body></html>",
        escape_html(message)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markets::client::{ReyaClient, ReyaEndpoints};
    use crate::store::CsvStore;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use serde_json::json;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn query(pairs: &[(&str, &str)]) -> MarketsQuery {
        let mut q = MarketsQuery::default();
        for (name, value) in pairs {
            let value = Some(value.to_string());
            match *name {
                "refresh" => q.refresh = value,
                "market" => q.market = value,
                "min_oi_cap" => q.min_oi_cap = value,
                "max_oi_cap" => q.max_oi_cap = value,
                "min_current_oi" => q.min_current_oi = value,
                "max_current_oi" => q.max_current_oi = value,
                other => panic!("unknown param {}", other),
            }
        }
        q
    }

    #[test]
    fn refresh_param_accepts_1_and_true() {
        assert!(query(&[("refresh", "1")]).prefer_refresh());
        assert!(query(&[("refresh", "true")]).prefer_refresh());
        assert!(!query(&[("refresh", "0")]).prefer_refresh());
        assert!(!MarketsQuery::default().prefer_refresh());
    }

    #[test]
    fn query_maps_onto_filter_predicates() {
        let filter = query(&[("market", "btc"), ("min_oi_cap", "100"), ("max_current_oi", "9.5")])
            .to_filter()
            .unwrap();
        assert_eq!(filter.market.as_deref(), Some("btc"));
        assert_eq!(filter.min_oi_cap, Some(dec!(100)));
        assert_eq!(filter.max_current_oi, Some(dec!(9.5)));
        assert_eq!(filter.min_current_oi, None);
    }

    #[test]
    fn malformed_bound_is_a_bad_request() {
        let err = query(&[("min_oi_cap", "lots")]).to_filter().unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn page_renders_rows_and_escapes_markup() {
        let ts = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let snapshot = Snapshot::new(vec![MarketRecord {
            market: "<script>BTC</script>".to_string(),
            current_oi: None,
            oi_cap: Some(dec!(5000)),
            fetched_at_utc: ts,
        }]);

        let page = render_page(&snapshot, &MarketsQuery::default());
        assert!(page.contains("&lt;script&gt;BTC&lt;/script&gt;"));
        assert!(!page.contains("<script>BTC"));
        assert!(page.contains("5000"));
        assert!(page.contains("2025-06-01 12:00:00 UTC"));
    }

    #[tokio::test]
    async fn api_markets_filters_the_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/marketDefinitions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"symbol": "BTC-PERP", "oiCap": "5000", "currentOi": "100"},
                {"symbol": "ETH-PERP", "oiCap": "1000", "currentOi": "200"},
                {"symbol": "SOL-PERP", "oiCap": "3000"},
            ])))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let client = ReyaClient::with_endpoints(ReyaEndpoints::for_base(server.uri())).unwrap();
        let state = AppState {
            service: Arc::new(SnapshotService::new(
                client,
                CsvStore::new(dir.path().join("snap.csv")),
            )),
        };

        let Json(records) = api_markets(
            State(state),
            Query(query(&[("refresh", "1"), ("min_current_oi", "150")])),
        )
        .await
        .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].market, "ETH-PERP");
    }

    #[tokio::test]
    async fn api_markets_reports_unavailable_when_everything_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/marketDefinitions"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let client = ReyaClient::with_endpoints(ReyaEndpoints::for_base(server.uri())).unwrap();
        let state = AppState {
            service: Arc::new(SnapshotService::new(
                client,
                CsvStore::new(dir.path().join("snap.csv")),
            )),
        };

        let err = api_markets(State(state), Query(query(&[("refresh", "1")])))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unavailable(_)));
    }
}
