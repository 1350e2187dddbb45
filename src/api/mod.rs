//! HTTP query surface.

pub mod activity;
pub mod addresses;
pub mod error;
pub mod transactions;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use chrono::DateTime;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::ledger::Network;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub network: Network,
    pub genesis_timestamp: i64,
}

impl AppState {
    /// Wall-clock time of a slot, RFC 3339 with a literal `Z`.
    pub fn slot_to_timestamp(&self, slot: u64) -> String {
        slot_to_timestamp(self.genesis_timestamp, slot)
    }
}

/// Slots map linearly onto wall-clock seconds from the configured genesis.
pub fn slot_to_timestamp(genesis_timestamp: i64, slot: u64) -> String {
    DateTime::from_timestamp(genesis_timestamp + slot as i64, 0)
        .map(|time| time.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_default()
}

/// Query-string integer with a fallback; unparsable input is not an error.
pub(crate) fn parse_limit(value: Option<&str>, default: i64) -> i64 {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/track_address", post(addresses::track_addresses))
        .route("/api/v1/tracked_addresses", get(addresses::tracked_addresses))
        .route(
            "/api/v1/addresses/tracked",
            get(addresses::tracked_addresses_cursor),
        )
        .route(
            "/api/v1/transactions/addresses/:address/history",
            get(transactions::transaction_history),
        )
        .route(
            "/api/v1/transactions/addresses/:address",
            get(transactions::transaction_history_offset),
        )
        .route(
            "/api/v1/transactions/subjects/:subject/history",
            get(transactions::transactions_by_subject),
        )
        .route(
            "/api/v1/transactions/subjects/:subject",
            get(transactions::transactions_by_subject_offset),
        )
        .layer(cors)
        .with_state(state)
}

pub async fn serve(listen: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!(%listen, "api listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_timestamps_are_genesis_relative() {
        assert_eq!(slot_to_timestamp(1_596_059_091, 0), "2020-07-29T21:44:51Z");
        assert_eq!(slot_to_timestamp(1_596_059_091, 9), "2020-07-29T21:45:00Z");
    }

    #[test]
    fn limits_fall_back_on_unparsable_input() {
        assert_eq!(parse_limit(None, 50), 50);
        assert_eq!(parse_limit(Some("abc"), 50), 50);
        assert_eq!(parse_limit(Some("25"), 50), 25);
        assert_eq!(parse_limit(Some("-1"), 50), -1);
    }
}
