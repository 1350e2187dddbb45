//! Address registry endpoints.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ledger::address;
use crate::pagination::{
    assemble_page, effective_limit, validate_page_request, Cursor, Direction,
    OffsetPaginatedResponse, PaginatedResponse, PairKey, DEFAULT_LIMIT,
};

use super::error::ApiError;
use super::{parse_limit, AppState};

#[derive(Deserialize)]
pub struct TrackAddressesRequest {
    pub addresses: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackAddressesResponse {
    pub added: usize,
    pub message: String,
}

/// POST /track_address — register bech32 addresses for indexing.
/// Duplicates and undecodable entries are ignored.
pub async fn track_addresses(
    State(state): State<AppState>,
    Json(request): Json<TrackAddressesRequest>,
) -> Result<Json<TrackAddressesResponse>, ApiError> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for text in &request.addresses {
        if let Some(parts) = address::decode_bech32(text) {
            let pair = (parts.payment_hash, parts.stake_hash);
            if !pairs.contains(&pair) {
                pairs.push(pair);
            }
        }
    }

    if pairs.is_empty() {
        return Ok(Json(TrackAddressesResponse {
            added: 0,
            message: "No new addresses to track".to_string(),
        }));
    }

    state.store.track_addresses(&pairs).await?;
    info!(count = pairs.len(), "addresses tracked");
    Ok(Json(TrackAddressesResponse {
        added: pairs.len(),
        message: "Addresses tracked successfully".to_string(),
    }))
}

#[derive(Deserialize)]
pub struct OffsetQuery {
    pub offset: Option<String>,
    pub limit: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedAddressItem {
    pub payment_key_hash: String,
    pub stake_key_hash: String,
    pub created_at: DateTime<Utc>,
}

/// GET /tracked_addresses — offset-paginated registry dump, oldest first.
pub async fn tracked_addresses(
    State(state): State<AppState>,
    Query(query): Query<OffsetQuery>,
) -> Result<Json<OffsetPaginatedResponse<TrackedAddressItem>>, ApiError> {
    let offset = parse_limit(query.offset.as_deref(), 0).max(0);
    let limit = effective_limit(parse_limit(query.limit.as_deref(), 100).max(1));

    let (rows, total) = state.store.tracked_addresses_offset(offset, limit).await?;
    let items = rows
        .into_iter()
        .map(|row| TrackedAddressItem {
            payment_key_hash: row.payment_key_hash,
            stake_key_hash: row.stake_key_hash,
            created_at: row.created_at,
        })
        .collect();
    Ok(Json(OffsetPaginatedResponse {
        items,
        total_records: total,
    }))
}

#[derive(Deserialize)]
pub struct CursorQuery {
    pub cursor: Option<String>,
    pub limit: Option<String>,
    pub direction: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedBech32Item {
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// GET /addresses/tracked — cursor-paginated registry walk in
/// `(payment, stake)` order, items as reconstructed bech32 text.
pub async fn tracked_addresses_cursor(
    State(state): State<AppState>,
    Query(query): Query<CursorQuery>,
) -> Result<Json<PaginatedResponse<TrackedBech32Item>>, ApiError> {
    let direction = Direction::parse(query.direction.as_deref());
    let limit = parse_limit(query.limit.as_deref(), DEFAULT_LIMIT);
    validate_page_request(query.cursor.as_deref(), direction, limit)?;
    let limit = effective_limit(limit);

    let decoded = Cursor::decode(query.cursor.as_deref());
    let position = decoded
        .as_ref()
        .and_then(|cursor| PairKey::parse(&cursor.key))
        .map(|key| (key.payment, key.stake));

    let rows = state
        .store
        .tracked_addresses_page(position.as_ref(), direction, limit + 1)
        .await?;

    let (rows, pagination) =
        assemble_page(rows, limit as usize, direction, decoded.is_some(), |row| {
            PairKey {
                payment: row.payment_key_hash.clone(),
                stake: row.stake_key_hash.clone(),
            }
            .to_key()
        });

    let items = rows
        .into_iter()
        .map(|row| TrackedBech32Item {
            address: address::encode_bech32(
                &row.payment_key_hash,
                &row.stake_key_hash,
                state.network,
            ),
            created_at: row.created_at,
        })
        .collect();
    Ok(Json(PaginatedResponse { items, pagination }))
}
