//! Transaction history and subject query endpoints.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::ledger::address;
use crate::pagination::{
    assemble_page, effective_limit, validate_page_request, Cursor, Direction, HistoryKey,
    OffsetPaginatedResponse, PaginatedResponse, SortOrder, DEFAULT_LIMIT,
};
use crate::store::{OutputRow, TransactionRow};

use super::activity::{
    classify_activities, classify_subject_activities, ActivityGroup, SubjectActivityGroup,
    Viewpoint,
};
use super::error::ApiError;
use super::{parse_limit, AppState};

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(rename = "stakeKeyHash")]
    pub stake_key_hash: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<String>,
    pub direction: Option<String>,
    pub sort: Option<String>,
    pub offset: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionHistoryItem {
    pub hash: String,
    pub activities: Vec<ActivityGroup>,
    pub slot: u64,
    pub timestamp: String,
    pub subjects: Vec<String>,
    pub raw: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionBySubjectItem {
    pub hash: String,
    pub address: Option<String>,
    pub slot: u64,
    pub timestamp: String,
    pub activities: Vec<SubjectActivityGroup>,
}

/// Resolve a path `{address}` that is either bech32 text or a raw hex
/// payment key hash (optionally paired with a `stakeKeyHash` query value).
fn resolve_address(
    text: &str,
    stake_query: Option<&str>,
) -> Result<(String, Option<String>), ApiError> {
    if let Some(parts) = address::decode_bech32(text) {
        let stake = (!parts.stake_hash.is_empty()).then_some(parts.stake_hash);
        return Ok((parts.payment_hash, stake));
    }
    let is_key_hash = text.len() == 56 && text.chars().all(|c| c.is_ascii_hexdigit());
    if is_key_hash {
        let stake = stake_query
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());
        return Ok((text.to_lowercase(), stake));
    }
    Err(ApiError::BadRequest(
        "Invalid bech32 address format".to_string(),
    ))
}

/// Consumed outputs grouped by the hash of their spending transaction.
fn consumed_by_tx(outputs: &[OutputRow]) -> HashMap<&str, Vec<&OutputRow>> {
    let mut map: HashMap<&str, Vec<&OutputRow>> = HashMap::new();
    for row in outputs {
        map.entry(row.spent_tx_hash.as_str()).or_default().push(row);
    }
    map
}

fn history_item(
    state: &AppState,
    row: &TransactionRow,
    viewpoint: &Viewpoint,
    consumed: &HashMap<&str, Vec<&OutputRow>>,
) -> TransactionHistoryItem {
    let empty = Vec::new();
    let spent = consumed.get(row.hash.as_str()).unwrap_or(&empty);
    TransactionHistoryItem {
        hash: row.hash.clone(),
        activities: classify_activities(&row.raw, viewpoint, spent),
        slot: row.slot,
        timestamp: state.slot_to_timestamp(row.slot),
        subjects: row.subjects.clone(),
        raw: hex::encode(&row.raw),
    }
}

/// GET /transactions/addresses/{address}/history — cursor-paginated history
/// with classified activities, newest first.
pub async fn transaction_history(
    State(state): State<AppState>,
    Path(addr): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<PaginatedResponse<TransactionHistoryItem>>, ApiError> {
    let direction = Direction::parse(query.direction.as_deref());
    let limit = parse_limit(query.limit.as_deref(), DEFAULT_LIMIT);
    validate_page_request(query.cursor.as_deref(), direction, limit)?;
    let limit = effective_limit(limit);

    let (payment, stake) = resolve_address(&addr, query.stake_key_hash.as_deref())?;

    let decoded = Cursor::decode(query.cursor.as_deref());
    let position = decoded
        .as_ref()
        .and_then(|cursor| HistoryKey::parse(&cursor.key))
        .map(|key| (key.slot, key.hash));

    let rows = state
        .store
        .transactions_by_address(&payment, stake.as_deref(), position.as_ref(), direction, limit + 1)
        .await?;

    let (rows, pagination) =
        assemble_page(rows, limit as usize, direction, decoded.is_some(), |row| {
            HistoryKey::new(row.slot, row.hash.clone()).to_key()
        });

    let page_hashes: Vec<String> = rows.iter().map(|row| row.hash.clone()).collect();
    let spent = state.store.outputs_spent_by(&page_hashes).await?;
    let consumed = consumed_by_tx(&spent);

    let viewpoint = Viewpoint {
        payment,
        stake,
        network: state.network,
    };
    let items = rows
        .iter()
        .map(|row| history_item(&state, row, &viewpoint, &consumed))
        .collect();
    Ok(Json(PaginatedResponse { items, pagination }))
}

/// GET /transactions/addresses/{address} — offset-paginated variant with a
/// total count.
pub async fn transaction_history_offset(
    State(state): State<AppState>,
    Path(addr): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<OffsetPaginatedResponse<TransactionHistoryItem>>, ApiError> {
    let limit = parse_limit(query.limit.as_deref(), DEFAULT_LIMIT);
    if limit <= 0 {
        return Err(ApiError::BadRequest(
            "Limit must be greater than 0".to_string(),
        ));
    }
    let limit = effective_limit(limit);
    let offset = parse_limit(query.offset.as_deref(), 0).max(0);
    let descending = SortOrder::parse(query.sort.as_deref()) == SortOrder::Descending;

    let (payment, stake) = resolve_address(&addr, query.stake_key_hash.as_deref())?;

    let (rows, total) = state
        .store
        .transactions_by_address_offset(&payment, stake.as_deref(), offset, limit, descending)
        .await?;

    let page_hashes: Vec<String> = rows.iter().map(|row| row.hash.clone()).collect();
    let spent = state.store.outputs_spent_by(&page_hashes).await?;
    let consumed = consumed_by_tx(&spent);

    let viewpoint = Viewpoint {
        payment,
        stake,
        network: state.network,
    };
    let items = rows
        .iter()
        .map(|row| history_item(&state, row, &viewpoint, &consumed))
        .collect();
    Ok(Json(OffsetPaginatedResponse {
        items,
        total_records: total,
    }))
}

fn subject_item(
    state: &AppState,
    row: &TransactionRow,
    subject: &str,
    consumed: &HashMap<&str, Vec<&OutputRow>>,
) -> TransactionBySubjectItem {
    let empty = Vec::new();
    let spent = consumed.get(row.hash.as_str()).unwrap_or(&empty);
    TransactionBySubjectItem {
        hash: row.hash.clone(),
        address: address::encode_bech32(
            &row.payment_key_hash,
            &row.stake_key_hash,
            state.network,
        ),
        slot: row.slot,
        timestamp: state.slot_to_timestamp(row.slot),
        activities: classify_subject_activities(
            &row.raw,
            &row.payment_key_hash,
            &row.stake_key_hash,
            subject,
            spent,
        ),
    }
}

/// GET /transactions/subjects/{subject}/history — cursor-paginated
/// transactions carrying an asset subject, newest first.
pub async fn transactions_by_subject(
    State(state): State<AppState>,
    Path(subject): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<PaginatedResponse<TransactionBySubjectItem>>, ApiError> {
    let direction = Direction::parse(query.direction.as_deref());
    let limit = parse_limit(query.limit.as_deref(), DEFAULT_LIMIT);
    validate_page_request(query.cursor.as_deref(), direction, limit)?;
    let limit = effective_limit(limit);

    let decoded = Cursor::decode(query.cursor.as_deref());
    let position = decoded
        .as_ref()
        .and_then(|cursor| HistoryKey::parse(&cursor.key))
        .map(|key| (key.slot, key.hash));

    let rows = state
        .store
        .transactions_by_subject(&subject, position.as_ref(), direction, limit + 1)
        .await?;

    let (rows, pagination) =
        assemble_page(rows, limit as usize, direction, decoded.is_some(), |row| {
            HistoryKey::new(row.slot, row.hash.clone()).to_key()
        });

    let page_hashes: Vec<String> = rows.iter().map(|row| row.hash.clone()).collect();
    let spent = state.store.outputs_spent_by(&page_hashes).await?;
    let consumed = consumed_by_tx(&spent);

    let items = rows
        .iter()
        .map(|row| subject_item(&state, row, &subject, &consumed))
        .collect();
    Ok(Json(PaginatedResponse { items, pagination }))
}

/// GET /transactions/subjects/{subject} — offset-paginated variant.
pub async fn transactions_by_subject_offset(
    State(state): State<AppState>,
    Path(subject): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<OffsetPaginatedResponse<TransactionBySubjectItem>>, ApiError> {
    let limit = parse_limit(query.limit.as_deref(), DEFAULT_LIMIT);
    if limit <= 0 {
        return Err(ApiError::BadRequest(
            "Limit must be greater than 0".to_string(),
        ));
    }
    let limit = effective_limit(limit);
    let offset = parse_limit(query.offset.as_deref(), 0).max(0);
    let descending = SortOrder::parse(query.sort.as_deref()) == SortOrder::Descending;

    let (rows, total) = state
        .store
        .transactions_by_subject_offset(&subject, offset, limit, descending)
        .await?;

    let page_hashes: Vec<String> = rows.iter().map(|row| row.hash.clone()).collect();
    let spent = state.store.outputs_spent_by(&page_hashes).await?;
    let consumed = consumed_by_tx(&spent);

    let items = rows
        .iter()
        .map(|row| subject_item(&state, row, &subject, &consumed))
        .collect();
    Ok(Json(OffsetPaginatedResponse {
        items,
        total_records: total,
    }))
}
