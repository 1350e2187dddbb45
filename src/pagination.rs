//! Cursor pagination engine.
//!
//! Pages are fetched keyset-style: `limit + 1` rows in the requested
//! direction to detect "more exist", trimmed to `limit`, and reversed for
//! `Previous` so callers always receive canonical forward order. Opaque
//! position tokens are base64-encoded JSON `{"Key": "<composite>"}`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

impl Direction {
    /// Parse a query-string value; anything unrecognized falls back to `Next`.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("Previous") => Direction::Previous,
            _ => Direction::Next,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// Parse a query-string value; anything unrecognized falls back to `Descending`.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("Ascending") => SortOrder::Ascending,
            _ => SortOrder::Descending,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageRequestError {
    #[error("Invalid pagination action: Cannot fetch previous page without a cursor.")]
    PreviousWithoutCursor,

    #[error("Limit must be greater than 0")]
    NonPositiveLimit,
}

/// Reject invalid pagination arguments before any index access.
pub fn validate_page_request(
    cursor: Option<&str>,
    direction: Direction,
    limit: i64,
) -> Result<(), PageRequestError> {
    if cursor.is_none() && direction == Direction::Previous {
        return Err(PageRequestError::PreviousWithoutCursor);
    }
    if limit <= 0 {
        return Err(PageRequestError::NonPositiveLimit);
    }
    Ok(())
}

/// Clamp a requested limit to the service maximum.
pub fn effective_limit(limit: i64) -> i64 {
    limit.min(MAX_LIMIT)
}

/// Opaque pagination position.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Cursor {
    #[serde(rename = "Key")]
    pub key: String,
}

impl Cursor {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn encode(&self) -> String {
        let json = serde_json::to_string(self).expect("cursor serialization is infallible");
        BASE64.encode(json.as_bytes())
    }

    /// Decode an opaque token. Any malformed input yields `None`; callers
    /// fall back to the default order from the start rather than erroring.
    pub fn decode(token: Option<&str>) -> Option<Self> {
        let token = token?;
        if token.is_empty() {
            return None;
        }
        let bytes = BASE64.decode(token).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

/// `"slot:hash"` composite key used by history and subject queries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryKey {
    pub slot: u64,
    pub hash: String,
}

impl HistoryKey {
    pub fn new(slot: u64, hash: impl Into<String>) -> Self {
        Self {
            slot,
            hash: hash.into(),
        }
    }

    /// Parse a cursor key. Wrong segment count or an unparsable slot yields
    /// `None` (silent fallback to the default order, not an error).
    pub fn parse(key: &str) -> Option<Self> {
        let parts: Vec<&str> = key.split(':').collect();
        if parts.len() != 2 {
            return None;
        }
        let slot = parts[0].parse::<u64>().ok()?;
        Some(Self {
            slot,
            hash: parts[1].to_string(),
        })
    }

    pub fn to_key(&self) -> String {
        format!("{}:{}", self.slot, self.hash)
    }
}

/// `"paymentHash:stakeHash"` composite key used by the tracked-address list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PairKey {
    pub payment: String,
    pub stake: String,
}

impl PairKey {
    pub fn parse(key: &str) -> Option<Self> {
        let parts: Vec<&str> = key.split(':').collect();
        if parts.len() != 2 {
            return None;
        }
        Some(Self {
            payment: parts[0].to_string(),
            stake: parts[1].to_string(),
        })
    }

    pub fn to_key(&self) -> String {
        format!("{}:{}", self.payment, self.stake)
    }
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OffsetPaginatedResponse<T> {
    pub items: Vec<T>,
    pub total_records: i64,
}

#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_cursor: Option<String>,
    pub next_cursor: Option<String>,
}

/// Trim a `limit + 1` fetch to a page and derive its pagination flags.
///
/// `cursor_supplied` is whether the request carried a decodable cursor; its
/// presence is taken to imply rows exist on the other side rather than being
/// re-verified. The one exception: an empty first page never claims
/// `hasNext`.
pub fn assemble_page<T>(
    mut rows: Vec<T>,
    limit: usize,
    direction: Direction,
    cursor_supplied: bool,
    key_of: impl Fn(&T) -> String,
) -> (Vec<T>, Pagination) {
    let has_more = rows.len() > limit;
    if has_more {
        rows.truncate(limit);
    }

    if direction == Direction::Previous {
        rows.reverse();
    }

    let mut pagination = Pagination::default();
    match direction {
        Direction::Next => {
            pagination.has_next = has_more;
            pagination.has_previous = cursor_supplied;
        }
        Direction::Previous => {
            pagination.has_previous = has_more;
            pagination.has_next = cursor_supplied || !rows.is_empty();
        }
    }

    if !cursor_supplied && direction == Direction::Next {
        pagination.has_previous = false;
        if rows.is_empty() && !has_more {
            pagination.has_next = false;
        }
    }

    if let (Some(first), Some(last)) = (rows.first(), rows.last()) {
        let next_cursor = Cursor::new(key_of(last)).encode();
        let previous_cursor = Cursor::new(key_of(first)).encode();
        pagination.next_cursor = pagination.has_next.then_some(next_cursor);
        pagination.previous_cursor = pagination.has_previous.then_some(previous_cursor);
    }

    (rows, pagination)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(rows: &[(u64, &str)]) -> Vec<HistoryKey> {
        rows.iter().map(|(s, h)| HistoryKey::new(*s, *h)).collect()
    }

    #[test]
    fn cursor_roundtrip_is_exact() {
        for key in ["100:abc", "0:", "p1:s1", "just-one-segment", ""] {
            let cursor = Cursor::new(key);
            assert_eq!(Cursor::decode(Some(&cursor.encode())), Some(cursor));
        }
    }

    #[test]
    fn malformed_cursor_decodes_to_none() {
        assert_eq!(Cursor::decode(None), None);
        assert_eq!(Cursor::decode(Some("")), None);
        assert_eq!(Cursor::decode(Some("!!!not-base64!!!")), None);
        let not_json = BASE64.encode(b"plain text");
        assert_eq!(Cursor::decode(Some(&not_json)), None);
    }

    #[test]
    fn history_key_parsing_falls_back_on_bad_input() {
        assert_eq!(
            HistoryKey::parse("100:abc"),
            Some(HistoryKey::new(100, "abc"))
        );
        assert_eq!(HistoryKey::parse("abc"), None);
        assert_eq!(HistoryKey::parse("x:abc"), None);
        assert_eq!(HistoryKey::parse("1:2:3"), None);
    }

    #[test]
    fn previous_without_cursor_is_an_input_error() {
        assert_eq!(
            validate_page_request(None, Direction::Previous, 10),
            Err(PageRequestError::PreviousWithoutCursor)
        );
        assert!(validate_page_request(Some("c"), Direction::Previous, 10).is_ok());
    }

    #[test]
    fn non_positive_limit_is_an_input_error() {
        assert_eq!(
            validate_page_request(None, Direction::Next, 0),
            Err(PageRequestError::NonPositiveLimit)
        );
        assert_eq!(
            validate_page_request(None, Direction::Next, -3),
            Err(PageRequestError::NonPositiveLimit)
        );
    }

    #[test]
    fn next_page_trims_extra_row_and_sets_has_next() {
        let rows = keys(&[(3, "c"), (2, "b"), (1, "a")]);
        let (page, p) = assemble_page(rows, 2, Direction::Next, false, |k| k.to_key());
        assert_eq!(page.len(), 2);
        assert!(p.has_next);
        assert!(!p.has_previous);
        assert_eq!(
            Cursor::decode(p.next_cursor.as_deref()).unwrap().key,
            "2:b"
        );
        assert_eq!(p.previous_cursor, None);
    }

    #[test]
    fn previous_page_returns_canonical_forward_order() {
        // Fetched ascending (reverse of canonical descending order)
        let rows = keys(&[(4, "d"), (5, "e"), (6, "f")]);
        let (page, p) = assemble_page(rows, 2, Direction::Previous, true, |k| k.to_key());
        assert_eq!(
            page.iter().map(|k| k.slot).collect::<Vec<_>>(),
            vec![5, 4]
        );
        assert!(p.has_previous); // extra row existed
        assert!(p.has_next); // cursor was supplied
    }

    #[test]
    fn empty_first_page_never_claims_more_data() {
        let (page, p) = assemble_page(Vec::<HistoryKey>::new(), 5, Direction::Next, false, |k| {
            k.to_key()
        });
        assert!(page.is_empty());
        assert!(!p.has_next);
        assert!(!p.has_previous);
        assert_eq!(p.next_cursor, None);
        assert_eq!(p.previous_cursor, None);
    }

    #[test]
    fn cursor_presence_implies_has_previous_in_next_mode() {
        let rows = keys(&[(2, "b")]);
        let (_, p) = assemble_page(rows, 5, Direction::Next, true, |k| k.to_key());
        assert!(!p.has_next); // no extra row
        assert!(p.has_previous); // cursor supplied, assumed not re-verified
        assert!(p.previous_cursor.is_some());
    }
}
