//! Typed read/write access to the index tables.
//!
//! Index writes go through reducers and `DbPool::execute_transaction`; this
//! layer covers registry writes and every read path (reducer lookups and the
//! paginated query endpoints). Slots are stored as NUMERIC and cast to
//! `bigint` on the way out.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_postgres::Row;

use crate::db::{DbError, DbOperation, DbPool, DbValue};
use crate::pagination::Direction;

/// Row of the tracked-address registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedAddressRow {
    pub payment_key_hash: String,
    pub stake_key_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Row of the unspent-output index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRow {
    pub out_ref: String,
    pub slot: u64,
    pub spent_tx_hash: String,
    pub spent_slot: Option<u64>,
    pub payment_key_hash: String,
    pub stake_key_hash: String,
    pub raw: Vec<u8>,
}

impl OutputRow {
    pub fn is_unspent(&self) -> bool {
        self.spent_tx_hash.is_empty()
    }
}

/// Row of the address-transaction index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRow {
    pub payment_key_hash: String,
    pub stake_key_hash: String,
    pub hash: String,
    pub subjects: Vec<String>,
    pub slot: u64,
    pub raw: Vec<u8>,
}

fn tracked_address_from_row(row: &Row) -> TrackedAddressRow {
    TrackedAddressRow {
        payment_key_hash: row.get("payment_key_hash"),
        stake_key_hash: row.get("stake_key_hash"),
        created_at: row.get("created_at"),
    }
}

fn output_from_row(row: &Row) -> OutputRow {
    let slot: i64 = row.get("slot");
    let spent_slot: Option<i64> = row.get("spent_slot");
    OutputRow {
        out_ref: row.get("out_ref"),
        slot: slot as u64,
        spent_tx_hash: row.get("spent_tx_hash"),
        spent_slot: spent_slot.map(|s| s as u64),
        payment_key_hash: row.get("payment_key_hash"),
        stake_key_hash: row.get("stake_key_hash"),
        raw: row.get("raw"),
    }
}

fn transaction_from_row(row: &Row) -> TransactionRow {
    let slot: i64 = row.get("slot");
    TransactionRow {
        payment_key_hash: row.get("payment_key_hash"),
        stake_key_hash: row.get("stake_key_hash"),
        hash: row.get("hash"),
        subjects: row.get("subjects"),
        slot: slot as u64,
        raw: row.get("raw"),
    }
}

const OUTPUT_COLUMNS: &str = "out_ref, slot::bigint AS slot, spent_tx_hash, \
     spent_slot::bigint AS spent_slot, payment_key_hash, stake_key_hash, raw";

const TRANSACTION_COLUMNS: &str =
    "payment_key_hash, stake_key_hash, hash, subjects, slot::bigint AS slot, raw";

#[derive(Clone)]
pub struct Store {
    pool: Arc<DbPool>,
}

impl Store {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<DbPool> {
        &self.pool
    }

    // ---- registry ----

    /// Register address pairs for indexing. Already-tracked pairs are left
    /// untouched (their `created_at` is preserved).
    pub async fn track_addresses(&self, pairs: &[(String, String)]) -> Result<(), DbError> {
        let now = Utc::now().timestamp();
        let ops: Vec<DbOperation> = pairs
            .iter()
            .map(|(payment, stake)| DbOperation::Upsert {
                table: "tracked_address".to_string(),
                columns: vec![
                    "payment_key_hash".to_string(),
                    "stake_key_hash".to_string(),
                    "created_at".to_string(),
                ],
                values: vec![
                    DbValue::Text(payment.clone()),
                    DbValue::Text(stake.clone()),
                    DbValue::Timestamp(now),
                ],
                conflict_columns: vec![
                    "payment_key_hash".to_string(),
                    "stake_key_hash".to_string(),
                ],
                update_columns: vec![],
            })
            .collect();
        self.pool.execute_transaction(ops).await
    }

    /// Filter a candidate set of pairs down to the ones that are tracked.
    pub async fn tracked_pairs_among(
        &self,
        pairs: &[(String, String)],
    ) -> Result<Vec<(String, String)>, DbError> {
        if pairs.is_empty() {
            return Ok(Vec::new());
        }
        let payments: Vec<String> = pairs.iter().map(|(p, _)| p.clone()).collect();
        let stakes: Vec<String> = pairs.iter().map(|(_, s)| s.clone()).collect();
        let rows = self
            .pool
            .query(
                "SELECT payment_key_hash, stake_key_hash FROM tracked_address \
                 WHERE (payment_key_hash, stake_key_hash) IN \
                 (SELECT * FROM unnest($1::text[], $2::text[]))",
                &[&payments, &stakes],
            )
            .await?;
        Ok(rows
            .iter()
            .map(|r| (r.get("payment_key_hash"), r.get("stake_key_hash")))
            .collect())
    }

    /// Keyset page of the registry, ordered by `(payment, stake)`.
    pub async fn tracked_addresses_page(
        &self,
        position: Option<&(String, String)>,
        direction: Direction,
        fetch: i64,
    ) -> Result<Vec<TrackedAddressRow>, DbError> {
        let rows = match (position, direction) {
            (Some((payment, stake)), Direction::Next) => {
                self.pool
                    .query(
                        "SELECT payment_key_hash, stake_key_hash, created_at \
                         FROM tracked_address \
                         WHERE payment_key_hash > $1 \
                            OR (payment_key_hash = $1 AND stake_key_hash > $2) \
                         ORDER BY payment_key_hash ASC, stake_key_hash ASC \
                         LIMIT $3",
                        &[payment, stake, &fetch],
                    )
                    .await?
            }
            (Some((payment, stake)), Direction::Previous) => {
                self.pool
                    .query(
                        "SELECT payment_key_hash, stake_key_hash, created_at \
                         FROM tracked_address \
                         WHERE payment_key_hash < $1 \
                            OR (payment_key_hash = $1 AND stake_key_hash < $2) \
                         ORDER BY payment_key_hash DESC, stake_key_hash DESC \
                         LIMIT $3",
                        &[payment, stake, &fetch],
                    )
                    .await?
            }
            (None, _) => {
                self.pool
                    .query(
                        "SELECT payment_key_hash, stake_key_hash, created_at \
                         FROM tracked_address \
                         ORDER BY payment_key_hash ASC, stake_key_hash ASC \
                         LIMIT $1",
                        &[&fetch],
                    )
                    .await?
            }
        };
        Ok(rows.iter().map(tracked_address_from_row).collect())
    }

    /// Offset page of the registry with total count, ordered by creation time.
    pub async fn tracked_addresses_offset(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<TrackedAddressRow>, i64), DbError> {
        let total: i64 = self
            .pool
            .query_one("SELECT COUNT(*) FROM tracked_address", &[])
            .await?
            .get(0);
        let rows = self
            .pool
            .query(
                "SELECT payment_key_hash, stake_key_hash, created_at \
                 FROM tracked_address \
                 ORDER BY created_at ASC, payment_key_hash ASC, stake_key_hash ASC \
                 OFFSET $1 LIMIT $2",
                &[&offset, &limit],
            )
            .await?;
        Ok((rows.iter().map(tracked_address_from_row).collect(), total))
    }

    // ---- output index lookups ----

    /// Outputs created by any of the given transactions (matched on the
    /// transaction-hash half of the out_ref).
    pub async fn outputs_created_by(
        &self,
        tx_hashes: &[String],
    ) -> Result<Vec<OutputRow>, DbError> {
        if tx_hashes.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {OUTPUT_COLUMNS} FROM output_by_address \
             WHERE split_part(out_ref, '#', 1) = ANY($1)"
        );
        let rows = self.pool.query(&sql, &[&tx_hashes]).await?;
        Ok(rows.iter().map(output_from_row).collect())
    }

    /// Outputs whose spend has been recorded against any of the given
    /// transaction hashes.
    pub async fn outputs_spent_by(
        &self,
        tx_hashes: &[String],
    ) -> Result<Vec<OutputRow>, DbError> {
        if tx_hashes.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {OUTPUT_COLUMNS} FROM output_by_address WHERE spent_tx_hash = ANY($1)"
        );
        let rows = self.pool.query(&sql, &[&tx_hashes]).await?;
        Ok(rows.iter().map(output_from_row).collect())
    }

    // ---- transaction index queries ----

    /// Keyset page of an address's transactions, newest first. `Previous`
    /// pages are fetched in ascending order and reversed by the caller.
    pub async fn transactions_by_address(
        &self,
        payment: &str,
        stake: Option<&str>,
        position: Option<&(u64, String)>,
        direction: Direction,
        fetch: i64,
    ) -> Result<Vec<TransactionRow>, DbError> {
        let mut sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transaction_by_address \
             WHERE payment_key_hash = $1"
        );
        let mut params: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> = vec![&payment];
        let mut n = 1;

        if let Some(stake) = &stake {
            n += 1;
            sql.push_str(&format!(" AND stake_key_hash = ${n}"));
            params.push(stake);
        }

        let position = position.map(|(slot, hash)| (*slot as i64, hash));
        if let Some((slot, hash)) = &position {
            let slot_p = n + 1;
            let hash_p = n + 2;
            n += 2;
            match direction {
                Direction::Next => sql.push_str(&format!(
                    " AND (slot < ${slot_p}::bigint \
                       OR (slot = ${slot_p}::bigint AND hash < ${hash_p}))"
                )),
                Direction::Previous => sql.push_str(&format!(
                    " AND (slot > ${slot_p}::bigint \
                       OR (slot = ${slot_p}::bigint AND hash > ${hash_p}))"
                )),
            }
            params.push(slot);
            params.push(*hash);
        }

        match direction {
            Direction::Next => sql.push_str(" ORDER BY slot DESC, hash DESC"),
            Direction::Previous => sql.push_str(" ORDER BY slot ASC, hash ASC"),
        }
        n += 1;
        sql.push_str(&format!(" LIMIT ${n}"));
        params.push(&fetch);

        let rows = self.pool.query(&sql, &params).await?;
        Ok(rows.iter().map(transaction_from_row).collect())
    }

    /// Offset page of an address's transactions with total count.
    pub async fn transactions_by_address_offset(
        &self,
        payment: &str,
        stake: Option<&str>,
        offset: i64,
        limit: i64,
        descending: bool,
    ) -> Result<(Vec<TransactionRow>, i64), DbError> {
        let mut filter = String::from("WHERE payment_key_hash = $1");
        let mut params: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> = vec![&payment];
        if let Some(stake) = &stake {
            filter.push_str(" AND stake_key_hash = $2");
            params.push(stake);
        }

        let count_sql = format!("SELECT COUNT(*) FROM transaction_by_address {filter}");
        let total: i64 = self.pool.query_one(&count_sql, &params).await?.get(0);

        let order = if descending { "DESC" } else { "ASC" };
        let offset_p = params.len() + 1;
        let limit_p = params.len() + 2;
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transaction_by_address {filter} \
             ORDER BY slot {order}, hash {order} OFFSET ${offset_p} LIMIT ${limit_p}"
        );
        params.push(&offset);
        params.push(&limit);

        let rows = self.pool.query(&sql, &params).await?;
        Ok((rows.iter().map(transaction_from_row).collect(), total))
    }

    /// Keyset page of transactions carrying a subject, newest first.
    pub async fn transactions_by_subject(
        &self,
        subject: &str,
        position: Option<&(u64, String)>,
        direction: Direction,
        fetch: i64,
    ) -> Result<Vec<TransactionRow>, DbError> {
        let rows = match (position.map(|(s, h)| (*s as i64, h)), direction) {
            (Some((slot, hash)), Direction::Next) => {
                let sql = format!(
                    "SELECT {TRANSACTION_COLUMNS} FROM transaction_by_address \
                     WHERE $1 = ANY(subjects) \
                       AND (slot < $2::bigint OR (slot = $2::bigint AND hash < $3)) \
                     ORDER BY slot DESC, hash DESC LIMIT $4"
                );
                self.pool.query(&sql, &[&subject, &slot, hash, &fetch]).await?
            }
            (Some((slot, hash)), Direction::Previous) => {
                let sql = format!(
                    "SELECT {TRANSACTION_COLUMNS} FROM transaction_by_address \
                     WHERE $1 = ANY(subjects) \
                       AND (slot > $2::bigint OR (slot = $2::bigint AND hash > $3)) \
                     ORDER BY slot ASC, hash ASC LIMIT $4"
                );
                self.pool.query(&sql, &[&subject, &slot, hash, &fetch]).await?
            }
            (None, _) => {
                let sql = format!(
                    "SELECT {TRANSACTION_COLUMNS} FROM transaction_by_address \
                     WHERE $1 = ANY(subjects) \
                     ORDER BY slot DESC, hash DESC LIMIT $2"
                );
                self.pool.query(&sql, &[&subject, &fetch]).await?
            }
        };
        Ok(rows.iter().map(transaction_from_row).collect())
    }

    /// Offset page of transactions carrying a subject with total count.
    pub async fn transactions_by_subject_offset(
        &self,
        subject: &str,
        offset: i64,
        limit: i64,
        descending: bool,
    ) -> Result<(Vec<TransactionRow>, i64), DbError> {
        let total: i64 = self
            .pool
            .query_one(
                "SELECT COUNT(*) FROM transaction_by_address WHERE $1 = ANY(subjects)",
                &[&subject],
            )
            .await?
            .get(0);
        let order = if descending { "DESC" } else { "ASC" };
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transaction_by_address \
             WHERE $1 = ANY(subjects) \
             ORDER BY slot {order}, hash {order} OFFSET $2 LIMIT $3"
        );
        let rows = self.pool.query(&sql, &[&subject, &offset, &limit]).await?;
        Ok((rows.iter().map(transaction_from_row).collect(), total))
    }
}
