//! Address-transaction index over tracked addresses.
//!
//! A transaction gets one row per tracked pair it touches, where "touches"
//! means it created an output for the pair or consumed one of the pair's
//! outputs. Each row carries the raw transaction plus the distinct asset
//! subjects appearing in its outputs, so subject queries need no decode.

use std::collections::BTreeSet;

use crate::db::{DbOperation, DbValue, WhereClause};
use crate::ledger::{address, Block, Transaction};

use super::{BlockContext, Reducer};

const TABLE: &str = "transaction_by_address";

pub struct TxByAddressReducer;

fn touched_pairs(tx: &Transaction, ctx: &BlockContext) -> BTreeSet<(String, String)> {
    let mut pairs = BTreeSet::new();
    for output in &tx.outputs {
        if let Some(parts) = address::decode_raw(&output.address) {
            let pair = (parts.payment_hash, parts.stake_hash);
            if ctx.tracked.contains(&pair) {
                pairs.insert(pair);
            }
        }
    }
    for spend in ctx.spends_of(tx) {
        pairs.insert((
            spend.payment_key_hash.clone(),
            spend.stake_key_hash.clone(),
        ));
    }
    pairs
}

fn subjects_of(tx: &Transaction) -> Vec<String> {
    let mut subjects = BTreeSet::new();
    for output in &tx.outputs {
        subjects.extend(output.value.subjects());
    }
    subjects.into_iter().collect()
}

impl Reducer for TxByAddressReducer {
    fn name(&self) -> &'static str {
        "tx_by_address"
    }

    fn roll_forward(&self, block: &Block, ctx: &BlockContext) -> Vec<DbOperation> {
        let mut ops = Vec::new();
        for tx in &block.transactions {
            let pairs = touched_pairs(tx, ctx);
            if pairs.is_empty() {
                continue;
            }
            let subjects = subjects_of(tx);
            let raw = tx.to_bytes();
            for (payment, stake) in pairs {
                ops.push(DbOperation::Upsert {
                    table: TABLE.to_string(),
                    columns: vec![
                        "payment_key_hash".to_string(),
                        "stake_key_hash".to_string(),
                        "hash".to_string(),
                        "subjects".to_string(),
                        "slot".to_string(),
                        "raw".to_string(),
                    ],
                    values: vec![
                        DbValue::Text(payment),
                        DbValue::Text(stake),
                        DbValue::Text(tx.hash.clone()),
                        DbValue::TextArray(subjects.clone()),
                        DbValue::slot(block.header.slot),
                        DbValue::Bytes(raw.clone()),
                    ],
                    conflict_columns: vec![
                        "payment_key_hash".to_string(),
                        "stake_key_hash".to_string(),
                        "hash".to_string(),
                    ],
                    update_columns: vec![],
                });
            }
        }
        ops
    }

    fn roll_backward(&self, target_slot: u64) -> Vec<DbOperation> {
        vec![DbOperation::Delete {
            table: TABLE.to_string(),
            where_clause: WhereClause::Gte("slot".to_string(), DbValue::slot(target_slot)),
        }]
    }
}
