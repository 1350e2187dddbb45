//! Sparse unspent-output index over tracked addresses.
//!
//! Each tracked output gets one row keyed by out-ref. Spends do not delete
//! the row; they stamp `spent_tx_hash` and `spent_slot` so a rollback can
//! restore the output without re-reading the chain. Inserts land before
//! spend updates within the block transaction, so a same-block spend updates
//! the row its own block created.

use crate::db::{DbOperation, DbValue, WhereClause};
use crate::ledger::{address, Block};

use super::{BlockContext, Reducer};

const TABLE: &str = "output_by_address";

pub struct UtxoByAddressReducer;

impl Reducer for UtxoByAddressReducer {
    fn name(&self) -> &'static str {
        "utxo_by_address"
    }

    fn roll_forward(&self, block: &Block, ctx: &BlockContext) -> Vec<DbOperation> {
        let mut inserts = Vec::new();
        let mut spends = Vec::new();

        for tx in &block.transactions {
            for (index, output) in tx.outputs.iter().enumerate() {
                let Some(parts) = address::decode_raw(&output.address) else {
                    continue;
                };
                let pair = (parts.payment_hash, parts.stake_hash);
                if !ctx.tracked.contains(&pair) {
                    continue;
                }
                inserts.push(DbOperation::Upsert {
                    table: TABLE.to_string(),
                    columns: vec![
                        "out_ref".to_string(),
                        "slot".to_string(),
                        "spent_tx_hash".to_string(),
                        "spent_slot".to_string(),
                        "payment_key_hash".to_string(),
                        "stake_key_hash".to_string(),
                        "raw".to_string(),
                    ],
                    values: vec![
                        DbValue::Text(tx.output_ref(index as u64)),
                        DbValue::slot(block.header.slot),
                        DbValue::Text(String::new()),
                        DbValue::Null,
                        DbValue::Text(pair.0),
                        DbValue::Text(pair.1),
                        DbValue::Bytes(output.to_bytes()),
                    ],
                    conflict_columns: vec!["out_ref".to_string()],
                    update_columns: vec![],
                });
            }

            for spend in ctx.spends_of(tx) {
                spends.push(DbOperation::Update {
                    table: TABLE.to_string(),
                    set_columns: vec![
                        (
                            "spent_tx_hash".to_string(),
                            DbValue::Text(spend.spending_tx_hash.clone()),
                        ),
                        ("spent_slot".to_string(), DbValue::slot(block.header.slot)),
                    ],
                    where_clause: WhereClause::Eq(
                        "out_ref".to_string(),
                        DbValue::Text(spend.out_ref.clone()),
                    ),
                });
            }
        }

        inserts.extend(spends);
        inserts
    }

    fn roll_backward(&self, target_slot: u64) -> Vec<DbOperation> {
        vec![
            // Outputs created at or after the rollback point never existed.
            DbOperation::Delete {
                table: TABLE.to_string(),
                where_clause: WhereClause::Gte("slot".to_string(), DbValue::slot(target_slot)),
            },
            // Spends recorded at or after it are undone.
            DbOperation::Update {
                table: TABLE.to_string(),
                set_columns: vec![
                    ("spent_tx_hash".to_string(), DbValue::Text(String::new())),
                    ("spent_slot".to_string(), DbValue::Null),
                ],
                where_clause: WhereClause::Gte(
                    "spent_slot".to_string(),
                    DbValue::slot(target_slot),
                ),
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::ledger::address::base_address_bytes;
    use crate::ledger::{
        BlockHeader, Network, Transaction, TransactionInput, TransactionOutput, Value,
    };

    fn pair(n: u8) -> (String, String) {
        (hex::encode([n; 28]), hex::encode([n + 100; 28]))
    }

    fn output_for(n: u8, coin: u64) -> TransactionOutput {
        TransactionOutput {
            address: base_address_bytes(&[n; 28], &[n + 100; 28], Network::Mainnet),
            value: Value::coin(coin),
        }
    }

    fn block(slot: u64, transactions: Vec<Transaction>) -> Block {
        Block {
            header: BlockHeader {
                hash: format!("block-{slot}"),
                height: slot,
                slot,
            },
            transactions,
        }
    }

    fn tx(hash: &str, inputs: Vec<(&str, u64)>, outputs: Vec<TransactionOutput>) -> Transaction {
        Transaction {
            hash: hash.to_string(),
            inputs: inputs
                .into_iter()
                .map(|(id, index)| TransactionInput {
                    transaction_id: id.to_string(),
                    index,
                })
                .collect(),
            outputs,
            certificates: vec![],
            withdrawals: vec![],
            votes: vec![],
        }
    }

    #[test]
    fn tracked_output_is_inserted_unspent() {
        let b = block(20, vec![tx("aa", vec![], vec![output_for(1, 5)])]);
        let ctx = BlockContext::assemble(&b, [pair(1)].into(), &[]);
        let ops = UtxoByAddressReducer.roll_forward(&b, &ctx);

        assert_eq!(ops.len(), 1);
        match &ops[0] {
            DbOperation::Upsert {
                table,
                values,
                update_columns,
                ..
            } => {
                assert_eq!(table, "output_by_address");
                assert!(update_columns.is_empty());
                assert!(matches!(&values[0], DbValue::Text(r) if r == "aa#0"));
                assert!(matches!(&values[1], DbValue::Numeric(s) if s == "20"));
                assert!(matches!(&values[2], DbValue::Text(s) if s.is_empty()));
                assert!(values[3].is_null());
            }
            other => panic!("expected upsert, got {other:?}"),
        }
    }

    #[test]
    fn untracked_output_is_skipped() {
        let b = block(20, vec![tx("aa", vec![], vec![output_for(1, 5)])]);
        let ctx = BlockContext::assemble(&b, HashSet::new(), &[]);
        assert!(UtxoByAddressReducer.roll_forward(&b, &ctx).is_empty());
    }

    #[test]
    fn same_block_spend_yields_insert_then_update() {
        let b = block(
            20,
            vec![
                tx("aa", vec![], vec![output_for(1, 5)]),
                tx("bb", vec![("aa", 0)], vec![]),
            ],
        );
        let ctx = BlockContext::assemble(&b, [pair(1)].into(), &[]);
        let ops = UtxoByAddressReducer.roll_forward(&b, &ctx);

        assert_eq!(ops.len(), 2);
        assert!(matches!(&ops[0], DbOperation::Upsert { .. }));
        match &ops[1] {
            DbOperation::Update {
                set_columns,
                where_clause,
                ..
            } => {
                assert!(matches!(&set_columns[0].1, DbValue::Text(h) if h == "bb"));
                assert!(matches!(&set_columns[1].1, DbValue::Numeric(s) if s == "20"));
                assert!(
                    matches!(where_clause, WhereClause::Eq(col, DbValue::Text(r))
                        if col == "out_ref" && r == "aa#0")
                );
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn reprocessing_a_block_emits_identical_operations() {
        let b = block(
            20,
            vec![
                tx("aa", vec![], vec![output_for(1, 5)]),
                tx("bb", vec![("aa", 0)], vec![]),
            ],
        );
        let ctx = BlockContext::assemble(&b, [pair(1)].into(), &[]);
        let first = format!("{:?}", UtxoByAddressReducer.roll_forward(&b, &ctx));
        let second = format!("{:?}", UtxoByAddressReducer.roll_forward(&b, &ctx));
        assert_eq!(first, second);
    }

    #[test]
    fn rollback_deletes_creations_and_clears_spent_marks() {
        let ops = UtxoByAddressReducer.roll_backward(15);
        assert_eq!(ops.len(), 2);
        assert!(matches!(
            &ops[0],
            DbOperation::Delete { where_clause: WhereClause::Gte(col, DbValue::Numeric(s)), .. }
                if col == "slot" && s == "15"
        ));
        match &ops[1] {
            DbOperation::Update {
                set_columns,
                where_clause,
                ..
            } => {
                assert!(matches!(&set_columns[0].1, DbValue::Text(s) if s.is_empty()));
                assert!(set_columns[1].1.is_null());
                assert!(matches!(where_clause, WhereClause::Gte(col, _) if col == "spent_slot"));
            }
            other => panic!("expected update, got {other:?}"),
        }
    }
}
