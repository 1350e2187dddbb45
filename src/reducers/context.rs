//! Per-block resolution context.
//!
//! Built once per block before any reducer runs: the set of tracked address
//! pairs touched by the block, and a map from each spent input's out-ref to
//! the tracked output it consumes. Outputs created earlier in the same block
//! resolve locally; everything else comes from the output index, looked up by
//! the creating transaction's hash.

use std::collections::{HashMap, HashSet};

use crate::db::DbError;
use crate::ledger::{address, Block};
use crate::store::{OutputRow, Store};

/// A spent input resolved to the tracked output it consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSpend {
    pub out_ref: String,
    pub payment_key_hash: String,
    pub stake_key_hash: String,
    pub raw: Vec<u8>,
    pub created_slot: u64,
    pub spending_tx_hash: String,
    pub created_in_same_block: bool,
}

#[derive(Debug, Default)]
pub struct BlockContext {
    /// Tracked `(payment, stake)` pairs appearing in this block's outputs.
    pub tracked: HashSet<(String, String)>,
    /// Spent input out-ref -> the tracked output it consumes.
    pub resolution: HashMap<String, ResolvedSpend>,
}

impl BlockContext {
    /// Fetch the block's registry hits and prior-output candidates, then
    /// assemble the context.
    pub async fn load(store: &Store, block: &Block) -> Result<Self, DbError> {
        let mut candidates: Vec<(String, String)> = Vec::new();
        let mut seen = HashSet::new();
        for tx in &block.transactions {
            for output in &tx.outputs {
                if let Some(parts) = address::decode_raw(&output.address) {
                    let pair = (parts.payment_hash, parts.stake_hash);
                    if seen.insert(pair.clone()) {
                        candidates.push(pair);
                    }
                }
            }
        }
        let tracked: HashSet<(String, String)> = store
            .tracked_pairs_among(&candidates)
            .await?
            .into_iter()
            .collect();

        let mut input_tx_hashes: Vec<String> = Vec::new();
        let mut seen_hashes = HashSet::new();
        for tx in &block.transactions {
            for input in &tx.inputs {
                if seen_hashes.insert(input.transaction_id.clone()) {
                    input_tx_hashes.push(input.transaction_id.clone());
                }
            }
        }
        let prior = store.outputs_created_by(&input_tx_hashes).await?;

        Ok(Self::assemble(block, tracked, &prior))
    }

    /// Pure assembly over pre-fetched data. Same-block outputs take
    /// precedence over index rows, which cannot both exist for one out-ref.
    pub fn assemble(
        block: &Block,
        tracked: HashSet<(String, String)>,
        prior: &[OutputRow],
    ) -> Self {
        // Tracked outputs created within this block, by out-ref.
        let mut local: HashMap<String, ResolvedSpend> = HashMap::new();
        for tx in &block.transactions {
            for (index, output) in tx.outputs.iter().enumerate() {
                let Some(parts) = address::decode_raw(&output.address) else {
                    continue;
                };
                let pair = (parts.payment_hash.clone(), parts.stake_hash.clone());
                if !tracked.contains(&pair) {
                    continue;
                }
                let out_ref = tx.output_ref(index as u64);
                local.insert(
                    out_ref.clone(),
                    ResolvedSpend {
                        out_ref,
                        payment_key_hash: pair.0,
                        stake_key_hash: pair.1,
                        raw: output.to_bytes(),
                        created_slot: block.header.slot,
                        spending_tx_hash: String::new(),
                        created_in_same_block: true,
                    },
                );
            }
        }

        let by_out_ref: HashMap<&str, &OutputRow> = prior
            .iter()
            .filter(|row| row.is_unspent())
            .map(|row| (row.out_ref.as_str(), row))
            .collect();

        let mut resolution = HashMap::new();
        for tx in &block.transactions {
            for input in &tx.inputs {
                let out_ref = input.out_ref();
                let resolved = if let Some(created) = local.get(&out_ref) {
                    Some(ResolvedSpend {
                        spending_tx_hash: tx.hash.clone(),
                        ..created.clone()
                    })
                } else {
                    by_out_ref.get(out_ref.as_str()).map(|row| ResolvedSpend {
                        out_ref: row.out_ref.clone(),
                        payment_key_hash: row.payment_key_hash.clone(),
                        stake_key_hash: row.stake_key_hash.clone(),
                        raw: row.raw.clone(),
                        created_slot: row.slot,
                        spending_tx_hash: tx.hash.clone(),
                        created_in_same_block: false,
                    })
                };
                if let Some(resolved) = resolved {
                    resolution.insert(out_ref, resolved);
                }
            }
        }

        Self {
            tracked,
            resolution,
        }
    }

    /// Resolved spends made by one transaction, in input order.
    pub fn spends_of<'a>(
        &'a self,
        tx: &'a crate::ledger::Transaction,
    ) -> impl Iterator<Item = &'a ResolvedSpend> + 'a {
        tx.inputs
            .iter()
            .filter_map(|input| self.resolution.get(&input.out_ref()))
            .filter(move |spend| spend.spending_tx_hash == tx.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::address::base_address_bytes;
    use crate::ledger::{
        Block, BlockHeader, Network, Transaction, TransactionInput, TransactionOutput, Value,
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

    #[test]
    fn same_block_spend_resolves_locally() {
        let tracked: HashSet<_> = [pair(1)].into();
        let b = block(
            10,
            vec![
                tx("aa", vec![], vec![output_for(1, 5)]),
                tx("bb", vec![("aa", 0)], vec![]),
            ],
        );
        let ctx = BlockContext::assemble(&b, tracked, &[]);
        let spend = ctx.resolution.get("aa#0").unwrap();
        assert!(spend.created_in_same_block);
        assert_eq!(spend.spending_tx_hash, "bb");
        assert_eq!(spend.created_slot, 10);
        assert_eq!(spend.payment_key_hash, pair(1).0);
    }

    #[test]
    fn prior_block_spend_resolves_from_index_rows() {
        let prior = vec![OutputRow {
            out_ref: "old#1".to_string(),
            slot: 4,
            spent_tx_hash: String::new(),
            spent_slot: None,
            payment_key_hash: pair(2).0,
            stake_key_hash: pair(2).1,
            raw: output_for(2, 7).to_bytes(),
        }];
        let b = block(10, vec![tx("cc", vec![("old", 1)], vec![])]);
        let ctx = BlockContext::assemble(&b, HashSet::new(), &prior);
        let spend = ctx.resolution.get("old#1").unwrap();
        assert!(!spend.created_in_same_block);
        assert_eq!(spend.created_slot, 4);
        assert_eq!(spend.spending_tx_hash, "cc");
    }

    #[test]
    fn spends_of_yields_only_the_transactions_own_inputs() {
        let tracked: HashSet<_> = [pair(1)].into();
        let b = block(
            10,
            vec![
                tx("aa", vec![], vec![output_for(1, 5), output_for(1, 6)]),
                tx("bb", vec![("aa", 0)], vec![]),
                tx("cc", vec![("aa", 1)], vec![]),
            ],
        );
        let ctx = BlockContext::assemble(&b, tracked, &[]);
        let spends: Vec<_> = ctx.spends_of(&b.transactions[1]).collect();
        assert_eq!(spends.len(), 1);
        assert_eq!(spends[0].out_ref, "aa#0");
        assert!(ctx.spends_of(&b.transactions[0]).next().is_none());
    }

    #[test]
    fn untracked_inputs_stay_unresolved() {
        let b = block(10, vec![tx("dd", vec![("unknown", 0)], vec![])]);
        let ctx = BlockContext::assemble(&b, HashSet::new(), &[]);
        assert!(ctx.resolution.is_empty());
    }

    #[test]
    fn untracked_outputs_do_not_resolve_same_block_spends() {
        // Output pair is not tracked, so the spend of it is invisible too.
        let b = block(
            10,
            vec![
                tx("aa", vec![], vec![output_for(3, 5)]),
                tx("bb", vec![("aa", 0)], vec![]),
            ],
        );
        let ctx = BlockContext::assemble(&b, HashSet::new(), &[]);
        assert!(ctx.resolution.is_empty());
    }
}
