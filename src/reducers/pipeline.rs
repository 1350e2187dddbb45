//! Fixed-order reducer pipeline.
//!
//! Every block (and every rollback) is applied atomically: the context is
//! built once, each reducer contributes its operations, and the whole batch
//! commits in one database transaction. A crash mid-block leaves the index
//! at the previous block boundary.

use std::sync::Arc;

use tracing::{debug, info};

use crate::db::{DbError, DbOperation};
use crate::ledger::Block;
use crate::store::Store;

use super::{BlockContext, Reducer, TxByAddressReducer, UtxoByAddressReducer};

pub struct ReducerPipeline {
    store: Arc<Store>,
    reducers: Vec<Box<dyn Reducer>>,
}

impl ReducerPipeline {
    /// The output index runs before the transaction index so both observe
    /// the same resolution context; order within the batch is what matters
    /// for the insert-before-update invariant inside each reducer.
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            reducers: vec![Box::new(UtxoByAddressReducer), Box::new(TxByAddressReducer)],
        }
    }

    pub async fn roll_forward(&self, block: &Block) -> Result<(), DbError> {
        let ctx = BlockContext::load(&self.store, block).await?;
        let mut operations: Vec<DbOperation> = Vec::new();
        for reducer in &self.reducers {
            let ops = reducer.roll_forward(block, &ctx);
            debug!(
                reducer = reducer.name(),
                slot = block.header.slot,
                operations = ops.len(),
                "roll forward"
            );
            operations.extend(ops);
        }
        if operations.is_empty() {
            return Ok(());
        }
        let count = operations.len();
        self.store.pool().execute_transaction(operations).await?;
        info!(
            slot = block.header.slot,
            hash = %block.header.hash,
            operations = count,
            "block applied"
        );
        Ok(())
    }

    pub async fn roll_backward(&self, target_slot: u64) -> Result<(), DbError> {
        let mut operations: Vec<DbOperation> = Vec::new();
        for reducer in &self.reducers {
            operations.extend(reducer.roll_backward(target_slot));
        }
        self.store.pool().execute_transaction(operations).await?;
        info!(slot = target_slot, "rolled back");
        Ok(())
    }
}
