//! Index reducers.
//!
//! A reducer turns a block (plus its pre-built [`BlockContext`]) into a list
//! of database operations. Reducers are pure over their inputs; all I/O
//! happens in the pipeline, which executes every reducer's operations for a
//! block in a single database transaction.

pub mod context;
pub mod pipeline;
pub mod tx_by_address;
pub mod utxo_by_address;

pub use context::{BlockContext, ResolvedSpend};
pub use pipeline::ReducerPipeline;
pub use tx_by_address::TxByAddressReducer;
pub use utxo_by_address::UtxoByAddressReducer;

use crate::db::DbOperation;
use crate::ledger::Block;

pub trait Reducer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Operations to apply the block to this reducer's table.
    fn roll_forward(&self, block: &Block, ctx: &BlockContext) -> Vec<DbOperation>;

    /// Operations to rewind this reducer's table to just before
    /// `target_slot`: everything at or after it is undone.
    fn roll_backward(&self, target_slot: u64) -> Vec<DbOperation>;
}
