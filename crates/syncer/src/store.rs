use edgemesh_primitives::application::Application;
use edgemesh_primitives::chain::{Block, Header, Receipt};
use edgemesh_primitives::Hash;
use eyre::Result as EyreResult;

/// Read-only view of the chain, consulted by the `GetData` endpoint.
pub trait BlockchainStore: Send + Sync {
    /// Current head of the chain (genesis if empty).
    fn header(&self) -> Option<Header>;

    fn get_header_by_number(&self, number: u64) -> Option<Header>;

    fn get_block_by_hash(&self, hash: &Hash, full: bool) -> Option<Block>;

    fn get_block_by_number(&self, number: u64, full: bool) -> Option<Block>;

    /// Hash of the block a transaction was mined in, if known.
    fn read_tx_lookup(&self, tx_hash: &Hash) -> Option<Hash>;

    fn get_receipts_by_hash(&self, hash: &Hash) -> EyreResult<Vec<Receipt>>;
}

/// Source of this node's own application descriptor. Snapshots must be
/// cheap; the publisher reads one on every tick.
pub trait ApplicationStore: Send + Sync {
    fn endpoint_application(&self) -> Application;
}
