use serde::{Deserialize, Serialize};

use crate::hash::Hash;

/// Block header, as exposed by the chain store.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Header {
    pub number: u64,
    pub hash: Hash,
    pub parent_hash: Hash,
    pub timestamp: u64,
    pub transactions_root: Hash,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Transaction>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Transaction {
    pub hash: Hash,
    pub method: String,
    pub payload: Vec<u8>,
}

/// Execution receipt for a mined transaction.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Receipt {
    pub tx_hash: Hash,
    pub success: bool,
    pub gas_used: u64,
}

impl Block {
    pub fn transaction(&self, hash: &Hash) -> Option<&Transaction> {
        self.transactions.iter().find(|tx| tx.hash == *hash)
    }
}
