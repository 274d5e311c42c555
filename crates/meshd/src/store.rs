use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use edgemesh_primitives::application::Application;
use edgemesh_primitives::chain::{Block, Header, Receipt};
use edgemesh_primitives::Hash;
use edgemesh_syncer::{ApplicationStore, BlockchainStore};
use eyre::Result as EyreResult;
use libp2p::PeerId;

use crate::config::ApplicationConfig;

/// The endpoint application this node advertises. The gauge moves as
/// requests come and go; uptime is derived on every snapshot.
pub struct EndpointApp {
    inner: Mutex<Application>,
    started: Instant,
}

impl EndpointApp {
    pub fn new(peer_id: PeerId, config: &ApplicationConfig) -> Self {
        let startup_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();

        let cpu_info = std::thread::available_parallelism()
            .map(|cores| format!("{cores}-core"))
            .unwrap_or_default();

        Self {
            inner: Mutex::new(Application {
                name: config.name.clone(),
                tag: config.tag.clone(),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                peer_id,
                app_origin: config.app_origin.clone(),
                model_hash: config.model_hash.clone(),
                ip_addr: String::new(),
                mac: String::new(),
                mem_info: String::new(),
                cpu_info,
                gpu_info: String::new(),
                average_power: 0.0,
                startup_time,
                uptime: 0,
                gauge_height: 0,
                gauge_max: config.gauge_max,
                signing_key: config.signing_key.clone(),
            }),
            started: Instant::now(),
        }
    }

    /// Record the current number of occupied slots.
    pub fn set_gauge_height(&self, height: u64) {
        let mut app = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        app.gauge_height = height.min(app.gauge_max);
    }
}

impl ApplicationStore for EndpointApp {
    fn endpoint_application(&self) -> Application {
        let mut app = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        app.uptime = self.started.elapsed().as_secs();
        app
    }
}

/// In-memory chain view backing the data-fetch endpoint. The full kernel
/// lives elsewhere; this keeps just enough state to resolve artifacts.
#[derive(Default)]
pub struct InMemoryChain {
    inner: RwLock<ChainInner>,
}

#[derive(Default)]
struct ChainInner {
    blocks_by_hash: HashMap<Hash, Block>,
    hash_by_number: BTreeMap<u64, Hash>,
    tx_lookup: HashMap<Hash, Hash>,
    receipts: HashMap<Hash, Vec<Receipt>>,
    head: Option<Hash>,
}

impl InMemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_block(&self, block: Block, receipts: Vec<Receipt>) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        let hash = block.header.hash;

        for tx in &block.transactions {
            let _ = inner.tx_lookup.insert(tx.hash, hash);
        }

        let _ = inner.hash_by_number.insert(block.header.number, hash);
        let _ = inner.receipts.insert(hash, receipts);
        let _ = inner.blocks_by_hash.insert(hash, block);
        inner.head = Some(hash);
    }
}

impl BlockchainStore for InMemoryChain {
    fn header(&self) -> Option<Header> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let head = inner.head?;
        inner
            .blocks_by_hash
            .get(&head)
            .map(|block| block.header.clone())
    }

    fn get_header_by_number(&self, number: u64) -> Option<Header> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let hash = inner.hash_by_number.get(&number)?;
        inner
            .blocks_by_hash
            .get(hash)
            .map(|block| block.header.clone())
    }

    fn get_block_by_hash(&self, hash: &Hash, _full: bool) -> Option<Block> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .blocks_by_hash
            .get(hash)
            .cloned()
    }

    fn get_block_by_number(&self, number: u64, full: bool) -> Option<Block> {
        let hash = {
            let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            inner.hash_by_number.get(&number).copied()
        }?;

        self.get_block_by_hash(&hash, full)
    }

    fn read_tx_lookup(&self, tx_hash: &Hash) -> Option<Hash> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .tx_lookup
            .get(tx_hash)
            .copied()
    }

    fn get_receipts_by_hash(&self, hash: &Hash) -> EyreResult<Vec<Receipt>> {
        Ok(self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .receipts
            .get(hash)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use edgemesh_primitives::chain::Transaction;

    use super::*;

    fn app_config() -> ApplicationConfig {
        ApplicationConfig {
            name: "edge-app".to_owned(),
            tag: String::new(),
            app_origin: "llama".to_owned(),
            model_hash: "m-abc123".to_owned(),
            gauge_max: 4,
            signing_key: String::new(),
        }
    }

    #[test]
    fn endpoint_snapshot_tracks_gauge_and_uptime() {
        let app = EndpointApp::new(PeerId::random(), &app_config());

        app.set_gauge_height(3);
        let snapshot = app.endpoint_application();
        assert_eq!(snapshot.gauge_height, 3);
        assert_eq!(snapshot.gauge_max, 4);

        // the gauge never exceeds its limit
        app.set_gauge_height(99);
        assert_eq!(app.endpoint_application().gauge_height, 4);
    }

    #[test]
    fn chain_resolves_tx_lookup() {
        let chain = InMemoryChain::new();
        assert!(chain.header().is_none());

        let tx_hash = Hash::hash(b"tx");
        let block = Block {
            header: Header {
                number: 1,
                hash: Hash::hash(b"block-1"),
                parent_hash: Hash::hash(b"block-0"),
                timestamp: 1_700_000_000,
                transactions_root: Hash::default(),
            },
            transactions: vec![Transaction {
                hash: tx_hash,
                method: "deploy".to_owned(),
                payload: b"weights".to_vec(),
            }],
        };

        chain.insert_block(
            block.clone(),
            vec![Receipt {
                tx_hash,
                success: true,
                gas_used: 21_000,
            }],
        );

        assert_eq!(chain.header().unwrap().number, 1);
        assert_eq!(chain.read_tx_lookup(&tx_hash), Some(block.header.hash));
        assert_eq!(chain.get_header_by_number(1).unwrap().hash, block.header.hash);
        assert!(chain.get_block_by_number(1, true).is_some());

        let receipts = chain.get_receipts_by_hash(&block.header.hash).unwrap();
        assert_eq!(receipts.len(), 1);

        assert!(chain.read_tx_lookup(&Hash::hash(b"unknown")).is_none());
    }
}
