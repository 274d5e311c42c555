use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use edgemesh_primitives::AppPeer;
use libp2p::PeerId;
use tokio::time::Instant;

/// Registry of known remote application peers.
///
/// Writers funnel through the fan-in and the connection tracker; readers
/// always receive clones, never references into the map, so no guard is
/// ever held across a suspension point.
#[derive(Debug, Default)]
pub struct PeerMap {
    peers: RwLock<HashMap<PeerId, AppPeer>>,
}

impl PeerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `status.peer_id`, refreshing its
    /// last-seen stamp.
    pub fn put(&self, mut status: AppPeer) {
        status.last_seen = Instant::now();

        let _previous = self
            .peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(status.peer_id, status);
    }

    pub fn put_all(&self, statuses: impl IntoIterator<Item = AppPeer>) {
        for status in statuses {
            self.put(status);
        }
    }

    /// Snapshot copy of a single entry.
    pub fn get(&self, peer_id: &PeerId) -> Option<AppPeer> {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(peer_id)
            .cloned()
    }

    /// Idempotent delete.
    pub fn remove(&self, peer_id: &PeerId) {
        let _removed = self
            .peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(peer_id);
    }

    /// Point-in-time copy of all entries, in unspecified order.
    pub fn snapshot(&self) -> Vec<AppPeer> {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use edgemesh_primitives::AppStatus;

    use super::*;

    fn peer(peer_id: PeerId, uptime: u64) -> AppPeer {
        AppStatus {
            name: "svc".to_owned(),
            startup_time: 1_700_000_000,
            uptime,
            gauge_height: 0,
            gauge_max: 4,
            relay: String::new(),
            node_id: peer_id.to_string(),
            addr: String::new(),
            app_origin: "llama".to_owned(),
            model_hash: "m".to_owned(),
            mac: String::new(),
            mem_info: String::new(),
            cpu_info: String::new(),
            average_power: 0.0,
            gpu_info: String::new(),
            version: "1".to_owned(),
        }
        .into_peer()
        .unwrap()
    }

    #[tokio::test]
    async fn get_reflects_last_operation() {
        let map = PeerMap::new();
        let id = PeerId::random();

        assert!(map.get(&id).is_none());

        map.put(peer(id, 1));
        assert_eq!(map.get(&id).unwrap().uptime, 1);

        map.put(peer(id, 2));
        assert_eq!(map.get(&id).unwrap().uptime, 2);

        map.remove(&id);
        assert!(map.get(&id).is_none());

        // removing twice is fine
        map.remove(&id);
        assert!(map.get(&id).is_none());
    }

    // Drives a pseudo-random Put/Remove sequence against a model map and
    // checks Get agrees after every step.
    #[tokio::test]
    async fn agrees_with_model_under_random_ops() {
        let map = PeerMap::new();
        let ids: Vec<_> = (0..4).map(|_| PeerId::random()).collect();
        let mut model: HashMap<PeerId, u64> = HashMap::new();

        let mut state = 0x2545_f491_4f6c_dd1d_u64;
        for step in 0..500 {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);

            let id = ids[(state >> 32) as usize % ids.len()];
            if state % 3 == 0 {
                map.remove(&id);
                let _ = model.remove(&id);
            } else {
                map.put(peer(id, step));
                let _ = model.insert(id, step);
            }

            for id in &ids {
                assert_eq!(
                    map.get(id).map(|p| p.uptime),
                    model.get(id).copied(),
                    "model divergence at step {step}"
                );
            }
        }

        assert_eq!(map.len(), model.len());
    }

    #[tokio::test]
    async fn snapshot_is_point_in_time() {
        let map = PeerMap::new();
        let a = PeerId::random();
        let b = PeerId::random();

        map.put(peer(a, 1));
        let snapshot = map.snapshot();
        map.put(peer(b, 2));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].peer_id, a);
        assert_eq!(map.len(), 2);
    }

    #[tokio::test]
    async fn put_refreshes_last_seen_monotonically() {
        let map = PeerMap::new();
        let id = PeerId::random();

        map.put(peer(id, 1));
        let first = map.get(&id).unwrap().last_seen;

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        map.put(peer(id, 2));
        let second = map.get(&id).unwrap().last_seen;

        assert!(second >= first);
    }

    #[test]
    fn concurrent_puts_serialize() {
        let map = Arc::new(PeerMap::new());
        let id = PeerId::random();

        std::thread::scope(|scope| {
            for uptime in 0..8 {
                let map = Arc::clone(&map);
                let _handle = scope.spawn(move || map.put(peer(id, uptime)));
            }
        });

        // one of the writers won; the entry is whole
        let stored = map.get(&id).unwrap();
        assert!(stored.uptime < 8);
        assert_eq!(stored.gauge_max, 4);
    }
}
