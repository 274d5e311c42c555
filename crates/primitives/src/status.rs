use core::str::FromStr;

use libp2p::PeerId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

use crate::application::{AppPeer, Application};

/// The gossip message advertising an application's state.
///
/// Published on the status topic on every publisher tick and translated
/// into an [`AppPeer`] on receipt. `node_id` is the stringified peer id of
/// the advertising node.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct AppStatus {
    pub name: String,
    pub startup_time: u64,
    pub uptime: u64,
    pub gauge_height: u64,
    pub gauge_max: u64,
    pub relay: String,
    pub node_id: String,
    pub addr: String,
    pub app_origin: String,
    pub model_hash: String,
    pub mac: String,
    pub mem_info: String,
    pub cpu_info: String,
    pub average_power: f32,
    pub gpu_info: String,
    pub version: String,
}

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("status carries an empty node id")]
    EmptyNodeId,
    #[error("invalid node id: {0}")]
    InvalidNodeId(String),
    #[error("gauge height {height} exceeds gauge max {max}")]
    GaugeOverflow { height: u64, max: u64 },
}

impl AppStatus {
    /// Build the outgoing status from the endpoint application snapshot.
    ///
    /// `addr` is the overlay listen address, or empty when the node has
    /// none yet.
    pub fn from_application(app: &Application, addr: String) -> Self {
        Self {
            name: app.name.clone(),
            node_id: app.peer_id.to_string(),
            startup_time: app.startup_time,
            uptime: app.uptime,
            gauge_height: app.gauge_height,
            gauge_max: app.gauge_max,
            relay: String::new(),
            addr,
            app_origin: app.app_origin.clone(),
            model_hash: app.model_hash.clone(),
            mac: app.mac.clone(),
            mem_info: app.mem_info.clone(),
            cpu_info: app.cpu_info.clone(),
            gpu_info: app.gpu_info.clone(),
            average_power: app.average_power,
            version: app.version.clone(),
        }
    }

    /// Check the invariants a status must satisfy before it may enter the
    /// peer map.
    pub fn validate(&self) -> Result<(), StatusError> {
        if self.node_id.is_empty() {
            return Err(StatusError::EmptyNodeId);
        }

        if self.gauge_height > self.gauge_max {
            return Err(StatusError::GaugeOverflow {
                height: self.gauge_height,
                max: self.gauge_max,
            });
        }

        Ok(())
    }

    /// Validate and translate into a peer record, stamping `last_seen`.
    pub fn into_peer(self) -> Result<AppPeer, StatusError> {
        self.validate()?;

        let peer_id = PeerId::from_str(&self.node_id)
            .map_err(|_| StatusError::InvalidNodeId(self.node_id.clone()))?;

        let empty_to_none = |s: String| (!s.is_empty()).then_some(s);

        Ok(AppPeer {
            peer_id,
            name: self.name,
            app_origin: self.app_origin,
            model_hash: self.model_hash,
            version: self.version,
            startup_time: self.startup_time,
            uptime: self.uptime,
            gauge_height: self.gauge_height,
            gauge_max: self.gauge_max,
            relay: empty_to_none(self.relay),
            addr: empty_to_none(self.addr),
            mac: self.mac,
            mem_info: self.mem_info,
            cpu_info: self.cpu_info,
            gpu_info: self.gpu_info,
            average_power: self.average_power,
            last_seen: Instant::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(node_id: String) -> AppStatus {
        AppStatus {
            name: "llama-svc".to_owned(),
            startup_time: 1_700_000_000,
            uptime: 600,
            gauge_height: 2,
            gauge_max: 4,
            relay: String::new(),
            node_id,
            addr: "/ip4/10.0.0.7/tcp/2830".to_owned(),
            app_origin: "llama".to_owned(),
            model_hash: "m-abc123".to_owned(),
            mac: "aa:bb:cc:dd:ee:ff".to_owned(),
            mem_info: "64GiB".to_owned(),
            cpu_info: "16-core".to_owned(),
            average_power: 0.5,
            gpu_info: "rtx-4090".to_owned(),
            version: "1.2.0".to_owned(),
        }
    }

    #[test]
    fn wire_round_trip_preserves_fields() {
        let original = status(PeerId::random().to_string());

        let bytes = serde_json::to_vec(&original).unwrap();
        let decoded: AppStatus = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(decoded, original);
    }

    #[tokio::test]
    async fn into_peer_maps_fields() {
        let peer_id = PeerId::random();
        let peer = status(peer_id.to_string()).into_peer().unwrap();

        assert_eq!(peer.peer_id, peer_id);
        assert_eq!(peer.gauge_height, 2);
        assert_eq!(peer.gauge_max, 4);
        assert_eq!(peer.relay, None);
        assert_eq!(peer.addr.as_deref(), Some("/ip4/10.0.0.7/tcp/2830"));
        assert_eq!(peer.gpu_info, "rtx-4090");
    }

    #[test]
    fn rejects_empty_node_id() {
        assert!(matches!(
            status(String::new()).validate(),
            Err(StatusError::EmptyNodeId)
        ));
    }

    #[test]
    fn rejects_gauge_overflow() {
        let mut bad = status(PeerId::random().to_string());
        bad.gauge_height = 9;

        assert!(matches!(
            bad.validate(),
            Err(StatusError::GaugeOverflow { height: 9, max: 4 })
        ));
    }

    #[test]
    fn rejects_garbage_node_id() {
        assert!(matches!(
            status("not-a-peer-id".to_owned()).into_peer(),
            Err(StatusError::InvalidNodeId(_))
        ));
    }
}
