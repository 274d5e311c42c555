use libp2p::PeerId;
use tokio::time::Instant;

/// This node's own advertised application endpoint.
///
/// Owned by the application store; the uptime and gauge fields are mutated
/// by the local runtime as requests come and go, and the whole record is
/// snapshot-read by the status publisher on every tick.
#[derive(Clone, Debug)]
pub struct Application {
    pub name: String,
    pub tag: String,
    pub version: String,
    pub peer_id: PeerId,

    // ai app origin name
    pub app_origin: String,
    // ai model hash string
    pub model_hash: String,
    // ip4 addr string
    pub ip_addr: String,

    pub mac: String,
    pub mem_info: String,
    pub cpu_info: String,
    pub gpu_info: String,
    pub average_power: f32,

    // seconds since the unix epoch at startup
    pub startup_time: u64,
    // seconds since startup
    pub uptime: u64,
    // slots currently occupied / slot limit
    pub gauge_height: u64,
    pub gauge_max: u64,

    /// Reference to the signing key held by the secrets manager.
    pub signing_key: String,
}

/// A remote peer's advertised application, as tracked in the peer map.
#[derive(Clone, Debug)]
pub struct AppPeer {
    pub peer_id: PeerId,

    pub name: String,
    pub app_origin: String,
    pub model_hash: String,
    pub version: String,

    pub startup_time: u64,
    pub uptime: u64,
    pub gauge_height: u64,
    pub gauge_max: u64,

    pub relay: Option<String>,
    pub addr: Option<String>,

    pub mac: String,
    pub mem_info: String,
    pub cpu_info: String,
    pub gpu_info: String,
    pub average_power: f32,

    /// When this peer was last heard from, on the local monotonic clock.
    pub last_seen: Instant,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint_app() -> Application {
        Application {
            name: "llama-svc".to_owned(),
            tag: "edge".to_owned(),
            version: "1.2.0".to_owned(),
            peer_id: PeerId::random(),
            app_origin: "llama".to_owned(),
            model_hash: "m-abc123".to_owned(),
            ip_addr: "10.0.0.7".to_owned(),
            mac: "aa:bb:cc:dd:ee:ff".to_owned(),
            mem_info: "64GiB".to_owned(),
            cpu_info: "16-core".to_owned(),
            gpu_info: "rtx-4090".to_owned(),
            average_power: 0.75,
            startup_time: 1_700_000_000,
            uptime: 3600,
            gauge_height: 1,
            gauge_max: 4,
            signing_key: "edge-key".to_owned(),
        }
    }

    // The upstream implementation dropped the hardware descriptors when
    // snapshotting an application; a full copy is the intended behavior.
    #[test]
    fn snapshot_keeps_hardware_fields() {
        let app = endpoint_app();
        let copy = app.clone();

        assert_eq!(copy.mac, app.mac);
        assert_eq!(copy.mem_info, app.mem_info);
        assert_eq!(copy.cpu_info, app.cpu_info);
        assert_eq!(copy.gpu_info, app.gpu_info);
        assert_eq!(copy.average_power, app.average_power);
        assert_eq!(copy.ip_addr, app.ip_addr);
        assert_eq!(copy.model_hash, app.model_hash);
    }
}
