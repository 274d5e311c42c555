use core::net::IpAddr;
use std::fs::create_dir_all;

use clap::Parser;
use edgemesh_network::config::{
    BootstrapConfig, BootstrapNodes, DiscoveryConfig, SwarmConfig, DEFAULT_PORT,
};
use edgemesh_syncer::SyncerConfig;
use eyre::{bail, Result as EyreResult, WrapErr};
use libp2p::identity::Keypair;
use multiaddr::{Multiaddr, Protocol};
use tracing::info;

use crate::cli::RootArgs;
use crate::config::{ApplicationConfig, ConfigFile};

/// Initialize node configuration
#[derive(Debug, Parser)]
pub struct InitCommand {
    /// List of bootstrap nodes
    #[clap(long, value_name = "ADDR")]
    pub boot_nodes: Vec<Multiaddr>,

    /// Host to listen on
    #[clap(long, value_name = "HOST")]
    #[clap(default_value = "0.0.0.0,::")]
    #[clap(use_value_delimiter = true)]
    pub swarm_host: Vec<IpAddr>,

    /// Port to listen on
    #[clap(long, value_name = "PORT")]
    #[clap(default_value_t = DEFAULT_PORT)]
    pub swarm_port: u16,

    /// Disable mDNS peer discovery
    #[clap(long, default_value_t = false)]
    pub no_mdns: bool,

    /// Name of the advertised application endpoint
    #[clap(long, value_name = "NAME", default_value = "edge-app")]
    pub app_name: String,

    /// Origin tag of the advertised application
    #[clap(long, value_name = "ORIGIN", default_value = "llama")]
    pub app_origin: String,

    /// Model hash of the advertised application
    #[clap(long, value_name = "HASH", default_value = "")]
    pub model_hash: String,

    /// Maximum concurrent slots advertised by the endpoint
    #[clap(long, value_name = "SLOTS", default_value_t = 4)]
    pub gauge_max: u64,

    /// Overwrite an existing configuration
    #[clap(long)]
    pub force: bool,
}

impl InitCommand {
    pub async fn run(self, root_args: RootArgs) -> EyreResult<()> {
        let path = root_args.home.join(&root_args.node_name);

        create_dir_all(&path).wrap_err_with(|| format!("failed to create {}", path))?;

        if ConfigFile::exists(&path) && !self.force {
            bail!("node is already initialized in {:?}, use --force to overwrite", path);
        }

        let identity = Keypair::generate_ed25519();
        let peer_id = identity.public().to_peer_id();

        let listen: Vec<Multiaddr> = self
            .swarm_host
            .into_iter()
            .flat_map(|host| {
                let addr = Multiaddr::from(host);
                [
                    addr.clone().with(Protocol::Tcp(self.swarm_port)),
                    addr.with(Protocol::Udp(self.swarm_port))
                        .with(Protocol::QuicV1),
                ]
            })
            .collect();

        let config = ConfigFile {
            identity,
            swarm: SwarmConfig { listen },
            bootstrap: BootstrapConfig {
                nodes: BootstrapNodes {
                    list: self.boot_nodes,
                },
            },
            discovery: DiscoveryConfig {
                mdns: !self.no_mdns,
            },
            sync: SyncerConfig::default(),
            application: ApplicationConfig {
                name: self.app_name,
                tag: String::new(),
                app_origin: self.app_origin,
                model_hash: self.model_hash,
                gauge_max: self.gauge_max,
                signing_key: String::new(),
            },
        };

        config.save(&path).await?;

        info!(%peer_id, "Initialized node in {}", path);

        Ok(())
    }
}
