use std::sync::Arc;

use clap::Parser;
use edgemesh_network::config::NetworkConfig;
use edgemesh_syncer::{Overlay, SyncAppClient, SyncAppService, Syncer};
use eyre::{bail, Result as EyreResult};
use tokio::signal;
use tracing::info;

use crate::cli::RootArgs;
use crate::config::ConfigFile;
use crate::store::{EndpointApp, InMemoryChain};

/// Run a node
#[derive(Debug, Parser)]
pub struct RunCommand;

impl RunCommand {
    pub async fn run(self, root_args: RootArgs) -> EyreResult<()> {
        let path = root_args.home.join(&root_args.node_name);

        if !ConfigFile::exists(&path) {
            bail!("node is not initialized in {:?}", path);
        }

        let config = ConfigFile::load(&path).await?;
        let peer_id = config.identity.public().to_peer_id();

        info!(%peer_id, "Starting edgemesh node");

        let (network_client, network_events) = edgemesh_network::run(&NetworkConfig {
            identity: config.identity.clone(),
            swarm: config.swarm,
            bootstrap: config.bootstrap,
            discovery: config.discovery,
        })?;

        let overlay: Arc<dyn Overlay> = Arc::new(network_client);
        let app_store = Arc::new(EndpointApp::new(peer_id, &config.application));
        let chain = Arc::new(InMemoryChain::new());

        let client = SyncAppClient::new(Arc::clone(&overlay), network_events, config.sync);
        let service = SyncAppService::new(
            Arc::clone(&overlay),
            app_store.clone(),
            chain,
            config.sync,
        );

        let syncer = Syncer::new(client, service, overlay, app_store, config.sync);

        syncer.start(true).await?;

        signal::ctrl_c().await?;

        info!("Shutting down");

        syncer.close().await
    }
}
