use libp2p::identify;
use owo_colors::OwoColorize;
use tracing::debug;

use super::{EventHandler, EventLoop};

impl EventHandler<identify::Event> for EventLoop {
    async fn handle(&mut self, event: identify::Event) {
        debug!("{}: {:?}", "identify".yellow(), event);

        if let identify::Event::Received { peer_id, info, .. } = event {
            for addr in info.listen_addrs {
                let _ = self.swarm.behaviour_mut().kad.add_address(&peer_id, addr);
            }
        }
    }
}
