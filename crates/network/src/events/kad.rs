use libp2p::kad;
use owo_colors::OwoColorize;
use tracing::debug;

use super::{EventHandler, EventLoop};

impl EventHandler<kad::Event> for EventLoop {
    async fn handle(&mut self, event: kad::Event) {
        debug!("{}: {:?}", "kad".yellow(), event);

        if let kad::Event::OutboundQueryProgressed {
            id,
            result: kad::QueryResult::Bootstrap(result),
            ..
        } = event
        {
            if let Some(sender) = self.pending_bootstrap.remove(&id) {
                let _ = sender.send(result.map(|_| None).map_err(Into::into));
            }
        }
    }
}
