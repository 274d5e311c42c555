use libp2p::gossipsub;
use owo_colors::OwoColorize;
use tracing::{debug, error};

use super::{EventHandler, EventLoop};
use crate::types::NetworkEvent;

impl EventHandler<gossipsub::Event> for EventLoop {
    async fn handle(&mut self, event: gossipsub::Event) {
        debug!("{}: {:?}", "gossipsub".yellow(), event);

        match event {
            gossipsub::Event::Message {
                message_id: id,
                message,
                ..
            } => {
                if let Err(err) = self
                    .event_sender
                    .send(NetworkEvent::Message { id, message })
                    .await
                {
                    error!(?err, "Failed to send message event");
                }
            }
            gossipsub::Event::Subscribed { peer_id, topic } => {
                if self
                    .event_sender
                    .send(NetworkEvent::Subscribed { peer_id, topic })
                    .await
                    .is_err()
                {
                    error!("Failed to send subscribed event");
                }
            }
            _ => {}
        }
    }
}
