use libp2p::multiaddr;
use libp2p::swarm::SwarmEvent;
use tracing::{debug, error, trace, warn};

use super::*;
use crate::behaviour::BehaviourEvent;

mod gossipsub;
mod identify;
mod kad;
mod mdns;
mod ping;

pub(crate) trait EventHandler<E> {
    async fn handle(&mut self, event: E);
}

impl EventLoop {
    pub(super) async fn handle_swarm_event(&mut self, event: SwarmEvent<BehaviourEvent>) {
        match event {
            SwarmEvent::Behaviour(event) => match event {
                BehaviourEvent::Gossipsub(event) => EventHandler::handle(self, event).await,
                BehaviourEvent::Identify(event) => EventHandler::handle(self, event).await,
                BehaviourEvent::Kad(event) => EventHandler::handle(self, event).await,
                BehaviourEvent::Mdns(event) => EventHandler::handle(self, event).await,
                BehaviourEvent::Ping(event) => EventHandler::handle(self, event).await,
                BehaviourEvent::Relay(event) => trace!("relay: {:?}", event),
                BehaviourEvent::Stream(_) => {}
            },
            SwarmEvent::NewListenAddr {
                listener_id,
                address,
            } => {
                let local_peer_id = *self.swarm.local_peer_id();
                if let Err(err) = self
                    .event_sender
                    .send(NetworkEvent::ListeningOn {
                        listener_id,
                        address: address.with(multiaddr::Protocol::P2p(local_peer_id)),
                    })
                    .await
                {
                    error!(?err, "Failed to send listening on event");
                }
            }
            SwarmEvent::IncomingConnection { .. } => {}
            SwarmEvent::ConnectionEstablished {
                peer_id,
                endpoint,
                num_established,
                ..
            } => {
                if endpoint.is_dialer() {
                    if let Some(sender) = self.pending_dial.remove(&peer_id) {
                        let _ = sender.send(Ok(Some(())));
                    }
                }

                if num_established.get() == 1 {
                    if let Err(err) = self
                        .event_sender
                        .send(NetworkEvent::PeerConnected { peer_id })
                        .await
                    {
                        error!(?err, "Failed to send peer connected event");
                    }
                }
            }
            SwarmEvent::ConnectionClosed {
                peer_id,
                connection_id,
                endpoint,
                num_established,
                cause,
            } => {
                debug!(
                    "Connection closed: {} {:?} {:?} {} {:?}",
                    peer_id, connection_id, endpoint, num_established, cause
                );

                if num_established == 0 {
                    if let Err(err) = self
                        .event_sender
                        .send(NetworkEvent::PeerDisconnected { peer_id })
                        .await
                    {
                        error!(?err, "Failed to send peer disconnected event");
                    }
                }
            }
            SwarmEvent::OutgoingConnectionError { peer_id, error, .. } => {
                if let Some(peer_id) = peer_id {
                    if let Some(sender) = self.pending_dial.remove(&peer_id) {
                        let _ = sender.send(Err(eyre::eyre!(error)));
                    }
                }
            }
            SwarmEvent::IncomingConnectionError { .. } => {}
            SwarmEvent::Dialing {
                peer_id: Some(peer_id),
                ..
            } => debug!("Dialing peer: {}", peer_id),
            SwarmEvent::ExpiredListenAddr { address, .. } => {
                trace!("Expired listen address: {}", address)
            }
            SwarmEvent::ListenerClosed {
                addresses, reason, ..
            } => trace!("Listener closed: {:?} {:?}", addresses, reason.err()),
            SwarmEvent::ListenerError { error, .. } => trace!("Listener error: {:?}", error),
            SwarmEvent::NewExternalAddrCandidate { address } => {
                trace!("New external address candidate: {}", address)
            }
            SwarmEvent::ExternalAddrConfirmed { address } => {
                trace!("External address confirmed: {}", address)
            }
            SwarmEvent::ExternalAddrExpired { address } => {
                trace!("External address expired: {}", address)
            }
            unhandled => warn!("Unhandled event: {:?}", unhandled),
        }
    }
}
