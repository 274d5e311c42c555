//! The libp2p overlay: gossipsub topics for status broadcasts,
//! point-to-point streams for the sync protocol, and connection liveness
//! events.

use std::collections::hash_map::{self, HashMap};

use eyre::{Result as EyreResult, WrapErr};
use futures_util::StreamExt;
use libp2p::kad::QueryId;
use libp2p::swarm::Swarm;
use libp2p::{PeerId, Stream as P2pStream};
use tokio::sync::{mpsc, oneshot};
use tracing::error;

mod behaviour;
pub mod client;
pub mod config;
mod events;
pub mod stream;
pub mod types;

use behaviour::Behaviour;
use client::{Command, NetworkClient};
use config::NetworkConfig;
use stream::{Stream, APPSYNC_PROTOCOL};
use types::NetworkEvent;

const CHANNEL_SIZE: usize = 32;

/// Build the swarm and spawn the event loop.
///
/// Returns the command client and the single receiver carrying every
/// overlay event (gossip messages, connection changes, inbound streams).
pub fn run(config: &NetworkConfig) -> EyreResult<(NetworkClient, mpsc::Receiver<NetworkEvent>)> {
    let swarm = Behaviour::build_swarm(config)?;

    let mut control = swarm.behaviour().stream.new_control();
    let incoming_streams = control
        .accept(APPSYNC_PROTOCOL)
        .wrap_err("failed to register the appsync stream protocol")?;

    let (command_sender, command_receiver) = mpsc::channel(CHANNEL_SIZE);
    let (event_sender, event_receiver) = mpsc::channel(CHANNEL_SIZE);

    let client = NetworkClient::new(
        *swarm.local_peer_id(),
        command_sender,
        swarm.behaviour().stream.new_control(),
    );

    let event_loop = EventLoop::new(swarm, command_receiver, event_sender, incoming_streams);

    drop(tokio::spawn(event_loop.run()));

    Ok((client, event_receiver))
}

pub(crate) struct EventLoop {
    swarm: Swarm<Behaviour>,
    command_receiver: mpsc::Receiver<Command>,
    event_sender: mpsc::Sender<NetworkEvent>,
    incoming_streams: libp2p_stream::IncomingStreams,
    pending_dial: HashMap<PeerId, oneshot::Sender<EyreResult<Option<()>>>>,
    pending_bootstrap: HashMap<QueryId, oneshot::Sender<EyreResult<Option<()>>>>,
}

impl EventLoop {
    fn new(
        swarm: Swarm<Behaviour>,
        command_receiver: mpsc::Receiver<Command>,
        event_sender: mpsc::Sender<NetworkEvent>,
        incoming_streams: libp2p_stream::IncomingStreams,
    ) -> Self {
        Self {
            swarm,
            command_receiver,
            event_sender,
            incoming_streams,
            pending_dial: HashMap::default(),
            pending_bootstrap: HashMap::default(),
        }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                event = self.swarm.next() => self.handle_swarm_event(event.expect("Swarm stream to be infinite.")).await,
                command = self.command_receiver.recv() => match command {
                    Some(c) => self.handle_command(c).await,
                    None => break,
                },
                Some((peer, stream)) = self.incoming_streams.next() => {
                    self.handle_incoming_stream(peer, stream).await;
                }
            }
        }
    }

    async fn handle_incoming_stream(&mut self, peer_id: PeerId, stream: P2pStream) {
        if let Err(err) = self
            .event_sender
            .send(NetworkEvent::StreamOpened {
                peer_id,
                stream: Box::new(Stream::new(stream)),
            })
            .await
        {
            error!(?err, "Failed to send stream opened event");
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::ListenOn { addr, sender } => {
                let _ = match self.swarm.listen_on(addr) {
                    Ok(_) => sender.send(Ok(())),
                    Err(e) => sender.send(Err(eyre::eyre!(e))),
                };
            }
            Command::Dial {
                mut peer_addr,
                sender,
            } => {
                let Some(multiaddr::Protocol::P2p(peer_id)) = peer_addr.pop() else {
                    let _ = sender.send(Err(eyre::eyre!(
                        "no peer id in address: {}",
                        peer_addr
                    )));
                    return;
                };

                match self.pending_dial.entry(peer_id) {
                    hash_map::Entry::Occupied(_) => {
                        let _ = sender.send(Ok(None));
                    }
                    hash_map::Entry::Vacant(entry) => {
                        self.swarm
                            .behaviour_mut()
                            .kad
                            .add_address(&peer_id, peer_addr.clone());

                        match self.swarm.dial(peer_addr) {
                            Ok(()) => {
                                let _ = entry.insert(sender);
                            }
                            Err(e) => {
                                let _ = sender.send(Err(eyre::eyre!(e)));
                            }
                        }
                    }
                }
            }
            Command::Bootstrap { sender } => match self.swarm.behaviour_mut().kad.bootstrap() {
                Ok(query_id) => {
                    let _ = self.pending_bootstrap.insert(query_id, sender);
                }
                Err(err) => {
                    let _ = sender.send(Err(eyre::eyre!(err)));
                }
            },
            Command::Subscribe { topic, sender } => {
                let _ = match self.swarm.behaviour_mut().gossipsub.subscribe(&topic) {
                    Ok(_) => sender.send(Ok(topic)),
                    Err(err) => sender.send(Err(eyre::eyre!(err))),
                };
            }
            Command::Unsubscribe { topic, sender } => {
                let _ = match self.swarm.behaviour_mut().gossipsub.unsubscribe(&topic) {
                    Ok(_) => sender.send(Ok(topic)),
                    Err(err) => sender.send(Err(eyre::eyre!(err))),
                };
            }
            Command::Publish {
                topic,
                data,
                sender,
            } => {
                let _ = match self.swarm.behaviour_mut().gossipsub.publish(topic, data) {
                    Ok(id) => sender.send(Ok(id)),
                    Err(err) => sender.send(Err(eyre::eyre!(err))),
                };
            }
            Command::ConnectedPeers { sender } => {
                let _ = sender.send(self.swarm.connected_peers().copied().collect());
            }
            Command::PeerCount { sender } => {
                let _ = sender.send(self.swarm.connected_peers().count());
            }
            Command::ListenAddrs { sender } => {
                let _ = sender.send(self.swarm.listeners().cloned().collect());
            }
        }
    }
}
