use core::time::Duration;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use edgemesh_network::stream::Stream;
use edgemesh_primitives::{AppStatus, Hash};
use eyre::Result as EyreResult;
use futures_util::SinkExt;
use libp2p::PeerId;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

use crate::client::IncomingStream;
use crate::config::SyncerConfig;
use crate::error::SyncError;
use crate::overlay::Overlay;
use crate::store::{ApplicationStore, BlockchainStore};
use crate::wire::{self, CloseStatus, SyncRequest, SyncResponse};

const KEEP_ALIVE_FLOOR: Duration = Duration::from_secs(1);

/// Server side of the appsync protocol: one task per accepted stream,
/// three conversations (`PostStatus`, `GetData`, `GetStatus`).
pub struct SyncAppService {
    ctx: StreamCtx,
    started: AtomicBool,
}

/// Everything a per-stream task needs.
#[derive(Clone)]
struct StreamCtx {
    overlay: Arc<dyn Overlay>,
    app_store: Arc<dyn ApplicationStore>,
    chain: Arc<dyn BlockchainStore>,
    config: SyncerConfig,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

/// How a stream ended, for the close log.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum CloseReason {
    Ok,
    ClientGone,
    ServerShutdown,
    Error,
}

impl SyncAppService {
    pub fn new(
        overlay: Arc<dyn Overlay>,
        app_store: Arc<dyn ApplicationStore>,
        chain: Arc<dyn BlockchainStore>,
        config: SyncerConfig,
    ) -> Self {
        Self {
            ctx: StreamCtx {
                overlay,
                app_store,
                chain,
                config,
                cancel: CancellationToken::new(),
                tracker: TaskTracker::new(),
            },
            started: AtomicBool::new(false),
        }
    }

    /// Spawn the accept loop over the inbound stream feed.
    pub fn start(&self, streams: mpsc::Receiver<IncomingStream>) -> EyreResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(SyncError::AlreadyStarted.into());
        }

        let _handle = self.ctx.tracker.spawn(accept_streams(streams, self.ctx.clone()));

        Ok(())
    }

    /// Cancel all in-flight streams and wait for their tasks.
    pub async fn close(&self) {
        self.ctx.cancel.cancel();
        self.ctx.tracker.close();
        self.ctx.tracker.wait().await;
    }
}

async fn accept_streams(mut streams: mpsc::Receiver<IncomingStream>, ctx: StreamCtx) {
    loop {
        tokio::select! {
            () = ctx.cancel.cancelled() => break,
            next = streams.recv() => {
                let Some((peer_id, stream)) = next else { break };

                debug!(%peer_id, "Accepted sync stream");

                let _handle = ctx.tracker.spawn(serve_stream(*stream, peer_id, ctx.clone()));
            }
        }
    }

    debug!("sync stream accept loop stopped");
}

async fn serve_stream(mut stream: Stream, peer_id: PeerId, ctx: StreamCtx) {
    let request = match wire::recv::<SyncRequest>(&mut stream, ctx.config.status_timeout).await {
        Ok(Some(request)) => request,
        Ok(None) => {
            debug!(%peer_id, "Peer closed stream before sending a request");
            return;
        }
        Err(err) => {
            debug!(%peer_id, %err, "Failed to read sync request");
            return;
        }
    };

    let reason = match request {
        SyncRequest::GetStatus => serve_get_status(&mut stream, &ctx).await,
        SyncRequest::PostStatus { node_id } => {
            serve_post_status(&mut stream, peer_id, &node_id, &ctx).await
        }
        SyncRequest::GetData { data_hash } => {
            serve_get_data(&mut stream, peer_id, &data_hash, &ctx).await
        }
    };

    debug!(%peer_id, ?reason, "Sync stream closed");

    let _ = stream.close().await;
}

async fn serve_get_status(stream: &mut Stream, ctx: &StreamCtx) -> CloseReason {
    let app = ctx.app_store.endpoint_application();
    let addr = ctx
        .overlay
        .listen_addrs()
        .await
        .first()
        .map(ToString::to_string)
        .unwrap_or_default();

    let status = AppStatus::from_application(&app, addr);

    match wire::send(stream, &SyncResponse::Status(status)).await {
        Ok(()) => CloseReason::Ok,
        Err(err) => {
            debug!(%err, "Failed to send status reply");
            CloseReason::ClientGone
        }
    }
}

/// Hold the stream open, emitting a result record per keep-alive tick.
/// The record carries our best block number.
async fn serve_post_status(
    stream: &mut Stream,
    peer_id: PeerId,
    node_id: &str,
    ctx: &StreamCtx,
) -> CloseReason {
    debug!(%peer_id, %node_id, "Peer announced itself");

    let keep_alive = ctx.config.publish_interval / 10;
    let mut ticker = interval(keep_alive.max(KEEP_ALIVE_FLOOR));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = ctx.cancel.cancelled() => {
                let _ = wire::send(stream, &SyncResponse::Error(CloseStatus::Shutdown)).await;
                return CloseReason::ServerShutdown;
            }
            _ = ticker.tick() => {
                let number = ctx.chain.header().map(|h| h.number).unwrap_or_default();
                let record = SyncResponse::Result {
                    data: number.to_string(),
                };

                if let Err(err) = wire::send(stream, &record).await {
                    debug!(%peer_id, %err, "Keep-alive send failed");
                    return CloseReason::ClientGone;
                }
            }
        }
    }
}

/// Locate the artifact behind `data_hash` and stream its chunks, bounded
/// by the block timeout. Partial results stand; the timeout closes the
/// stream with a timeout status.
async fn serve_get_data(
    stream: &mut Stream,
    peer_id: PeerId,
    data_hash: &Hash,
    ctx: &StreamCtx,
) -> CloseReason {
    let serve = send_artifact(stream, data_hash, ctx);

    tokio::select! {
        () = ctx.cancel.cancelled() => {
            let _ = wire::send(stream, &SyncResponse::Error(CloseStatus::Shutdown)).await;
            CloseReason::ServerShutdown
        }
        outcome = timeout(ctx.config.block_timeout, serve) => match outcome {
            Ok(reason) => reason,
            Err(_elapsed) => {
                debug!(%peer_id, %data_hash, "GetData exceeded the block timeout");
                let _ = wire::send(stream, &SyncResponse::Error(CloseStatus::Timeout)).await;
                CloseReason::Error
            }
        }
    }
}

async fn send_artifact(stream: &mut Stream, data_hash: &Hash, ctx: &StreamCtx) -> CloseReason {
    let Some(block_hash) = ctx.chain.read_tx_lookup(data_hash) else {
        debug!(%data_hash, "Data hash not found");
        let _ = wire::send(stream, &SyncResponse::Error(CloseStatus::NotFound)).await;
        return CloseReason::Ok;
    };

    let Some(block) = ctx.chain.get_block_by_hash(&block_hash, true) else {
        debug!(%data_hash, %block_hash, "Lookup points at a missing block");
        let _ = wire::send(stream, &SyncResponse::Error(CloseStatus::NotFound)).await;
        return CloseReason::Ok;
    };

    let header = match serde_json::to_vec(&block.header) {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!(%err, "Failed to encode block header");
            return CloseReason::Error;
        }
    };

    if !send_chunk(stream, "header", header).await {
        return CloseReason::ClientGone;
    }

    if let Some(tx) = block.transaction(data_hash) {
        if !send_chunk(stream, "transaction", tx.payload.clone()).await {
            return CloseReason::ClientGone;
        }
    }

    match ctx.chain.get_receipts_by_hash(&block_hash) {
        Ok(receipts) => {
            for receipt in receipts {
                if receipt.tx_hash != *data_hash {
                    continue;
                }

                let Ok(bytes) = serde_json::to_vec(&receipt) else {
                    continue;
                };

                if !send_chunk(stream, "receipt", bytes).await {
                    return CloseReason::ClientGone;
                }
            }
        }
        Err(err) => debug!(%block_hash, %err, "Failed to read receipts"),
    }

    CloseReason::Ok
}

async fn send_chunk(stream: &mut Stream, name: &str, bytes: Vec<u8>) -> bool {
    let mut chunks = BTreeMap::new();
    let _ = chunks.insert(name.to_owned(), bytes);

    match wire::send(stream, &SyncResponse::Data { chunks }).await {
        Ok(()) => true,
        Err(err) => {
            debug!(%err, "Failed to send data chunk");
            false
        }
    }
}
