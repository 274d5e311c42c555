use core::time::Duration;
use std::collections::BTreeMap;

use edgemesh_network::stream::{Message, Stream};
use edgemesh_primitives::{AppStatus, Hash};
use eyre::{Result as EyreResult, WrapErr};
use futures_util::{SinkExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;

/// Gossip topic carrying [`AppStatus`] broadcasts.
pub const STATUS_TOPIC: &str = "/edgemesh/appstatus/0.1.0";

/// Requests on an appsync stream. The first frame a caller sends selects
/// the conversation.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum SyncRequest {
    /// Announce the caller and hold the stream open for keep-alives.
    PostStatus { node_id: String },
    /// Fetch the artifact recorded under `data_hash`.
    GetData { data_hash: Hash },
    /// One-shot status query.
    GetStatus,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum SyncResponse {
    /// Keep-alive record on a `PostStatus` stream; `data` carries the
    /// serving node's best block number.
    Result { data: String },
    /// One chunk of a `GetData` artifact.
    Data { chunks: BTreeMap<String, Vec<u8>> },
    /// Reply to `GetStatus`.
    Status(AppStatus),
    /// Terminal status closing the conversation.
    Error(CloseStatus),
}

#[derive(Copy, Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum CloseStatus {
    NotFound,
    Timeout,
    Shutdown,
}

impl From<CloseStatus> for crate::error::SyncError {
    fn from(status: CloseStatus) -> Self {
        match status {
            CloseStatus::NotFound => Self::NotFound,
            CloseStatus::Timeout => Self::Timeout,
            CloseStatus::Shutdown => Self::Shutdown,
        }
    }
}

pub(crate) async fn send<T: Serialize>(stream: &mut Stream, message: &T) -> EyreResult<()> {
    let encoded = serde_json::to_vec(message)?;

    stream.send(Message::new(encoded)).await?;

    Ok(())
}

pub(crate) async fn recv<T: DeserializeOwned>(
    stream: &mut Stream,
    budget: Duration,
) -> EyreResult<Option<T>> {
    let message = timeout(budget, stream.try_next())
        .await
        .wrap_err("timed out receiving message from peer")?
        .wrap_err("error receiving message from peer")?;

    let Some(message) = message else {
        return Ok(None);
    };

    let decoded = serde_json::from_slice(&message.data)?;

    Ok(Some(decoded))
}
