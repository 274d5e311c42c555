use core::pin::Pin;
use core::task::{Context, Poll};

use futures_util::{Sink as FuturesSink, SinkExt, Stream as FuturesStream, StreamExt};
use libp2p::{Stream as P2pStream, StreamProtocol};
use tokio::io::{AsyncRead, AsyncWrite, BufStream};
use tokio_util::codec::Framed;
use tokio_util::compat::FuturesAsyncReadCompatExt;

mod codec;

use codec::MessageCodec;
pub use codec::{CodecError, Message};

pub const MAX_MESSAGE_SIZE: usize = 8 * 1_024 * 1_024;

/// Protocol id for the application sync point-to-point streams.
pub const APPSYNC_PROTOCOL: StreamProtocol = StreamProtocol::new("/edgemesh/appsync/0.1.0");

/// The byte transport a [`Stream`] runs over.
///
/// Production streams wrap a libp2p substream; tests drive the same codec
/// over in-memory duplex pipes.
pub trait StreamIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> StreamIo for T {}

pub struct Stream {
    inner: Framed<Box<dyn StreamIo>, MessageCodec>,
}

impl core::fmt::Debug for Stream {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Stream").finish_non_exhaustive()
    }
}

impl Stream {
    #[must_use]
    pub fn new(stream: P2pStream) -> Self {
        Self::from_io(BufStream::new(stream.compat()))
    }

    pub fn from_io<T: StreamIo + 'static>(io: T) -> Self {
        Self {
            inner: Framed::new(Box::new(io), MessageCodec::new(MAX_MESSAGE_SIZE)),
        }
    }
}

impl FuturesStream for Stream {
    type Item = Result<Message, CodecError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl FuturesSink<Message> for Stream {
    type Error = CodecError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready_unpin(cx)
    }

    fn start_send(mut self: Pin<&mut Self>, item: Message) -> Result<(), Self::Error> {
        self.inner.start_send_unpin(item)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_flush_unpin(cx)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_close_unpin(cx)
    }
}
