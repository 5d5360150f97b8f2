//! Output side of a listener stream.

use super::frame::Frame;
use bytes::Bytes;
use futures::future::BoxFuture;
use std::convert::Infallible;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Frames buffered between a session and the HTTP body.
pub const DEFAULT_SINK_CAPACITY: usize = 16;

/// A frame could not be written.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WriteError {
    /// The client side of the stream is gone.
    #[error("client stream closed")]
    Closed,
}

/// Destination for session frames.
///
/// Uses boxed futures so sessions can be driven over any transport,
/// including in-memory sinks in tests.
pub trait FrameSink: Send {
    /// Writes one frame and flushes it to the client.
    fn send_frame(&mut self, frame: Frame) -> BoxFuture<'_, Result<(), WriteError>>;

    /// Resolves once the client has gone away.
    fn closed(&self) -> BoxFuture<'_, ()>;
}

/// Sink backed by a bounded channel whose receiver feeds an HTTP body.
///
/// Dropping the body (client disconnect or a failed write in the server)
/// closes the channel, which the session observes through
/// [`FrameSink::closed`] or a failed send.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<Result<Bytes, Infallible>>,
}

impl ChannelSink {
    /// Creates a sink and the stream to hand to the response body.
    pub fn new(capacity: usize) -> (Self, ReceiverStream<Result<Bytes, Infallible>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, ReceiverStream::new(rx))
    }
}

impl FrameSink for ChannelSink {
    fn send_frame(&mut self, frame: Frame) -> BoxFuture<'_, Result<(), WriteError>> {
        Box::pin(async move {
            self.tx
                .send(Ok(frame.encode()))
                .await
                .map_err(|_| WriteError::Closed)
        })
    }

    fn closed(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.tx.closed())
    }
}
