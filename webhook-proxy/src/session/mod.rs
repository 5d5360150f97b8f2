//! Listener streaming sessions.
//!
//! Each authorized `GET /listen/:request_id` becomes one [`StreamSession`]
//! that writes server-sent event [`Frame`]s into a [`FrameSink`] until the
//! payload is delivered or the wait ends some other way.

mod frame;
mod sink;
mod stream;

pub use frame::Frame;
pub use sink::{ChannelSink, FrameSink, WriteError, DEFAULT_SINK_CAPACITY};
pub use stream::{
    SessionConfig, SessionContext, SessionState, StreamSession, TerminationReason,
    DEFAULT_KEEPALIVE_INTERVAL, DEFAULT_STREAM_TIMEOUT,
};
