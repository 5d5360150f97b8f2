//! Server-sent event frames written to listeners.

use bytes::Bytes;

const DATA_PREFIX: &[u8] = b"data: ";
const FRAME_END: &[u8] = b"\n\n";

/// One event on a listener stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// The raw webhook body.
    Data(Bytes),
    /// The signature that accompanied the webhook.
    Signature(String),
    /// Marks the end of a delivery.
    EndOfTransmission,
    /// Sent periodically while waiting.
    KeepAlive,
    /// The server is giving up on this listener (deadline or shutdown).
    ServerGone,
}

impl Frame {
    /// Encodes the frame as `data: <payload>\n\n`.
    pub fn encode(&self) -> Bytes {
        let payload: &[u8] = match self {
            Frame::Data(content) => content.as_ref(),
            Frame::Signature(signature) => {
                return encode_with(&[b"signature=", signature.as_bytes()]);
            }
            Frame::EndOfTransmission => b"eot",
            Frame::KeepAlive => b"keep-alive",
            Frame::ServerGone => b"server gone",
        };
        encode_with(&[payload])
    }
}

fn encode_with(parts: &[&[u8]]) -> Bytes {
    let len = parts.iter().map(|p| p.len()).sum::<usize>() + DATA_PREFIX.len() + FRAME_END.len();
    let mut buf = Vec::with_capacity(len);
    buf.extend_from_slice(DATA_PREFIX);
    for part in parts {
        buf.extend_from_slice(part);
    }
    buf.extend_from_slice(FRAME_END);
    Bytes::from(buf)
}
