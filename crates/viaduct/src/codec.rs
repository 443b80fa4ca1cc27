//! Newline-delimited JSON frame codec.
//!
//! The channel may deliver arbitrary byte chunks; the codec buffers until a
//! complete line is available and then yields zero or more frames per read,
//! preserving arrival order. A frame that parses as JSON but not as a known
//! envelope is surfaced as [`Frame::Malformed`] with whatever correlation
//! id could be salvaged, so the dispatcher can still produce exactly one
//! error reply for it.

use bytes::{BufMut, BytesMut};
use serde_json::Value;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use viaduct_protocol::Envelope;

/// Frames larger than this indicate a corrupt stream, not a large payload.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// One decoded unit off the wire.
#[derive(Debug)]
pub enum Frame {
    Envelope(Envelope),
    /// Undecodable line; `id` is salvaged when the line was at least valid
    /// JSON with a numeric `id` field.
    Malformed { id: Option<u64>, detail: String },
}

/// Stream-fatal codec failures. Per-frame JSON problems are not errors --
/// they come through as [`Frame::Malformed`].
#[derive(Debug, Error)]
pub enum CodecError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("frame exceeds {max} bytes")]
    FrameTooLong { max: usize },
}

pub struct EnvelopeCodec {
    max_frame_bytes: usize,
    // Scan resumes here instead of rescanning the whole buffer each read.
    next_index: usize,
}

impl EnvelopeCodec {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            max_frame_bytes,
            next_index: 0,
        }
    }
}

impl Default for EnvelopeCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

fn parse_line(line: &[u8]) -> Frame {
    match serde_json::from_slice::<Envelope>(line) {
        Ok(envelope) => Frame::Envelope(envelope),
        Err(err) => {
            let id = serde_json::from_slice::<Value>(line)
                .ok()
                .and_then(|value| value.get("id").and_then(Value::as_u64));
            Frame::Malformed {
                id,
                detail: err.to_string(),
            }
        }
    }
}

impl Decoder for EnvelopeCodec {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, CodecError> {
        loop {
            let Some(offset) = buf[self.next_index..].iter().position(|b| *b == b'\n') else {
                if buf.len() > self.max_frame_bytes {
                    return Err(CodecError::FrameTooLong {
                        max: self.max_frame_bytes,
                    });
                }
                self.next_index = buf.len();
                return Ok(None);
            };

            let end = self.next_index + offset;
            self.next_index = 0;
            let mut line = buf.split_to(end + 1);
            line.truncate(line.len() - 1);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            if line.iter().all(|b| b.is_ascii_whitespace()) {
                continue;
            }
            if line.len() > self.max_frame_bytes {
                return Err(CodecError::FrameTooLong {
                    max: self.max_frame_bytes,
                });
            }
            return Ok(Some(parse_line(&line)));
        }
    }
}

impl Encoder<&Envelope> for EnvelopeCodec {
    type Error = CodecError;

    fn encode(&mut self, envelope: &Envelope, buf: &mut BytesMut) -> Result<(), CodecError> {
        let json = serde_json::to_vec(envelope)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
        buf.reserve(json.len() + 1);
        buf.put_slice(&json);
        buf.put_u8(b'\n');
        Ok(())
    }
}
