//! Channel plumbing: one dedicated reader task feeding a bounded frame
//! queue, one writer task serializing outbound frames.
//!
//! The queue bound is the engine's backpressure policy: when handlers fall
//! behind, the reader stops pulling bytes and the transport throttles the
//! peer. No frames are dropped. Writes from concurrently-completing
//! handlers funnel through a single mpsc so partial frames never
//! interleave on the wire.

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error};

use viaduct_protocol::Envelope;

use crate::codec::{EnvelopeCodec, Frame};

/// The peer hung up or the writer task stopped.
#[derive(Debug, thiserror::Error)]
#[error("channel closed")]
pub struct ChannelClosed;

/// Clonable handle for writing frames; order of `write` calls from a
/// single task is preserved on the wire.
#[derive(Clone)]
pub struct FrameWriter {
    tx: mpsc::Sender<Envelope>,
}

impl FrameWriter {
    pub async fn write(&self, envelope: Envelope) -> Result<(), ChannelClosed> {
        self.tx.send(envelope).await.map_err(|_| ChannelClosed)
    }
}

/// Spawn the reader and writer tasks for one connection.
///
/// Returns the inbound frame queue and the outbound writer handle. The
/// frame queue ends (returns `None`) when the peer closes the stream or a
/// stream-fatal decode error occurs.
pub fn spawn<R, W>(
    read: R,
    write: W,
    queue_depth: usize,
    max_frame_bytes: usize,
) -> (mpsc::Receiver<Frame>, FrameWriter)
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (frame_tx, frame_rx) = mpsc::channel(queue_depth);
    let (write_tx, mut write_rx) = mpsc::channel::<Envelope>(queue_depth);

    tokio::spawn(async move {
        let mut frames = FramedRead::new(read, EnvelopeCodec::new(max_frame_bytes));
        while let Some(result) = frames.next().await {
            match result {
                Ok(frame) => {
                    if frame_tx.send(frame).await.is_err() {
                        debug!("frame queue dropped, stopping reader");
                        break;
                    }
                }
                Err(err) => {
                    error!(error = %err, "stream-fatal decode error, closing channel");
                    break;
                }
            }
        }
    });

    tokio::spawn(async move {
        let mut sink = FramedWrite::new(write, EnvelopeCodec::new(max_frame_bytes));
        while let Some(envelope) = write_rx.recv().await {
            if let Err(err) = sink.send(&envelope).await {
                error!(error = %err, "write failed, closing channel");
                break;
            }
        }
        let _ = sink.flush().await;
    });

    (frame_rx, FrameWriter { tx: write_tx })
}
