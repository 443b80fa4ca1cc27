//! The protocol engine: one running connection to the bridge peer.
//!
//! Wires the channel tasks, the frame pump, the dispatcher, and the
//! correlation registry together. All shared state is owned here and
//! injected downward; nothing is global.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use viaduct_protocol::{Command, Envelope, LogLevel, LogPayload, ResponsePayload};

use crate::channel::{self, ChannelClosed, FrameWriter};
use crate::codec::Frame;
use crate::correlation::{CorrelationRegistry, RequestError};
use crate::dispatch::{Deps, Dispatcher};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Reader-to-dispatcher queue bound; the backpressure policy.
    pub queue_depth: usize,
    /// Deadline for outbound-initiated requests.
    pub request_timeout: Duration,
    pub max_frame_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_depth: 128,
            request_timeout: Duration::from_secs(30),
            max_frame_bytes: crate::codec::DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

/// A running engine attached to one byte stream.
pub struct Engine {
    handle: EngineHandle,
    pump: JoinHandle<()>,
}

impl Engine {
    /// Attach to a stream and start the reader, writer, and pump tasks.
    pub fn spawn<R, W>(read: R, write: W, deps: Arc<Deps>, config: EngineConfig) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (mut frames, writer) =
            channel::spawn(read, write, config.queue_depth, config.max_frame_bytes);
        let correlation = CorrelationRegistry::new(config.request_timeout);
        let dispatcher = Dispatcher::new(deps, writer.clone());

        let handle = EngineHandle {
            writer: writer.clone(),
            correlation: Arc::clone(&correlation),
        };

        let pump = tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                match frame {
                    Frame::Envelope(envelope) => {
                        route(&dispatcher, &correlation, envelope).await;
                    }
                    Frame::Malformed { id: Some(id), detail } => {
                        debug!(id, "malformed envelope: {detail}");
                        let error = viaduct_protocol::ErrorPayload::new(
                            viaduct_protocol::ErrorCode::DecodeError,
                            detail,
                        );
                        if writer.write(Envelope::error(id, error)).await.is_err() {
                            break;
                        }
                    }
                    Frame::Malformed { id: None, detail } => {
                        // No id to correlate a reply to; drop it.
                        warn!("dropping malformed envelope: {detail}");
                    }
                }
            }
            correlation.drain().await;
            info!("peer closed the channel, engine stopped");
        });

        Self { handle, pump }
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Wait until the peer closes the stream.
    pub async fn finished(self) {
        let _ = self.pump.await;
    }
}

/// Inbound `response`/`error` frames resolve outstanding outbound
/// requests; everything else goes to the dispatcher in decode order.
async fn route(
    dispatcher: &Arc<Dispatcher>,
    correlation: &Arc<CorrelationRegistry>,
    envelope: Envelope,
) {
    match (envelope.command, envelope.id) {
        (Command::Response(payload), Some(id)) => {
            if !correlation.fulfill(id, Ok(payload)).await {
                debug!(id, "reply for unknown or expired request");
            }
        }
        (Command::Error(payload), Some(id)) => {
            if !correlation.fulfill(id, Err(payload)).await {
                debug!(id, "error reply for unknown or expired request");
            }
        }
        (command @ (Command::Response(_) | Command::Error(_)), None) => {
            warn!(kind = command.kind(), "reply envelope without an id, dropping");
        }
        (command, id) => dispatcher.dispatch(Envelope { id, command }),
    }
}

/// Clonable surface for daemon-side code: push events, issue requests.
#[derive(Clone)]
pub struct EngineHandle {
    writer: FrameWriter,
    correlation: Arc<CorrelationRegistry>,
}

impl EngineHandle {
    /// Push an unsolicited event to the peer (no id, no reply expected).
    pub async fn send_event(&self, command: Command) -> Result<(), ChannelClosed> {
        self.writer.write(Envelope::event(command)).await
    }

    /// Forward a log line to the peer. Log frames never carry an id.
    pub async fn send_log(
        &self,
        level: LogLevel,
        module: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), ChannelClosed> {
        self.send_event(Command::Log(LogPayload {
            level,
            module: module.into(),
            message: message.into(),
            metadata: None,
        }))
        .await
    }

    /// Issue an outbound-initiated request and await the correlated reply.
    pub async fn request(&self, command: Command) -> Result<ResponsePayload, RequestError> {
        let (id, rx) = self.correlation.register().await;
        if self
            .writer
            .write(Envelope::new(Some(id), command))
            .await
            .is_err()
        {
            self.correlation.abort(id).await;
            return Err(RequestError::ChannelClosed);
        }
        self.correlation.wait(id, rx).await
    }
}
