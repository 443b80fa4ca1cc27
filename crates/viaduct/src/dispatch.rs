//! Command dispatch.
//!
//! Envelopes move through `Received -> Decoded -> Dispatched ->
//! (Completed | Failed | Dropped)`. The dispatcher owns a kind-to-handler
//! map built at startup and nothing else; handlers get their dependencies
//! injected and never touch framing. A failing or panicking handler
//! produces exactly one structured error reply when the request carried an
//! id, and never takes the engine down with it.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, error, warn};

use viaduct_protocol::{Command, Envelope, ErrorCode, ErrorPayload, ResponsePayload};

use crate::channel::FrameWriter;
use crate::registry::{ChatRegistry, MessageSender, RegistryError, SendError};
use crate::resolve::{ResolveError, Resolver};
use crate::store::MessageStore;

/// Shared dependencies injected into every handler.
pub struct Deps {
    pub store: Arc<dyn MessageStore>,
    pub registry: Arc<dyn ChatRegistry>,
    pub sender: Arc<dyn MessageSender>,
    pub resolver: Resolver,
}

impl Deps {
    pub fn new(
        store: Arc<dyn MessageStore>,
        registry: Arc<dyn ChatRegistry>,
        sender: Arc<dyn MessageSender>,
    ) -> Arc<Self> {
        let resolver = Resolver::new(Arc::clone(&store));
        Arc::new(Self {
            store,
            registry,
            sender,
            resolver,
        })
    }
}

/// Handler failure, converted to a structured error reply at the
/// dispatcher boundary.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("no chat with guid {0}")]
    ChatNotFound(String),

    #[error("no message with guid {0}")]
    MessageNotFound(String),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("{0}")]
    Internal(String),
}

impl CommandError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ChatNotFound(_) => ErrorCode::ChatNotFound,
            Self::MessageNotFound(_) => ErrorCode::MessageNotFound,
            Self::Resolve(_) | Self::Internal(_) => ErrorCode::InternalError,
        }
    }
}

impl From<SendError> for CommandError {
    fn from(err: SendError) -> Self {
        match err {
            SendError::ChatNotFound(guid) => Self::ChatNotFound(guid),
            SendError::MessageNotFound(guid) => Self::MessageNotFound(guid),
            SendError::Failed(detail) => Self::Internal(detail),
        }
    }
}

impl From<RegistryError> for CommandError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::ChatNotFound(id) | RegistryError::Unreachable(id) => {
                Self::ChatNotFound(id)
            }
            RegistryError::Internal(detail) => Self::Internal(detail),
        }
    }
}

/// `Some(payload)` becomes a success reply; `None` means the handler has
/// nothing to say (event-shaped commands).
pub type HandlerResult = Result<Option<ResponsePayload>, CommandError>;

pub type Handler = Arc<dyn Fn(Arc<Deps>, Command) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

pub struct Dispatcher {
    handlers: HashMap<&'static str, Handler>,
    deps: Arc<Deps>,
    writer: FrameWriter,
}

impl Dispatcher {
    /// Build a dispatcher with the built-in handler table.
    pub fn new(deps: Arc<Deps>, writer: FrameWriter) -> Arc<Self> {
        Arc::new(Self {
            handlers: crate::handlers::builtin(),
            deps,
            writer,
        })
    }

    /// Dispatch one decoded envelope. The handler runs on its own task so
    /// slow resolution never blocks acceptance of later envelopes; spawn
    /// order preserves decode order.
    pub fn dispatch(self: &Arc<Self>, envelope: Envelope) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run(envelope).await;
        });
    }

    async fn run(&self, envelope: Envelope) {
        let kind = envelope.command.kind();
        let is_event = envelope.command.is_event();
        let id = envelope.id;

        let Some(handler) = self.handlers.get(kind) else {
            if !is_event && id.is_some() {
                self.reply(
                    id,
                    Err(ErrorPayload::internal(format!("no handler for {kind}"))),
                )
                .await;
            } else {
                debug!(kind, "dropping envelope with no handler");
            }
            return;
        };

        if !is_event && id.is_none() {
            // Request-shaped but uncorrelated: there is no id to attach a
            // reply to, so there is nothing useful to do.
            warn!(kind, "request arrived without an id, dropping");
            return;
        }

        let future = handler(Arc::clone(&self.deps), envelope.command);
        let outcome = match tokio::spawn(future).await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(err)) => {
                debug!(kind, code = %err.code(), "handler failed: {err}");
                Err(ErrorPayload::new(err.code(), err.to_string()))
            }
            Err(join_err) => {
                error!(kind, error = %join_err, "handler crashed");
                Err(ErrorPayload::internal("internal handler failure"))
            }
        };

        if is_event {
            // No peer to inform; failures were already logged.
            return;
        }
        match outcome {
            Ok(Some(payload)) => self.reply(id, Ok(payload)).await,
            Ok(None) => {
                debug!(kind, "request handler returned no payload, acking");
                self.reply(id, Ok(ResponsePayload::Ack {})).await;
            }
            Err(error) => self.reply(id, Err(error)).await,
        }
    }

    async fn reply(&self, id: Option<u64>, outcome: Result<ResponsePayload, ErrorPayload>) {
        let Some(id) = id else {
            return;
        };
        let envelope = match outcome {
            Ok(payload) => Envelope::response(id, payload),
            Err(error) => Envelope::error(id, error),
        };
        if self.writer.write(envelope).await.is_err() {
            debug!(id, "reply dropped, channel closed");
        }
    }
}
