//! Liveness and startup handlers.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use viaduct_protocol::{Command, LogLevel, ResponsePayload};

use crate::dispatch::{Deps, HandlerResult};

use super::mismatch;

pub(super) async fn ping(_deps: Arc<Deps>, command: Command) -> HandlerResult {
    match command {
        Command::Ping => Ok(Some(ResponsePayload::Ack {})),
        other => Err(mismatch("ping", &other)),
    }
}

/// The peer announces it is about to replay history. Nothing to prepare
/// on this side; acknowledge so the peer can proceed.
pub(super) async fn pre_startup_sync(_deps: Arc<Deps>, command: Command) -> HandlerResult {
    match command {
        Command::PreStartupSync => Ok(Some(ResponsePayload::Ack {})),
        other => Err(mismatch("pre_startup_sync", &other)),
    }
}

/// Forward a peer log line into our own logging pipeline.
pub(super) async fn log(_deps: Arc<Deps>, command: Command) -> HandlerResult {
    let payload = match command {
        Command::Log(payload) => payload,
        other => return Err(mismatch("log", &other)),
    };
    let module = payload.module.as_str();
    match payload.level {
        LogLevel::Debug => debug!(peer_module = module, "{}", payload.message),
        LogLevel::Info => info!(peer_module = module, "{}", payload.message),
        LogLevel::Warn => warn!(peer_module = module, "{}", payload.message),
        LogLevel::Error | LogLevel::Fatal => error!(peer_module = module, "{}", payload.message),
    }
    Ok(None)
}
