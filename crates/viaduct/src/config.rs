//! Layered runtime settings: defaults, then a TOML file, then
//! `VIADUCT_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::codec::DEFAULT_MAX_FRAME_BYTES;
use crate::engine::EngineConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Unix socket to listen on; stdio when unset.
    #[serde(default)]
    pub socket: Option<PathBuf>,

    /// Deadline for outbound-initiated requests, seconds.
    pub request_timeout_secs: u64,

    /// Reader-to-dispatcher queue bound.
    pub queue_depth: usize,

    pub max_frame_bytes: usize,
}

impl Settings {
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("request_timeout_secs", 30u64)?
            .set_default("queue_depth", 128u64)?
            .set_default("max_frame_bytes", DEFAULT_MAX_FRAME_BYTES as u64)?;

        let path = config_path.map(Path::to_path_buf).or_else(default_config_path);
        if let Some(path) = path {
            if path.exists() {
                builder = builder.add_source(
                    File::from(path.as_path()).format(FileFormat::Toml).required(false),
                );
            } else if config_path.is_some() {
                anyhow::bail!("config file {} does not exist", path.display());
            }
        }

        builder = builder.add_source(Environment::with_prefix("VIADUCT"));

        builder
            .build()
            .context("assembling configuration")?
            .try_deserialize()
            .context("parsing configuration")
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            queue_depth: self.queue_depth,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_frame_bytes: self.max_frame_bytes,
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("viaduct").join("config.toml"))
}
