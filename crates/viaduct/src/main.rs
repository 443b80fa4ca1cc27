use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use viaduct::config::Settings;
use viaduct::dispatch::Deps;
use viaduct::engine::Engine;
use viaduct::offline::{OfflineRegistry, OfflineSender, OfflineStore};

const APP_NAME: &str = "viaduct";

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.common)?;

    let settings = Settings::load(cli.common.config.as_deref())?;

    match cli.command {
        Command::Serve(cmd) => run_serve(settings, cmd),
    }
}

#[tokio::main]
async fn run_serve(settings: Settings, cmd: ServeCommand) -> Result<()> {
    handle_serve(settings, cmd).await
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Viaduct - bridge daemon between a chat bridge and the local message store.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Reduce output to only errors
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    quiet: bool,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Enable trace logging (overrides other levels)
    #[arg(long, global = true)]
    trace: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the bridge protocol over stdio or a Unix socket.
    Serve(ServeCommand),
}

#[derive(Debug, Args)]
struct ServeCommand {
    /// Listen on a Unix socket instead of stdio.
    #[arg(long, value_name = "PATH", conflicts_with = "stdio")]
    socket: Option<PathBuf>,

    /// Serve a single peer over stdin/stdout (the default).
    #[arg(long)]
    stdio: bool,
}

/// Logs go to stderr; stdout belongs to the protocol when serving stdio.
fn init_logging(common: &CommonOpts) -> Result<()> {
    let default_level = if common.trace {
        "trace"
    } else if common.quiet {
        "error"
    } else {
        match common.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_env("VIADUCT_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(format!("{APP_NAME}={default_level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
    Ok(())
}

async fn handle_serve(settings: Settings, cmd: ServeCommand) -> Result<()> {
    // Real daemon adapters are platform integrations wired in by the
    // embedding build; the standalone binary runs the offline set.
    let deps = Deps::new(
        Arc::new(OfflineStore),
        Arc::new(OfflineRegistry),
        Arc::new(OfflineSender),
    );
    let engine_config = settings.engine_config();

    let socket = cmd.socket.or_else(|| {
        if cmd.stdio { None } else { settings.socket.clone() }
    });

    match socket {
        None => {
            info!("serving bridge protocol on stdio");
            let engine = Engine::spawn(
                tokio::io::stdin(),
                tokio::io::stdout(),
                deps,
                engine_config,
            );
            engine.finished().await;
            Ok(())
        }
        Some(path) => {
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("removing stale socket {}", path.display()))?;
            }
            let listener = tokio::net::UnixListener::bind(&path)
                .with_context(|| format!("binding {}", path.display()))?;
            info!(socket = %path.display(), "serving bridge protocol");

            loop {
                let (stream, _addr) = listener.accept().await.context("accepting peer")?;
                info!("peer connected");
                let (read, write) = stream.into_split();
                let engine = Engine::spawn(read, write, Arc::clone(&deps), engine_config.clone());
                engine.finished().await;
                info!("peer disconnected");
            }
        }
    }
}
