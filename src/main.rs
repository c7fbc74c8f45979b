//! `strata`: authoritative shared-world server, plus a few offline
//! commands over a disk store.
#![forbid(unsafe_code)]

mod config;

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use strata_net::{NetError, Server};
use strata_store::{Storage, StoreError};
use thiserror::Error;

use config::{ConfigError, FileConfig, ServerSection, Settings};

#[derive(Debug, Parser)]
#[command(name = "strata", version, about = "Shared voxel world server")]
struct Cli {
    /// Listen port
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Listen address
    #[arg(long)]
    bind: Option<IpAddr>,

    /// PEM private key for TLS
    #[arg(long, env = "SSL_KEY")]
    key: Option<PathBuf>,

    /// PEM certificate chain for TLS
    #[arg(long, env = "SSL_CERT")]
    cert: Option<PathBuf>,

    /// Most sessions open at once
    #[arg(long)]
    max_sessions: Option<usize>,

    /// Store worlds on disk under this directory instead of in memory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Milliseconds between storage pumps
    #[arg(long)]
    tick_ms: Option<u64>,

    /// TOML file with a [server] table
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write a world's stored chunks as JSON
    Export {
        world: String,
        /// Output file; stdout when absent
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Load a JSON export into a world
    Import { world: String, file: PathBuf },
    /// List a world's save slots
    Slots { world: String },
    /// Delete a world's chunks and save slots
    Clear { world: String },
}

impl Cli {
    fn overrides(&self) -> ServerSection {
        ServerSection {
            bind: self.bind,
            port: self.port,
            key: self.key.clone(),
            cert: self.cert.clone(),
            max_sessions: self.max_sessions,
            data_dir: self.data_dir.clone(),
            tick_ms: self.tick_ms,
        }
    }
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Net(#[from] NetError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn open_storage(data_dir: Option<&Path>) -> Result<Storage, StoreError> {
    match data_dir {
        Some(dir) => {
            log::info!("storing worlds under {}", dir.display());
            Storage::disk(dir)
        }
        None => {
            log::info!("storing worlds in memory");
            Ok(Storage::memory())
        }
    }
}

fn offline_storage(settings: &Settings) -> Result<Storage, AppError> {
    let dir = settings.data_dir.as_deref().ok_or_else(|| {
        ConfigError::Invalid("this command needs --data-dir (or server.data_dir)".into())
    })?;
    Ok(Storage::disk(dir)?)
}

async fn serve(settings: Settings) -> Result<(), AppError> {
    let storage = open_storage(settings.data_dir.as_deref())?;
    let server = Server::bind(&settings.server, storage).await?;
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("cannot listen for ctrl-c: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await?;
    Ok(())
}

fn run_offline(command: Command, settings: &Settings) -> Result<(), AppError> {
    let storage = offline_storage(settings)?;
    match command {
        Command::Export { world, out } => {
            let export = storage.world(&world).export()?;
            let json = export.to_json()?;
            match out {
                Some(path) => {
                    fs::write(&path, json)?;
                    log::info!(
                        "exported {} chunks of '{world}' to {}",
                        export.chunks.len(),
                        path.display()
                    );
                }
                None => println!("{json}"),
            }
        }
        Command::Import { world, file } => {
            let text = fs::read_to_string(&file)?;
            let mut store = storage.world(&world);
            store.import_json(&text)?;
        }
        Command::Slots { world } => {
            for info in storage.world(&world).list_slots()? {
                match info.saved_at {
                    Some(at) => println!("slot {}: saved at {at}", info.slot),
                    None => println!("slot {}: saved", info.slot),
                }
            }
        }
        Command::Clear { world } => {
            storage.world(&world).clear_world()?;
            log::info!("cleared world '{world}'");
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let file = match cli.config.as_deref() {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let settings = Settings::resolve(cli.overrides().or(file.server))?;
    match cli.command {
        Some(command) => run_offline(command, &settings),
        None => serve(settings).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
