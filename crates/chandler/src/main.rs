//! `chandler`: a deduplicating, content-addressed blob store.
//!
//! # Usage
//!
//! ```text
//! chandler demo                         # ingest "we out here!" and read it back
//! chandler put photo.jpg                # ingest a file, print its superhash
//! cat log.txt | chandler put            # ingest stdin
//! chandler get <BLOB_ID> -o copy.jpg    # write a blob to a file
//! chandler get <BLOB_ID>                # write a blob to stdout
//! chandler stat                         # schema, polynomial, chunk and blob counts
//! chandler -d ./store put file.bin      # use another data directory
//! ```

mod config;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chandler_engine::{BlobId, BlobStore};
use clap::{Parser, Subcommand};
use tempfile::NamedTempFile;
use tracing::{error, info};

use config::CliConfig;

const DEMO_INPUT: &[u8] = b"we out here!";

// -----------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "chandler",
    version,
    about = "Deduplicating content-addressed blob store"
)]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the data directory.
    #[arg(short, long, global = true, env = "CHANDLER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a short sample string, read it back, and print both.
    Demo,

    /// Ingest a file (or stdin) and print its superhash.
    Put {
        /// File to ingest. Reads stdin when omitted.
        file: Option<PathBuf>,
    },

    /// Write a stored blob to a file or stdout.
    Get {
        /// Superhash of the blob, as 64 hex characters.
        blob_id: BlobId,

        /// Output file. Writes to stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show schema version, polynomial, and chunk/blob counts.
    Stat,
}

// -----------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = CliConfig::load(cli.config.as_deref()).context("failed to load config")?;

    setup_tracing(&config.log.level);

    // CLI args override config file values.
    if let Some(dir) = cli.data_dir {
        config.store.data_dir = dir;
    }

    let store = Arc::new(open_store(&config).await?);

    match cli.command {
        Commands::Demo => cmd_demo(store).await,
        Commands::Put { file } => {
            let id = cmd_put(store, file).await?;
            println!("{id}");
            Ok(())
        }
        Commands::Get { blob_id, output } => cmd_get(store, blob_id, output).await.map(|_| ()),
        Commands::Stat => cmd_stat(store).await,
    }
}

/// Initialize the `tracing` subscriber with the given level filter.
///
/// Respects `RUST_LOG` env var if set, otherwise uses the config value.
/// Logs go to stderr so `get` can stream blobs to stdout.
fn setup_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn open_store(config: &CliConfig) -> Result<BlobStore> {
    let dir = config.store.data_dir.clone();
    let store_config = config.blob_store_config();

    std::fs::create_dir_all(&dir).context("failed to create data directory")?;
    info!(path = %dir.display(), "opening blob store");

    tokio::task::spawn_blocking(move || {
        BlobStore::open(&dir, store_config).map_err(|e| {
            error!(path = %dir.display(), %e, "failed to open blob store");
            anyhow::anyhow!("cannot open blob store at {}: {e}", dir.display())
        })
    })
    .await
    .context("store task panicked")?
}

// -----------------------------------------------------------------------
// chandler demo
// -----------------------------------------------------------------------

async fn cmd_demo(store: Arc<BlobStore>) -> Result<()> {
    let (id, read_back) = tokio::task::spawn_blocking(move || -> Result<_> {
        let id = store.ingest_bytes(DEMO_INPUT)?;
        let read_back = store.read_blob(&id)?;
        Ok((id, read_back))
    })
    .await
    .context("demo task panicked")??;

    println!("ingested:  {:?}", String::from_utf8_lossy(DEMO_INPUT));
    println!("superhash: {id}");
    println!("retrieved: {:?}", String::from_utf8_lossy(&read_back));
    Ok(())
}

// -----------------------------------------------------------------------
// chandler put
// -----------------------------------------------------------------------

async fn cmd_put(store: Arc<BlobStore>, file: Option<PathBuf>) -> Result<BlobId> {
    let report = tokio::task::spawn_blocking(move || -> Result<_> {
        match file {
            Some(path) => {
                let f = File::open(&path)
                    .with_context(|| format!("failed to open {}", path.display()))?;
                Ok(store.ingest_with_report(f)?)
            }
            None => Ok(store.ingest_with_report(io::stdin().lock())?),
        }
    })
    .await
    .context("ingest task panicked")??;

    info!(
        blob = %report.blob_id,
        bytes = report.bytes,
        chunks = report.chunks,
        new_chunks = report.new_chunks,
        "stored"
    );
    Ok(report.blob_id)
}

// -----------------------------------------------------------------------
// chandler get
// -----------------------------------------------------------------------

/// Write a blob to `output` or stdout.
///
/// Nothing is written unless the whole blob reads back: file output goes
/// through a temporary file in the target directory that is renamed into
/// place on success, and stdout output is buffered in full first.
async fn cmd_get(store: Arc<BlobStore>, id: BlobId, output: Option<PathBuf>) -> Result<u64> {
    tokio::task::spawn_blocking(move || -> Result<u64> {
        match output {
            Some(path) => {
                let mut reader = store.retrieve(&id)?;
                let dir = match path.parent() {
                    Some(p) if !p.as_os_str().is_empty() => p,
                    _ => Path::new("."),
                };
                let tmp = NamedTempFile::new_in(dir).with_context(|| {
                    format!("failed to create a temporary file in {}", dir.display())
                })?;
                let mut out = BufWriter::new(tmp);
                let n = io::copy(&mut reader, &mut out)
                    .with_context(|| format!("failed to read blob {id}"))?;
                let tmp = out.into_inner().map_err(|e| e.into_error())?;
                tmp.persist(&path)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                Ok(n)
            }
            None => {
                let data = store.read_blob(&id)?;
                let mut out = io::stdout().lock();
                out.write_all(&data)?;
                out.flush()?;
                Ok(data.len() as u64)
            }
        }
    })
    .await
    .context("read task panicked")?
}

// -----------------------------------------------------------------------
// chandler stat
// -----------------------------------------------------------------------

async fn cmd_stat(store: Arc<BlobStore>) -> Result<()> {
    let stats = tokio::task::spawn_blocking(move || store.stats())
        .await
        .context("stat task panicked")??;

    println!("Schema version: {}", stats.schema_version);
    println!("Polynomial: {}", stats.polynomial);
    println!("Chunks: {} ({} bytes)", stats.chunk_count, stats.chunk_bytes);
    println!("Blobs: {}", stats.blob_count);
    Ok(())
}
