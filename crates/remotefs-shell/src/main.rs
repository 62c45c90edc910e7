//! remotefs interactive shell.
//!
//! Usage:
//!   # Simulated remote, configured from REMOTEFS_ARGS
//!   REMOTEFS_ARGS="-n=client.admin" cargo run -p remotefs-shell
//!
//!   # Simulated remote, configured from a TOML file
//!   cargo run -p remotefs-shell -- --config remotefs.toml
//!
//!   # A directory on local disk
//!   cargo run -p remotefs-shell -- --backend local --root /tmp/scratch

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt};

use remotefs_shell::Shell;
use remotefs_vfs::{LocalFs, MemoryRemote, RemoteConfig, RemoteFs};

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Backend {
    /// In-process remote client behind the remote adapter
    Memory,
    /// Local directory
    Local,
}

/// Interactive shell over a remotefs backend.
#[derive(Parser, Debug)]
#[command(name = "remotefs-shell")]
#[command(about = "Interactive shell over a remotefs backend")]
struct Args {
    /// Filesystem backend to use
    #[arg(short, long, value_enum, default_value_t = Backend::Memory)]
    backend: Backend,

    /// Root directory for the local backend
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// TOML connection config for the remote backend (default: REMOTEFS_ARGS)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Logs go to stderr so they never interleave with command output
    fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let input = io::stdin().lock();
    let mut output = io::stdout().lock();

    match args.backend {
        Backend::Memory => {
            let config = match &args.config {
                Some(path) => RemoteConfig::from_toml_file(path)?,
                None => RemoteConfig::from_env(),
            };
            let fs = RemoteFs::<MemoryRemote>::connect(&config)
                .context("failed to connect to remote filesystem")?;

            let shell = Shell::new(fs);
            let result = shell.run(input, &mut output);
            shell
                .into_inner()
                .unmount()
                .context("failed to unmount remote filesystem")?;
            result
        }
        Backend::Local => {
            tracing::info!(root = %args.root.display(), "using local backend");
            Shell::new(LocalFs::new(args.root)).run(input, &mut output)
        }
    }
}
