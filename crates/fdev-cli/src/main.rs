//! fdev: browse a remote file device from the command line.
//!
//! ## Usage
//!
//! ```bash
//! # Pre-load the packfiles under a directory
//! fdev scan x64
//!
//! # Exit status 0 if the path exists, 1 if it does not
//! fdev exists x64/audio.rpf
//!
//! # List everything under x64 matching a pattern, directories first
//! fdev search x64 '*.rpf' --recurse --group-dirs
//!
//! # Only archives and directories, as JSON lines
//! fdev search x64 --include archive,directory --json
//! ```
//!
//! Connection settings come from `--config`, else `<config dir>/fdev/client.ron`
//! if present, else defaults; `--address` overrides the file. Set `RUST_LOG`
//! to change log verbosity.

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use fdev_client::{ClientConfig, FileDeviceClient, Termination};
use fdev_types::{EntryKind, FileEntry, SearchInclude, group_entries};
use futures::TryStreamExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Exit status for a search interrupted with Ctrl-C.
const EXIT_INTERRUPTED: u8 = 130;

/// Browse a remote file device.
#[derive(Parser, Debug)]
#[command(name = "fdev", version)]
#[command(about = "Browse directories and packfiles on a remote file device")]
struct Args {
    /// Config file (RON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Server address, overriding the config file
    #[arg(long, global = true, value_name = "HOST:PORT")]
    address: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pre-load every packfile under a directory
    Scan { path: String },
    /// Check whether a path exists
    Exists { path: String },
    /// List the entries of a directory or packfile
    Search(SearchArgs),
}

#[derive(clap::Args, Debug)]
struct SearchArgs {
    path: String,

    /// Glob (`*`, `?`) or substring to match entry names against
    #[arg(default_value = "")]
    pattern: String,

    /// Descend into subdirectories and packfiles
    #[arg(short, long)]
    recurse: bool,

    /// Entry kinds to return (default: all)
    #[arg(long, value_enum, value_delimiter = ',')]
    include: Vec<IncludeKind>,

    /// Collect all results, then print directories first
    #[arg(long)]
    group_dirs: bool,

    /// One JSON object per entry
    #[arg(long)]
    json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum IncludeKind {
    File,
    #[value(alias = "packfile")]
    Archive,
    Directory,
    Resource,
}

impl IncludeKind {
    fn kind(self) -> EntryKind {
        match self {
            IncludeKind::File => EntryKind::File,
            IncludeKind::Archive => EntryKind::Packfile,
            IncludeKind::Directory => EntryKind::Directory,
            IncludeKind::Resource => EntryKind::Resource,
        }
    }
}

fn include_mask(kinds: &[IncludeKind]) -> SearchInclude {
    if kinds.is_empty() {
        return SearchInclude::ALL;
    }
    kinds
        .iter()
        .fold(SearchInclude::empty(), |mask, kind| mask | kind.kind().include_flag())
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fdev: {e:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let mut config = ClientConfig::load_or_default(args.config.as_deref())
        .context("failed to load config")?;
    if let Some(address) = args.address {
        config.address = address;
    }

    let client = fdev_client::connect(&config)
        .await
        .with_context(|| format!("failed to connect to {}", config.address))?;

    match args.command {
        Command::Scan { path } => {
            client.scan_directory(&path).await?;
            tracing::info!(%path, "scan complete");
            Ok(ExitCode::SUCCESS)
        }
        Command::Exists { path } => {
            let exists = client.is_file_exists(&path).await?;
            println!("{path}: {}", if exists { "exists" } else { "not found" });
            Ok(if exists { ExitCode::SUCCESS } else { ExitCode::from(1) })
        }
        Command::Search(search) => run_search(&client, search).await,
    }
}

async fn run_search(client: &FileDeviceClient, args: SearchArgs) -> Result<ExitCode> {
    let mut results = client.search(
        &args.path,
        &args.pattern,
        args.recurse,
        include_mask(&args.include),
        CancellationToken::new(),
    );
    let interrupt = tokio::spawn({
        let cancel = results.cancel_token().clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupted, cancelling search");
                cancel.cancel();
            }
        }
    });

    let mut out = BufWriter::new(io::stdout());
    let mut count = 0usize;

    if args.group_dirs {
        let mut entries = Vec::new();
        while let Some(entry) = results.try_next().await? {
            entries.push(entry);
        }
        group_entries(&mut entries);
        for entry in &entries {
            print_entry(&mut out, entry, args.json)?;
        }
        count = entries.len();
    } else {
        while let Some(entry) = results.try_next().await? {
            print_entry(&mut out, &entry, args.json)?;
            count += 1;
        }
    }
    out.flush()?;
    interrupt.abort();

    if results.termination() == Some(Termination::Cancelled) {
        eprintln!("search cancelled after {count} entries");
        return Ok(ExitCode::from(EXIT_INTERRUPTED));
    }
    tracing::debug!(count, "search complete");
    Ok(ExitCode::SUCCESS)
}

fn print_entry(out: &mut impl Write, entry: &FileEntry, json: bool) -> io::Result<()> {
    if json {
        serde_json::to_writer(&mut *out, entry)?;
        return writeln!(out);
    }
    writeln!(out, "{}", format_entry(entry))
}

fn format_entry(entry: &FileEntry) -> String {
    let kind = match entry.kind() {
        EntryKind::Directory => 'd',
        EntryKind::Packfile => 'p',
        EntryKind::Resource => 'r',
        EntryKind::File => '-',
    };
    let modified = entry
        .modified()
        .map(|time| time.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!("{kind} {:>12} {modified:<16} {}", entry.size, entry.path)
}
