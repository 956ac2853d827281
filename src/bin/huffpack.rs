//! huffpack CLI
//!
//! Pack files into a container, list its contents, or extract it.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use huffpack::{Archive, ArchiveLoader, ArchiveSaver, CodecRegistry, PipelineConfig};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "huffpack")]
#[command(version, about = "Huffman-coded archive containers")]
struct Args {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create ARCHIVE from files and directories
    Pack {
        archive: PathBuf,

        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Codec for every file (huffman, none)
        #[arg(short, long, default_value = "huffman")]
        codec: String,

        /// Pipeline configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List the contents of ARCHIVE
    List {
        archive: PathBuf,

        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract ARCHIVE into DEST
    Extract {
        archive: PathBuf,

        dest: PathBuf,

        /// Pipeline configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    let config = match path {
        Some(path) => PipelineConfig::from_path(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn pack(
    archive_path: &Path,
    paths: &[PathBuf],
    codec: &str,
    config: PipelineConfig,
) -> anyhow::Result<()> {
    let registry = CodecRegistry::new(&config);
    let codec = registry
        .by_name(codec)
        .ok_or_else(|| anyhow!("unknown codec '{}'. Valid options: huffman, none", codec))?;

    let mut archive = Archive::new();
    let root = archive.root();
    for path in paths {
        archive
            .add_path(root, path, codec.id(), &config)
            .with_context(|| format!("adding {}", path.display()))?;
    }

    info!(
        "Packing {} files ({} bytes) with {}",
        archive.file_count(),
        archive.size(),
        codec.name()
    );
    ArchiveSaver::new(registry)
        .with_config(config)?
        .save_to_path(&archive, archive_path)
        .with_context(|| format!("writing {}", archive_path.display()))?;
    Ok(())
}

fn list(archive_path: &Path, json: bool) -> anyhow::Result<()> {
    let archive = ArchiveLoader::default()
        .load_path(archive_path)
        .with_context(|| format!("loading {}", archive_path.display()))?;
    let entries = archive.entries(&CodecRegistry::default());

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for entry in &entries {
        if entry.is_dir {
            println!("{:>12}  {:<10}  {}/", entry.size, "", entry.path);
        } else {
            let codec = entry.codec_name.as_deref().unwrap_or("unknown codec");
            println!("{:>12}  {:<10}  {}", entry.size, codec, entry.path);
        }
    }
    println!("{:>12}  total", archive.size());
    Ok(())
}

fn extract(archive_path: &Path, dest: &Path, config: PipelineConfig) -> anyhow::Result<()> {
    let registry = CodecRegistry::new(&config);
    let archive = ArchiveLoader::new(config)?
        .load_path(archive_path)
        .with_context(|| format!("loading {}", archive_path.display()))?;
    archive
        .extract_all(dest, &registry)
        .with_context(|| format!("extracting to {}", dest.display()))?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Pack {
            archive,
            paths,
            codec,
            config,
        } => pack(&archive, &paths, &codec, load_config(config.as_deref())?),
        Command::List { archive, json } => list(&archive, json),
        Command::Extract {
            archive,
            dest,
            config,
        } => extract(&archive, &dest, load_config(config.as_deref())?),
    }
}
