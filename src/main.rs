//! flatfs - command-line tool for single-file container images.
//!
//! Each invocation performs exactly one operation against the image
//! and releases the backing file before exiting.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use flatfs::Container;
use std::path::{Path, PathBuf};
use tracing::Level;

#[derive(Parser)]
#[command(name = "flatfs")]
#[command(author, version, about, long_about = None)]
#[command(
    about = "Single-file container image tool",
    long_about = "Stores a flat namespace of named byte blobs inside one image file, \
                  with soft deletion and offline compaction."
)]
struct Cli {
    /// Set the logging level
    #[arg(long, value_enum, default_value = "warn")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a fresh, empty container image
    Mkfs {
        /// Path of the image file to create (overwritten if present)
        image: PathBuf,
    },

    /// Show image statistics
    Info {
        /// Path of the image file
        image: PathBuf,
    },

    /// Insert a host file into the image
    Add {
        /// Path of the image file
        image: PathBuf,

        /// Host file whose bytes are stored
        file: PathBuf,

        /// Name to store under (default: the file's base name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Extract a stored file back to disk
    Get {
        /// Path of the image file
        image: PathBuf,

        /// Name of the stored file
        name: String,

        /// Output path (default: the stored name)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Mark a stored file as deleted
    Rm {
        /// Path of the image file
        image: PathBuf,

        /// Name of the stored file
        name: String,
    },

    /// List active files
    Ls {
        /// Path of the image file
        image: PathBuf,
    },

    /// Purge deleted files and compact the data region
    Defrag {
        /// Path of the image file
        image: PathBuf,
    },

    /// Print a stored file as text
    Cat {
        /// Path of the image file
        image: PathBuf,

        /// Name of the stored file
        name: String,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(Level::from(cli.log_level))
        .with_target(false)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Mkfs { image } => cmd_mkfs(&image),
        Commands::Info { image } => cmd_info(&image),
        Commands::Add { image, file, name } => cmd_add(&image, &file, name),
        Commands::Get {
            image,
            name,
            output,
        } => cmd_get(&image, &name, output),
        Commands::Rm { image, name } => cmd_rm(&image, &name),
        Commands::Ls { image } => cmd_ls(&image),
        Commands::Defrag { image } => cmd_defrag(&image),
        Commands::Cat { image, name } => cmd_cat(&image, &name),
    }
}

fn cmd_mkfs(image: &Path) -> anyhow::Result<()> {
    Container::format(image)?;
    println!("Created new container image {}", image.display());
    Ok(())
}

fn cmd_info(image: &Path) -> anyhow::Result<()> {
    let stats = Container::inspect(image)?;

    println!("Image: {}", stats.path.display());
    println!("  Active files:   {}", stats.file_count);
    println!("  Free entries:   {}", stats.free_slots);
    println!("  Deleted files:  {}", stats.deleted_files);
    println!("  Total size:     {} bytes", stats.disk_size);

    Ok(())
}

fn cmd_add(image: &Path, file: &Path, name: Option<String>) -> anyhow::Result<()> {
    let content =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;

    let name = match name {
        Some(name) => name,
        None => file
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Cannot derive a store name from {}", file.display()))?,
    };

    let mut container = Container::open_rw(image)?;
    container.insert(&name, &content)?;

    println!(
        "Added {} ({} bytes) to {}",
        name,
        content.len(),
        image.display()
    );
    Ok(())
}

fn cmd_get(image: &Path, name: &str, output: Option<PathBuf>) -> anyhow::Result<()> {
    let mut container = Container::open(image)?;
    let content = container.fetch(name)?;

    let output = output.unwrap_or_else(|| PathBuf::from(name));
    std::fs::write(&output, &content)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("Wrote {} bytes to {}", content.len(), output.display());
    Ok(())
}

fn cmd_rm(image: &Path, name: &str) -> anyhow::Result<()> {
    let mut container = Container::open_rw(image)?;
    container.delete(name)?;

    println!("Marked {} as deleted in {}", name, image.display());
    Ok(())
}

fn cmd_ls(image: &Path) -> anyhow::Result<()> {
    let container = Container::open(image)?;
    let files = container.list();

    if files.is_empty() {
        println!("No active files in {}", image.display());
    } else {
        for file in files {
            println!(
                "{:<32} {:>10} bytes  created={}",
                file.name, file.length, file.created
            );
        }
    }

    Ok(())
}

fn cmd_defrag(image: &Path) -> anyhow::Result<()> {
    let mut container = Container::open_rw(image)?;
    let report = container.defragment()?;

    println!(
        "Purged {} deleted files and freed {} bytes",
        report.purged, report.freed_bytes
    );
    Ok(())
}

fn cmd_cat(image: &Path, name: &str) -> anyhow::Result<()> {
    let mut container = Container::open(image)?;
    let text = container.dump(name)?;
    print!("{text}");
    Ok(())
}
