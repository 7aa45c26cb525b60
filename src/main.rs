use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use vpkrs::{ArchiveBuilder, ArchiveReader, DirectoryEntry};

#[derive(Parser)]
#[command(name = "vpk", about = "Read and build VPK archives")]
struct Cli {
    /// Log at info level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the files in an archive
    List {
        input: PathBuf,
        /// Print entry metadata as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show header fields
    Info {
        input: PathBuf,
    },
    /// Extract every file
    Extract {
        input: PathBuf,
        #[arg(short = 'C', long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Print (or save) a single file
    Cat {
        input: PathBuf,
        path:  String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Build a version 1 archive from a directory
    Pack {
        source: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Serialize)]
struct ListedEntry<'a> {
    path:  &'a str,
    #[serde(flatten)]
    entry: &'a DirectoryEntry,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { input, json } => {
            let mut vpk = ArchiveReader::new(&input);
            vpk.load()?;
            let tree = vpk.tree().ok_or("archive not loaded")?;
            if json {
                let listed: Vec<ListedEntry> = tree
                    .iter()
                    .map(|(path, entry)| ListedEntry { path, entry })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&listed)?);
            } else {
                println!("{:<48} {:>10} {:>7}  CRC", "Path", "Size", "Archive");
                for (path, entry) in tree.iter() {
                    let archive = if entry.in_dir_file() { "dir".to_string() } else { format!("{:03}", entry.archive_index) };
                    println!("{:<48} {:>10} {:>7}  {:08x}", path, entry.total_len(), archive, entry.crc);
                }
            }
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let mut vpk = ArchiveReader::new(&input);
            vpk.load()?;
            let header = vpk.header().ok_or("archive not loaded")?;
            println!("── VPK Archive ──────────────────────────────────────────");
            println!("  Path           {}", input.display());
            println!("  Version        {}", header.version);
            println!("  Header size    {} B", header.size());
            println!("  Tree size      {} B", header.tree_length);
            if let Some(ext) = &header.v2 {
                println!("  Footer size    {} B", ext.footer_length);
            }
            println!("  Files          {}", vpk.files().len());
        }

        // ── Extract ──────────────────────────────────────────────────────────
        Commands::Extract { input, output_dir } => {
            let mut vpk = ArchiveReader::new(&input);
            vpk.extract(&output_dir)?;
            println!("Extracted to: {}", output_dir.display());
        }

        // ── Cat ──────────────────────────────────────────────────────────────
        Commands::Cat { input, path, output } => {
            let mut vpk = ArchiveReader::new(&input);
            let data = vpk.get_file(&path)?;
            match output {
                Some(out) => std::fs::write(out, &data)?,
                None => std::io::stdout().write_all(&data)?,
            }
        }

        // ── Pack ─────────────────────────────────────────────────────────────
        Commands::Pack { source, output } => {
            let mut builder = ArchiveBuilder::new(&source);
            if !builder.is_valid() {
                return Err(format!("{} is not a directory", source.display()).into());
            }
            builder.load(1)?;
            builder.save(&output)?;
            println!("Created: {} ({} files)", output.display(), builder.records().len());
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}
