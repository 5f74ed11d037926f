use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use console::style;
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use romext::carver::{CarveConfig, Carver, DEFAULT_NAME_LOOKBACK, NamingPolicy};
use romext::container::{BranchStatus, ContainerInspector};
use romext::signatures::{DEFAULT_MAX_PAYLOAD, SignatureTable};

#[derive(Parser)]
#[command(name = "romext")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Carve embedded payloads out of firmware blobs")]
struct Cli {
    /// Enable debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Carve JPEG/PNG/BMP images out of an arbitrary blob
    Images {
        input: PathBuf,
        output: PathBuf,

        /// Ceiling for payloads whose end must be guessed (PNG without IEND)
        #[arg(long, default_value_t = DEFAULT_MAX_PAYLOAD)]
        max_payload: usize,
    },

    /// Carve JPEGs, naming them from filename hints near each match
    JpegNames {
        input: PathBuf,
        output: PathBuf,

        /// How far before a match to look for an embedded filename
        #[arg(long, default_value_t = DEFAULT_NAME_LOOKBACK)]
        lookback: usize,
    },

    /// Split an Android boot/recovery image into its parts
    Boot { input: PathBuf, output: PathBuf },
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // clap's own message carries the usage text
            let _ = e.print();
            std::process::exit(1);
        }
    };

    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {e:#}", style("error:").red().bold());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Images {
            input,
            output,
            max_payload,
        } => run_carve(
            &input,
            &output,
            SignatureTable::images(),
            CarveConfig {
                max_payload_size: max_payload,
                naming: NamingPolicy::Sequential,
            },
        ),
        Commands::JpegNames {
            input,
            output,
            lookback,
        } => run_carve(
            &input,
            &output,
            SignatureTable::jpeg_only(),
            CarveConfig {
                max_payload_size: DEFAULT_MAX_PAYLOAD,
                naming: NamingPolicy::NameHint { lookback },
            },
        ),
        Commands::Boot { input, output } => run_boot(&input, &output),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "romext=debug" } else { "romext=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn map_input(path: &Path) -> Result<Mmap> {
    if !path.is_file() {
        bail!("input file not found: {}", path.display());
    }
    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    // Safety: the mapping is read-only and the tool never mutates the input
    let blob = unsafe { Mmap::map(&file) }
        .with_context(|| format!("failed to map {}", path.display()))?;
    Ok(blob)
}

fn run_carve(
    input: &Path,
    output: &Path,
    table: SignatureTable,
    config: CarveConfig,
) -> Result<()> {
    let blob = map_input(input)?;
    let carver = Carver::new(table, config);
    let report = carver
        .carve_to_dir(&blob, output)
        .with_context(|| format!("failed to write into {}", output.display()))?;

    for path in &report.written {
        println!("[+] Extracted {}", path.display());
    }

    let s = report.summary;
    if s.extracted == 0 {
        println!("[!] No payloads found.");
    }
    println!(
        "{} found {}, extracted {}, rejected {}, failed to write {}",
        style("Done:").green().bold(),
        s.found,
        s.extracted,
        s.rejected,
        s.failed_writes
    );
    Ok(())
}

fn run_boot(input: &Path, output: &Path) -> Result<()> {
    let blob = map_input(input)?;
    let inspector = ContainerInspector::new();
    let report = inspector
        .inspect(&blob, output)
        .with_context(|| format!("failed to write into {}", output.display()))?;

    for outcome in &report.outcomes {
        match &outcome.status {
            BranchStatus::Absent => {}
            BranchStatus::Extracted { offset } => {
                println!("[+] Found {} @ {offset:#x}", outcome.name);
            }
            BranchStatus::Expanded { offset, entries } => {
                println!(
                    "[+] Found {} @ {offset:#x}, expanded {entries} entries",
                    outcome.name
                );
            }
            BranchStatus::Failed { offset, reason } => {
                println!("[-] {} @ {offset:#x}: {reason}", outcome.name);
            }
        }
    }

    let produced = report.produced_output();
    if produced == 0 && report.failed() == 0 {
        println!("[!] No kernel, initrd or ramdisk found.");
    } else {
        println!(
            "{} {} parts written to {}",
            style("Done:").green().bold(),
            produced,
            output.display()
        );
    }
    Ok(())
}
