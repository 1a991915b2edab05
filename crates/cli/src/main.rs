//! Command-line interface for unpacking downloaded editor artifacts.
//!
//! Each download is sniffed, unpacked next to the others under `--out`, and
//! reported with one status line. A failed file never stops the batch.

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tracing::warn;
use unpacker::{
    Dispatcher, Disposition, ExtractionOutcome, FormatClass, OffsetOrder, ToolKind,
    ToolRegistry, UnpackOptions,
};

#[derive(Parser)]
#[command(name = "unpacker")]
#[command(version, about = "Identify and unpack downloaded release artifacts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Unpack one or more downloads
    Unpack {
        /// Downloaded files to unpack
        #[arg(required = true)]
        archives: Vec<PathBuf>,

        /// Output directory; each file unpacks into a subdirectory named after it
        #[arg(short, long)]
        out: PathBuf,

        /// Order in which AppImage SquashFS offsets are tried with unsquashfs
        #[arg(long, value_enum, default_value = "highest")]
        offset_order: OffsetOrderArg,

        /// Fail AppImages that cannot be unpacked instead of keeping the executable
        #[arg(long)]
        no_exec_fallback: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Report the detected format of a file
    Sniff {
        /// File to inspect
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the external extraction tools found on PATH
    Tools {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OffsetOrderArg {
    Highest,
    Lowest,
}

impl From<OffsetOrderArg> for OffsetOrder {
    fn from(arg: OffsetOrderArg) -> Self {
        match arg {
            OffsetOrderArg::Highest => OffsetOrder::HighestFirst,
            OffsetOrderArg::Lowest => OffsetOrder::LowestFirst,
        }
    }
}

/// Per-file result for `unpack --json`.
#[derive(Serialize)]
struct FileReport {
    source: PathBuf,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<ExtractionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = ctrlc::set_handler(|| {
        eprintln!("\nInterrupted; partial output is left in place");
        process::exit(130);
    }) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Unpack {
            archives,
            out,
            offset_order,
            no_exec_fallback,
            json,
        } => {
            let options = UnpackOptions {
                offset_order: offset_order.into(),
                keep_executable_fallback: !no_exec_fallback,
                ..UnpackOptions::default()
            };
            handle_unpack(archives, out, options, json)
        }
        Commands::Sniff { file, json } => handle_sniff(file, json),
        Commands::Tools { json } => handle_tools(json),
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

/// Returns `Ok(false)` when at least one file failed.
fn handle_unpack(
    archives: Vec<PathBuf>,
    out: PathBuf,
    options: UnpackOptions,
    json: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    let limit = options.diagnostic_limit;
    let dispatcher = Dispatcher::new(ToolRegistry::discover(), options);
    let mut reports = Vec::with_capacity(archives.len());

    for archive in archives {
        let destination = out.join(artifact_stem(&archive));
        let spinner = (!json).then(|| spinner(&archive));

        let report = match dispatcher.unpack(&archive, &destination) {
            Ok(outcome) => FileReport {
                source: archive,
                status: status_of(&outcome),
                outcome: Some(outcome),
                error: None,
            },
            Err(e) => FileReport {
                source: archive,
                status: "failed",
                outcome: None,
                error: Some(e.diagnostic(limit)),
            },
        };

        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }
        if !json {
            print_status(&report);
        }
        reports.push(report);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }

    Ok(reports.iter().all(|report| report.status != "failed"))
}

fn handle_sniff(file: PathBuf, json: bool) -> Result<bool, Box<dyn std::error::Error>> {
    let class = unpacker::sniff(&file)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "file": file,
                "class": class,
            }))?
        );
    } else {
        println!("{}: {}", file.display(), class);
    }

    Ok(class != FormatClass::Unknown)
}

fn handle_tools(json: bool) -> Result<bool, Box<dyn std::error::Error>> {
    let tools = ToolRegistry::discover();

    if json {
        println!("{}", serde_json::to_string_pretty(&tools)?);
        return Ok(true);
    }

    for kind in ToolKind::ALL {
        match tools.get(kind) {
            Some(path) => println!("{:<12} {}", kind.to_string(), path.display()),
            None => println!("{:<12} missing ({})", kind.to_string(), kind.install_hint()),
        }
    }

    Ok(true)
}

fn spinner(archive: &Path) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(format!("Unpacking {}", archive.display()));
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn status_of(outcome: &ExtractionOutcome) -> &'static str {
    match outcome.disposition {
        Disposition::Extracted => "extracted",
        Disposition::RetainedAsIs => "found",
        Disposition::KeptExecutable => "kept",
    }
}

fn print_status(report: &FileReport) {
    let source = report.source.display();
    match (&report.outcome, &report.error) {
        (Some(outcome), _) => match outcome.disposition {
            Disposition::Extracted => println!(
                "extracted  {} [{}] {} files with {} -> {}",
                source,
                outcome.class,
                outcome.files,
                outcome
                    .backend
                    .map(|backend| backend.to_string())
                    .unwrap_or_default(),
                outcome.destination.display()
            ),
            Disposition::RetainedAsIs => {
                println!("found      {} [{}] kept as downloaded", source, outcome.class)
            }
            Disposition::KeptExecutable => println!(
                "kept       {} [{}] could not be unpacked; the executable can be run directly",
                source, outcome.class
            ),
        },
        (None, error) => println!(
            "failed     {}: {}",
            source,
            error.as_deref().unwrap_or("unknown error")
        ),
    }
}

/// Output subdirectory for `archive`: its file name without archive suffixes.
fn artifact_stem(archive: &Path) -> String {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unpacked".to_string());
    for suffix in [".tar.gz", ".zip", ".exe", ".dmg", ".appimage"] {
        let Some(split) = name.len().checked_sub(suffix.len()).filter(|&at| at > 0) else {
            continue;
        };
        if let (Some(stem), Some(tail)) = (name.get(..split), name.get(split..)) {
            if tail.eq_ignore_ascii_case(suffix) {
                return stem.to_string();
            }
        }
    }
    name
}
