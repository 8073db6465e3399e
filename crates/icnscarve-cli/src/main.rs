//! icnscarve - Extract embedded icons from macOS keyboard layout DAT files
//!
//! This tool scans a binary blob for `icns` markers and writes every
//! length-prefixed resource it finds to its own file.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use icnscarve_core::{
    artifact_file_name, load_source, Chunk, ChunkSink, DirectorySink, ExtractionReport,
    Extractor, ExtractorConfig, Marker, NullProgress, PassOutcome, Progress, DEFAULT_DATFILE,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Extract icons from macOS keyboard layout DAT files
#[derive(Parser, Debug)]
#[command(name = "icnscarve")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the DAT file
    #[arg(default_value = DEFAULT_DATFILE, conflicts_with = "directory")]
    datfile: PathBuf,

    /// Process every matching file below this directory instead
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// File extension selecting inputs in directory mode
    #[arg(long, default_value = "dat")]
    input_ext: String,

    /// Output directory for extracted icons
    #[arg(short, long)]
    output: PathBuf,

    /// Logging level
    #[arg(short, long, value_enum, default_value = "info")]
    log_level: LogLevel,

    /// Raise verbosity above the logging level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Hide the progress bar and everything below errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Four-byte marker announcing each resource
    #[arg(long, default_value = "icns")]
    marker: Marker,

    /// File name prefix for extracted resources
    #[arg(long, default_value = "icon")]
    prefix: String,

    /// File extension for extracted resources
    #[arg(long, default_value = "icns")]
    extension: String,

    /// Maximum number of resources to extract per file (0 = unlimited)
    #[arg(long, default_value = "0")]
    max_chunks: usize,

    /// Dry run - don't write files, just show what would be extracted
    #[arg(long)]
    dry_run: bool,

    /// Only list found resources without extracting
    #[arg(long)]
    list_only: bool,

    /// Overwrite existing files
    #[arg(long)]
    force: bool,

    /// Fail when a pass stops early on malformed data
    #[arg(long)]
    strict: bool,
}

impl Cli {
    fn extractor(&self) -> Extractor {
        Extractor::with_config(
            ExtractorConfig::new()
                .marker(self.marker)
                .max_chunks(self.max_chunks),
        )
    }

    fn writes_files(&self) -> bool {
        !self.dry_run && !self.list_only
    }

    fn tracing_level(&self) -> Level {
        if self.quiet {
            return Level::ERROR;
        }
        match self.verbose {
            0 => self.log_level.into(),
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

/// Logging level selectable on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Debug,
    Info,
    #[value(alias = "warn")]
    Warning,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warning => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

/// Progress bar tracking the cursor through the source buffer
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new(hidden: bool, label: String) -> Self {
        let bar = if hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(0)
        };
        bar.set_style(Self::bar_style());
        bar.set_message(label);
        Self { bar }
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
    }
}

impl Progress for BarProgress {
    fn report(&mut self, bytes_processed: u64, total_bytes: u64) {
        self.bar.set_length(total_bytes);
        self.bar.set_position(bytes_processed);
    }

    fn finish(&mut self) {
        self.bar.finish_and_clear();
    }
}

/// Prints chunks instead of writing them (`--list-only` and `--dry-run`)
struct PreviewSink<'a> {
    cli: &'a Cli,
    output_dir: &'a Path,
}

impl ChunkSink for PreviewSink<'_> {
    fn accept(&mut self, index: usize, chunk: &Chunk) -> icnscarve_core::Result<()> {
        if self.cli.list_only {
            println!(
                "{:>5}  offset {:>10}  size {:>9}  {}",
                index,
                chunk.start(),
                chunk.len(),
                content_hash(chunk.as_bytes())
            );
        } else {
            let name = artifact_file_name(&self.cli.prefix, index, &self.cli.extension);
            println!(
                "Would write: {} ({} bytes)",
                self.output_dir.join(name).display(),
                chunk.len()
            );
        }
        Ok(())
    }
}

/// Short content hash (first 8 chars of blake3)
fn content_hash(data: &[u8]) -> String {
    let hash = blake3::hash(data);
    hash.to_hex()[..8].to_string()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(cli.tracing_level().into()))
        .with_target(false)
        .init();

    let result = if let Some(ref directory) = cli.directory {
        process_directory(&cli, directory)
    } else {
        process_single_file(&cli, &cli.datfile, &cli.output).map(|_| ())
    };

    if let Err(ref e) = result {
        error!("Extraction failed: {:#}", e);
    }
    result
}

/// Extract every resource from one DAT file into `output_dir`
fn process_single_file(cli: &Cli, file: &Path, output_dir: &Path) -> Result<ExtractionReport> {
    let buffer = load_source(file)?;
    let extractor = cli.extractor();

    info!("Starting icon extraction from {}", file.display());

    let result = if cli.writes_files() {
        let mut sink = DirectorySink::create(output_dir)?
            .prefix(cli.prefix.as_str())
            .extension(cli.extension.as_str())
            .overwrite(cli.force);
        let label = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Extracting".to_string());
        let progress = BarProgress::new(cli.quiet, label);
        extractor
            .run(&buffer, &mut sink, progress)
            .and_then(|report| {
                // leftovers of an earlier, longer run would pass for this run's output
                if cli.force {
                    sink.remove_stale(report.chunks)?;
                }
                Ok(report)
            })
    } else {
        extractor.run(&buffer, PreviewSink { cli, output_dir }, NullProgress)
    };
    let report = result.with_context(|| format!("Failed to extract {}", file.display()))?;

    match report.outcome {
        PassOutcome::Halted(reason) => {
            warn!(
                "Stopped early in {} at offset {}: {}",
                file.display(),
                reason.offset(),
                reason
            );
        }
        PassOutcome::LimitReached => {
            debug!("Stopped after {} resources (limit)", report.chunks);
        }
        PassOutcome::Exhausted => {}
    }
    info!("Extraction complete. {} icons extracted.", report.chunks);

    if cli.strict {
        report
            .ensure_complete()
            .with_context(|| format!("Incomplete pass over {}", file.display()))?;
    }

    Ok(report)
}

/// Process a directory of DAT files recursively
fn process_directory(cli: &Cli, directory: &Path) -> Result<()> {
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());

    let mut files_processed = 0;
    let mut chunks_extracted = 0;
    let mut failures = 0;

    for entry in WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !entry.file_type().is_file() || is_hidden(path) {
            continue;
        }

        if !matches_extension(path, &cli.input_ext) {
            trace!("Skipping {}", path.display());
            continue;
        }

        let output_dir = batch_output_dir(&cli.output, directory, path);

        debug!("Processing: {}", path.display());
        match process_single_file(cli, path, &output_dir) {
            Ok(report) => chunks_extracted += report.chunks,
            Err(e) => {
                warn!("Error processing {}: {:#}", path.display(), e);
                failures += 1;
            }
        }
        files_processed += 1;
    }

    info!(
        "Summary: {} file(s) processed, {} icons extracted, {} failure(s)",
        files_processed, chunks_extracted, failures
    );

    if cli.strict && failures > 0 {
        bail!("{} file(s) could not be fully extracted", failures);
    }

    Ok(())
}

/// Output folder for one input in directory mode.
///
/// Mirrors the input's position below `directory`, minus its extension, so
/// `in/a/L.dat` and `in/b/L.dat` land in `out/a/L` and `out/b/L`.
fn batch_output_dir(output: &Path, directory: &Path, input: &Path) -> PathBuf {
    let relative = input.strip_prefix(directory).unwrap_or(input);
    output.join(relative.with_extension(""))
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

fn matches_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext.trim_start_matches('.')))
        .unwrap_or(false)
}
