use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;

use image_stamp::config;
use image_stamp::container::OutputFormat;
use image_stamp::metadata::{self, TrustFlag};
use image_stamp::pipeline::{self, ProcessResult, StampRequest};

#[derive(Parser, Debug)]
#[command(
    name = "image-stamp",
    version,
    about = "Write metadata and an optional embedded payload into JPEG comment segments and PNG text chunks"
)]
struct Cli {
    /// Image files or directories to process
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Declared output format (jpeg, png, webp). Defaults to each file's extension
    #[arg(short, long, value_name = "FORMAT")]
    format: Option<String>,

    /// User metadata as a JSON object, e.g. '{"Author":"A","Title":"T"}'
    #[arg(short, long, value_name = "JSON", default_value = "")]
    metadata: String,

    /// Embedded payload stored under the reserved key
    #[arg(long, value_name = "TEXT")]
    payload: Option<String>,

    /// Store the payload verbatim instead of the redaction marker
    #[arg(long)]
    trust_payload: bool,

    /// Directory for stamped files (default: next to each input)
    #[arg(short, long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Resolve and inject without writing files
    #[arg(long)]
    dry_run: bool,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Display the existing metadata of each image and exit
    #[arg(long = "show-metadata")]
    show_metadata: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    if cli.paths.is_empty() {
        anyhow::bail!("No input files or directories specified. Use --help for usage.");
    }

    let images = pipeline::collect_images(&cli.paths);
    if images.is_empty() {
        anyhow::bail!("No supported image files found in the specified paths.");
    }

    // Handle --show-metadata
    if cli.show_metadata {
        for image_path in &images {
            print_metadata(image_path);
        }
        return Ok(());
    }

    let mut config = config::Config::load(cli.config.as_deref())?;
    if cli.dry_run {
        config.output.dry_run = true;
    }
    if let Some(dir) = cli.out_dir {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        config.output.out_dir = Some(dir);
    }

    // Bad metadata JSON is a usage error: fail before touching any image
    let mut request = StampRequest::new(
        &cli.metadata,
        cli.payload.as_deref(),
        TrustFlag::from(cli.trust_payload),
    )
    .context("Invalid --metadata")?;
    request.format = cli.format.as_deref().map(OutputFormat::parse);

    log::info!("Found {} image(s) to process", images.len());
    if config.output.dry_run {
        log::info!("DRY RUN: no files will be written");
    }
    if request.payload.is_some() && !request.trust.is_trusted() {
        log::info!("Payload is untrusted and will be stored as the redaction marker");
    }

    // One independent pipeline per file
    let request = Arc::new(request);
    let config = Arc::new(config);
    let total = images.len();
    let mut tasks = JoinSet::new();
    for image_path in images {
        let request = Arc::clone(&request);
        let config = Arc::clone(&config);
        tasks.spawn_blocking(move || pipeline::stamp_file(&image_path, &request, &config));
    }

    let mut results = Vec::with_capacity(total);
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => {
                report(&result, config.output.dry_run);
                results.push(result);
            }
            Err(e) => log::error!("Worker failed: {e}"),
        }
    }
    results.sort_by(|a, b| a.path.cmp(&b.path));

    // JSON output
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }

    // Summary
    let success = results.iter().filter(|r| r.error.is_none()).count();
    let failed = total - success;
    log::info!("Done: {success} succeeded, {failed} failed out of {total} images");

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn report(result: &ProcessResult, dry_run: bool) {
    let path = result.path.display();

    if let Some(ref err) = result.error {
        let kind = if result.client_error { "Request error" } else { "Error" };
        log::error!("{path}: {kind}: {err}");
        return;
    }

    for warning in &result.warnings {
        log::warn!("{path}: {warning}");
    }

    if !result.keys_written.is_empty() {
        let action = if dry_run { "Would write" } else { "Wrote" };
        log::info!("{path}: {action}: {}", result.keys_written.join(", "));
    }
    if !result.redacted_keys.is_empty() {
        log::info!("{path}: Redacted: {}", result.redacted_keys.join(", "));
    }
    if let Some(ref out) = result.output_path {
        log::info!("{path}: -> {}", out.display());
    }
}

fn print_metadata(path: &std::path::Path) {
    println!("=== {} ===", path.display());
    match metadata::read_original(path) {
        Ok(record) if record.is_empty() => println!("  (no metadata)"),
        Ok(record) => {
            for (key, value) in record.iter() {
                println!("  {key}: {value}");
            }
        }
        Err(e) => println!("  {e}"),
    }
    println!();
}
