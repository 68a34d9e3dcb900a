//! geodelta - Compare two GNSS survey readings from photographs
//!
//! Command-line front end: parses OCR text, runs the comparison pipeline and
//! prints the result as text or JSON.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use geodelta::config::{self, AppConfig, OutputFormat, OutputSettings};
use geodelta::geodesy::Proj4Factory;
use geodelta::report;
use geodelta::shared::readiness::probe_transformer;
use geodelta::shared::Capability;
use geodelta::vision::{FsImageLoader, TesseractOcr};
use geodelta::{
    extract_parameters, resolve_zone, ComparisonPipeline, ImageSlot, PipelineError,
    PipelineSettings, Readiness,
};

/// geodelta - Distance and height offsets between two GNSS readings
#[derive(Parser, Debug)]
#[command(name = "geodelta", version)]
#[command(about = "Compare two survey points read from photographs of GNSS receiver displays")]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compare the readings shown in two photographs
    Compare(CompareArgs),
    /// Extract survey parameters from an OCR text file or an image
    Extract(ExtractArgs),
    /// Print the UTM EPSG code for a coordinate
    Zone {
        /// Latitude in decimal degrees
        #[arg(allow_negative_numbers = true)]
        latitude: f64,
        /// Longitude in decimal degrees
        #[arg(allow_negative_numbers = true)]
        longitude: f64,
    },
    /// Check that the OCR engine and the geodetic transformer are usable
    Status,
}

#[derive(Args, Debug)]
struct CompareArgs {
    /// Photograph of the first reading (defines the UTM zone)
    first: PathBuf,
    /// Photograph of the second reading
    second: PathBuf,
    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
    /// Also print the raw OCR text of both images
    #[arg(long)]
    show_text: bool,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// OCR text file, or an image with --image
    file: PathBuf,
    /// Treat FILE as a photograph and run OCR on it
    #[arg(long)]
    image: bool,
    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
    /// Also print the raw OCR text
    #[arg(long)]
    show_text: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging on stderr so results stay pipeable
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_or_create_config(cli.config.as_deref())?;

    match cli.command {
        Command::Compare(args) => compare(&config, args).await,
        Command::Extract(args) => extract(&config, args).await,
        Command::Zone {
            latitude,
            longitude,
        } => {
            let zone = resolve_zone(latitude, longitude);
            println!("{}", zone.epsg());
            Ok(ExitCode::SUCCESS)
        }
        Command::Status => {
            let (ocr, readiness) = probe(&config).await;
            println!("{}", report::render_readiness(&readiness));
            let ocr_ready = readiness.state(Capability::Ocr).is_ready();
            if let Some(language) = config.ocr.language.as_deref().filter(|_| ocr_ready) {
                match ocr.missing_languages(language).await {
                    Ok(missing) => {
                        if !missing.is_empty() {
                            warn!("OCR language {} is not installed: {:?}", language, missing);
                        }
                        println!("{}", report::render_language_check(language, &missing));
                    }
                    Err(e) => warn!("Could not list installed OCR languages: {}", e),
                }
            }
            Ok(if readiness.is_ready() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

/// Load configuration from file or fall back to defaults
///
/// An explicitly requested file must load; the default location is optional.
fn load_or_create_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        let config = config::load_config(path)?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    if let Ok(config_path) = config::default_config_path() {
        if config_path.exists() {
            match config::load_config(&config_path) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", config_path);
                    return Ok(config);
                }
                Err(e) => warn!("Ignoring invalid configuration: {:#}", e),
            }
        }
    }
    info!("Using default configuration");
    Ok(AppConfig::default())
}

/// Probe both capabilities once
async fn probe(config: &AppConfig) -> (TesseractOcr, Readiness) {
    let ocr = TesseractOcr::new(&config.ocr, config.preprocessing.clone());
    let readiness = Readiness::new(ocr.probe().await, probe_transformer(&Proj4Factory));
    (ocr, readiness)
}

async fn build_pipeline(config: &AppConfig) -> ComparisonPipeline {
    let (ocr, readiness) = probe(config).await;
    ComparisonPipeline::new(
        Arc::new(FsImageLoader),
        Arc::new(ocr),
        Arc::new(Proj4Factory),
        readiness,
        PipelineSettings::from(&config.ocr),
    )
}

/// Cancel the token on Ctrl+C
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            trigger.cancel();
        }
    });
    cancel
}

fn output_format(json: bool, settings: &OutputSettings) -> OutputFormat {
    if json {
        OutputFormat::Json
    } else {
        settings.format
    }
}

async fn compare(config: &AppConfig, args: CompareArgs) -> Result<ExitCode> {
    let pipeline = build_pipeline(config).await;
    let cancel = cancel_on_ctrl_c();
    let format = output_format(args.json, &config.output);
    let show_text = args.show_text || config.output.show_raw_text;

    let outcome = match pipeline.read_pair(&args.first, &args.second, &cancel).await {
        Ok(readings) => {
            if show_text && format == OutputFormat::Text {
                for (slot, reading) in ImageSlot::BOTH.into_iter().zip(readings.iter()) {
                    println!("{}\n", report::render_raw_text(Some(slot), &reading.raw_text));
                }
            }
            pipeline.compare_readings(readings)
        }
        Err(e) => Err(e),
    };

    match outcome {
        Ok(result) => {
            match format {
                OutputFormat::Text => println!("{}", report::render_comparison(&result, &config.output)),
                OutputFormat::Json => println!("{}", report::to_json(&result)?),
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            report_failure(&e, format)?;
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn extract(config: &AppConfig, args: ExtractArgs) -> Result<ExitCode> {
    let format = output_format(args.json, &config.output);
    let show_text = args.show_text || config.output.show_raw_text;

    let reading = if args.image {
        let pipeline = build_pipeline(config).await;
        match pipeline
            .extract_from_image(&args.file, &cancel_on_ctrl_c())
            .await
        {
            Ok(reading) => reading,
            Err(e) => {
                report_failure(&e, format)?;
                return Ok(ExitCode::FAILURE);
            }
        }
    } else {
        let raw_text = std::fs::read_to_string(&args.file)
            .with_context(|| format!("Failed to read OCR text {}", args.file.display()))?;
        let extraction = extract_parameters(&raw_text);
        geodelta::ImageReading {
            raw_text,
            extraction,
        }
    };

    match format {
        OutputFormat::Text => {
            if show_text {
                println!("{}\n", report::render_raw_text(None, &reading.raw_text));
            }
            println!("{}", report::render_extraction(&reading.extraction));
        }
        OutputFormat::Json => {
            println!("{}", report::to_json(&report::reading_json(&reading, show_text))?);
        }
    }

    Ok(if reading.extraction.parameters.coordinates().is_some() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn report_failure(error: &PipelineError, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => eprintln!("{}", report::render_error(error)),
        OutputFormat::Json => println!("{}", report::to_json(&report::error_json(error))?),
    }
    Ok(())
}
