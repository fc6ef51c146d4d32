//! HUD telemetry extractor
//!
//! Command-line driver: reads HUD frames from image files, extracts a
//! telemetry record per frame and writes CSV and JSON-lines output into a
//! timestamped session folder as frames finish, then a frame-ordered JSON
//! copy once the run is done.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};

use hud_telemetry::catalog::RegionCatalog;
use hud_telemetry::config::{default_config_path, load_config, AppConfig};
use hud_telemetry::ocr::setup::{find_tessdata_dir, find_tesseract_executable};
use hud_telemetry::ocr::{ensure_tessdata, TesseractPaths};
use hud_telemetry::output::{append_jsonl, append_record, export_to_json, init_csv, read_jsonl};
use hud_telemetry::pose::{load_calibration, PoseCalibration, PoseClassifier};
use hud_telemetry::{
    default_catalog, paths, FieldParser, FrameExtractor, FrameJob, FramePool, TelemetryRecord,
    TesseractRecognizer,
};

#[derive(Parser, Debug)]
#[command(name = "hud-telemetry")]
#[command(version, about = "Extract telemetry from cycling simulator HUD frames", long_about = None)]
struct Cli {
    /// Log per-field decisions
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract telemetry from frame images
    Extract {
        /// Frame image files, processed in the given order
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Region catalog JSON file
        #[arg(long, conflicts_with = "catalog_dir")]
        catalog: Option<PathBuf>,

        /// Directory of per-resolution catalogs (WxH*.json)
        #[arg(long)]
        catalog_dir: Option<PathBuf>,

        /// Pose calibration JSON merged over the built-in table
        #[arg(long)]
        calibration: Option<PathBuf>,

        /// Configuration file (default: <exe_dir>/config.json)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Base output directory (default: <exe_dir>/output)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Worker threads (default from config)
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Print the built-in 1920x1080 region catalog
    Catalog,

    /// Print the built-in pose calibration table
    Calibration,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    match cli.command {
        Commands::Extract {
            images,
            catalog,
            catalog_dir,
            calibration,
            config,
            output,
            workers,
        } => {
            let config_path = config.unwrap_or_else(default_config_path);
            let mut config = load_config(&config_path);
            if let Some(workers) = workers {
                config.workers = workers;
            }
            if catalog_dir.is_some() {
                config.catalog_dir = catalog_dir;
            }
            if calibration.is_some() {
                config.calibration_file = calibration;
            }
            run_extract(&images, catalog.as_deref(), &config, output)
        }
        Commands::Catalog => {
            let file = default_catalog().to_file_format();
            println!("{}", serde_json::to_string_pretty(&file)?);
            Ok(())
        }
        Commands::Calibration => {
            println!(
                "{}",
                serde_json::to_string_pretty(&PoseCalibration::default())?
            );
            Ok(())
        }
    }
}

fn run_extract(
    images: &[PathBuf],
    catalog_file: Option<&Path>,
    config: &AppConfig,
    output: Option<PathBuf>,
) -> Result<()> {
    let Some(first) = images.first() else {
        bail!("no input images");
    };

    let catalog = Arc::new(resolve_catalog(first, catalog_file, config)?);
    let calibration = match &config.calibration_file {
        Some(path) => load_calibration(path)?,
        None => PoseCalibration::default(),
    };

    let recognizer = build_recognizer(config)?;

    let extractor = FrameExtractor::new(Arc::clone(&catalog), Arc::new(recognizer))
        .with_parser(FieldParser::with_vocabulary(&config.free_text_vocabulary))
        .with_leaderboard_settings(config.leaderboard)
        .with_classifier(PoseClassifier::new(
            calibration,
            config.pose_confidence_cutoff,
        ));

    let base = output.unwrap_or_else(paths::get_output_dir);
    let session = paths::create_session_dir(&base, Local::now())?;
    let csv_path = session.join("telemetry.csv");
    let jsonl_path = session.join("telemetry.jsonl");

    let fields: Vec<String> = catalog.scalar_regions().map(|r| r.name.clone()).collect();
    init_csv(&csv_path, &fields)?;

    info!(
        "Extracting {} frames with {} workers into {}",
        images.len(),
        config.workers,
        session.display()
    );

    let pool = FramePool::start(extractor, config.workers, config.queue_capacity);
    let mut write = |record: TelemetryRecord| -> Result<()> {
        append_record(&csv_path, &fields, &record)?;
        append_jsonl(&jsonl_path, &record)
    };

    // Records are appended as frames finish, so a crash keeps what is done
    let mut written = 0;
    for (i, path) in images.iter().enumerate() {
        let job = FrameJob::new(path.clone(), i as u32 + 1).with_captured_at(captured_at(path));
        pool.submit(job)?;
        written += pool.drain_completed(&mut write)?;
    }
    written += pool.finish_into(&mut write)?;

    let skipped = images.len() - written;
    if skipped > 0 {
        warn!("{} frames could not be read", skipped);
    }

    // Frame-ordered copy of the session
    let mut records = if written > 0 {
        read_jsonl(&jsonl_path)?
    } else {
        Vec::new()
    };
    records.sort_by_key(|r| r.frame_index);
    export_to_json(&records, &session.join("telemetry.json"))?;

    info!("Wrote {} records to {}", records.len(), session.display());
    Ok(())
}

/// Tesseract from the usual locations, downloading English data if no
/// tessdata directory is found.
fn build_recognizer(config: &AppConfig) -> Result<TesseractRecognizer> {
    let executable = find_tesseract_executable().context("Tesseract is required for extraction")?;
    let tessdata = match find_tessdata_dir() {
        Ok(dir) => dir,
        Err(e) => {
            warn!("{}. Downloading trained data.", e);
            ensure_tessdata()?
        }
    };
    info!("Using Tesseract {}", executable.display());

    Ok(TesseractRecognizer::new(TesseractPaths {
        executable,
        tessdata,
    })
    .with_page_segmentation_mode(config.page_segmentation_mode))
}

/// Explicit catalog file, else the catalog directory matched against the
/// first frame's resolution, else the built-in layout.
fn resolve_catalog(
    first_frame: &Path,
    catalog_file: Option<&Path>,
    config: &AppConfig,
) -> Result<RegionCatalog> {
    if let Some(path) = catalog_file {
        return RegionCatalog::load_from_file(path);
    }

    let dir = config.catalog_dir.clone().unwrap_or_else(paths::get_catalog_dir);
    if dir.is_dir() {
        let (width, height) = image::image_dimensions(first_frame)
            .with_context(|| format!("Failed to read {}", first_frame.display()))?;
        match RegionCatalog::load_for_resolution(&dir, width, height) {
            Ok(catalog) => return Ok(catalog),
            Err(e) => warn!("{:#}. Using built-in catalog.", e),
        }
    }

    Ok(default_catalog())
}

/// File modification time, falling back to now.
fn captured_at(path: &Path) -> DateTime<Local> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Local>::from)
        .unwrap_or_else(|_| Local::now())
}
