//! Background face detection for the photo moderation queue.
//!
//! Picks up undecided uploads that have not been through face detection
//! yet and stores suggested crop bounds for the moderators. Detection is
//! best effort: an image is marked as tried whatever the outcome.
//!
//! ## Usage
//!
//! ```bash
//! photoqueue-detector              # Poll in the foreground
//! photoqueue-detector --once       # Process pending uploads once and exit
//! ```

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

use photoqueue::intake::{CropSeeder, SeedOutcome};
use photoqueue::media::MediaStore;
use photoqueue::{logging, Config, Database};

/// Entries handled per database round trip.
const BATCH_SIZE: usize = 25;

/// Worker options
struct DetectorOptions {
    /// Poll interval (seconds)
    poll_interval: u64,
    /// Run once and exit
    once: bool,
    /// Config path override
    config_path: Option<PathBuf>,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            poll_interval: 60,
            once: false,
            config_path: None,
        }
    }
}

/// Totals for one pass over the pending entries.
#[derive(Debug, Default)]
struct PassStats {
    seeded: usize,
    unavailable: usize,
    unreadable: usize,
    superseded: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let options = parse_args();

    let config = match &options.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    logging::init(&config.logging)?;
    info!("photoqueue-detector starting...");

    if !config.faces.enabled {
        warn!("Face detection is disabled in the config, nothing to do");
        return Ok(());
    }

    let db = Database::open(&config.db_path).context("Failed to open database")?;
    db.initialize()?;
    info!(path = ?config.db_path, "Database opened");

    let media = MediaStore::new(&config.media_root, config.images.clone());

    let (faces, crop) = (config.faces.clone(), config.crop.clone());
    let seeder = tokio::task::spawn_blocking(move || CropSeeder::from_config(&faces, &crop))
        .await?
        .context("Failed to load face detection model")?;

    if options.once {
        info!("Running in single-shot mode");
        let stats = process_pending(&db, &media, &seeder).await?;
        if stats.unreadable > 0 {
            error!(count = stats.unreadable, "Some queued images could not be read");
            std::process::exit(1);
        }
    } else {
        info!(interval = options.poll_interval, "Polling for new uploads");
        loop {
            if let Err(e) = process_pending(&db, &media, &seeder).await {
                error!(error = %e, "Error processing queued images");
            }
            tokio::time::sleep(Duration::from_secs(options.poll_interval)).await;
        }
    }

    info!("photoqueue-detector stopped");
    Ok(())
}

fn parse_args() -> DetectorOptions {
    let args: Vec<String> = std::env::args().collect();
    let mut options = DetectorOptions::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--once" | "-1" => {
                options.once = true;
            }
            "--interval" | "-i" => {
                if i + 1 < args.len() {
                    if let Ok(interval) = args[i + 1].parse() {
                        options.poll_interval = interval;
                    }
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    options.config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    options
}

fn print_help() {
    println!(
        r#"photoqueue-detector - suggest crop bounds for queued photos

USAGE:
    photoqueue-detector [OPTIONS]

OPTIONS:
    --once, -1          Process pending uploads once and exit
    --interval, -i N    Poll interval in seconds (default: 60)
    --config, -c PATH   Path to config file
    --help, -h          Show this help message

ENVIRONMENT:
    PHOTOQUEUE_CONFIG   Path to config file (overrides default location)
    PHOTOQUEUE_LOG      Log filter (trace, debug, info, warn, error)

With --once the exit status is 1 when any queued image could not be read."#
    );
}

async fn process_pending(db: &Database, media: &MediaStore, seeder: &CropSeeder) -> Result<PassStats> {
    let mut stats = PassStats::default();

    loop {
        // Every handled entry drops out of this query, so the loop ends.
        let pending = db.needing_face_detection(BATCH_SIZE)?;
        if pending.is_empty() {
            break;
        }

        info!(count = pending.len(), "Found queued images needing face detection");
        for entry in pending {
            match seeder.seed_crop_bounds(db, media, &entry).await? {
                SeedOutcome::Faces { .. } | SeedOutcome::NoFaces { .. } => stats.seeded += 1,
                SeedOutcome::DetectionUnavailable { .. } => stats.unavailable += 1,
                SeedOutcome::Unreadable { .. } => stats.unreadable += 1,
                SeedOutcome::Superseded => stats.superseded += 1,
            }
        }
    }

    if stats.seeded + stats.unavailable + stats.unreadable + stats.superseded == 0 {
        info!("No queued images need face detection");
    } else {
        info!(
            seeded = stats.seeded,
            unavailable = stats.unavailable,
            unreadable = stats.unreadable,
            superseded = stats.superseded,
            "Face detection pass finished"
        );
    }
    Ok(stats)
}
