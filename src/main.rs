use anyhow::{anyhow, bail, Context, Result};
use std::path::{Path, PathBuf};

use photoqueue::db::{CopyrightOption, CropBounds, Notification, QueuedImage};
use photoqueue::export;
use photoqueue::faces::review_defaults;
use photoqueue::intake::{CropSeeder, Intake, Upload};
use photoqueue::media::MediaStore;
use photoqueue::moderation::{ApproveRequest, Moderator, ReviewDecision, ReviewOutcome};
use photoqueue::{logging, Config, Database, ModerationError};

struct Cli {
    config_path: Option<PathBuf>,
    command: String,
    args: Vec<String>,
}

fn parse_args() -> Cli {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut config_path = None;
    let mut rest = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" if rest.is_empty() => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" if rest.is_empty() => {
                println!("photoqueue {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            _ => rest.push(args[i].clone()),
        }
        i += 1;
    }

    if rest.is_empty() {
        print_help();
        std::process::exit(1);
    }
    let command = rest.remove(0);

    Cli {
        config_path,
        command,
        args: rest,
    }
}

fn print_help() {
    println!(
        r#"photoqueue - moderation queue for candidate photos

USAGE:
    photoqueue [--config PATH] <COMMAND> [ARGS]

COMMANDS:
    init                                 Create the config, database and media directories
    add-person NAME                      Add a person who can receive photos
    upload PERSON FILE [--user NAME] [--why OPTION] [--justification TEXT]
                                         Queue a photo for moderation
    queue [--person ID] [--json]         List undecided uploads, oldest first
    show ID                              Show one queued upload and its suggested crop
    approve ID --moderator NAME [--crop X1,Y1,X2,Y2] [--copyright OPTION] [--no-primary]
                                         Publish the cropped photo on the person,
                                         as their primary image unless --no-primary
    reject ID --moderator NAME [--reason TEXT]
    ignore ID --moderator NAME           Drop an upload (usually a duplicate)
    notifications [--json] [--drain]     List unsent notices to uploaders;
                                         --drain marks the listed ones sent
    images PERSON                        List a person's public images
    check-duplicate PERSON FILE          Check FILE against the person's public images
    duplicates                           Report identical public images on one person
    export-actions [--output PATH]       Write the action log as CSV

    Copyright options: public-domain, copyright-assigned, profile-photo, other

OPTIONS:
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    PHOTOQUEUE_CONFIG     Path to config file (overrides default location)
    PHOTOQUEUE_LOG        Log filter (trace, debug, info, warn, error)
    PHOTOQUEUE_MODERATOR  Default for --moderator

See also: photoqueue-detector --help"#
    );
}

/// Pull `--name VALUE` out of `args`.
fn take_opt(args: &mut Vec<String>, name: &str) -> Result<Option<String>> {
    match args.iter().position(|a| a == name) {
        Some(i) => {
            if i + 1 >= args.len() {
                bail!("{} requires a value", name);
            }
            let value = args.remove(i + 1);
            args.remove(i);
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Pull a bare `--flag` out of `args`.
fn take_flag(args: &mut Vec<String>, name: &str) -> bool {
    match args.iter().position(|a| a == name) {
        Some(i) => {
            args.remove(i);
            true
        }
        None => false,
    }
}

fn positional<T: std::str::FromStr>(args: &[String], index: usize, what: &str) -> Result<T> {
    let raw = args
        .get(index)
        .ok_or_else(|| anyhow!("missing {}", what))?;
    raw.parse().map_err(|_| anyhow!("invalid {}: {:?}", what, raw))
}

fn no_extra(args: &[String], expected: usize) -> Result<()> {
    if args.len() > expected {
        bail!("unexpected argument: {}", args[expected]);
    }
    Ok(())
}

fn moderator_name(args: &mut Vec<String>) -> Result<String> {
    take_opt(args, "--moderator")?
        .or_else(|| std::env::var("PHOTOQUEUE_MODERATOR").ok())
        .ok_or_else(|| anyhow!("--moderator is required"))
}

/// Options of `approve`. Unset ones fall back to the entry's suggested
/// crop and the uploader's copyright claim; the photo becomes primary
/// unless `--no-primary` is given.
#[derive(Debug)]
struct ApproveArgs {
    crop: Option<CropBounds>,
    copyright: Option<CopyrightOption>,
    make_primary: bool,
}

impl ApproveArgs {
    fn take(args: &mut Vec<String>) -> Result<Self> {
        let crop = match take_opt(args, "--crop")? {
            Some(raw) => Some(raw.parse::<CropBounds>().map_err(ModerationError::Validation)?),
            None => None,
        };
        let copyright = match take_opt(args, "--copyright")? {
            Some(raw) => Some(raw.parse::<CopyrightOption>().map_err(ModerationError::Validation)?),
            None => None,
        };
        let make_primary = !take_flag(args, "--no-primary");
        Ok(Self {
            crop,
            copyright,
            make_primary,
        })
    }

    fn request_for(&self, entry: &QueuedImage) -> ApproveRequest {
        ApproveRequest {
            crop: self.crop.unwrap_or_else(|| review_defaults(entry)),
            moderator_why_allowed: self.copyright.unwrap_or(entry.why_allowed),
            make_primary: self.make_primary,
        }
    }
}

struct App {
    config: Config,
    db: Database,
    media: MediaStore,
}

fn engine(ctx: &App) -> Moderator<'_> {
    Moderator::new(&ctx.db, &ctx.media).with_notify(ctx.config.notify.clone())
}

fn open(config: Config) -> Result<App> {
    let db = Database::open(&config.db_path)
        .with_context(|| format!("Failed to open database {:?}", config.db_path))?;
    db.initialize()?;
    let media = MediaStore::new(&config.media_root, config.images.clone());
    Ok(App { config, db, media })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = parse_args();

    let config = match &cli.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // Output is for the moderator; a logging failure shouldn't block it.
    let _ = logging::init(&config.logging);

    let ctx = open(config)?;
    match run(&ctx, &cli.command, cli.args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            // Bad requests get a plain message; anything else keeps its chain.
            if let Some(err) = e.downcast_ref::<ModerationError>() {
                if err.is_user_error() {
                    eprintln!("Error: {}", err);
                    std::process::exit(2);
                }
            }
            Err(e)
        }
    }
}

async fn run(ctx: &App, command: &str, mut args: Vec<String>) -> Result<()> {
    match command {
        "init" => {
            no_extra(&args, 0)?;
            std::fs::create_dir_all(&ctx.config.media_root)?;
            println!("Database:   {}", ctx.config.db_path.display());
            println!("Media root: {}", ctx.config.media_root.display());
            Ok(())
        }
        "add-person" => {
            let name = args.join(" ");
            if name.trim().is_empty() {
                bail!("missing person name");
            }
            let id = ctx.db.create_person(name.trim())?;
            println!("{}", id);
            Ok(())
        }
        "upload" => cmd_upload(ctx, args).await,
        "queue" => {
            let json = take_flag(&mut args, "--json");
            let person = take_opt(&mut args, "--person")?;
            no_extra(&args, 0)?;

            if json {
                println!("{}", export::queue_json(&ctx.db)?);
                return Ok(());
            }
            let entries = match person {
                Some(id) => ctx.db.undecided_for_person(id.parse().context("invalid person id")?)?,
                None => ctx.db.undecided_queue()?,
            };
            if entries.is_empty() {
                println!("The queue is empty");
            }
            for entry in &entries {
                print_entry_line(entry);
            }
            Ok(())
        }
        "show" => {
            let id: i64 = positional(&args, 0, "queued image id")?;
            no_extra(&args, 1)?;
            let entry = Moderator::new(&ctx.db, &ctx.media).load(id)?;
            print_entry(ctx, &entry)
        }
        "approve" => {
            let moderator = moderator_name(&mut args)?;
            let options = ApproveArgs::take(&mut args)?;
            let id: i64 = positional(&args, 0, "queued image id")?;
            no_extra(&args, 1)?;

            let engine = engine(ctx);
            let entry = engine.load(id)?;
            let request = options.request_for(&entry);
            report(engine.review(&entry, &moderator, ReviewDecision::Approve(request))?);
            Ok(())
        }
        "reject" => {
            let moderator = moderator_name(&mut args)?;
            let reason = take_opt(&mut args, "--reason")?.unwrap_or_default();
            let id: i64 = positional(&args, 0, "queued image id")?;
            no_extra(&args, 1)?;

            let engine = engine(ctx);
            let entry = engine.load(id)?;
            report(engine.review(&entry, &moderator, ReviewDecision::Reject { reason })?);
            Ok(())
        }
        "ignore" => {
            let moderator = moderator_name(&mut args)?;
            let id: i64 = positional(&args, 0, "queued image id")?;
            no_extra(&args, 1)?;

            let engine = engine(ctx);
            let entry = engine.load(id)?;
            report(engine.review(&entry, &moderator, ReviewDecision::Ignore)?);
            Ok(())
        }
        "images" => {
            let person: i64 = positional(&args, 0, "person id")?;
            no_extra(&args, 1)?;
            for image in ctx.db.images_for_person(person)? {
                println!(
                    "{:>5}  {}{}  {}  {}",
                    image.id,
                    ctx.media.public_url(&image.path),
                    if image.is_primary { " (primary)" } else { "" },
                    image.copyright,
                    image.source
                );
            }
            Ok(())
        }
        "check-duplicate" => {
            let person: i64 = positional(&args, 0, "person id")?;
            let file: PathBuf = positional(&args, 1, "file")?;
            no_extra(&args, 2)?;

            let bytes = read_file(&file)?;
            let intake = Intake::new(&ctx.db, &ctx.media, &ctx.config.upload);
            if intake.check_duplicate(person, &bytes)? {
                println!("duplicate: this image is already on person {}", person);
            } else {
                println!("not a duplicate");
            }
            Ok(())
        }
        "duplicates" => {
            no_extra(&args, 0)?;
            let groups = ctx.db.find_duplicate_images()?;
            if groups.is_empty() {
                println!("No duplicate public images");
            }
            for group in groups {
                let ids: Vec<String> = group.images.iter().map(|i| i.id.to_string()).collect();
                println!("person {}  md5 {}  images {}", group.person_id, group.md5sum, ids.join(", "));
            }
            Ok(())
        }
        "notifications" => {
            let json = take_flag(&mut args, "--json");
            let drain = take_flag(&mut args, "--drain");
            no_extra(&args, 0)?;

            let pending = ctx.db.pending_notifications()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&pending)?);
            } else if pending.is_empty() {
                println!("No unsent notifications");
            } else {
                for notice in &pending {
                    print_notification(ctx, notice);
                }
            }
            if drain {
                let mut sent = 0;
                for notice in &pending {
                    if ctx.db.mark_notification_sent(notice.id)? {
                        sent += 1;
                    }
                }
                tracing::info!(count = sent, "Drained notification outbox");
                eprintln!("Marked {} notifications sent", sent);
            }
            Ok(())
        }
        "export-actions" => {
            let output = take_opt(&mut args, "--output")?;
            no_extra(&args, 0)?;
            match output {
                Some(path) => {
                    let count = export::export_actions_csv(&ctx.db, Path::new(&path))?;
                    eprintln!("Exported {} actions to {}", count, path);
                }
                None => {
                    export::write_actions_csv(&ctx.db, std::io::stdout().lock())?;
                }
            }
            Ok(())
        }
        other => {
            print_help();
            bail!("unknown command: {}", other)
        }
    }
}

async fn cmd_upload(ctx: &App, mut args: Vec<String>) -> Result<()> {
    let user = take_opt(&mut args, "--user")?;
    let why_allowed = match take_opt(&mut args, "--why")? {
        Some(raw) => raw.parse::<CopyrightOption>().map_err(ModerationError::Validation)?,
        None => CopyrightOption::default(),
    };
    let justification = take_opt(&mut args, "--justification")?.unwrap_or_default();
    let person: i64 = positional(&args, 0, "person id")?;
    let file: PathBuf = positional(&args, 1, "file")?;
    no_extra(&args, 2)?;

    let bytes = read_file(&file)?;
    let receipt = Intake::new(&ctx.db, &ctx.media, &ctx.config.upload).submit(&Upload {
        person_id: person,
        bytes: &bytes,
        uploaded_by: user.as_deref(),
        why_allowed,
        justification_for_use: &justification,
    })?;

    println!("Queued as {} (md5 {})", receipt.entry_id, receipt.digest);
    if receipt.duplicate {
        println!("Warning: an identical image is already on this person's record");
    }

    let faces = &ctx.config.faces;
    if faces.enabled && faces.detect_on_upload {
        let (faces, crop) = (faces.clone(), ctx.config.crop.clone());
        let seeder = tokio::task::spawn_blocking(move || CropSeeder::from_config(&faces, &crop)).await?;
        match seeder {
            Ok(seeder) => {
                let entry = Moderator::new(&ctx.db, &ctx.media).load(receipt.entry_id)?;
                let outcome = seeder.seed_crop_bounds(&ctx.db, &ctx.media, &entry).await?;
                tracing::debug!(entry = entry.id, outcome = ?outcome, "Seeded crop bounds on upload");
            }
            Err(e) => {
                // Leave it for photoqueue-detector.
                tracing::warn!(error = %e, "Face detector unavailable, skipping crop suggestion");
            }
        }
    }
    Ok(())
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))
}

fn report(outcome: ReviewOutcome) {
    match outcome {
        ReviewOutcome::Approved { public_image_id } => println!("Approved as public image {}", public_image_id),
        ReviewOutcome::Rejected => println!("Rejected"),
        ReviewOutcome::Ignored => println!("Ignored"),
        ReviewOutcome::LeftInQueue => println!("Left in the queue"),
    }
}

fn print_notification(ctx: &App, notice: &Notification) {
    println!("Notification {} ({})", notice.id, notice.kind);
    println!("To: {}", notice.recipient);
    if notice.copy_support {
        if let Some(support) = &ctx.config.notify.support_email {
            println!("Cc: {}", support);
        }
    }
    println!("Subject: {}", notice.subject);
    println!();
    println!("{}", notice.body);
}

fn print_entry_line(entry: &QueuedImage) {
    println!(
        "{:>5}  person {:<5} {:<20} {}x{}  {}",
        entry.id,
        entry.person_id,
        entry.uploaded_by.as_deref().unwrap_or("(script)"),
        entry.image_width,
        entry.image_height,
        entry.created_at
    );
}

fn print_entry(ctx: &App, entry: &QueuedImage) -> Result<()> {
    let person = ctx.db.get_person(entry.person_id)?;
    let crop = review_defaults(entry);

    println!("Queued image {}", entry.id);
    println!(
        "  person:        {} ({})",
        person.map(|p| p.name).unwrap_or_else(|| "unknown".to_string()),
        entry.person_id
    );
    println!("  uploaded by:   {}", entry.uploaded_by.as_deref().unwrap_or("a script"));
    println!("  why allowed:   {}", entry.why_allowed);
    println!("  justification: {}", entry.justification_for_use);
    println!("  decision:      {} (revision {})", entry.decision, entry.revision);
    println!("  file:          {}", ctx.media.public_url(&entry.image_path));
    println!("  size:          {}x{}", entry.image_width, entry.image_height);
    println!(
        "  crop:          {}{}",
        crop,
        if entry.has_crop_bounds() { "" } else { " (whole image)" }
    );
    if !entry.face_detection_tried {
        println!("  face detection has not run yet");
    }
    if let Some(moderator) = &entry.moderator {
        println!("  moderator:     {}", moderator);
    }
    if let Some(notes) = &entry.moderator_notes {
        println!("  notes:         {}", notes);
    }

    let others = ctx.db.undecided_for_person(entry.person_id)?;
    if others.len() > 1 {
        println!("  {} other uploads for this person are waiting", others.len() - 1);
    }
    Ok(())
}
