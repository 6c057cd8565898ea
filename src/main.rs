// Darkroom CLI binary

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use darkroom::config::{check_directories, Config};
use darkroom::context::AppContext;
use darkroom::db::settings::ImportMode;
use darkroom::db::{self, photos, sessions, settings};
use darkroom::geocode;
use darkroom::grouping::{self, bursts};
use darkroom::ingest::{self, IngestOptions};
use darkroom::thumbs;

#[derive(Parser)]
#[command(name = "darkroom")]
#[command(about = "Local photo library engine: ingest, dedup, enrich, group", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest media from the import folder into the library
    Ingest {
        /// Import folder (defaults to IMPORT_PATH)
        #[arg(short, long)]
        import: Option<PathBuf>,
        /// Library root (defaults to LIBRARY_PATH)
        #[arg(short, long)]
        library: Option<PathBuf>,
        /// Transfer mode: move or copy (defaults to the import_mode setting)
        #[arg(short, long)]
        mode: Option<String>,
    },

    /// Rebuild trip groups over the whole library
    RebuildGroups,

    /// Recompute perceptual hashes for burst detection
    RebuildBursts,

    /// Regenerate every thumbnail
    RebuildThumbnails,

    /// Load the GeoNames gazetteer (defaults to GEONAMES_PATH)
    LoadGazetteer {
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// List photos, newest first
    List {
        /// Which slice: curated, uncurated, or trashed
        #[arg(long, default_value = "curated")]
        shape: String,
        #[arg(long, default_value = "100")]
        limit: i64,
        #[arg(long, default_value = "0")]
        offset: i64,
        /// Page by whole trip groups
        #[arg(long)]
        grouped: bool,
    },

    /// Show one photo's record
    Show {
        /// Library file path
        path: String,
    },

    /// Detect rapid-capture bursts over a page of photos
    Bursts {
        /// Which slice: curated, uncurated, or trashed
        #[arg(long, default_value = "curated")]
        shape: String,
        #[arg(long, default_value = "100")]
        limit: i64,
        #[arg(long, default_value = "0")]
        offset: i64,
    },

    /// Month-by-month library summary
    Calendar,

    /// List recent import sessions
    Sessions {
        #[arg(long, default_value = "20")]
        limit: i64,
    },

    /// Read or write a setting
    Settings {
        key: Option<String>,
        value: Option<String>,
    },

    /// Update curation flags on a photo
    Curate {
        /// Library file path
        path: String,
        #[arg(long)]
        curated: bool,
        #[arg(long)]
        trashed: bool,
        #[arg(long, default_value = "0")]
        rating: i64,
        /// Replace the photo's notes
        #[arg(long)]
        notes: Option<String>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Ingest { import, library, mode } => cmd_ingest(config, import, library, mode),
        Commands::RebuildGroups => cmd_rebuild_groups(config),
        Commands::RebuildBursts => cmd_rebuild_bursts(config),
        Commands::RebuildThumbnails => cmd_rebuild_thumbnails(config),
        Commands::LoadGazetteer { dir } => cmd_load_gazetteer(config, dir),
        Commands::List { shape, limit, offset, grouped } => {
            cmd_list(config, shape, limit, offset, grouped)
        }
        Commands::Show { path } => cmd_show(config, path),
        Commands::Bursts { shape, limit, offset } => cmd_bursts(config, shape, limit, offset),
        Commands::Calendar => cmd_calendar(config),
        Commands::Sessions { limit } => cmd_sessions(config, limit),
        Commands::Settings { key, value } => cmd_settings(config, key, value),
        Commands::Curate { path, curated, trashed, rating, notes } => {
            cmd_curate(config, path, curated, trashed, rating, notes)
        }
    }
}

fn open(config: &Config) -> Result<rusqlite::Connection> {
    let db_path = config.db_path()?;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(db::open_db(&db_path)?)
}

fn cmd_ingest(
    mut config: Config,
    import: Option<PathBuf>,
    library: Option<PathBuf>,
    mode: Option<String>,
) -> Result<()> {
    if let Some(path) = import {
        config.import_path = Some(path);
    }
    if let Some(path) = library {
        config.library_path = Some(path);
    }

    let import_path = config.import_path()?.to_path_buf();
    let library_path = config.library_path()?.to_path_buf();
    let thumbnails_path = config.thumbnails_path()?;
    check_directories(&[import_path.as_path(), library_path.as_path()])?;

    let mode = match mode.as_deref() {
        Some(s) => Some(
            ImportMode::parse(s).ok_or_else(|| anyhow::anyhow!("mode must be 'move' or 'copy'"))?,
        ),
        None => None,
    };

    let conn = open(&config)?;
    let geonames_dir = config.geonames_path.clone();
    geocode::load_gazetteer(&conn, &geonames_dir)?;

    let ctx = AppContext::new(config);
    let opts = IngestOptions { import_path, library_path, thumbnails_path, mode };
    let stats = ingest::run_ingest(&conn, &ctx, &opts)?;

    println!();
    println!("=== Import Summary ===");
    println!("Total files scanned:      {}", stats.total_scanned);
    println!("Already imported:         {}", stats.already_imported);
    println!("Unique files:             {}", stats.unique_files);
    println!("Duplicate groups found:   {}", stats.duplicate_groups);
    println!("Duplicates skipped:       {}", stats.duplicates_removed);
    println!("Moved to library:         {}", stats.moved_to_library);
    println!("Errors:                   {}", stats.error_count);
    println!();

    // Fold the new arrivals into trip groups
    grouping::assign_ungrouped_photos(&conn)?;

    Ok(())
}

fn cmd_rebuild_groups(config: Config) -> Result<()> {
    let conn = open(&config)?;
    let ctx = AppContext::new(config);
    grouping::rebuild_groups(&conn, &ctx.trackers.groups)?;
    Ok(())
}

fn cmd_rebuild_bursts(config: Config) -> Result<()> {
    let conn = open(&config)?;
    let ctx = AppContext::new(config);
    bursts::rebuild_burst_data(&conn, &ctx.trackers.bursts)?;
    Ok(())
}

fn cmd_rebuild_thumbnails(config: Config) -> Result<()> {
    let conn = open(&config)?;
    let library_path = config.library_path()?.to_path_buf();
    let thumbnails_path = config.thumbnails_path()?;
    let ctx = AppContext::new(config);
    thumbs::rebuild_thumbnails(&conn, &library_path, &thumbnails_path, &ctx.trackers.thumbnails)?;
    Ok(())
}

fn cmd_load_gazetteer(config: Config, dir: Option<PathBuf>) -> Result<()> {
    let conn = open(&config)?;
    let dir = dir.unwrap_or_else(|| config.geonames_path.clone());
    geocode::load_gazetteer(&conn, &dir)?;
    Ok(())
}

fn page_shape(shape: &str) -> Result<photos::PageShape> {
    match shape {
        "curated" => Ok(photos::PageShape::Curated),
        "uncurated" => Ok(photos::PageShape::Uncurated),
        "trashed" => Ok(photos::PageShape::Trashed),
        other => anyhow::bail!("unknown shape '{}': use curated, uncurated, or trashed", other),
    }
}

fn print_photo_line(photo: &darkroom::db::photos::Photo) {
    println!(
        "{:<24} {:>4}* {:<9} {:<20} {}",
        photo.date_time.as_deref().unwrap_or("-"),
        photo.rating,
        photo.file_format,
        photo.camera_model.as_deref().unwrap_or("-"),
        photo.file_path,
    );
}

fn cmd_list(config: Config, shape: String, limit: i64, offset: i64, grouped: bool) -> Result<()> {
    let conn = open(&config)?;
    let shape = page_shape(&shape)?;

    if grouped {
        let page = db::groups::get_photos_with_groups(&conn, shape, limit, offset, None)?;

        // Nothing persisted yet (fresh import, no rebuild): synthesise
        // display groups over the plain page instead.
        if page.groups.is_empty() {
            let plain = photos::get_photos_page(&conn, shape, limit, offset, None)?;
            if !plain.photos.is_empty() {
                let time_gap = settings::get_group_time_gap(&conn);
                let distance = settings::get_group_distance(&conn);
                for group in grouping::detect_page_groups(&plain.photos, time_gap, distance) {
                    println!(
                        "[group {}] {} photos  {} .. {}",
                        group.group_id, group.photo_count, group.start_time, group.end_time
                    );
                }
                for photo in &plain.photos {
                    print_photo_line(photo);
                }
                println!(
                    "\nshowing {}-{} of {}",
                    plain.page_start_record, plain.page_end_record, plain.total_records
                );
                return Ok(());
            }
        }

        for group in &page.groups {
            let label = group.location().unwrap_or_else(|| "Unknown location".to_string());
            println!(
                "[group {}] {}  {} photos  {} .. {}",
                group.group_id,
                label,
                group.photo_count,
                group.start_time.as_deref().unwrap_or("-"),
                group.end_time.as_deref().unwrap_or("-"),
            );
            for photo in page.photos.iter().filter(|p| p.group_id == Some(group.group_id)) {
                print_photo_line(photo);
            }
        }
        println!(
            "\nshowing {}-{} of {}",
            page.page_start_record, page.page_end_record, page.total_records
        );
    } else {
        let page = photos::get_photos_page(&conn, shape, limit, offset, None)?;
        for photo in &page.photos {
            print_photo_line(photo);
        }
        println!(
            "\nshowing {}-{} of {}",
            page.page_start_record, page.page_end_record, page.total_records
        );
    }
    Ok(())
}

fn cmd_show(config: Config, path: String) -> Result<()> {
    let conn = open(&config)?;
    let photo = photos::get_photo(&conn, &path)?
        .ok_or_else(|| anyhow::anyhow!("no photo at {}", path))?;
    println!("{}", serde_json::to_string_pretty(&photo)?);
    Ok(())
}

fn cmd_bursts(config: Config, shape: String, limit: i64, offset: i64) -> Result<()> {
    let conn = open(&config)?;
    let shape = page_shape(&shape)?;

    if !settings::get_burst_detection_enabled(&conn) {
        println!(
            "Burst detection is disabled (run `darkroom settings burst_detection_enabled true` to enable)."
        );
        return Ok(());
    }

    // Page queries return newest-first, the ordering detect_bursts needs
    let page = photos::get_photos_page(&conn, shape, limit, offset, None)?;
    if page.photos.is_empty() {
        println!("No photos in this page.");
        return Ok(());
    }

    let time_threshold = settings::get_burst_time_threshold(&conn);
    let dhash_threshold = settings::get_burst_dhash_threshold(&conn);
    let detected = bursts::detect_bursts(&page.photos, time_threshold, dhash_threshold);

    if detected.is_empty() {
        println!(
            "No bursts in this page ({} photos, window {}s, distance {} bits).",
            page.photos.len(),
            time_threshold,
            dhash_threshold,
        );
        return Ok(());
    }

    for burst in &detected {
        let cover = &page.photos[burst.cover_index];
        println!(
            "[{}] {} photos from {}, cover:",
            burst.burst_id,
            burst.count,
            cover.date_time.as_deref().unwrap_or("-"),
        );
        print_photo_line(cover);
    }
    println!(
        "\n{} bursts across {} photos (showing {}-{} of {})",
        detected.len(),
        page.photos.len(),
        page.page_start_record,
        page.page_end_record,
        page.total_records,
    );
    Ok(())
}

fn cmd_calendar(config: Config) -> Result<()> {
    let conn = open(&config)?;
    for month in db::calendar::get_calendar_months(&conn)? {
        println!(
            "{} {}  {:>5} curated  {:>5} uncurated  cover: {}",
            month.month_name,
            month.year,
            month.curated_photos,
            month.uncurated_photos,
            month.cover_photo_path.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

fn cmd_sessions(config: Config, limit: i64) -> Result<()> {
    let conn = open(&config)?;
    let sessions = sessions::get_import_sessions(&conn, limit)?;

    if sessions.is_empty() {
        println!("No import sessions recorded.");
        return Ok(());
    }

    println!(
        "{:<6} {:<20} {:<10} {:>8} {:>8} {:>8} {:>7}  {}",
        "ID", "Started", "Status", "Scanned", "Moved", "Skipped", "Errors", "Path"
    );
    for s in sessions {
        println!(
            "{:<6} {:<20} {:<10} {:>8} {:>8} {:>8} {:>7}  {}",
            s.import_id,
            s.started_at,
            s.status,
            s.total_scanned,
            s.moved_to_library,
            s.duplicates_removed + s.already_imported,
            s.error_count,
            s.import_path,
        );
    }
    Ok(())
}

fn cmd_settings(config: Config, key: Option<String>, value: Option<String>) -> Result<()> {
    let conn = open(&config)?;

    match (key, value) {
        (None, _) => {
            for setting in settings::get_all_settings(&conn)? {
                println!("{} = {}", setting.key, setting.value);
            }
        }
        (Some(key), None) => match settings::get_setting(&conn, &key)? {
            Some(value) => println!("{}", value),
            None => println!("(not set)"),
        },
        (Some(key), Some(value)) => {
            settings::upsert_setting(&conn, &key, &value)?;
            println!("{} = {}", key, value);
        }
    }
    Ok(())
}

fn cmd_curate(
    config: Config,
    path: String,
    curated: bool,
    trashed: bool,
    rating: i64,
    notes: Option<String>,
) -> Result<()> {
    let conn = open(&config)?;
    anyhow::ensure!((0..=5).contains(&rating), "rating must be between 0 and 5");

    let ctx = AppContext::new(config);
    ctx.curate_photo(&conn, &path, curated, trashed, rating)?;
    if let Some(notes) = notes {
        photos::update_notes(&conn, &path, Some(&notes))?;
    }

    println!("updated {}", path);
    Ok(())
}
