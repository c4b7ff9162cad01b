//! Photo Organizer - pick, order and export photos under a numbered naming scheme
//!
//! Main entry point for the command-line host.
//!
//! # Overview
//!
//! The binary drives the same [`Controller`] a graphical front end would,
//! without a window. It initializes:
//! - Logging infrastructure (daily rotating file, console output in debug mode)
//! - Persisted settings ([`SettingsStore`])
//! - The host loop ([`EventQueue`]) the thumbnail task yields to
//! - The controller with the file system, EXIF and image collaborators
//!
//! # Execution Flow
//!
//! 1. Initialize logging → logs/photo-organizer.<date>
//! 2. Load settings from the config directory
//! 3. Apply command-line overrides (recursion, display key, picture size)
//! 4. Load every positional path (directories are scanned, files added as is)
//! 5. Optionally move everything to Selected and export it
//! 6. Print the two lists and thumbnail progress
//! 7. Shut down: stop rendering, persist settings, log the metrics summary

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use photo_organizer::config::keys;
use photo_organizer::models::Item;
use photo_organizer::services::{ExportMode, ExportPlan, NamingTemplate};
use photo_organizer::{APP_NAME, Controller, DisplayKey, EventQueue, SettingsStore, VERSION};
use std::rc::Rc;

#[derive(Parser, Debug)]
#[command(
    name = "photo-organizer",
    version,
    about = "Pick, order and export photos under a numbered naming scheme"
)]
struct Cli {
    /// Directories (or individual image files) to load
    #[arg(value_name = "PATH")]
    paths: Vec<Utf8PathBuf>,

    /// Descend into subdirectories, skipping hidden entries
    #[arg(short, long)]
    recursive: bool,

    /// Order of the Available list (index, name, date, date-name)
    #[arg(long, value_name = "KEY")]
    display_key: Option<DisplayKey>,

    /// Edge length of thumbnails in pixels
    #[arg(long, value_name = "PIXELS")]
    picture_size: Option<u32>,

    /// Directory holding photo-organizer.yaml
    #[arg(long, value_name = "DIR", default_value = "config")]
    config_dir: Utf8PathBuf,

    /// Directory for log files
    #[arg(long, value_name = "DIR", default_value = "logs")]
    log_dir: Utf8PathBuf,

    /// Log at debug level and mirror logs to the console
    #[arg(long)]
    debug: bool,

    /// Move every loaded item to Selected, in display order
    #[arg(long)]
    select_all: bool,

    /// Export the Selected list to this directory
    #[arg(long, value_name = "DIR")]
    export_to: Option<Utf8PathBuf>,

    /// File name prefix of exported files (default: last used)
    #[arg(long)]
    prefix: Option<String>,

    /// First number (default: continue the numbering found in the target)
    #[arg(long)]
    start: Option<u64>,

    /// Zero-padded width of the number (default: last used)
    #[arg(long)]
    digits: Option<u32>,

    /// Copy or move exported files
    #[arg(long, default_value = "copy")]
    mode: ExportMode,
}

/// Main entry point for the photo organizer
///
/// # Errors
///
/// This function can fail if:
/// - Logging or the configuration directory cannot be initialized
/// - The export target or naming template is invalid
/// - An export file operation fails (remaining items stay selected)
fn main() -> Result<()> {
    let cli = Cli::parse();

    let _guard = photo_organizer::logging::setup_logging_with_console(
        &cli.log_dir,
        "photo-organizer",
        cli.debug,
        cli.debug,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let settings = SettingsStore::load(&cli.config_dir)?;
    let queue = Rc::new(EventQueue::new());
    let controller = Controller::with_filesystem(Rc::clone(&queue), settings);

    apply_overrides(&controller, &cli);

    for path in &cli.paths {
        if let Err(e) = load_path(&controller, path) {
            tracing::error!("{:#}", e);
            eprintln!("error: {:#}", e);
        }
    }
    queue.run_until_idle();

    if cli.select_all {
        let ids: Vec<Utf8PathBuf> = controller
            .state()
            .read(|s| s.selection.available().iter().map(|i| i.path.clone()).collect());
        controller.select(&ids);
    }

    let result = match &cli.export_to {
        Some(target_dir) => run_export(&controller, &cli, target_dir),
        None => Ok(()),
    };

    print_listing(&controller);
    controller.shutdown();

    tracing::info!("Application shutdown complete");
    result
}

fn apply_overrides(controller: &Controller, cli: &Cli) {
    if cli.recursive {
        controller.set_recursive(true);
    }
    if let Some(key) = cli.display_key {
        controller.set_display_key(key);
    }
    if let Some(size) = cli.picture_size {
        let applied = controller.set_picture_size(size);
        if applied != size {
            tracing::warn!("Picture size {} clamped to {}", size, applied);
        }
    }
    if let Some(prefix) = &cli.prefix {
        controller.set_setting(keys::PREFIX, prefix.as_str());
    }
    if let Some(digits) = cli.digits {
        controller.set_setting(keys::DECIMALS, digits);
    }
}

fn load_path(controller: &Controller, path: &Utf8Path) -> Result<()> {
    if path.is_dir() {
        controller.load_directory(path)?;
    } else if path.is_file() {
        controller.load_paths([path.to_path_buf()]);
    } else {
        anyhow::bail!("No such file or directory: {}", path);
    }
    Ok(())
}

fn run_export(controller: &Controller, cli: &Cli, target_dir: &Utf8Path) -> Result<()> {
    let suggested = controller
        .suggest_export(target_dir)
        .with_context(|| format!("Cannot prepare export to {}", target_dir))?;

    let template = match cli.start {
        Some(start) => NamingTemplate::new(suggested.prefix, start, suggested.digits)?,
        None => suggested,
    };

    let plan = ExportPlan {
        target_dir: target_dir.to_path_buf(),
        template,
        mode: cli.mode,
    };
    let exported = controller.export(&plan)?;
    println!("Exported {} files to {}", exported, target_dir);
    Ok(())
}

fn print_listing(controller: &Controller) {
    controller.state().read(|s| {
        let print_list = |title: &str, items: &[Item], numbered: bool| {
            println!("{} ({}):", title, items.len());
            for (row, item) in items.iter().enumerate() {
                if numbered {
                    println!("  {:>4}  {}", row + 1, item.file_name);
                } else {
                    println!("        {}", item.file_name);
                }
            }
        };

        print_list("Available", s.selection.available(), false);
        print_list("Selected", s.selection.selected(), true);
        println!(
            "Thumbnails: {}/{} at {}px",
            s.selection.rendered_count(s.picture_size),
            s.selection.len(),
            s.picture_size
        );
    });
}
