use dragbox::cli::{AppConfig, Args, Command};
use dragbox::config::UserConfig;
use dragbox::{
    open_file, CollectionObserver, DragboxError, EntryObserver, FileCollection, FileEntry,
    Result, ThumbnailPool,
};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const THUMBNAIL_TIMEOUT: Duration = Duration::from_secs(30);

fn main() {
    // Parse command line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let user_config = UserConfig::load().unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load user config: {}", e);
        UserConfig::default()
    });

    let config = AppConfig::from_args(args, &user_config);
    init_tracing(&config.log_level);

    if let Err(e) = run(&config) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// RUST_LOG wins; otherwise the configured level, falling back to info
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match level.parse::<tracing::Level>() {
            Ok(level) => level,
            Err(_) => tracing::Level::INFO,
        };
        EnvFilter::new(level.to_string())
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Stand-in presentation layer: logs what a list UI would redraw
#[derive(Default)]
struct ConsoleObserver {
    updates: AtomicUsize,
}

impl CollectionObserver for ConsoleObserver {
    fn reloaded(&self, count: usize) {
        tracing::debug!("Listing reloaded with {count} entries");
    }

    fn updated(&self, index: usize) {
        self.updates.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Row {index} updated");
    }

    fn removed(&self, index: usize) {
        tracing::debug!("Row {index} removed");
    }

    fn reload_failed(&self, error: &DragboxError) {
        eprintln!("Warning: {}", error);
    }
}

impl EntryObserver for ConsoleObserver {
    fn edit_mode_changed(&self, entry: &FileEntry) {
        tracing::debug!(
            "{} {} editing",
            entry.name(),
            if entry.edit_mode() { "began" } else { "ended" }
        );
    }
}

fn run(config: &AppConfig) -> Result<()> {
    let pool = ThumbnailPool::new()?;
    let mut files = FileCollection::new(&config.directory, &pool)
        .with_thumbnail_size(config.thumbnail_size)
        .with_delete_mode(config.delete_mode);
    let observer = Arc::new(ConsoleObserver::default());
    files.set_observer(&observer);

    files.reload();

    match &config.command {
        Command::List { thumbnails } => {
            if *thumbnails && !files.wait_until_idle(THUMBNAIL_TIMEOUT) {
                tracing::warn!("Timed out waiting for thumbnails");
            }
            tracing::debug!(
                "{} row updates received",
                observer.updates.load(Ordering::Relaxed)
            );
            print_listing(&files, *thumbnails);
        }
        Command::Import { source } => {
            let destination = files.import(source)?;
            println!("Imported {}", destination.display());
        }
        Command::Rename { from, to } => {
            let index = find_entry(&files, from)?;
            if let Some(entry) = files.get_mut(index) {
                entry.set_observer(&observer);
                entry.set_edit_mode(true);
            }
            let renamed = files.rename(index, to);
            if let Some(entry) = files.get_mut(index) {
                entry.set_edit_mode(false);
            }
            if !renamed {
                return Err(DragboxError::MoveFailed {
                    from: files.content_path(from),
                    to: files.content_path(to),
                    reason: "rename refused".to_string(),
                });
            }
            println!("Renamed {} to {}", from, to);
        }
        Command::Remove { name, .. } => {
            let index = find_entry(&files, name)?;
            files.remove(index)?;
            if files.content_path(name).exists() {
                println!("Removed {} from the listing, but it is still on disk", name);
            } else {
                println!("Removed {}", name);
            }
        }
        Command::Thumbnail { name, output, .. } => {
            let index = find_entry(&files, name)?;
            if !files.wait_until_idle(THUMBNAIL_TIMEOUT) {
                tracing::warn!("Timed out waiting for thumbnails");
            }
            let entry = &files[index];
            let thumbnail = entry.thumbnail().ok_or_else(|| DragboxError::DecodeFailed {
                path: entry.path(),
                reason: "no thumbnail available".to_string(),
            })?;
            thumbnail
                .save(output)
                .map_err(|e| DragboxError::Io(io::Error::other(e.to_string())))?;
            println!(
                "Wrote {}x{} thumbnail to {}",
                thumbnail.width(),
                thumbnail.height(),
                output.display()
            );
        }
        Command::Open { name } => {
            let index = find_entry(&files, name)?;
            open_file(&files[index].path())?;
        }
    }

    Ok(())
}

fn find_entry(files: &FileCollection, name: &str) -> Result<usize> {
    files
        .find(name)
        .ok_or_else(|| DragboxError::InvalidName(name.to_string()))
}

fn print_listing(files: &FileCollection, with_thumbnails: bool) {
    println!("{}: {} entries", files.directory().display(), files.count());
    for entry in files.iter() {
        let mut line = format!(
            "{:<6} {:<40} {}",
            entry.viewer_kind().label(),
            entry.name(),
            entry.detail_line()
        );
        if with_thumbnails {
            match entry.thumbnail() {
                Some(thumb) => line.push_str(&format!("  [thumb {}x{}]", thumb.width(), thumb.height())),
                None => line.push_str("  [no thumb]"),
            }
        }
        println!("{}", line);
    }
}
