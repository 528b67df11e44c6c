// CLI module for argument parsing and configuration

use crate::config::UserConfig;
use crate::domain::DeleteMode;
use crate::thumbnail::ThumbnailSize;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// DragBox - browse a directory, preview, rename, delete and import files
#[derive(Parser, Debug, Clone)]
#[command(name = "dragbox")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory to browse
    ///
    /// Defaults to the configured root, then the documents directory.
    #[arg(short = 'C', long = "dir", global = true)]
    pub directory: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short = 'v', long = "verbose", action = ArgAction::SetTrue, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List the directory (default)
    List {
        /// Wait for thumbnails and report which entries have one
        #[arg(long = "thumbnails", action = ArgAction::SetTrue)]
        thumbnails: bool,
    },
    /// Move an external file into the directory under a unique name
    Import { source: PathBuf },
    /// Rename an entry
    Rename { from: String, to: String },
    /// Delete an entry
    Remove {
        name: String,
        /// Move to the system trash instead of deleting
        #[arg(long = "trash", action = ArgAction::SetTrue)]
        trash: bool,
    },
    /// Write an entry's thumbnail as PNG
    Thumbnail {
        name: String,
        output: PathBuf,
        #[arg(long = "width")]
        width: Option<u32>,
        #[arg(long = "height")]
        height: Option<u32>,
    },
    /// Open an entry in the default application
    Open { name: String },
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Args::parse()
    }

    /// Validate the arguments and return any errors
    pub fn validate(&self) -> Result<(), String> {
        if let Some(ref directory) = self.directory {
            if !directory.exists() {
                return Err(format!("Directory does not exist: {}", directory.display()));
            }
            if !directory.is_dir() {
                return Err(format!("Path is not a directory: {}", directory.display()));
            }
        }

        if let Some(Command::Thumbnail { width, height, .. }) = &self.command {
            if *width == Some(0) || *height == Some(0) {
                return Err("Thumbnail width and height must be positive".to_string());
            }
        }

        Ok(())
    }
}

/// Configuration derived from CLI arguments layered over the user config
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub directory: PathBuf,
    pub command: Command,
    pub thumbnail_size: ThumbnailSize,
    pub delete_mode: DeleteMode,
    pub log_level: String,
}

impl AppConfig {
    pub fn from_args(args: Args, user_config: &UserConfig) -> Self {
        let directory = args
            .directory
            .unwrap_or_else(|| user_config.resolve_root());

        let mut thumbnail_size = user_config.thumbnail_size();
        let mut delete_mode = user_config.delete_mode;
        let command = args
            .command
            .unwrap_or(Command::List { thumbnails: false });

        match &command {
            Command::Thumbnail { width, height, .. } => {
                thumbnail_size = ThumbnailSize::new(
                    width.unwrap_or(thumbnail_size.width),
                    height.unwrap_or(thumbnail_size.height),
                );
            }
            Command::Remove { trash: true, .. } => delete_mode = DeleteMode::Trash,
            _ => {}
        }

        let log_level = if args.verbose {
            "debug".to_string()
        } else {
            user_config.log_level.clone()
        };

        AppConfig {
            directory,
            command,
            thumbnail_size,
            delete_mode,
            log_level,
        }
    }
}
