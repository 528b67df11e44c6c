//! DragBox - a file-browser model library
//!
//! This crate provides the listing model behind the DragBox file browser:
//! directory collections with observer callbacks, lazily-statted entries,
//! inline rename, delete, import and background thumbnail generation.

pub mod async_thumbnail;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod file_opener;
pub mod thumbnail;

// Re-export primary types for convenience
pub use async_thumbnail::ThumbnailPool;
pub use config::UserConfig;
pub use domain::{
    mime_type_from_extension, CollectionObserver, DeleteMode, EntryId, EntryObserver,
    FileAttributes, FileCollection, FileEntry, ViewerKind,
};
pub use error::{DragboxError, Result};
pub use file_opener::open_file;
pub use thumbnail::{ThumbnailKind, ThumbnailSize};
