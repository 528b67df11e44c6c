//! Directory listing model: entries, collections, observers and the
//! extension to media-type table used to pick viewers and thumbnailers.

pub mod collection;
pub mod entry;
pub mod observer;

pub use collection::FileCollection;
pub use entry::{EntryId, FileAttributes, FileEntry};
pub use observer::{CollectionObserver, EntryObserver};

use serde::{Deserialize, Serialize};

/// Extension to media type, lower-case keys.
static MEDIA_TYPES: &[(&str, &str)] = &[
    // Images
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("bmp", "image/bmp"),
    ("webp", "image/webp"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("heic", "image/heic"),
    ("svg", "image/svg+xml"),
    ("ico", "image/vnd.microsoft.icon"),
    // Documents
    ("pdf", "application/pdf"),
    ("rtf", "application/rtf"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("xls", "application/vnd.ms-excel"),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    ("ppt", "application/vnd.ms-powerpoint"),
    ("key", "application/x-iwork-keynote-sffkey"),
    ("pages", "application/x-iwork-pages-sffpages"),
    // Text
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("js", "text/javascript"),
    ("json", "application/json"),
    ("xml", "application/xml"),
    // Archives
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("tar", "application/x-tar"),
    ("7z", "application/x-7z-compressed"),
    // Audio / video
    ("mp3", "audio/mpeg"),
    ("m4a", "audio/mp4"),
    ("wav", "audio/wav"),
    ("aac", "audio/aac"),
    ("mp4", "video/mp4"),
    ("m4v", "video/x-m4v"),
    ("mov", "video/quicktime"),
];

/// Looks up the media type for a file extension (without the dot).
///
/// Matching is case-insensitive; unknown extensions yield `None`.
pub fn mime_type_from_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.to_lowercase();
    MEDIA_TYPES
        .iter()
        .find(|(candidate, _)| *candidate == ext)
        .map(|(_, mime)| *mime)
}

/// Which viewer a listing row opens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerKind {
    Directory,
    Image,
    Pdf,
    /// Anything without a dedicated viewer; offered for "open in" only
    Binary,
}

impl ViewerKind {
    pub fn from_mime_type(mime: Option<&str>) -> Self {
        match mime {
            Some("image/png") | Some("image/jpeg") => ViewerKind::Image,
            Some("application/pdf") => ViewerKind::Pdf,
            _ => ViewerKind::Binary,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ViewerKind::Directory => "dir",
            ViewerKind::Image => "image",
            ViewerKind::Pdf => "pdf",
            ViewerKind::Binary => "binary",
        }
    }
}

/// How an entry's backing filesystem object is deleted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMode {
    #[default]
    Permanent,
    /// Move to the platform trash instead of unlinking
    Trash,
}
