//! Hands files to the platform's default application ("open in")

use crate::error::{DragboxError, Result};
use std::io;
use std::path::Path;

/// Opens `path` with whatever application the system associates with it
pub fn open_file(path: &Path) -> Result<()> {
    if let Err(source) = path.metadata() {
        return Err(DragboxError::StatFailed {
            path: path.to_path_buf(),
            source,
        });
    }

    open::that(path).map_err(|e| {
        DragboxError::Io(io::Error::new(
            e.kind(),
            format!("Failed to open {}: {}", path.display(), e),
        ))
    })?;
    tracing::info!("Opened {} in default application", path.display());
    Ok(())
}
