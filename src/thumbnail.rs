// Thumbnail generation for images and the first page of PDFs

use crate::domain::mime_type_from_extension;
use crate::error::{DragboxError, Result};
use image::{imageops::FilterType, DynamicImage, GenericImageView, RgbaImage};
use pdfium_render::prelude::*;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

/// Pdfium must not be entered from more than one thread at a time.
static PDFIUM_LOCK: Mutex<()> = Mutex::new(());

/// Bounding box a thumbnail is fitted into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailSize {
    pub width: u32,
    pub height: u32,
}

impl ThumbnailSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for ThumbnailSize {
    fn default() -> Self {
        Self::new(40, 40)
    }
}

/// Decode strategy chosen from a file's media type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailKind {
    Image,
    Document,
}

/// Maps an extension to a decode strategy, `None` for anything unsupported
pub fn thumbnail_kind(extension: &str) -> Option<ThumbnailKind> {
    match mime_type_from_extension(extension)? {
        "image/png" | "image/jpeg" => Some(ThumbnailKind::Image),
        "application/pdf" => Some(ThumbnailKind::Document),
        _ => None,
    }
}

/// Uniform scale factor that fits `width`×`height` inside `target`.
///
/// May exceed 1.0; small images are scaled up.
pub fn fit_scale(width: u32, height: u32, target: ThumbnailSize) -> f64 {
    let width_ratio = target.width as f64 / width as f64;
    let height_ratio = target.height as f64 / height as f64;
    width_ratio.min(height_ratio)
}

/// Dimensions after applying [`fit_scale`], never below one pixel
pub fn scaled_dimensions(width: u32, height: u32, target: ThumbnailSize) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (0, 0);
    }
    let scale = fit_scale(width, height, target);
    let new_width = ((width as f64 * scale).round() as u32).max(1);
    let new_height = ((height as f64 * scale).round() as u32).max(1);
    (new_width, new_height)
}

/// Produces a preview of the file at `path` fitted into `size`.
///
/// Unsupported extensions return `None` without touching the file. Decode
/// failures are logged and also return `None`.
pub fn generate(path: &Path, size: ThumbnailSize) -> Option<RgbaImage> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let kind = thumbnail_kind(extension)?;

    if size.width == 0 || size.height == 0 {
        tracing::debug!("Zero thumbnail size requested for {}", path.display());
        return None;
    }

    let result = match kind {
        ThumbnailKind::Image => thumbnail_from_image(path, size),
        ThumbnailKind::Document => thumbnail_from_pdf(path, size),
    };

    match result {
        Ok(thumbnail) => Some(thumbnail),
        Err(e) => {
            tracing::debug!("{e}");
            None
        }
    }
}

fn decode_failed(path: &Path, reason: impl ToString) -> DragboxError {
    DragboxError::DecodeFailed {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Decodes an image from file bytes
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    let data = fs::read(path).map_err(|e| decode_failed(path, format!("no data: {}", e)))?;
    image::load_from_memory(&data).map_err(|e| decode_failed(path, format!("not an image: {}", e)))
}

fn thumbnail_from_image(path: &Path, size: ThumbnailSize) -> Result<RgbaImage> {
    let img = load_image(path)?;
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(decode_failed(path, "image has no pixels"));
    }

    let (new_width, new_height) = scaled_dimensions(width, height, size);
    // Triangle is fast and good enough at thumbnail sizes
    Ok(img
        .resize_exact(new_width, new_height, FilterType::Triangle)
        .to_rgba8())
}

/// Attempts to create a Pdfium instance using explicit binding (no panic)
fn try_create_pdfium() -> Option<Pdfium> {
    // System library paths first, then PDFIUM_DYNAMIC_LIB_PATH, then the
    // lib/ subdirectory of bundled distributions, then the working directory
    if let Ok(bindings) = Pdfium::bind_to_system_library() {
        return Some(Pdfium::new(bindings));
    }

    if let Ok(lib_path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        if let Ok(bindings) =
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&lib_path))
        {
            return Some(Pdfium::new(bindings));
        }
    }

    if let Ok(bindings) =
        Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./lib/"))
    {
        return Some(Pdfium::new(bindings));
    }

    if let Ok(bindings) =
        Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
    {
        return Some(Pdfium::new(bindings));
    }

    None
}

/// Checks if Pdfium library is available by attempting to initialize it
pub fn is_pdfium_available() -> bool {
    let _guard = PDFIUM_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    try_create_pdfium().is_some()
}

/// Renders the first page of a PDF fitted into `size`
fn thumbnail_from_pdf(path: &Path, size: ThumbnailSize) -> Result<RgbaImage> {
    let _guard = PDFIUM_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let pdfium = try_create_pdfium()
        .ok_or_else(|| decode_failed(path, "Pdfium library not available"))?;

    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| decode_failed(path, format!("no document: {}", e)))?;

    let page = document
        .pages()
        .get(0)
        .map_err(|e| decode_failed(path, format!("no page: {}", e)))?;

    let render_config = PdfRenderConfig::new()
        .set_target_width(size.width as i32)
        .set_maximum_height(size.height as i32);

    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| decode_failed(path, format!("render failed: {}", e)))?;

    let width = bitmap.width() as u32;
    let height = bitmap.height() as u32;
    if width == 0 || height == 0 {
        return Err(decode_failed(path, "rendered page is empty"));
    }

    // Rows may carry alignment padding beyond width * 4 bytes
    let raw_buffer = bitmap.as_raw_bytes();
    let stride = raw_buffer.len() / (height as usize);
    let row_bytes = (width as usize) * 4;

    let mut buffer = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let row_start = row * stride;
        let row_end = row_start + row_bytes;
        if row_end <= raw_buffer.len() {
            buffer.extend_from_slice(&raw_buffer[row_start..row_end]);
        }
    }

    // Pdfium bitmaps are BGRA
    for pixel in buffer.chunks_exact_mut(4) {
        pixel.swap(0, 2);
    }

    RgbaImage::from_vec(width, height, buffer).ok_or_else(|| {
        decode_failed(
            path,
            format!(
                "bitmap buffer of {} bytes does not match {}x{}",
                raw_buffer.len(),
                width,
                height
            ),
        )
    })
}
