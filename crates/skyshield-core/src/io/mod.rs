pub mod fits;
pub mod image_io;
pub mod metadata;
pub mod reports;

use std::path::{Path, PathBuf};

use crate::error::{Result, SkyShieldError};
use crate::frame::{Frame, Mask};

/// Extensions accepted as input frames (lower case).
pub const FITS_EXTENSIONS: &[&str] = &["fits", "fit", "fts"];
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "tif", "tiff"];

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

pub fn is_fits(path: &Path) -> bool {
    extension_of(path).is_some_and(|e| FITS_EXTENSIONS.contains(&e.as_str()))
}

pub fn is_frame_file(path: &Path) -> bool {
    extension_of(path)
        .is_some_and(|e| FITS_EXTENSIONS.contains(&e.as_str()) || IMAGE_EXTENSIONS.contains(&e.as_str()))
}

/// File name without directory, lossily decoded.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// File name without its extension.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Read a frame and resolve its metadata.
pub fn read_frame(path: &Path) -> Result<Frame> {
    let name = file_name(path);
    if is_fits(path) {
        let image = fits::read_fits(path)?;
        let metadata = metadata::extract_metadata(&image.header, &name);
        Ok(Frame::with_metadata(image.data, metadata))
    } else if is_frame_file(path) {
        let data = image_io::load_image(path)?;
        Ok(Frame::with_metadata(data, metadata::metadata_from_filename(&name)))
    } else {
        Err(SkyShieldError::InvalidInput(format!(
            "unsupported frame format: {}",
            path.display()
        )))
    }
}

/// Read a mask from FITS or an image file.
pub fn read_mask(path: &Path) -> Result<Mask> {
    if is_fits(path) {
        fits::read_mask(path)
    } else {
        image_io::load_mask_image(path)
    }
}

/// Input frames of a folder, sorted by name. Masks and ground-truth files
/// (names containing `mask` or `_truth`) are skipped.
pub fn list_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(SkyShieldError::InvalidInput(format!(
            "not a directory: {}",
            dir.display()
        )));
    }
    let mut frames: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_frame_file(p))
        .filter(|p| {
            let name = file_name(p).to_ascii_lowercase();
            !name.contains("_truth") && !name.contains("mask")
        })
        .collect();
    frames.sort();
    Ok(frames)
}
