use std::path::Path;

use image::GrayImage;
use ndarray::Array2;

use crate::error::{Result, SkyShieldError};
use crate::frame::Mask;

/// Load a PNG/TIFF as grayscale f32 in [0.0, 1.0]. Colour images are reduced
/// to luminance.
pub fn load_image(path: &Path) -> Result<Array2<f32>> {
    let img = image::open(path)?;
    let gray = img.to_luma32f();
    let (w, h) = gray.dimensions();
    Array2::from_shape_vec((h as usize, w as usize), gray.into_raw())
        .map_err(|e| SkyShieldError::InvalidInput(e.to_string()))
}

/// Save a mask as an 8-bit PNG (255 = contaminated) for quick inspection.
pub fn save_mask_png(mask: &Mask, path: &Path) -> Result<()> {
    let (h, w) = mask.shape();
    let pixels: Vec<u8> = mask.data.iter().map(|&m| if m { 255 } else { 0 }).collect();
    let img = GrayImage::from_raw(w as u32, h as u32, pixels)
        .ok_or_else(|| SkyShieldError::InvalidDimensions { width: w, height: h })?;
    img.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}

/// Load a mask image; any non-zero pixel is contaminated.
pub fn load_mask_image(path: &Path) -> Result<Mask> {
    let img = image::open(path)?.to_luma8();
    let (w, h) = img.dimensions();
    let data = Array2::from_shape_vec((h as usize, w as usize), img.into_raw())
        .map_err(|e| SkyShieldError::InvalidInput(e.to_string()))?;
    Ok(Mask::from_u8(&data))
}
