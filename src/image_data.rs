use std::{fs, path::Path};

use image::{imageops, DynamicImage};

use crate::error::{OcrDataError, Result};

/// Decodes `bytes` into a single-channel image with values in `[0, 1]`,
/// resized to exactly `height` x `width` (row-major, one value per pixel).
pub fn decode_and_resize(bytes: &[u8], height: u32, width: u32) -> Result<Vec<f32>> {
    decode_from(Path::new("<memory>"), bytes, height, width)
}

/// Reads and decodes the image at `path`. A read failure is reported as a
/// decode failure so the sample can be skipped like any undecodable one.
pub fn read_image<P: AsRef<Path>>(path: P, height: u32, width: u32) -> Result<Vec<f32>> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| OcrDataError::decode(path, e))?;
    decode_from(path, &bytes, height, width)
}

fn decode_from(origin: &Path, bytes: &[u8], height: u32, width: u32) -> Result<Vec<f32>> {
    let img = image::load_from_memory(bytes).map_err(|e| OcrDataError::decode(origin, e))?;
    Ok(resize_gray(img, height, width))
}

/// Converts to luma in `[0, 1]` first, then interpolates in `f32`.
fn resize_gray(img: DynamicImage, height: u32, width: u32) -> Vec<f32> {
    let gray = img.to_luma32f();
    let gray = if gray.height() == height && gray.width() == width {
        gray
    } else {
        imageops::resize(&gray, width, height, imageops::FilterType::Triangle)
    };

    gray.into_raw()
        .into_iter()
        .map(|px| px.clamp(0.0, 1.0))
        .collect()
}
