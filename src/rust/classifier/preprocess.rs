use std::io::Cursor;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageReader, Limits, RgbImage};
use ndarray::Array4;

use super::error::ClassifierError;

/// Length the shorter image side is scaled to before cropping.
pub const RESIZE_SHORTER_SIDE: u32 = 256;
/// Side of the square window the network sees.
pub const CROP_SIZE: u32 = 224;
/// Per-channel ImageNet mean (RGB), matching training-time normalization.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// Per-channel ImageNet standard deviation (RGB).
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];
/// Largest width or height accepted from a decoder.
pub const MAX_IMAGE_SIDE: u32 = 16_384;
/// Largest long side the shorter-side resize may produce (caps the aspect ratio at 64:1).
pub const MAX_RESIZED_SIDE: u64 = 16_384;

fn decoder_limits() -> Limits {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_IMAGE_SIDE);
    limits.max_image_height = Some(MAX_IMAGE_SIDE);
    limits
}

/// Decodes an in-memory image. The format is sniffed from the content, never from a file name.
pub fn decode_bytes(bytes: &[u8]) -> Result<DynamicImage, ClassifierError> {
    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ClassifierError::DecodeError(e.to_string()))?;
    reader.limits(decoder_limits());
    let image = reader
        .decode()
        .map_err(|e| ClassifierError::DecodeError(e.to_string()))?;
    ensure_not_empty(image)
}

/// Decodes an image file. An unreadable path is reported as a decode failure.
pub fn decode_path(path: &Path) -> Result<DynamicImage, ClassifierError> {
    let mut reader = ImageReader::open(path)
        .map_err(|e| ClassifierError::DecodeError(format!("{}: {}", path.display(), e)))?
        .with_guessed_format()
        .map_err(|e| ClassifierError::DecodeError(format!("{}: {}", path.display(), e)))?;
    reader.limits(decoder_limits());
    let image = reader
        .decode()
        .map_err(|e| ClassifierError::DecodeError(format!("{}: {}", path.display(), e)))?;
    ensure_not_empty(image)
}

fn ensure_not_empty(image: DynamicImage) -> Result<DynamicImage, ClassifierError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(ClassifierError::DecodeError("Image has no pixels".into()));
    }
    Ok(image)
}

/// Scales `image` so its shorter side equals `target`, keeping the aspect ratio.
/// The longer side is truncated, not rounded.
///
/// # Errors
/// - `DecodeError` if the image is empty or the scaled long side would exceed
///   [`MAX_RESIZED_SIDE`]
pub fn resize_shorter_side(image: &RgbImage, target: u32) -> Result<RgbImage, ClassifierError> {
    let (width, height) = image.dimensions();
    let (short, long) = (width.min(height) as u64, width.max(height) as u64);
    if short == 0 {
        return Err(ClassifierError::DecodeError("Image has no pixels".into()));
    }
    let scaled_long = target as u64 * long / short;
    if scaled_long > MAX_RESIZED_SIDE {
        return Err(ClassifierError::DecodeError(format!(
            "Aspect ratio of {}x{} is out of range",
            width, height
        )));
    }
    // Bounded by MAX_RESIZED_SIDE above.
    let scaled_long = scaled_long as u32;
    let (new_width, new_height) = if width <= height {
        (target, scaled_long)
    } else {
        (scaled_long, target)
    };
    if (new_width, new_height) == (width, height) {
        return Ok(image.clone());
    }
    Ok(imageops::resize(image, new_width, new_height, FilterType::Triangle))
}

/// Cuts the centered `size`×`size` window out of `image`.
///
/// Callers resize first, so both sides are at least `size`. Offsets round half to even.
pub fn center_crop(image: &RgbImage, size: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    let left = (width.saturating_sub(size) as f64 / 2.0).round_ties_even() as u32;
    let top = (height.saturating_sub(size) as f64 / 2.0).round_ties_even() as u32;
    imageops::crop_imm(image, left, top, size.min(width), size.min(height)).to_image()
}

/// Converts an RGB image to a `[1, 3, H, W]` tensor scaled to `[0, 1]` and normalized with the
/// ImageNet statistics.
pub fn to_normalized_tensor(image: &RgbImage) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
    for (x, y, pixel) in image.enumerate_pixels() {
        for channel in 0..3 {
            let value = pixel[channel] as f32 / 255.0;
            tensor[[0, channel, y as usize, x as usize]] =
                (value - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel];
        }
    }
    tensor
}

/// Runs the full pipeline: RGB conversion, shorter-side resize, center crop, normalization.
pub fn preprocess(image: &DynamicImage) -> Result<Array4<f32>, ClassifierError> {
    let rgb = image.to_rgb8();
    let resized = resize_shorter_side(&rgb, RESIZE_SHORTER_SIDE)?;
    let cropped = center_crop(&resized, CROP_SIZE);
    Ok(to_normalized_tensor(&cropped))
}
